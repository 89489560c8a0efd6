mod args;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ragprobe_config::Settings;
use tracing::{error, info};

use crate::args::{Cli, Command};

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    match cli.command {
        Command::Check(args) => commands::check(args, settings).await,
        Command::Rag(args) => commands::rag(args, settings).await,
        Command::Retrieval(args) => commands::retrieval(args, settings).await,
        Command::Models(args) => commands::models(args, settings).await,
        Command::Suites(args) => commands::suites(args),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    info!("Ollama host {}, request timeout {}s", settings.ollama_host, settings.timeout_secs);

    match run(cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use ragprobe_core::EvalError;

    use super::*;

    #[tokio::test]
    async fn missing_listener_fails_the_run() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let port_arg = port.to_string();
        let cli = Cli::try_parse_from(["ragprobe", "check", "--backend", "discovered", "--ports", port_arg.as_str()])
            .unwrap();

        let err = run(cli, &Settings::default()).await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<EvalError>(), Some(EvalError::NoListener(_))),
            "got {err:#}"
        );
    }
}
