//! TCP probing for locally running inference servers.

use std::net::SocketAddr;
use std::time::Duration;

use ragprobe_core::EvalError;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Connect timeout used for each probed port.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Returns the address of the first port on `host` that accepts a TCP connection.
pub async fn discover_listener(host: &str, ports: &[u16], connect_timeout: Duration) -> Result<SocketAddr, EvalError> {
    for &port in ports {
        let attempt = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port))).await;

        match attempt {
            Ok(Ok(stream)) => {
                let addr = stream.peer_addr()?;
                info!("Found local listener at {}", addr);
                return Ok(addr);
            }
            Ok(Err(e)) => debug!("{}:{} refused: {}", host, port, e),
            Err(_) => debug!("{}:{} timed out", host, port),
        }
    }

    let tried = ports.iter().map(u16::to_string).collect::<Vec<_>>().join(", ");
    Err(EvalError::NoListener(format!("{host} ports [{tried}]")))
}

/// Builds the base URL for a discovered listener.
pub fn listener_url(addr: SocketAddr, path: &str) -> String {
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    format!("http://{addr}{path}")
}
