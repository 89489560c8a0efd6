//! Self-contained HTML table rendering.

use html_escape::encode_text;

use crate::Summary;

const STYLE: &str = "body{font-family:sans-serif;margin:2rem}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:.4rem;text-align:left;vertical-align:top}\
th{background:#f4f4f4}\
tr.pass td:last-child{color:#1a7f37}\
tr.fail td:last-child{color:#cf222e}\
.meta{color:#555}";

/// A table row and whether it counts as a pass.
pub(crate) struct Row {
    pub cells: Vec<String>,
    pub passed: bool,
}

/// Renders a titled page with metadata lines, a summary, and a results table.
pub(crate) fn render_page(title: &str, meta: &[(&str, String)], summary: &Summary, headers: &[&str], rows: &[Row]) -> String {
    let mut out = String::with_capacity(1024 + rows.len() * 256);

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", encode_text(title)));
    out.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>{}</h1>\n", encode_text(title)));

    out.push_str("<ul class=\"meta\">\n");
    for (key, value) in meta {
        out.push_str(&format!("<li><strong>{}</strong>: {}</li>\n", encode_text(key), encode_text(value)));
    }
    out.push_str("</ul>\n");

    out.push_str(&format!(
        "<p class=\"summary\">{} / {} passed ({:.1}%)</p>\n",
        summary.passed,
        summary.total,
        summary.pass_rate * 100.0
    ));

    out.push_str("<table>\n<thead><tr>");
    for header in headers {
        out.push_str(&format!("<th>{}</th>", encode_text(header)));
    }
    out.push_str("</tr></thead>\n<tbody>\n");

    for row in rows {
        let class = if row.passed { "pass" } else { "fail" };
        out.push_str(&format!("<tr class=\"{class}\">"));
        for cell in &row.cells {
            out.push_str(&format!("<td>{}</td>", encode_text(cell)));
        }
        out.push_str("</tr>\n");
    }

    out.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    out
}
