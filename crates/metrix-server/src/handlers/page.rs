//! 메트릭 목록 페이지.

use std::fmt::Write as _;

use axum::extract::State;
use axum::response::Html;
use metrix_core::models::metric::{format_gauge, Metric};

use crate::error::ApiError;
use crate::AppState;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Metrics</title>
    <style>
        table { border-collapse: collapse; width: 100%; margin: 20px 0; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
        th { background-color: #f2f2f2; }
        tr:nth-child(even) { background-color: #f9f9f9; }
    </style>
</head>
<body>
    <h1>Metrics</h1>
    <table>
        <tr><th>ID</th><th>Type</th><th>Value</th><th>Delta</th><th>Hash</th></tr>
"#;

const PAGE_TAIL: &str = "    </table>\n</body>\n</html>\n";

/// GET /
pub async fn metrics_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let mut metrics = state.service.get_all().await?;
    metrics.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Html(render(&metrics)))
}

fn render(metrics: &[Metric]) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + metrics.len() * 96);
    html.push_str(PAGE_HEAD);

    for m in metrics {
        // String에 대한 write!는 실패하지 않음
        let _ = writeln!(
            html,
            "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&m.id),
            m.kind,
            m.value.map(format_gauge).unwrap_or_default(),
            m.delta.map(|d| d.to_string()).unwrap_or_default(),
            escape(m.hash.as_deref().unwrap_or_default()),
        );
    }

    html.push_str(PAGE_TAIL);
    html
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
