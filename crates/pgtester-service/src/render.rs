//! Presentation of dashboard state.
//!
//! A stored response is first reduced to a list of [`Block`]s according to
//! which known fields it carries; the HTML page and the CLI both render from
//! that list.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::dashboard::DashboardState;
use crate::endpoints::{ENDPOINTS, EndpointId};
use crate::models::ApiResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Failure(String),
    ObjectRepresentation(String),
    Type(String),
    DatabaseUrl(String),
    EnvironmentVariables(BTreeMap<String, String>),
    ConnectionParameters(BTreeMap<String, String>),
}

impl Block {
    /// Caption shown above the block. Failures have none.
    pub fn label(&self) -> Option<String> {
        match self {
            Block::Failure(_) => None,
            Block::ObjectRepresentation(_) => Some("Object Representation".to_string()),
            Block::Type(_) => Some("Type".to_string()),
            Block::DatabaseUrl(_) => Some("Database URL".to_string()),
            Block::EnvironmentVariables(vars) => {
                Some(format!("Environment Variables ({})", vars.len()))
            }
            Block::ConnectionParameters(_) => Some("Connection Parameters".to_string()),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Block::Failure(text)
            | Block::ObjectRepresentation(text)
            | Block::Type(text)
            | Block::DatabaseUrl(text) => text.clone(),
            Block::EnvironmentVariables(map) | Block::ConnectionParameters(map) => {
                pretty_json(map)
            }
        }
    }

    fn css_class(&self) -> &'static str {
        match self {
            Block::Failure(_) => "failure",
            Block::ObjectRepresentation(_) => "repr",
            Block::Type(_) => "type",
            Block::DatabaseUrl(_) => "db-url",
            Block::EnvironmentVariables(_) => "env-vars",
            Block::ConnectionParameters(_) => "conn-params",
        }
    }

    fn is_preformatted(&self) -> bool {
        matches!(
            self,
            Block::EnvironmentVariables(_) | Block::ConnectionParameters(_)
        )
    }
}

fn pretty_json(map: &BTreeMap<String, String>) -> String {
    serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string())
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.is_empty())
}

/// Blocks to display for `response`.
///
/// An error hides everything else. Otherwise each known field that is present
/// gets its own block, in a fixed order; empty strings count as absent.
pub fn response_blocks(response: &ApiResponse) -> Vec<Block> {
    if let Some(error) = response.error_message() {
        return vec![Block::Failure(error.to_string())];
    }

    let mut blocks = Vec::new();
    if let Some(result) = non_empty(&response.result) {
        blocks.push(Block::ObjectRepresentation(result.clone()));
    }
    if let Some(type_name) = non_empty(&response.type_name) {
        blocks.push(Block::Type(type_name.clone()));
    }
    if let Some(db_url) = non_empty(&response.db_url) {
        blocks.push(Block::DatabaseUrl(db_url.clone()));
    }
    if let Some(env_vars) = &response.env_vars {
        blocks.push(Block::EnvironmentVariables(env_vars.clone()));
    }
    if let Some(params) = &response.connection_params {
        blocks.push(Block::ConnectionParameters(params.clone()));
    }
    blocks
}

/// Plain-text rendering of one response card.
pub fn render_text(endpoint: EndpointId, response: &ApiResponse) -> String {
    let mut out = format!("Response: /{endpoint}\n");
    for block in response_blocks(response) {
        match block.label() {
            Some(label) => {
                let _ = writeln!(out, "  {label}:");
                for line in block.body().lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
            None => {
                let _ = writeln!(out, "  Error: {}", block.body());
            }
        }
    }
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn icon(name: &str) -> String {
    let glyph = match name {
        "Database" => "&#128451;",
        "Terminal" => "&#8984;",
        "Info" => "&#8505;",
        "FileJson" => "{ }",
        "Loader2" => "&#8635;",
        "Play" => "&#9654;",
        _ => "&#9679;",
    };
    format!("<span class=\"icon\" data-icon=\"{}\">{glyph}</span>", html_escape(name))
}

const STYLE: &str = "\
body{margin:0;min-height:100vh;background:linear-gradient(135deg,#1A1F2C,#2A2F3C,#1A1F2C);\
color:#fff;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;padding:2rem}
.page{max-width:72rem;margin:0 auto}
header{text-align:center;margin-bottom:3rem}
header h1{font-size:3rem;margin:0 0 1rem}
header p,.description,.caption{color:#9ca3af}
.grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(16rem,1fr));gap:1.5rem;margin-bottom:2rem}
.card{background:#2A2F3C;border:1px solid rgba(155,135,245,.2);border-radius:.75rem;padding:1.5rem}
.card h2{display:flex;align-items:center;gap:.5rem;margin:0 0 .5rem;font-size:1.25rem}
.icon{color:#9b87f5}
button{width:100%;padding:.6rem;border:0;border-radius:.5rem;background:#9b87f5;color:#fff;cursor:pointer}
button:hover{background:#7E69AB}
button:disabled{opacity:.6;cursor:wait}
.responses{display:flex;flex-direction:column;gap:1.5rem}
.block{margin-top:1rem}
.caption{font-size:.875rem;margin:0 0 .5rem}
.value{background:#1A1F2C;border:1px solid rgba(155,135,245,.1);border-radius:.5rem;padding:1rem;\
font-family:monospace;font-size:.875rem;word-break:break-all;margin:0}
pre.value{font-size:.75rem;overflow:auto;white-space:pre}
.repr .value{color:#9b87f5}.type .value{color:#4ade80}.db-url .value{color:#60a5fa}
.env-vars .value{color:#facc15;max-height:24rem}.conn-params .value{color:#22d3ee}
.failure{background:rgba(239,68,68,.1);border:1px solid rgba(239,68,68,.2);border-radius:.5rem;\
padding:1rem;color:#f87171;font-family:monospace;font-size:.875rem}
";

/// The dashboard page.
///
/// While a trigger is in flight the page asks the browser to reload itself
/// every second so the result shows up without user action.
pub fn render_dashboard(state: &DashboardState) -> String {
    let mut html = String::with_capacity(8_192);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    if state.loading.is_some() {
        html.push_str("<meta http-equiv=\"refresh\" content=\"1\">\n");
    }
    html.push_str("<title>PostgreSQL Tester</title>\n");
    let _ = write!(html, "<style>\n{STYLE}</style>\n");
    html.push_str("</head>\n<body>\n<div class=\"page\">\n");

    html.push_str("<header>\n<h1>PostgreSQL Tester</h1>\n");
    html.push_str("<p>Test your database connections</p>\n</header>\n");

    html.push_str("<section class=\"grid\">\n");
    for descriptor in &ENDPOINTS {
        let id = descriptor.id;
        let loading = state.loading == Some(id);
        let _ = write!(
            html,
            "<div class=\"card endpoint\" id=\"endpoint-{id}\">\n\
             <h2>{} {}</h2>\n\
             <p class=\"description\">Test /{id} endpoint</p>\n\
             <form method=\"post\" action=\"/web/trigger/{id}\">\n",
            icon(descriptor.icon),
            html_escape(descriptor.label),
        );
        if loading {
            let _ = writeln!(
                html,
                "<button type=\"submit\" disabled>{} Loading...</button>",
                icon("Loader2")
            );
        } else {
            let _ = writeln!(html, "<button type=\"submit\">{} Test</button>", icon("Play"));
        }
        html.push_str("</form>\n</div>\n");
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"responses\">\n");
    for (id, response) in state.responses.iter() {
        let _ = write!(
            html,
            "<div class=\"card response\" id=\"response-{id}\">\n<h2>{} Response: /{id}</h2>\n",
            icon("FileJson")
        );
        for block in response_blocks(response) {
            push_block(&mut html, &block);
        }
        html.push_str("</div>\n");
    }
    html.push_str("</section>\n");

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn push_block(html: &mut String, block: &Block) {
    let body = html_escape(&block.body());
    let Some(label) = block.label() else {
        let _ = writeln!(html, "<div class=\"{}\">{body}</div>", block.css_class());
        return;
    };

    let _ = write!(
        html,
        "<div class=\"block {}\">\n<p class=\"caption\">{}:</p>\n",
        block.css_class(),
        html_escape(&label)
    );
    if block.is_preformatted() {
        let _ = writeln!(html, "<pre class=\"value\">{body}</pre>");
    } else {
        let _ = writeln!(html, "<code class=\"value\">{body}</code>");
    }
    html.push_str("</div>\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_result_only_renders_object_representation() {
        let response = ApiResponse {
            result: Some("Connection(...)".to_string()),
            ..Default::default()
        };
        assert_eq!(
            response_blocks(&response),
            vec![Block::ObjectRepresentation("Connection(...)".to_string())]
        );
    }

    #[test]
    fn test_error_suppresses_other_fields() {
        let response = ApiResponse {
            result: Some("ignored".to_string()),
            type_name: Some("OperationalError".to_string()),
            error: Some("Failed to fetch".to_string()),
            ..Default::default()
        };
        assert_eq!(
            response_blocks(&response),
            vec![Block::Failure("Failed to fetch".to_string())]
        );
    }

    #[test]
    fn test_env_vars_label_counts_entries() {
        let block = Block::EnvironmentVariables(vars(&[("PGHOST", "db"), ("PGPORT", "5432")]));
        assert_eq!(block.label().as_deref(), Some("Environment Variables (2)"));
        assert_eq!(
            block.body(),
            "{\n  \"PGHOST\": \"db\",\n  \"PGPORT\": \"5432\"\n}"
        );
    }

    #[test]
    fn test_blocks_follow_fixed_order() {
        let response = ApiResponse {
            endpoint: Some("/info".to_string()),
            connection_params: Some(vars(&[("host", "db")])),
            db_url: Some("postgres://db/app".to_string()),
            env_vars: Some(BTreeMap::new()),
            type_name: Some("PgConnection".to_string()),
            result: Some("<PgConnection>".to_string()),
            error: None,
        };
        let labels: Vec<_> = response_blocks(&response)
            .iter()
            .filter_map(Block::label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "Object Representation",
                "Type",
                "Database URL",
                "Environment Variables (0)",
                "Connection Parameters",
            ]
        );
    }

    #[test]
    fn test_empty_strings_are_omitted() {
        let response = ApiResponse {
            result: Some(String::new()),
            type_name: Some(String::new()),
            error: Some(String::new()),
            ..Default::default()
        };
        assert!(response_blocks(&response).is_empty());
    }

    #[test]
    fn test_render_text() {
        let response = ApiResponse {
            result: Some("<PgCursor>".to_string()),
            type_name: Some("PgCursor".to_string()),
            ..Default::default()
        };
        assert_eq!(
            render_text(EndpointId::Cursor, &response),
            "Response: /cursor\n  Object Representation:\n    <PgCursor>\n  Type:\n    PgCursor\n"
        );
    }

    #[test]
    fn test_render_text_failure() {
        assert_eq!(
            render_text(EndpointId::Conn, &ApiResponse::failure("refused")),
            "Response: /conn\n  Error: refused\n"
        );
    }

    #[test]
    fn test_dashboard_lists_every_endpoint_card() {
        let html = render_dashboard(&DashboardState::default());
        for descriptor in &ENDPOINTS {
            assert!(html.contains(descriptor.label));
            assert!(html.contains(&format!("Test /{} endpoint", descriptor.id)));
            assert!(html.contains(&format!("action=\"/web/trigger/{}\"", descriptor.id)));
        }
        assert!(!html.contains("http-equiv=\"refresh\""));
        assert!(!html.contains("Response: /"));
    }

    #[test]
    fn test_dashboard_disables_only_loading_button() {
        let state = DashboardState {
            loading: Some(EndpointId::Info),
            ..Default::default()
        };
        let html = render_dashboard(&state);

        assert_eq!(html.matches(" disabled>").count(), 1);
        assert_eq!(html.matches("Loading...").count(), 1);
        assert_eq!(html.matches("> Test</button>").count(), 2);
        assert!(html.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_dashboard_escapes_response_text() {
        let mut state = DashboardState::default();
        state.responses.upsert(
            EndpointId::Conn,
            ApiResponse {
                result: Some("<connection object at 0x7f; closed: 0>".to_string()),
                ..Default::default()
            },
        );
        let html = render_dashboard(&state);

        assert!(html.contains("Response: /conn"));
        assert!(html.contains("Object Representation:"));
        assert!(html.contains("&lt;connection object at 0x7f; closed: 0&gt;"));
        assert!(!html.contains("<connection object"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
