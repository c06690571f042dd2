//! HTML rendering of query results.

use chrono::{DateTime, Utc};
use mqwatch_store::Message;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Everything shown on the index page.
#[derive(Debug, Default)]
pub struct IndexPage<'a> {
    /// When the page was rendered.
    pub created: DateTime<Utc>,
    /// The raw query as typed.
    pub query: &'a str,
    /// Notice shown above the results (e.g. a rejected query).
    pub notice: Option<String>,
    /// Number of messages ever received.
    pub total_received: i64,
    /// Routing-key histogram, already sorted.
    pub frequencies: &'a [(String, usize)],
    /// Messages to list.
    pub messages: &'a [std::sync::Arc<Message>],
    /// Header shown as the message class.
    pub class_header: &'a str,
    /// Pretty-print JSON bodies.
    pub indent_json: bool,
}

const STYLE: &str = r#"body {
  font-family: Arial, sans-serif;
  font-size: 10pt;
}
tr {
  text-align: left;
}
.notice {
  color: darkred;
}
.message .content {
  background-color: lightyellow;
  font-family: Courier New, monospace;
}
.message .routingkey {
  font-family: Courier New, monospace;
  background-color: lightblue;
}"#;

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats a message body as text, optionally pretty-printing JSON.
///
/// Bodies that are not JSON are returned as-is (lossily decoded).
pub fn format_body(body: &[u8], indent: bool) -> String {
    if indent {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return pretty;
            }
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS.mmm`.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Formats headers as `name: value` lines, sorted by name.
pub fn format_headers(headers: &Map<String, Value>) -> String {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();

    let mut out = String::new();
    for name in names {
        let value = match &headers[name] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{name}: {value}");
    }
    out
}

/// Looks up the class header, ignoring ASCII case (HTTP lowercases names).
fn class_of<'m>(message: &'m Message, class_header: &str) -> &'m str {
    message
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(class_header))
        .and_then(|(_, value)| value.as_str())
        .unwrap_or_default()
}

/// Renders the index page.
pub fn render_index(page: &IndexPage<'_>) -> String {
    let mut html = String::with_capacity(4096 + page.messages.len() * 512);

    let _ = write!(
        html,
        "<!doctype html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n  <title>mqwatch</title>\n  <style type=\"text/css\">\n{STYLE}\n  </style>\n</head>\n<body>\n"
    );
    let _ = writeln!(
        html,
        "  Timestamp: {}, Total messages received: {}",
        format_time(page.created),
        page.total_received
    );
    let _ = writeln!(
        html,
        "  <h1>Query</h1>\n  <form method=\"get\" action=\"/\">\n  <input type=\"text\" name=\"q\" size=\"80\" value=\"{}\">\n  <input type=\"submit\" value=\"Query\">\n  </form>",
        escape_html(page.query)
    );

    if let Some(notice) = &page.notice {
        let _ = writeln!(html, "  <p class=\"notice\">{}</p>", escape_html(notice));
    }

    if !page.frequencies.is_empty() {
        html.push_str("  <h1>Frequencies</h1>\n  <table>\n  <tr><th>Routing Key</th><th>Message Count</th></tr>\n");
        for (key, count) in page.frequencies {
            let _ = writeln!(
                html,
                "  <tr><td>{}</td><td>{count}</td></tr>",
                escape_html(key)
            );
        }
        html.push_str("  </table>\n");
    }

    if page.messages.is_empty() {
        html.push_str("  <p>No messages.</p>\n");
    } else {
        html.push_str("  <h1>Messages</h1>\n");
        for message in page.messages {
            let class = class_of(message, page.class_header);
            let _ = writeln!(
                html,
                "  <div class=\"message\">\n    <span class=\"received\">{}</span> (#{}) <span class=\"routingkey\">{}</span> <span>{}</span>",
                format_time(message.received_at),
                message.seq,
                escape_html(&message.routing_key),
                escape_html(class)
            );
            if !message.sender.is_empty() {
                let _ = writeln!(
                    html,
                    "    <span class=\"sender\">from {}</span>",
                    escape_html(&message.sender)
                );
            }
            if !message.headers.is_empty() {
                let _ = writeln!(
                    html,
                    "    <div class=\"headers\"><pre>{}</pre></div>",
                    escape_html(&format_headers(&message.headers))
                );
            }
            let _ = writeln!(
                html,
                "    <div class=\"content\"><pre>{}</pre></div>\n  </div>",
                escape_html(&format_body(&message.body, page.indent_json))
            );
        }
    }

    html.push_str("</body>\n</html>\n");
    html
}
