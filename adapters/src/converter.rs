//! Markdown passthrough converter.
//!
//! The remote stores page bodies as markdown, so conversion only normalizes
//! line endings and trailing whitespace in both directions.

use mirror_core::traits::{ContentConverter, Converted};

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownPassthrough;

impl MarkdownPassthrough {
    pub fn new() -> Self {
        Self
    }
}

fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.lines().map(trim_line_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

// Two trailing spaces are a markdown hard break; keep exactly those.
fn trim_line_end(line: &str) -> &str {
    let trimmed = line.trim_end();
    if line.len() >= trimmed.len() + 2 && line[trimmed.len()..].starts_with("  ") && !trimmed.is_empty() {
        &line[..trimmed.len() + 2]
    } else {
        trimmed
    }
}

impl ContentConverter for MarkdownPassthrough {
    fn to_local_format(&self, remote_body: &str) -> Converted {
        let mut text = normalize(remote_body);
        let mut warnings = Vec::new();
        if text.is_empty() {
            warnings.push("remote page body is empty".to_string());
        } else {
            text.push('\n');
        }
        Converted { text, warnings }
    }

    fn to_remote_format(&self, text: &str) -> Converted {
        let body = normalize(text);
        let mut warnings = Vec::new();
        if body.is_empty() {
            warnings.push("document body is empty".to_string());
        }
        Converted {
            text: body,
            warnings
        }
    }
}
