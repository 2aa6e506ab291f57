//! YAML front matter delimited by `---` lines at the top of each document.
//!
//! Front matter is the authoritative record of which page and version a local
//! file holds. Keys this crate does not know about are preserved on rewrite.

use chrono::{DateTime, Utc};
use errors::MirrorError;
use mirror_core::types::PageState;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

const DELIMITER: &str = "---";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>
}

// Ids and titles are often written unquoted, which YAML reads as numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        )))
    }
}

impl FrontMatter {
    /// Page state as seen locally; `None` for documents never synced.
    pub fn page_state(&self) -> Option<PageState> {
        let page_id = self.page_id.clone()?;
        Some(PageState {
            page_id,
            title: self.title.clone().unwrap_or_default(),
            version: self.version.unwrap_or(0),
            updated_at: self.updated_at,
            synced_at: self.synced_at
        })
    }
}

/// A parsed document: optional front matter plus the body after it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub front_matter: Option<FrontMatter>,
    pub body: String
}

impl Document {
    /// Title from front matter, else the first level-one heading.
    pub fn title(&self) -> Option<String> {
        if let Some(title) = self.front_matter.as_ref().and_then(|f| f.title.clone()) {
            if !title.trim().is_empty() {
                return Some(title);
            }
        }
        self.body
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Split `text` into front matter and body.
///
/// Text that does not open with a `---` line has no front matter. An opening
/// delimiter without a closing one is an error.
pub fn parse(path: &str, text: &str) -> Result<Document, MirrorError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = strip_delimiter_line(text) else {
        return Ok(Document {
            front_matter: None,
            body: text.to_string()
        });
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let front_matter = if yaml.trim().is_empty() {
                FrontMatter::default()
            } else {
                serde_yaml::from_str(yaml).map_err(|e| MirrorError::FrontMatter {
                    path: path.to_string(),
                    reason: e.to_string()
                })?
            };
            return Ok(Document {
                front_matter: Some(front_matter),
                body: body.to_string()
            });
        }
        offset += line.len();
    }

    Err(MirrorError::FrontMatter {
        path: path.to_string(),
        reason: "missing closing '---' delimiter".to_string()
    })
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    text.strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
}

/// Render front matter and body back into a document.
pub fn render(front_matter: &FrontMatter, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(front_matter)?;
    Ok(format!("{}\n{}{}\n{}", DELIMITER, yaml, DELIMITER, body))
}

/// Read the page state recorded in a document, `None` when the document has
/// no usable front matter.
pub fn read_page_state(path: &str, text: &str) -> Option<PageState> {
    match parse(path, text) {
        Ok(doc) => doc.front_matter.and_then(|f| f.page_state()),
        Err(e) => {
            tracing::warn!("{}", e);
            None
        }
    }
}
