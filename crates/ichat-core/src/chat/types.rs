//! Transcript entries, citations, and decoder events.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A citation attached to an assistant answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Path or URL of the originating document. May be missing.
    #[serde(default)]
    pub source: Option<String>,
}

impl Source {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }

    /// A citation whose locator is unknown.
    pub fn unavailable() -> Self {
        Self { source: None }
    }

    /// Returns the trimmed locator, or `None` when it is absent or blank.
    pub fn locator(&self) -> Option<&str> {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Reads one citation from loosely-shaped JSON.
    ///
    /// Accepts `{"source": "..."}` objects and bare strings. Anything else
    /// still yields an entry so the citation is shown as unavailable.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Object(map) => Self {
                source: map.get("source").and_then(Value::as_str).map(str::to_string),
            },
            _ => Self::unavailable(),
        }
    }
}

/// Reads a citation list, treating a missing or non-array value as empty.
pub fn sources_from_value(value: Option<&Value>) -> Vec<Source> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Source::from_value).collect())
        .unwrap_or_default()
}

fn deserialize_sources<'de, D>(deserializer: D) -> Result<Vec<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(sources_from_value(value.as_ref()))
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            loading: false,
            error: false,
        }
    }

    /// The empty assistant entry created at submission time.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            loading: true,
            error: false,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Events produced by the stream decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Replaces the current answer's content and sources wholesale
    Definition { text: String, sources: Vec<Source> },
    /// Appends text to the current answer
    TextChunk { text: String },
    /// Terminal marker; nothing follows for this exchange
    Done,
}

/// Non-streaming chat response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "deserialize_sources")]
    pub sources: Vec<Source>,
}
