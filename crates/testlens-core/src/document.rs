use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A source document as reported by the editor host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uri: String,
    pub language_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Current buffer contents, when the host sends them along.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Document {
    pub fn new(uri: impl Into<String>, language_id: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            path: None,
            text: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_same(&self, other: &Document) -> bool {
        self.uri == other.uri
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Editor {
    pub document: Document,
    /// Editing column; panels such as output views have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_column: Option<u32>,
}

impl Editor {
    pub fn primary(document: Document) -> Self {
        Self {
            document,
            view_column: Some(1),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.view_column.is_some()
    }
}
