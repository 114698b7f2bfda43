use serde::{Deserialize, Serialize};

/// Top-level document response of a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
}

/// A console message emitted by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ConsoleMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}

/// A network response observed while the page loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
    pub method: String,
}

/// Opaque reference to the `index`th element matching `selector` on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// What the interaction engine needs to know about an element before clicking it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementInfo {
    pub text: String,
    pub href: Option<String>,
    pub visible: bool,
    pub enabled: bool,
}
