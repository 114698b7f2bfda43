use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Navigation timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No document loaded")]
    NoDocument,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// True when the failure was the navigation running out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            ScanError::Timeout(_) => true,
            ScanError::HttpError(e) => e.is_timeout(),
            other => other.to_string().to_lowercase().contains("timeout"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
