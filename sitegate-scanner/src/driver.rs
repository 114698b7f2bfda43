//! Page driver abstraction.
//!
//! The discovery and validation engines never talk to a browser directly. They
//! consume a [`PageDriver`], so any automation backend (a real browser over CDP,
//! the bundled [`HttpDriver`](crate::HttpDriver), or a scripted fake in tests) can
//! sit underneath them.

use crate::error::Result;
use crate::result::{ConsoleMessage, ElementHandle, ElementInfo, NetworkResponse, PageResponse};
use async_trait::async_trait;
use std::time::Duration;

/// Lifecycle event a navigation waits for before it is considered complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    #[default]
    DomContentLoaded,
    Load,
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

impl NavigateOptions {
    pub fn new(wait_until: WaitUntil, timeout: Duration) -> Self {
        Self {
            wait_until,
            timeout,
        }
    }
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self::new(WaitUntil::DomContentLoaded, Duration::from_secs(30))
    }
}

/// Capability set consumed by discovery and validation.
///
/// Console and network events are buffered per navigation: `navigate` clears
/// both buffers and the `take_*` methods drain whatever the last navigation
/// produced.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url`. Errors for failures to load at all; HTTP error
    /// statuses are reported through the returned response.
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<PageResponse>;

    /// URL of the currently loaded document, after redirects
    fn current_url(&self) -> String;

    /// Absolute `href` values of every anchor on the page, in document order
    async fn extract_anchor_hrefs(&mut self) -> Result<Vec<String>>;

    /// Text content of `<body>`
    async fn body_text(&mut self) -> Result<String>;

    /// Raw source of the current document
    async fn content(&mut self) -> Result<String>;

    fn take_console_messages(&mut self) -> Vec<ConsoleMessage>;

    fn take_network_responses(&mut self) -> Vec<NetworkResponse>;
}

/// Element-level operations used by the interaction engine
#[async_trait]
pub trait InteractivePage: PageDriver {
    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>>;

    async fn element_info(&mut self, element: &ElementHandle) -> Result<ElementInfo>;

    /// Click the element. `force` skips actionability checks (overlays etc).
    async fn click(&mut self, element: &ElementHandle, force: bool) -> Result<()>;

    async fn count(&mut self, selector: &str) -> Result<usize>;

    async fn go_back(&mut self, timeout: Duration) -> Result<()>;

    /// Give the page time to react to the last action
    async fn settle(&mut self, duration: Duration);
}

/// Opens isolated browsing contexts, one per validation worker.
///
/// Contexts must not share cookies or storage with each other.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn PageDriver>>;
}
