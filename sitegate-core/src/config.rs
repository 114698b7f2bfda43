// Run configuration for discovery and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_SAMPLE_DYNAMIC_ROUTES: usize = 5;
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MIN_PASS_RATE: u8 = 80;
pub const DEFAULT_MAX_BROKEN_LINKS: usize = 4;

/// Console messages containing any of these are treated as third-party noise
pub const IGNORED_CONSOLE_PATTERNS: &[&str] = &["favicon.ico", "stripe", "intercom"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base URL {0:?} is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("minimum pass rate {0}% is not a percentage")]
    InvalidPassRate(u8),

    #[error("authenticated run requested but no session cookie was provided (set SITEGATE_AUTH_COOKIE)")]
    MissingCredentials,
}

/// Budget for one discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryLimits {
    pub max_pages: usize,
    pub max_depth: usize,
    pub sample_dynamic_routes: usize,
    #[serde(skip)]
    pub timeout: Duration,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
            sample_dynamic_routes: DEFAULT_SAMPLE_DYNAMIC_ROUTES,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

/// Decides whether the final URL of a 404 response is really a login redirect
pub type AuthRedirectPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub fn looks_like_auth_redirect(final_url: &str) -> bool {
    final_url.contains("/login") || final_url.contains("signin")
}

#[derive(Clone)]
pub struct ValidationOptions {
    pub concurrency: usize,
    pub page_timeout: Duration,
    pub ignored_console_patterns: Vec<String>,
    pub auth_redirect: AuthRedirectPredicate,
}

impl ValidationOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    pub fn with_auth_redirect(mut self, predicate: AuthRedirectPredicate) -> Self {
        self.auth_redirect = predicate;
        self
    }

    pub fn is_ignored_console_error(&self, text: &str) -> bool {
        self.ignored_console_patterns
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            ignored_console_patterns: IGNORED_CONSOLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            auth_redirect: Arc::new(looks_like_auth_redirect),
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("concurrency", &self.concurrency)
            .field("page_timeout", &self.page_timeout)
            .field("ignored_console_patterns", &self.ignored_console_patterns)
            .finish_non_exhaustive()
    }
}

/// Credentials for runs against pages behind a login
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub required: bool,
    pub session_cookie: Option<String>,
}

/// Thresholds a validation run must meet to pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityGate {
    /// Percent of pages that must pass, 0..=100
    pub min_pass_rate: u8,
    pub max_broken_links: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            min_pass_rate: DEFAULT_MIN_PASS_RATE,
            max_broken_links: DEFAULT_MAX_BROKEN_LINKS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    pub discovery: DiscoveryLimits,
    pub validation: ValidationOptions,
    pub auth: AuthConfig,
    pub gate: QualityGate,
}

impl RunConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            discovery: DiscoveryLimits::default(),
            validation: ValidationOptions::default(),
            auth: AuthConfig::default(),
            gate: QualityGate::default(),
        }
    }

    /// Base URL without a trailing slash, the form sitemap paths are built from
    pub fn trimmed_base_url(&self) -> &str {
        let trimmed = self.base_url.trim_end_matches('/');
        if trimmed.is_empty() { &self.base_url } else { trimmed }
    }

    /// Reject configurations that must abort before any page is visited
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(self.base_url.clone())),
        }

        if self.discovery.max_pages == 0 {
            return Err(ConfigError::ZeroLimit("max pages"));
        }
        if self.validation.concurrency == 0 {
            return Err(ConfigError::ZeroLimit("concurrency"));
        }
        if self.validation.page_timeout.is_zero() {
            return Err(ConfigError::ZeroLimit("page timeout"));
        }
        if self.gate.min_pass_rate > 100 {
            return Err(ConfigError::InvalidPassRate(self.gate.min_pass_rate));
        }

        let has_cookie = self
            .auth
            .session_cookie
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if self.auth.required && !has_cookie {
            return Err(ConfigError::MissingCredentials);
        }

        Ok(())
    }
}
