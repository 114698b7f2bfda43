//! Validation: visit every discovered URL once and classify its health.
//!
//! A fixed pool of workers drains one shared FIFO queue. Each worker owns an
//! isolated browsing context from a [`DriverFactory`], so cookies and storage
//! never leak between workers. A failing page is classified and the worker
//! moves on; nothing raised while visiting a single URL escapes this module.

use crate::api_monitor::{ApiMonitoringResult, analyze_network};
use crate::config::{QualityGate, ValidationOptions};
use crate::normalize::is_internal_url;
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sitegate_scanner::{
    ConsoleMessage, DriverFactory, NavigateOptions, NetworkResponse, PageDriver, ScanError,
    WaitUntil,
};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Trimmed body text shorter than this means the page rendered blank
pub const MIN_BODY_TEXT_CHARS: usize = 50;

/// Called with (worker id, finished result)
pub type ValidationProgressCallback = Arc<dyn Fn(usize, &ValidationResult) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Warning,
    Critical,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pass => "pass",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureReason {
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "crash")]
    Crash,
    #[serde(rename = "404")]
    NotFound,
    #[serde(rename = "auth_redirect")]
    AuthRedirect,
    #[serde(rename = "5xx")]
    ServerError,
    #[serde(rename = "blank_page")]
    BlankPage,
    #[serde(rename = "console_error")]
    ConsoleError,
    #[serde(rename = "network_failure")]
    NetworkFailure,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::Crash => "crash",
            FailureReason::NotFound => "404",
            FailureReason::AuthRedirect => "auth_redirect",
            FailureReason::ServerError => "5xx",
            FailureReason::BlankPage => "blank_page",
            FailureReason::ConsoleError => "console_error",
            FailureReason::NetworkFailure => "network_failure",
        }
    }

    /// Status a page gets when this is its recorded reason
    pub fn status(&self) -> ValidationStatus {
        match self {
            FailureReason::Crash | FailureReason::ServerError | FailureReason::BlankPage => {
                ValidationStatus::Critical
            }
            _ => ValidationStatus::Warning,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub url: String,
    pub status: ValidationStatus,
    pub severity: Severity,
    /// Milliseconds spent loading the page
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure_reason: Option<FailureReason>,
    #[serde(rename = "is404FalsePositive")]
    pub is_404_false_positive: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub redirected_to: Option<String>,
    pub console_errors: Vec<ConsoleMessage>,
    pub failed_requests: Vec<NetworkResponse>,
    #[serde(default)]
    pub api_monitoring: ApiMonitoringResult,
    pub timestamp: String,
}

impl ValidationResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: ValidationStatus::Pass,
            severity: Severity::None,
            duration: 0,
            failure_reason: None,
            is_404_false_positive: false,
            redirected_to: None,
            console_errors: Vec::new(),
            failed_requests: Vec::new(),
            api_monitoring: ApiMonitoringResult::default(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        let status = reason.status();
        self.status = status;
        self.severity = match status {
            ValidationStatus::Critical => Severity::Critical,
            _ => Severity::Warning,
        };
        self.failure_reason = Some(reason);
    }

    /// Downgrade to warning unless already failed; the first reason sticks
    fn warn(&mut self, reason: FailureReason) {
        if self.failure_reason.is_none() {
            self.fail(reason);
        }
    }

    pub fn is_critical(&self) -> bool {
        self.status == ValidationStatus::Critical
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowestPage {
    pub url: String,
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_pages: usize,
    pub passed: usize,
    pub critical: usize,
    pub warning: usize,
    pub average_duration: u64,
    pub slowest_page: SlowestPage,
    #[serde(rename = "falsePositives404")]
    pub false_positives_404: usize,
    pub duration_ms: u64,
    pub failures_by_category: BTreeMap<String, usize>,
    /// Pages that repeated at least one same-origin API call
    #[serde(default)]
    pub duplicate_api_pages: usize,
    #[serde(default)]
    pub failed_api_calls: usize,
}

impl ValidationSummary {
    pub fn from_results(results: &[ValidationResult], duration_ms: u64) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();

        let total_duration: u64 = results.iter().map(|r| r.duration).sum();
        let average_duration = if results.is_empty() {
            0
        } else {
            (total_duration as f64 / results.len() as f64).round() as u64
        };

        let slowest_page = results
            .iter()
            .fold(SlowestPage::default(), |slowest, r| {
                if r.duration > slowest.duration {
                    SlowestPage {
                        url: r.url.clone(),
                        duration: r.duration,
                    }
                } else {
                    slowest
                }
            });

        let mut failures_by_category = BTreeMap::new();
        for reason in results.iter().filter_map(|r| r.failure_reason) {
            *failures_by_category
                .entry(reason.as_str().to_string())
                .or_insert(0) += 1;
        }

        Self {
            total_pages: results.len(),
            passed: count(ValidationStatus::Pass),
            critical: count(ValidationStatus::Critical),
            warning: count(ValidationStatus::Warning),
            average_duration,
            slowest_page,
            false_positives_404: results.iter().filter(|r| r.is_404_false_positive).count(),
            duration_ms,
            failures_by_category,
            duplicate_api_pages: results
                .iter()
                .filter(|r| r.api_monitoring.stats.duplicate_calls > 0)
                .count(),
            failed_api_calls: results
                .iter()
                .map(|r| r.api_monitoring.stats.failed_calls)
                .sum(),
        }
    }

    /// A run is acceptable when nothing critical was found; warnings never block
    pub fn is_acceptable(&self) -> bool {
        self.critical == 0
    }

    /// Percentage of pages that passed, 0 for an empty run
    pub fn pass_rate(&self) -> f64 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.passed as f64 / self.total_pages as f64 * 100.0
        }
    }

    /// Pages that answered with a genuine 404
    pub fn broken_links(&self) -> usize {
        self.failures_by_category
            .get(FailureReason::NotFound.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Every threshold of `gate` this run misses; empty when it clears the gate.
    ///
    /// The pass rate is not judged for a run without pages.
    pub fn gate_failures(&self, gate: &QualityGate) -> Vec<String> {
        let mut failures = Vec::new();

        if !self.is_acceptable() {
            failures.push(format!("{} critical page(s)", self.critical));
        }
        if self.total_pages > 0 && self.pass_rate() < f64::from(gate.min_pass_rate) {
            failures.push(format!(
                "pass rate {:.1}% is below {}%",
                self.pass_rate(),
                gate.min_pass_rate
            ));
        }
        if self.broken_links() > gate.max_broken_links {
            failures.push(format!(
                "{} broken link(s), at most {} allowed",
                self.broken_links(),
                gate.max_broken_links
            ));
        }

        failures
    }
}

/// Results of a validation run, in completion order
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub results: Vec<ValidationResult>,
    pub summary: ValidationSummary,
}

/// Visit `url` and classify it. Never fails: every error becomes a verdict.
pub async fn validate_page<D: PageDriver + ?Sized>(
    driver: &mut D,
    url: &str,
    options: &ValidationOptions,
) -> ValidationResult {
    let start = Instant::now();
    let mut result = ValidationResult::new(url);

    // Drop events left over from the previous page
    driver.take_console_messages();
    driver.take_network_responses();

    let navigate_options = NavigateOptions::new(WaitUntil::DomContentLoaded, options.page_timeout);
    let navigation =
        match tokio::time::timeout(options.page_timeout, driver.navigate(url, navigate_options)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ScanError::Timeout(options.page_timeout.as_millis() as u64)),
        };

    result.duration = start.elapsed().as_millis() as u64;
    result.console_errors = driver
        .take_console_messages()
        .into_iter()
        .filter(ConsoleMessage::is_error)
        .collect();
    let responses = driver.take_network_responses();
    result.api_monitoring = analyze_network(&responses, url);
    result.failed_requests = responses.into_iter().filter(|r| r.status >= 400).collect();

    let response = match navigation {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            debug!("Timed out validating {}: {}", url, e);
            result.fail(FailureReason::Timeout);
            return result;
        }
        Err(e) => {
            debug!("Navigation crashed for {}: {}", url, e);
            result.fail(FailureReason::Crash);
            result.console_errors.push(ConsoleMessage::error(e.to_string()));
            return result;
        }
    };

    let final_url = driver.current_url();
    let body_text = driver.body_text().await.unwrap_or_default();

    if response.status == 404 {
        if body_text.contains("404") || body_text.contains("Page Not Found") {
            debug!("{} looks like a soft 404 page", url);
        }

        if (options.auth_redirect)(&final_url) {
            result.redirected_to = Some(final_url);
            result.is_404_false_positive = true;
            result.fail(FailureReason::AuthRedirect);
        } else {
            result.fail(FailureReason::NotFound);
        }
        return result;
    }

    if response.status >= 500 {
        result.fail(FailureReason::ServerError);
        return result;
    }

    if body_text.trim().chars().count() < MIN_BODY_TEXT_CHARS {
        result.fail(FailureReason::BlankPage);
        return result;
    }

    if result
        .console_errors
        .iter()
        .any(|e| !options.is_ignored_console_error(&e.text))
    {
        result.warn(FailureReason::ConsoleError);
    }

    let has_bad_requests = result.failed_requests.iter().any(|r| {
        (400..500).contains(&r.status) && r.status != 404 && is_internal_url(&r.url, url)
    });
    if has_bad_requests && !result.is_critical() {
        result.warn(FailureReason::NetworkFailure);
    }

    result
}

/// Validate every URL exactly once with a pool of `options.concurrency` workers.
///
/// Output order follows completion, not input; index by URL if order matters.
pub async fn validate_many(
    factory: Arc<dyn DriverFactory>,
    urls: Vec<String>,
    options: ValidationOptions,
    progress_callback: Option<ValidationProgressCallback>,
) -> ValidationRun {
    let start = Instant::now();
    let total = urls.len();
    let workers = options.concurrency.max(1).min(total);

    info!(
        "Starting validation for {} URLs (concurrency {}, timeout {}ms)",
        total,
        options.concurrency,
        options.page_timeout.as_millis()
    );

    let queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(urls.into_iter().collect()));
    let results: Arc<Mutex<Vec<ValidationResult>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let options = Arc::new(options);

    let mut worker_handles = Vec::with_capacity(workers);
    for worker_id in 1..=workers {
        let factory = factory.clone();
        let queue = queue.clone();
        let results = results.clone();
        let options = options.clone();
        let progress_cb = progress_callback.clone();

        let handle = tokio::spawn(async move {
            debug!("Worker {} started", worker_id);

            let mut context = match factory.new_context().await {
                Ok(driver) => Ok(driver),
                Err(e) => {
                    warn!("Worker {} could not open a browsing context: {}", worker_id, e);
                    Err(e.to_string())
                }
            };

            loop {
                // Lock only for the pop so no two workers take the same URL
                let next = queue.lock().await.pop_front();
                let Some(url) = next else {
                    break;
                };

                let result = match context {
                    Ok(ref mut driver) => validate_page(driver.as_mut(), &url, &options).await,
                    Err(ref message) => context_failure(&url, message),
                };

                debug!(
                    "[Worker {}] {} {} ({}) - {}ms",
                    worker_id,
                    result.status,
                    url,
                    result
                        .failure_reason
                        .map(|r| r.as_str())
                        .unwrap_or("OK"),
                    result.duration
                );

                if let Some(ref callback) = progress_cb {
                    callback(worker_id, &result);
                }
                results.lock().await.push(result);
            }

            debug!("Worker {} finished", worker_id);
        });

        worker_handles.push(handle);
    }

    for outcome in join_all(worker_handles).await {
        if let Err(e) = outcome {
            warn!("Validation worker task failed: {}", e);
        }
    }

    let results = std::mem::take(&mut *results.lock().await);
    let summary = ValidationSummary::from_results(&results, start.elapsed().as_millis() as u64);

    info!(
        "Validation complete in {}ms. Pass: {} | Critical: {} | Warning: {}",
        summary.duration_ms, summary.passed, summary.critical, summary.warning
    );

    ValidationRun { results, summary }
}

fn context_failure(url: &str, message: &str) -> ValidationResult {
    let mut result = ValidationResult::new(url);
    result.fail(FailureReason::Crash);
    result
        .console_errors
        .push(ConsoleMessage::error(format!("browsing context unavailable: {}", message)));
    result
}
