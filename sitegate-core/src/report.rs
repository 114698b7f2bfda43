// Run artifacts, the per-run QA summary and text reports

use crate::discovery::{DiscoveryOutput, DiscoveryRun};
use crate::error::Result;
use crate::interaction::{InteractionAction, InteractionResult};
use crate::normalize::extract_url_path;
use crate::validation::{FailureReason, ValidationResult, ValidationStatus, ValidationSummary};
use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Serialize `value` as pretty JSON and move it into place in one step, so a
/// reader never sees a half-written artifact.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Load a discovery artifact written by an earlier `discover` run
pub fn read_discovery_output(path: &Path) -> Result<DiscoveryOutput> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetail {
    pub page: String,
    pub status: PageStatus,
    pub errors: Vec<String>,
}

/// Aggregate QA summary written at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaSummary {
    pub timestamp: String,
    pub total_pages: usize,
    pub passed_pages: usize,
    pub failed_pages: usize,
    pub broken_links: usize,
    pub console_error_pages: usize,
    pub network_failure_pages: usize,
    /// Milliseconds
    pub duration: u64,
    pub details: Vec<PageDetail>,
}

impl QaSummary {
    fn empty() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            total_pages: 0,
            passed_pages: 0,
            failed_pages: 0,
            broken_links: 0,
            console_error_pages: 0,
            network_failure_pages: 0,
            duration: 0,
            details: Vec::new(),
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.passed_pages as f64 / self.total_pages as f64 * 100.0
        }
    }
}

/// Collects page verdicts for one run. Owned by the caller and passed
/// explicitly; every run starts from [`ReportAccumulator::new`] or `reset`.
#[derive(Debug, Clone)]
pub struct ReportAccumulator {
    summary: QaSummary,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self {
            summary: QaSummary::empty(),
        }
    }

    pub fn reset(&mut self) {
        self.summary = QaSummary::empty();
    }

    pub fn record(&mut self, detail: PageDetail) {
        self.summary.total_pages += 1;

        match detail.status {
            PageStatus::Pass => self.summary.passed_pages += 1,
            PageStatus::Fail => {
                self.summary.failed_pages += 1;
                if detail.errors.iter().any(|e| e.contains("Console errors")) {
                    self.summary.console_error_pages += 1;
                }
                if detail.errors.iter().any(|e| e.contains("network failures")) {
                    self.summary.network_failure_pages += 1;
                }
            }
        }

        self.summary.details.push(detail);
    }

    /// Record a validation verdict. Anything but `pass` counts as failed.
    pub fn record_result(&mut self, result: &ValidationResult) {
        self.record(page_detail(result));
        if result.failure_reason == Some(FailureReason::NotFound) {
            self.add_broken_links(1);
        }
    }

    pub fn extend<'a>(&mut self, results: impl IntoIterator<Item = &'a ValidationResult>) {
        for result in results {
            self.record_result(result);
        }
    }

    pub fn add_broken_links(&mut self, count: usize) {
        self.summary.broken_links += count;
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.summary.duration = duration_ms;
    }

    pub fn summary(&self) -> &QaSummary {
        &self.summary
    }

    pub fn flush(&self, path: &Path) -> Result<()> {
        write_json(path, &self.summary)
    }
}

impl Default for ReportAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn page_detail(result: &ValidationResult) -> PageDetail {
    let mut errors = Vec::new();

    if let Some(reason) = result.failure_reason {
        match reason {
            FailureReason::ConsoleError => errors.push(format!(
                "Console errors: {}",
                result
                    .console_errors
                    .iter()
                    .map(|m| m.text.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            )),
            FailureReason::NetworkFailure => errors.push(format!(
                "{} network failures",
                result.failed_requests.len()
            )),
            FailureReason::AuthRedirect => errors.push(format!(
                "Redirected to login: {}",
                result.redirected_to.as_deref().unwrap_or("unknown")
            )),
            other => errors.push(format!("Failure: {}", other)),
        }
    }

    PageDetail {
        page: result.url.clone(),
        status: match result.status {
            ValidationStatus::Pass => PageStatus::Pass,
            _ => PageStatus::Fail,
        },
        errors,
    }
}

/// Human-readable discovery summary
pub fn generate_discovery_report(run: &DiscoveryRun) -> String {
    let summary = &run.summary;
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("# Discovery:\n");
    report.push_str(&format!("  Base URL: {}\n", run.output.metadata.base_url));
    report.push_str(&format!("  URLs found: {}\n", summary.total_after_sampling));
    report.push_str(&format!("  From sitemap: {}\n", summary.sitemap_count));
    report.push_str(&format!("  From crawl: {}\n", summary.crawl_count));
    report.push_str(&format!("  Duration: {:.1}s\n", summary.duration_ms as f64 / 1000.0));

    if let Some(ref adjusted) = run.output.metadata.adjusted_limits {
        report.push_str(&format!(
            "  {} {}\n",
            "Fallback:".yellow(),
            adjusted.reason
        ));
    }

    let dynamic: Vec<_> = summary
        .patterns_detected
        .iter()
        .filter(|(pattern, _)| crate::pattern::is_dynamic_pattern(pattern))
        .collect();
    if !dynamic.is_empty() {
        report.push_str("\n# Dynamic routes:\n");
        for (pattern, count) in dynamic {
            report.push_str(&format!("  /{} {}\n", pattern, format!("x{}", count).dimmed()));
        }
    }

    report.push('\n');
    report.push_str(RULE);
    report
}

/// Validation results grouped by host, worst first within each host
pub fn generate_validation_report(results: &[ValidationResult], summary: &ValidationSummary) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Pages validated: {}\n", summary.total_pages));
    report.push_str(&format!("  Passed: {}\n", summary.passed.to_string().green()));
    report.push_str(&format!("  Warnings: {}\n", summary.warning.to_string().yellow()));
    report.push_str(&format!("  Critical: {}\n", summary.critical.to_string().red()));
    report.push_str(&format!("  Pass rate: {:.1}%\n", summary.pass_rate()));
    report.push_str(&format!("  Broken links: {}\n", summary.broken_links()));
    report.push_str(&format!("  404 false positives: {}\n", summary.false_positives_404));
    if summary.duplicate_api_pages > 0 || summary.failed_api_calls > 0 {
        report.push_str(&format!(
            "  API: {} page(s) with duplicate calls, {} failed call(s)\n",
            summary.duplicate_api_pages, summary.failed_api_calls
        ));
    }
    report.push_str(&format!("  Average duration: {}ms\n", summary.average_duration));
    if !summary.slowest_page.url.is_empty() {
        report.push_str(&format!(
            "  Slowest page: {} ({}ms)\n",
            summary.slowest_page.url, summary.slowest_page.duration
        ));
    }

    if !summary.failures_by_category.is_empty() {
        report.push_str("\n# Failures by category:\n");
        for (reason, count) in &summary.failures_by_category {
            report.push_str(&format!("  {:<16} {}\n", reason, count));
        }
    }

    report.push('\n');
    report.push_str(RULE);
    report.push('\n');

    let mut by_host: BTreeMap<String, Vec<&ValidationResult>> = BTreeMap::new();
    for result in results {
        let host = Url::parse(&result.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(result);
    }

    for (host, mut host_results) in by_host {
        host_results.sort_by(|a, b| {
            status_rank(a.status)
                .cmp(&status_rank(b.status))
                .then_with(|| a.url.cmp(&b.url))
        });

        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages validated\n\n", host_results.len()));

        for result in host_results {
            let status = match result.status {
                ValidationStatus::Pass => "PASS".green(),
                ValidationStatus::Warning => "WARN".yellow(),
                ValidationStatus::Critical => "CRIT".red(),
            };

            let mut line = format!("  {} {}", status, extract_url_path(&result.url));
            if let Some(reason) = result.failure_reason {
                line.push_str(&format!(" {}", reason.as_str().dimmed()));
            }
            if let Some(ref target) = result.redirected_to {
                line.push_str(&format!(" -> {}", extract_url_path(target)));
            }
            line.push_str(&format!(" {}", format!("{}ms", result.duration).bright_black()));

            report.push_str(&line);
            report.push('\n');

            for issue in &result.api_monitoring.issues {
                report.push_str(&format!(
                    "       {} {} {}\n",
                    "api".dimmed(),
                    issue.api,
                    format!("({})", issue.description).bright_black()
                ));
            }
        }
        report.push('\n');
    }

    report
}

/// One line per interaction attempt on `url`
pub fn generate_interaction_report(url: &str, results: &[InteractionResult]) -> String {
    let clicked = results
        .iter()
        .filter(|r| r.action == InteractionAction::Clicked)
        .count();
    let skipped = results
        .iter()
        .filter(|r| r.action == InteractionAction::Skipped)
        .count();
    let failed = results
        .iter()
        .filter(|r| r.action == InteractionAction::Failed)
        .count();

    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("# Interactions on {}:\n", url));
    report.push_str(&format!(
        "  Clicked: {}  Skipped: {}  Failed: {}\n\n",
        clicked,
        skipped,
        failed.to_string().red()
    ));

    for result in results {
        let mark = match result.action {
            InteractionAction::Clicked => "CLICK".green(),
            InteractionAction::Validated => "LINK ".cyan(),
            InteractionAction::Skipped => "SKIP ".yellow(),
            InteractionAction::Failed => "FAIL ".red(),
        };
        let label = if result.label.trim().is_empty() {
            "(no text)".to_string()
        } else {
            result.label.trim().to_string()
        };

        let mut line = format!("  {} {:<32} {}", mark, label, result.outcome);
        if let Some(ref error) = result.error {
            line.push_str(&format!(" {}", error.dimmed()));
        }
        report.push_str(&line);
        report.push('\n');
    }

    report.push('\n');
    report.push_str(RULE);
    report
}

fn status_rank(status: ValidationStatus) -> u8 {
    match status {
        ValidationStatus::Critical => 0,
        ValidationStatus::Warning => 1,
        ValidationStatus::Pass => 2,
    }
}
