//! Analysis of the requests a page made while it loaded.
//!
//! Only same-origin calls are considered. Repeated `METHOD url` pairs and
//! failed calls are reported as issues; response bodies are never inspected.

use crate::normalize::is_internal_url;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sitegate_scanner::NetworkResponse;

/// A call repeated more often than this is a warning rather than info
pub const DUPLICATE_WARNING_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiIssueKind {
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiIssueSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiIssue {
    #[serde(rename = "type")]
    pub kind: ApiIssueKind,
    pub severity: ApiIssueSeverity,
    pub api: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    pub total_calls: usize,
    pub unique_apis: usize,
    /// Distinct `METHOD url` pairs called more than once
    pub duplicate_calls: usize,
    pub failed_calls: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMonitoringResult {
    pub issues: Vec<ApiIssue>,
    pub stats: ApiStats,
}

impl ApiMonitoringResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Analyze the network responses observed on `page_url`.
pub fn analyze_network(responses: &[NetworkResponse], page_url: &str) -> ApiMonitoringResult {
    let calls: Vec<&NetworkResponse> = responses
        .iter()
        .filter(|r| is_internal_url(&r.url, page_url))
        .collect();

    let mut call_counts: IndexMap<String, usize> = IndexMap::new();
    for call in &calls {
        *call_counts
            .entry(format!("{} {}", call.method, call.url))
            .or_insert(0) += 1;
    }

    let mut issues = Vec::new();
    let mut duplicate_calls = 0;
    for (api, &count) in &call_counts {
        if count > 1 {
            duplicate_calls += 1;
            issues.push(ApiIssue {
                kind: ApiIssueKind::Duplicate,
                severity: if count > DUPLICATE_WARNING_THRESHOLD {
                    ApiIssueSeverity::Warning
                } else {
                    ApiIssueSeverity::Info
                },
                api: api.clone(),
                description: format!("API called {} times on same page", count),
            });
        }
    }

    let failed: Vec<&&NetworkResponse> = calls.iter().filter(|c| c.status >= 400).collect();
    for call in &failed {
        issues.push(ApiIssue {
            kind: ApiIssueKind::Error,
            severity: if call.status >= 500 {
                ApiIssueSeverity::Critical
            } else {
                ApiIssueSeverity::Warning
            },
            api: call.url.clone(),
            description: format!("API call failed with status {}", call.status),
        });
    }

    ApiMonitoringResult {
        issues,
        stats: ApiStats {
            total_calls: calls.len(),
            unique_apis: call_counts.len(),
            duplicate_calls,
            failed_calls: failed.len(),
        },
    }
}
