//! Discovery: enumerate reachable pages of a site without judging their health.
//!
//! A run first drains the sitemap tree, then does a breadth-first crawl from
//! the base URL and every sitemap page. It is bounded by page count, depth,
//! per-route-pattern samples and a wall-clock budget. When the budget is
//! exceeded the limits shrink once and the run carries on.

use crate::config::DiscoveryLimits;
use crate::normalize::{is_internal_url, normalize_url};
use crate::pattern::{is_dynamic_pattern, pattern_of};
use crate::safety::should_exclude_from_crawl;
use crate::sitemap::SitemapTree;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sitegate_scanner::{NavigateOptions, PageDriver, WaitUntil};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-page navigation timeout while crawling
pub const CRAWL_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Called with (pages discovered so far, URL being expanded)
pub type DiscoveryProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Sitemap,
    Crawl,
}

/// A link found during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlCandidate {
    pub url: String,
    pub depth: usize,
    pub source: CandidateSource,
}

impl CrawlCandidate {
    pub fn new(url: impl Into<String>, depth: usize, source: CandidateSource) -> Self {
        Self {
            url: url.into(),
            depth,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Sitemap,
    Crawl,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedLimits {
    pub max_pages: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryMetadata {
    pub base_url: String,
    pub generated_at: String,
    pub limits: DiscoveryLimits,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub adjusted_limits: Option<AdjustedLimits>,
}

/// Discovery artifact consumed by the validation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOutput {
    pub metadata: DiscoveryMetadata,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    pub total_found: usize,
    pub total_after_exclusions: usize,
    pub total_after_sampling: usize,
    pub duration_ms: u64,
    pub sitemap_count: usize,
    pub crawl_count: usize,
    pub patterns_detected: IndexMap<String, usize>,
    pub fallback_triggered: bool,
}

/// Everything a discovery run produced
#[derive(Debug, Clone)]
pub struct DiscoveryRun {
    pub output: DiscoveryOutput,
    pub summary: DiscoverySummary,
    /// Discovered pages in discovery order, with provenance
    pub pages: Vec<CrawlCandidate>,
}

impl DiscoveryRun {
    /// A run that found nothing, for when no browsing context could be opened
    pub fn empty(base_url: impl Into<String>, limits: DiscoveryLimits) -> Self {
        Self {
            output: DiscoveryOutput {
                metadata: DiscoveryMetadata {
                    base_url: base_url.into(),
                    generated_at: Utc::now().to_rfc3339(),
                    limits,
                    adjusted_limits: None,
                },
                urls: Vec::new(),
            },
            summary: DiscoverySummary {
                total_found: 0,
                total_after_exclusions: 0,
                total_after_sampling: 0,
                duration_ms: 0,
                sitemap_count: 0,
                crawl_count: 0,
                patterns_detected: IndexMap::new(),
                fallback_triggered: false,
            },
            pages: Vec::new(),
        }
    }
}

/// Mutable traversal state. Only ever touched between driver calls.
#[derive(Debug, Default)]
struct DiscoveryState {
    discovered: IndexMap<String, CrawlCandidate>,
    visited: HashSet<String>,
    pattern_counts: IndexMap<String, usize>,
    queue: VecDeque<CrawlCandidate>,
    sitemap_count: usize,
    crawl_count: usize,
}

impl DiscoveryState {
    /// Whether another URL of `pattern` may still be discovered
    fn has_sample_quota(&self, pattern: &str, sample_limit: usize) -> bool {
        let count = self.pattern_counts.get(pattern).copied().unwrap_or(0);
        count < sample_limit || !is_dynamic_pattern(pattern)
    }

    fn record(&mut self, candidate: CrawlCandidate, pattern: String) {
        *self.pattern_counts.entry(pattern).or_insert(0) += 1;
        match candidate.source {
            CandidateSource::Sitemap => self.sitemap_count += 1,
            CandidateSource::Crawl => self.crawl_count += 1,
        }
        self.discovered.insert(candidate.url.clone(), candidate);
    }
}

pub struct DiscoveryEngine {
    base_url: String,
    limits: DiscoveryLimits,
    progress_callback: Option<DiscoveryProgressCallback>,
}

impl DiscoveryEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_limits(base_url, DiscoveryLimits::default())
    }

    pub fn with_limits(base_url: impl Into<String>, limits: DiscoveryLimits) -> Self {
        let base_url: String = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        let base_url = if trimmed.is_empty() { base_url.clone() } else { trimmed.to_string() };

        Self {
            base_url,
            limits,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: DiscoveryProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run discovery to completion. Navigation failures are never fatal.
    pub async fn discover<D: PageDriver + ?Sized>(&self, driver: &mut D) -> DiscoveryRun {
        let start = Instant::now();
        let base = self.base_url.as_str();
        let mut max_pages = self.limits.max_pages;
        let mut max_depth = self.limits.max_depth;
        let sample_limit = self.limits.sample_dynamic_routes;

        let mut state = DiscoveryState::default();
        let mut adjusted_limits = None;

        info!(
            "Starting URL discovery for {} (max pages {}, max depth {}, timeout {}ms)",
            base,
            max_pages,
            max_depth,
            self.limits.timeout.as_millis()
        );

        // The base URL is always a crawl entry point, even without a sitemap
        if should_exclude_from_crawl(base) {
            warn!("Base URL {} matches a crawl exclusion; only sitemap pages will be seeded", base);
        } else {
            state
                .queue
                .push_back(CrawlCandidate::new(base, 0, CandidateSource::Crawl));
        }

        let mut phase = DiscoveryPhase::Sitemap;
        debug!("Discovery phase: {:?}", phase);

        let mut sitemaps = SitemapTree::new(base);
        'sitemaps: while state.discovered.len() < max_pages {
            let Some(batch) = sitemaps.next_batch(driver).await else {
                break;
            };

            for loc in batch {
                if state.discovered.len() >= max_pages {
                    break 'sitemaps;
                }

                let normalized = normalize_url(&loc, base);
                if !is_internal_url(&normalized, base)
                    || should_exclude_from_crawl(&normalized)
                    || state.discovered.contains_key(&normalized)
                {
                    continue;
                }

                let pattern = pattern_of(&normalized);
                if !state.has_sample_quota(&pattern, sample_limit) {
                    debug!("Skipping sitemap entry (pattern limit): {}", normalized);
                    continue;
                }

                let candidate = CrawlCandidate::new(normalized, 0, CandidateSource::Sitemap);
                if max_depth > 0 {
                    state.queue.push_back(candidate.clone());
                }
                state.record(candidate, pattern);
            }
        }

        info!(
            "Sitemap processing complete. Found {} initial pages in {} sitemap(s)",
            state.sitemap_count,
            sitemaps.visited_count()
        );

        phase = DiscoveryPhase::Crawl;
        debug!("Discovery phase: {:?}", phase);

        while !state.queue.is_empty() && state.discovered.len() < max_pages {
            let elapsed = start.elapsed();
            if elapsed > self.limits.timeout && adjusted_limits.is_none() {
                let original_max_pages = max_pages;
                (max_pages, max_depth) = fallback_limits(max_pages, max_depth);

                let reason = format!(
                    "Timeout exceeded. Limits reduced: Pages {}->{}, Depth -> {}",
                    original_max_pages, max_pages, max_depth
                );
                warn!(
                    "Discovery timeout exceeded ({}ms > {}ms). Applying fallback policy: {}",
                    elapsed.as_millis(),
                    self.limits.timeout.as_millis(),
                    reason
                );
                adjusted_limits = Some(AdjustedLimits { max_pages, reason });

                if state.discovered.len() >= max_pages {
                    break;
                }
            }

            let Some(current) = state.queue.pop_front() else {
                break;
            };
            let normalized = normalize_url(&current.url, base);

            if state.visited.contains(&normalized) {
                continue;
            }

            // Sitemap pages were admitted (and counted) when seeded
            if !state.discovered.contains_key(&normalized) {
                let pattern = pattern_of(&normalized);
                if !state.has_sample_quota(&pattern, sample_limit) {
                    debug!("Skipping (pattern limit): {}", normalized);
                    continue;
                }
                state.record(
                    CrawlCandidate::new(normalized.clone(), current.depth, CandidateSource::Crawl),
                    pattern,
                );
            }
            state.visited.insert(normalized.clone());

            if current.depth >= max_depth {
                continue;
            }

            if let Some(ref callback) = self.progress_callback {
                callback(state.discovered.len(), normalized.clone());
            }

            let links = match self.expand(driver, &normalized).await {
                Some(links) => links,
                None => continue,
            };

            for link in links {
                let normalized_link = normalize_url(&link, base);
                if is_internal_url(&normalized_link, base)
                    && !should_exclude_from_crawl(&normalized_link)
                    && !state.visited.contains(&normalized_link)
                {
                    state.queue.push_back(CrawlCandidate::new(
                        normalized_link,
                        current.depth + 1,
                        CandidateSource::Crawl,
                    ));
                }
            }
        }

        phase = DiscoveryPhase::Done;
        debug!("Discovery phase: {:?}", phase);

        let duration_ms = start.elapsed().as_millis() as u64;
        let pages: Vec<CrawlCandidate> = state.discovered.into_values().collect();
        let urls: Vec<String> = pages.iter().map(|p| p.url.clone()).collect();

        info!("Discovery complete: {} URLs found in {}ms", urls.len(), duration_ms);

        let summary = DiscoverySummary {
            total_found: urls.len(),
            total_after_exclusions: urls.len(),
            total_after_sampling: urls.len(),
            duration_ms,
            sitemap_count: state.sitemap_count,
            crawl_count: state.crawl_count,
            patterns_detected: state.pattern_counts,
            fallback_triggered: adjusted_limits.is_some(),
        };

        let output = DiscoveryOutput {
            metadata: DiscoveryMetadata {
                base_url: self.base_url.clone(),
                generated_at: Utc::now().to_rfc3339(),
                limits: self.limits,
                adjusted_limits,
            },
            urls,
        };

        DiscoveryRun {
            output,
            summary,
            pages,
        }
    }

    /// Load a page and return its anchors; failures contribute no links
    async fn expand<D: PageDriver + ?Sized>(&self, driver: &mut D, url: &str) -> Option<Vec<String>> {
        let options = NavigateOptions::new(WaitUntil::DomContentLoaded, CRAWL_NAVIGATION_TIMEOUT);

        if let Err(e) = driver.navigate(url, options).await {
            debug!("Ignoring navigation error during discovery for {}: {}", url, e);
            return None;
        }

        match driver.extract_anchor_hrefs().await {
            Ok(links) => {
                debug!("Crawled {} (found {} links)", url, links.len());
                Some(links)
            }
            Err(e) => {
                debug!("Could not extract links from {}: {}", url, e);
                None
            }
        }
    }
}

/// Convenience wrapper: discover `base_url` under `limits`
pub async fn discover_urls<D: PageDriver + ?Sized>(
    driver: &mut D,
    base_url: &str,
    limits: DiscoveryLimits,
) -> DiscoveryRun {
    DiscoveryEngine::with_limits(base_url, limits)
        .discover(driver)
        .await
}

/// Limits after the timeout fallback: 75% of the pages (rounded down) and one
/// level less depth, never below 1
fn fallback_limits(max_pages: usize, max_depth: usize) -> (usize, usize) {
    (
        max_pages - max_pages.div_ceil(4),
        max_depth.saturating_sub(1).max(1),
    )
}
