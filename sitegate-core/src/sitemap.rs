// Sitemap discovery: sitemap.xml and nested sitemap indexes

use scraper::{Html, Selector};
use sitegate_scanner::{NavigateOptions, PageDriver, WaitUntil};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

pub const SITEMAP_TIMEOUT: Duration = Duration::from_secs(10);

/// A `<loc>` that points at another sitemap rather than a page
pub fn is_nested_sitemap(url: &str) -> bool {
    url.contains("sitemap") && url.ends_with(".xml")
}

/// Pull every `<loc>` value out of a sitemap document
pub fn extract_locs(content: &str) -> Vec<String> {
    let document = Html::parse_document(content);
    let Ok(selector) = Selector::parse("loc") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|loc| loc.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Fetch one sitemap document. Absence or failure yields no URLs.
pub async fn fetch_sitemap<D: PageDriver + ?Sized>(driver: &mut D, url: &str) -> Vec<String> {
    let options = NavigateOptions::new(WaitUntil::NetworkIdle, SITEMAP_TIMEOUT);

    match driver.navigate(url, options).await {
        Ok(response) if response.status == 200 => {}
        Ok(response) => {
            info!("Sitemap not found at {} (status {})", url, response.status);
            return Vec::new();
        }
        Err(e) => {
            info!("Could not fetch sitemap at {}: {}", url, e);
            return Vec::new();
        }
    }

    match driver.content().await {
        Ok(content) => {
            let urls = extract_locs(&content);
            info!("Found {} URLs in {}", urls.len(), url);
            urls
        }
        Err(e) => {
            debug!("Could not read sitemap content at {}: {}", url, e);
            Vec::new()
        }
    }
}

/// Breadth-first walk over `{base}/sitemap.xml` and the sitemaps it references.
///
/// Each call to [`SitemapTree::next_batch`] fetches one sitemap document and
/// returns the page URLs it listed, so callers can stop the walk early.
#[derive(Debug)]
pub struct SitemapTree {
    queue: VecDeque<String>,
    visited: HashSet<String>,
}

impl SitemapTree {
    pub fn new(base_url: &str) -> Self {
        let root = format!("{}/sitemap.xml", base_url.trim_end_matches('/'));
        Self {
            queue: VecDeque::from([root]),
            visited: HashSet::new(),
        }
    }

    /// Page URLs of the next unvisited sitemap, or `None` once the tree is exhausted
    pub async fn next_batch<D: PageDriver + ?Sized>(&mut self, driver: &mut D) -> Option<Vec<String>> {
        while let Some(sitemap_url) = self.queue.pop_front() {
            if !self.visited.insert(sitemap_url.clone()) {
                continue;
            }

            let mut pages = Vec::new();
            for loc in fetch_sitemap(driver, &sitemap_url).await {
                if is_nested_sitemap(&loc) {
                    if !self.visited.contains(&loc) {
                        self.queue.push_back(loc);
                    }
                } else {
                    pages.push(loc);
                }
            }
            return Some(pages);
        }
        None
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Resolve the whole sitemap tree of `base_url` into page URLs
pub async fn fetch_sitemap_tree<D: PageDriver + ?Sized>(driver: &mut D, base_url: &str) -> Vec<String> {
    let mut tree = SitemapTree::new(base_url);
    let mut urls = Vec::new();
    while let Some(batch) = tree.next_batch(driver).await {
        urls.extend(batch);
    }
    urls
}
