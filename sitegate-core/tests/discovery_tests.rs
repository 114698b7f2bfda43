// Tests for sitemap seeding and breadth-first discovery

mod common;

use common::{BASE, FakeDriver, FakePage, FakeSite};
use sitegate_core::config::DiscoveryLimits;
use sitegate_core::discovery::{CandidateSource, DiscoveryEngine, discover_urls};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

fn limits(max_pages: usize, max_depth: usize, sample: usize) -> DiscoveryLimits {
    DiscoveryLimits {
        max_pages,
        max_depth,
        sample_dynamic_routes: sample,
        timeout: Duration::from_secs(60),
    }
}

// ============================================================================
// End-to-end traversal
// ============================================================================

#[tokio::test]
async fn test_sitemap_then_crawl_order() {
    let site = FakeSite::new()
        .page(
            &url("/sitemap.xml"),
            FakePage::sitemap(&[&url("/"), &url("/about"), &url("/contact")]),
        )
        .page(
            &url("/"),
            FakePage::ok().with_links(&[&url("/products"), &url("/blog"), &url("/about")]),
        )
        .page(&url("/about"), FakePage::ok())
        .page(&url("/contact"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 1, 5)).await;

    assert_eq!(
        run.output.urls,
        vec![
            url("/"),
            url("/about"),
            url("/contact"),
            url("/products"),
            url("/blog"),
        ]
    );
    assert_eq!(run.summary.sitemap_count, 3);
    assert_eq!(run.summary.crawl_count, 2);
    assert_eq!(run.summary.total_after_sampling, 5);
    assert!(!run.summary.fallback_triggered);
    assert!(run.output.metadata.adjusted_limits.is_none());

    let sources: Vec<CandidateSource> = run.pages.iter().map(|p| p.source).collect();
    assert_eq!(
        sources,
        vec![
            CandidateSource::Sitemap,
            CandidateSource::Sitemap,
            CandidateSource::Sitemap,
            CandidateSource::Crawl,
            CandidateSource::Crawl,
        ]
    );
}

#[tokio::test]
async fn test_missing_sitemap_falls_back_to_crawling() {
    let site = FakeSite::new()
        .page(&url("/"), FakePage::ok().with_links(&[&url("/pricing")]))
        .page(&url("/pricing"), FakePage::ok().with_links(&[&url("/faq")]))
        .page(&url("/faq"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 3, 5)).await;

    assert_eq!(run.output.urls, vec![url("/"), url("/pricing"), url("/faq")]);
    assert_eq!(run.summary.sitemap_count, 0);
    assert_eq!(run.summary.crawl_count, 3);
}

#[tokio::test]
async fn test_nested_sitemaps_are_followed() {
    let site = FakeSite::new()
        .page(
            &url("/sitemap.xml"),
            FakePage::sitemap(&[&url("/sitemap-blog.xml"), &url("/")]),
        )
        .page(
            &url("/sitemap-blog.xml"),
            FakePage::sitemap(&[&url("/blog/launch"), &url("/blog/roadmap")]),
        )
        .page(&url("/"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 0, 5)).await;

    assert_eq!(
        run.output.urls,
        vec![url("/"), url("/blog/launch"), url("/blog/roadmap")]
    );
    assert_eq!(run.summary.sitemap_count, 3);
    assert!(!run.output.urls.iter().any(|u| u.ends_with(".xml")));
}

// ============================================================================
// Normalization and exclusion
// ============================================================================

#[tokio::test]
async fn test_equivalent_links_are_discovered_once() {
    let site = FakeSite::new().page(
        &url("/"),
        FakePage::ok().with_links(&[
            &url("/about#team"),
            &url("/about/"),
            &url("/about?utm_source=newsletter"),
            &url("/about"),
        ]),
    );
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 2, 5)).await;

    assert_eq!(run.output.urls, vec![url("/"), url("/about")]);
    let about_visits = driver
        .visited()
        .iter()
        .filter(|v| v.starts_with(&url("/about")))
        .count();
    assert_eq!(about_visits, 1);
}

#[tokio::test]
async fn test_excluded_and_external_links_are_never_visited() {
    let site = FakeSite::new().page(
        &url("/"),
        FakePage::ok().with_links(&[
            &url("/logout"),
            &url("/admin/users"),
            &url("/api/v1/orders"),
            &url("/_next/static/chunk.js"),
            "https://other.test/landing",
            &url("/pricing"),
        ]),
    );
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 3, 5)).await;

    assert_eq!(run.output.urls, vec![url("/"), url("/pricing")]);
    for visited in driver.visited() {
        assert!(!visited.contains("/logout"), "visited {}", visited);
        assert!(!visited.contains("/admin"), "visited {}", visited);
        assert!(!visited.contains("/api/"), "visited {}", visited);
        assert!(!visited.starts_with("https://other.test"), "visited {}", visited);
    }
}

#[tokio::test]
async fn test_excluded_sitemap_entries_are_dropped() {
    let site = FakeSite::new()
        .page(
            &url("/sitemap.xml"),
            FakePage::sitemap(&[
                &url("/"),
                &url("/settings/delete-account"),
                "https://cdn.other.test/page",
            ]),
        )
        .page(&url("/"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 1, 5)).await;

    assert_eq!(run.output.urls, vec![url("/")]);
}

// ============================================================================
// Limits
// ============================================================================

#[tokio::test]
async fn test_dynamic_routes_are_sampled() {
    let products: Vec<String> = (1..=10).map(|i| url(&format!("/product/{}", i))).collect();
    let product_refs: Vec<&str> = products.iter().map(String::as_str).collect();
    let site = FakeSite::new().page(&url("/"), FakePage::ok().with_links(&product_refs));
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 2, 5)).await;

    let sampled: Vec<&String> = run
        .output
        .urls
        .iter()
        .filter(|u| u.contains("/product/"))
        .collect();
    assert_eq!(sampled.len(), 5);
    assert_eq!(run.summary.patterns_detected.get("product/:id"), Some(&5));
    assert_eq!(*sampled[0], url("/product/1"));
}

#[tokio::test]
async fn test_sitemap_entries_respect_sample_limit() {
    let posts: Vec<String> = (100..108).map(|i| url(&format!("/posts/{}", i))).collect();
    let mut locs: Vec<&str> = posts.iter().map(String::as_str).collect();
    let home = url("/");
    locs.insert(0, &home);
    let site = FakeSite::new()
        .page(&url("/sitemap.xml"), FakePage::sitemap(&locs))
        .page(&url("/"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 1, 3)).await;

    assert_eq!(run.summary.patterns_detected.get("posts/:id"), Some(&3));
    assert_eq!(run.output.urls.len(), 4);
}

#[tokio::test]
async fn test_max_pages_bounds_discovery() {
    let pages: Vec<String> = ["/a", "/b", "/c", "/d", "/e"].iter().map(|p| url(p)).collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let site = FakeSite::new().page(&url("/"), FakePage::ok().with_links(&page_refs));
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(3, 3, 5)).await;

    assert_eq!(run.output.urls, vec![url("/"), url("/a"), url("/b")]);
}

#[tokio::test]
async fn test_depth_limit_stops_expansion() {
    let site = FakeSite::new()
        .page(&url("/"), FakePage::ok().with_links(&[&url("/level-1")]))
        .page(&url("/level-1"), FakePage::ok().with_links(&[&url("/level-2")]))
        .page(&url("/level-2"), FakePage::ok().with_links(&[&url("/level-3")]));
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 2, 5)).await;

    assert_eq!(run.output.urls, vec![url("/"), url("/level-1"), url("/level-2")]);
    assert!(!driver.visited().contains(&url("/level-2")));
}

#[tokio::test]
async fn test_fallback_fires_once_and_shrinks_page_budget() {
    let pages: Vec<String> = (0..20).map(|i| url(&format!("/page-{}", (b'a' + i) as char))).collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let site = FakeSite::new()
        .page(
            &url("/sitemap.xml"),
            FakePage::status(404).with_delay(Duration::from_millis(5)),
        )
        .page(&url("/"), FakePage::ok().with_links(&page_refs));
    let mut driver = FakeDriver::new(site);

    let mut tiny = limits(8, 3, 5);
    tiny.timeout = Duration::from_nanos(1);
    let run = discover_urls(&mut driver, BASE, tiny).await;

    assert!(run.summary.fallback_triggered);
    let adjusted = run
        .output
        .metadata
        .adjusted_limits
        .as_ref()
        .expect("adjusted limits recorded");
    assert_eq!(adjusted.max_pages, 6);
    assert!(adjusted.reason.contains("8->6"));
    assert_eq!(run.output.metadata.limits.max_pages, 8);
    assert!(run.output.urls.len() <= 6);
}

fn chain_site() -> FakeSite {
    FakeSite::new()
        .page(
            &url("/sitemap.xml"),
            FakePage::status(404).with_delay(Duration::from_millis(5)),
        )
        .page(&url("/"), FakePage::ok().with_links(&[&url("/level-1")]))
        .page(&url("/level-1"), FakePage::ok().with_links(&[&url("/level-2")]))
        .page(&url("/level-2"), FakePage::ok().with_links(&[&url("/level-3")]))
}

#[tokio::test]
async fn test_fallback_reduces_depth_and_stops_expanding() {
    let mut driver = FakeDriver::new(chain_site());

    let mut tiny = limits(100, 3, 5);
    tiny.timeout = Duration::from_nanos(1);
    let run = discover_urls(&mut driver, BASE, tiny).await;

    let adjusted = run
        .output
        .metadata
        .adjusted_limits
        .as_ref()
        .expect("adjusted limits recorded");
    assert!(adjusted.reason.contains("Depth -> 2"));
    assert_eq!(run.output.urls, vec![url("/"), url("/level-1"), url("/level-2")]);
    assert!(!driver.visited().contains(&url("/level-2")));
}

#[tokio::test]
async fn test_fallback_keeps_depth_of_one() {
    let mut driver = FakeDriver::new(chain_site());

    let mut tiny = limits(100, 1, 5);
    tiny.timeout = Duration::from_nanos(1);
    let run = discover_urls(&mut driver, BASE, tiny).await;

    let adjusted = run
        .output
        .metadata
        .adjusted_limits
        .as_ref()
        .expect("adjusted limits recorded");
    assert!(adjusted.reason.contains("Depth -> 1"));
    assert_eq!(run.output.urls, vec![url("/"), url("/level-1")]);
    assert!(!driver.visited().contains(&url("/level-1")));
}

// ============================================================================
// Robustness and reporting
// ============================================================================

#[tokio::test]
async fn test_navigation_failures_are_not_fatal() {
    let site = FakeSite::new()
        .page(
            &url("/"),
            FakePage::ok().with_links(&[&url("/broken"), &url("/fine")]),
        )
        .page(&url("/broken"), FakePage::failing("net::ERR_CONNECTION_RESET"))
        .page(&url("/fine"), FakePage::ok().with_links(&[&url("/deeper")]));
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(100, 3, 5)).await;

    assert_eq!(
        run.output.urls,
        vec![url("/"), url("/broken"), url("/fine"), url("/deeper")]
    );
}

#[tokio::test]
async fn test_progress_callback_reports_growth() {
    let site = FakeSite::new()
        .page(&url("/"), FakePage::ok().with_links(&[&url("/a")]))
        .page(&url("/a"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let engine = DiscoveryEngine::with_limits(format!("{}/", BASE), limits(100, 3, 5))
        .with_progress_callback(Arc::new(move |found: usize, url: String| {
            seen_clone.lock().unwrap().push((found, url));
        }));

    assert_eq!(engine.base_url(), BASE);
    engine.discover(&mut driver).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (1, url("/")));
    assert_eq!(seen[1], (2, url("/a")));
}

#[tokio::test]
async fn test_output_json_shape() {
    let site = FakeSite::new().page(&url("/"), FakePage::ok());
    let mut driver = FakeDriver::new(site);

    let run = discover_urls(&mut driver, BASE, limits(10, 1, 5)).await;
    let output = serde_json::to_value(&run.output).unwrap();
    let summary = serde_json::to_value(&run.summary).unwrap();

    assert_eq!(output["metadata"]["baseUrl"], BASE);
    assert_eq!(output["metadata"]["limits"]["maxPages"], 10);
    assert!(output["metadata"].get("adjustedLimits").is_none());
    assert_eq!(output["urls"][0], url("/"));
    assert_eq!(summary["totalFound"], 1);
    assert_eq!(summary["fallbackTriggered"], false);
    assert!(summary["patternsDetected"].is_object());
}
