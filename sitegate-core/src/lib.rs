//! Discovery, validation and interaction engines for Sitegate.
//!
//! Every engine is generic over a [`sitegate_scanner::PageDriver`], so the
//! same code runs against a real browser, the bundled HTTP driver or a
//! scripted page in tests.

use colored::Colorize;

pub mod api_monitor;
pub mod config;
pub mod discovery;
pub mod error;
pub mod interaction;
pub mod normalize;
pub mod pattern;
pub mod pipeline;
pub mod report;
pub mod safety;
pub mod sitemap;
pub mod validation;

pub use config::{AuthConfig, ConfigError, DiscoveryLimits, RunConfig, ValidationOptions};
pub use discovery::{
    CandidateSource, CrawlCandidate, DiscoveryEngine, DiscoveryOutput, DiscoveryRun,
    DiscoverySummary, discover_urls,
};
pub use error::CoreError;
pub use interaction::{
    InteractionAction, InteractionOutcome, InteractionResult, check_navigation_links,
    click_safely, exercise_page_buttons,
};
pub use normalize::{extract_url_path, is_internal_url, normalize_url};
pub use pipeline::{ArtifactPaths, PipelineOptions, execute_discovery, execute_scan, execute_validation};
pub use report::ReportAccumulator;
pub use validation::{
    FailureReason, Severity, ValidationResult, ValidationRun, ValidationStatus,
    ValidationSummary, validate_many, validate_page,
};

const BANNER: &str = r#"
     _ _                   _
 ___(_) |_ ___  __ _  __ _| |_ ___
/ __| | __/ _ \/ _` |/ _` | __/ _ \
\__ \ | ||  __/ (_| | (_| | ||  __/
|___/_|\__\___|\__, |\__,_|\__\___|
               |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "discover. validate. gate.".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
