use crate::config::RunConfig;
use crate::discovery::{DiscoveryEngine, DiscoveryRun};
use crate::error::Result;
use crate::report::{ReportAccumulator, write_json};
use crate::validation::{
    ValidationProgressCallback, ValidationResult, ValidationRun, ValidationSummary, validate_many,
};
use indicatif::{ProgressBar, ProgressStyle};
use sitegate_scanner::{DriverFactory, PageDriver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

pub const DISCOVERY_URLS_FILE: &str = "crawl-urls.json";
pub const DISCOVERY_SUMMARY_FILE: &str = "crawl-discovery-summary.json";
pub const VALIDATION_RESULTS_FILE: &str = "crawl-results.json";
pub const VALIDATION_SUMMARY_FILE: &str = "crawl-validation-summary.json";
pub const QA_SUMMARY_FILE: &str = "qa-summary.json";

/// Where each stage writes its JSON artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub discovery_urls: PathBuf,
    pub discovery_summary: PathBuf,
    pub validation_results: PathBuf,
    pub validation_summary: PathBuf,
    pub qa_summary: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            discovery_urls: dir.join(DISCOVERY_URLS_FILE),
            discovery_summary: dir.join(DISCOVERY_SUMMARY_FILE),
            validation_results: dir.join(VALIDATION_RESULTS_FILE),
            validation_summary: dir.join(VALIDATION_SUMMARY_FILE),
            qa_summary: dir.join(QA_SUMMARY_FILE),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

/// Options for one pipeline stage
pub struct PipelineOptions {
    pub config: RunConfig,
    /// `None` keeps results in memory only
    pub artifacts: Option<ArtifactPaths>,
    pub show_progress_bars: bool,
}

impl PipelineOptions {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            artifacts: None,
            show_progress_bars: false,
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactPaths) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_progress_bars(mut self, show: bool) -> Self {
        self.show_progress_bars = show;
        self
    }
}

fn spinner(show: bool, message: &str) -> Option<Arc<ProgressBar>> {
    if !show {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    Some(Arc::new(pb))
}

/// Run discovery against `driver` and write its artifacts
pub async fn execute_discovery<D: PageDriver + ?Sized>(
    driver: &mut D,
    options: &PipelineOptions,
) -> Result<DiscoveryRun> {
    let config = &options.config;
    config.validate()?;

    let progress_bar = spinner(options.show_progress_bars, "Starting discovery...");

    let mut engine = DiscoveryEngine::with_limits(config.trimmed_base_url(), config.discovery);
    if let Some(ref pb) = progress_bar {
        let pb = pb.clone();
        engine = engine.with_progress_callback(Arc::new(move |found: usize, url: String| {
            pb.set_message(format!("Discovering... {} URLs found ({})", found, url));
            pb.tick();
        }));
    }

    let run = engine.discover(driver).await;

    if let Some(ref artifacts) = options.artifacts {
        write_discovery_artifacts(artifacts, &run)?;
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Discovery complete! {} URLs found",
            run.summary.total_after_sampling
        ));
    }

    Ok(run)
}

/// Validate `urls` with a worker pool and write the result artifacts.
///
/// Artifacts are written even when every page failed.
pub async fn execute_validation(
    factory: Arc<dyn DriverFactory>,
    urls: Vec<String>,
    options: &PipelineOptions,
) -> Result<ValidationRun> {
    let config = &options.config;
    config.validate()?;

    let total = urls.len();
    let progress_bar = spinner(options.show_progress_bars, "Starting validation...");
    let processed_count = Arc::new(AtomicUsize::new(0));

    let progress_callback: Option<ValidationProgressCallback> = progress_bar.as_ref().map(|pb| {
        let pb = pb.clone();
        let count = processed_count.clone();
        let callback: ValidationProgressCallback =
            Arc::new(move |_worker_id: usize, result: &ValidationResult| {
                let done = count.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_message(format!(
                    "Validating... {}/{} ({} {})",
                    done, total, result.status, result.url
                ));
                pb.tick();
            });
        callback
    });

    let run = validate_many(factory, urls, config.validation.clone(), progress_callback).await;

    if let Some(ref artifacts) = options.artifacts {
        write_validation_artifacts(artifacts, &run)?;
    }

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Validation complete! {} pages, {} critical",
            run.summary.total_pages, run.summary.critical
        ));
    }

    Ok(run)
}

/// Discovery followed by validation of everything discovered
pub async fn execute_scan(
    factory: Arc<dyn DriverFactory>,
    options: &PipelineOptions,
) -> Result<(DiscoveryRun, ValidationRun)> {
    options.config.validate()?;

    let mut driver = match factory.new_context().await {
        Ok(driver) => driver,
        Err(e) => {
            warn!("Could not open a browsing context for discovery: {}", e);
            if let Some(ref artifacts) = options.artifacts {
                let config = &options.config;
                let discovery = DiscoveryRun::empty(config.trimmed_base_url(), config.discovery);
                write_discovery_artifacts(artifacts, &discovery)?;
                write_validation_artifacts(
                    artifacts,
                    &ValidationRun {
                        results: Vec::new(),
                        summary: ValidationSummary::default(),
                    },
                )?;
            }
            return Err(e.into());
        }
    };
    let discovery = execute_discovery(driver.as_mut(), options).await?;
    drop(driver);

    let urls = discovery.output.urls.clone();
    let validation = execute_validation(factory, urls, options).await?;

    Ok((discovery, validation))
}

fn write_discovery_artifacts(artifacts: &ArtifactPaths, run: &DiscoveryRun) -> Result<()> {
    write_json(&artifacts.discovery_urls, &run.output)?;
    write_json(&artifacts.discovery_summary, &run.summary)?;
    info!(
        "Saved {} URLs to {}",
        run.output.urls.len(),
        artifacts.discovery_urls.display()
    );
    Ok(())
}

fn write_validation_artifacts(artifacts: &ArtifactPaths, run: &ValidationRun) -> Result<()> {
    write_json(&artifacts.validation_results, &run.results)?;
    write_json(&artifacts.validation_summary, &run.summary)?;

    let mut accumulator = ReportAccumulator::new();
    accumulator.extend(&run.results);
    accumulator.set_duration(run.summary.duration_ms);
    accumulator.flush(&artifacts.qa_summary)
}
