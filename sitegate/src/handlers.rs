use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use sitegate_core::config::{
    AuthConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_BROKEN_LINKS, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_PAGES, DEFAULT_MIN_PASS_RATE, DEFAULT_SAMPLE_DYNAMIC_ROUTES, DiscoveryLimits,
    QualityGate, RunConfig, ValidationOptions,
};
use sitegate_core::interaction::{InteractionAction, check_navigation_links, exercise_page_buttons};
use sitegate_core::pipeline::{
    ArtifactPaths, PipelineOptions, execute_discovery, execute_scan, execute_validation,
};
use sitegate_core::report::{
    generate_discovery_report, generate_interaction_report, generate_validation_report,
    read_discovery_output,
};
use sitegate_scanner::{HttpDriverFactory, NavigateOptions, PageDriver, WaitUntil};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, warn};
use url::Url;

/// Request timeout for the single discovery context
const DISCOVERY_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 60;

/// Install the fmt subscriber. Safe to call more than once.
pub fn init_logging(quiet: bool) {
    let level = if quiet { Level::WARN } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

// Helper functions for the validate handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(url: Option<&Url>, hosts_file: Option<&PathBuf>) -> Result<Vec<String>> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        bail!("Either --url or --hosts-file must be provided")
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read hosts file {}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        bail!("No valid URLs found in {}", path.display());
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some_and(|host| !host.contains(' '))
    {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// URLs to validate and the base URL they are judged against.
///
/// `--url` and `--hosts-file` take precedence over a discovery artifact.
pub fn resolve_validation_targets(args: &ArgMatches) -> Result<(String, Vec<String>)> {
    let url = args.get_one::<Url>("url");
    let hosts_file = args.get_one::<PathBuf>("hosts-file");

    if url.is_some() || hosts_file.is_some() {
        let urls = load_urls_from_source(url, hosts_file)?;
        let base = Url::parse(&urls[0])
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| urls[0].clone());
        return Ok((base, urls));
    }

    let input = match args.get_one::<PathBuf>("input") {
        Some(path) => expand_path(path),
        None => artifacts_from_args(args).discovery_urls,
    };
    let output = read_discovery_output(&input).with_context(|| {
        format!(
            "Failed to read discovery output {} (run `sitegate discover` first)",
            input.display()
        )
    })?;

    Ok((output.metadata.base_url, output.urls))
}

pub fn discovery_limits_from_args(args: &ArgMatches) -> DiscoveryLimits {
    let secs = args
        .get_one::<u64>("discovery-timeout")
        .copied()
        .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT_SECS);

    DiscoveryLimits {
        max_pages: args.get_one::<usize>("max-pages").copied().unwrap_or(DEFAULT_MAX_PAGES),
        max_depth: args.get_one::<usize>("max-depth").copied().unwrap_or(DEFAULT_MAX_DEPTH),
        sample_dynamic_routes: args
            .get_one::<usize>("sample")
            .copied()
            .unwrap_or(DEFAULT_SAMPLE_DYNAMIC_ROUTES),
        timeout: Duration::from_secs(secs),
    }
}

pub fn validation_options_from_args(args: &ArgMatches) -> ValidationOptions {
    ValidationOptions::default()
        .with_concurrency(args.get_one::<usize>("workers").copied().unwrap_or(DEFAULT_CONCURRENCY))
        .with_page_timeout(Duration::from_millis(page_timeout_ms(args)))
}

pub fn auth_from_args(args: &ArgMatches) -> AuthConfig {
    AuthConfig {
        required: args.get_flag("require-auth"),
        session_cookie: args.get_one::<String>("auth-cookie").cloned(),
    }
}

pub fn gate_from_args(args: &ArgMatches) -> QualityGate {
    QualityGate {
        min_pass_rate: args
            .get_one::<u8>("min-pass-rate")
            .copied()
            .unwrap_or(DEFAULT_MIN_PASS_RATE),
        max_broken_links: args
            .get_one::<usize>("max-broken-links")
            .copied()
            .unwrap_or(DEFAULT_MAX_BROKEN_LINKS),
    }
}

pub fn artifacts_from_args(args: &ArgMatches) -> ArtifactPaths {
    let dir = args
        .get_one::<PathBuf>("output-dir")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from("."));
    ArtifactPaths::in_dir(&dir)
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

fn page_timeout_ms(args: &ArgMatches) -> u64 {
    args.get_one::<u64>("page-timeout-ms")
        .copied()
        .unwrap_or(DEFAULT_PAGE_TIMEOUT_MS)
}

fn validation_factory(config: &RunConfig, args: &ArgMatches) -> HttpDriverFactory {
    let timeout_secs = (config.validation.page_timeout.as_millis() as u64).div_ceil(1000);
    HttpDriverFactory::new(timeout_secs.max(1))
        .with_session_cookie(config.auth.session_cookie.clone())
        .with_subresources(args.get_flag("check-subresources"))
}

fn print_run_header(action: &str, target: &str, lines: &[(&str, String)]) {
    println!("\n{} {}", action.bright_white().bold(), target.bright_cyan());
    for (label, value) in lines {
        println!("  {} {}", format!("{}:", label).blue(), value);
    }
    println!();
}

fn print_gate(failures: &[String]) {
    if failures.is_empty() {
        println!("{} Quality gate passed\n", "✓".green().bold());
        return;
    }

    println!("{} Quality gate failed", "✗".red().bold());
    for failure in failures {
        println!("  - {}", failure);
    }
    println!();
}

pub async fn handle_discover(args: &ArgMatches) -> Result<bool> {
    let quiet = args.get_flag("quiet");
    init_logging(quiet);

    let base_url = args
        .get_one::<Url>("url")
        .context("--url or SITEGATE_BASE_URL is required")?;

    let mut config = RunConfig::new(base_url.as_str());
    config.discovery = discovery_limits_from_args(args);

    if !quiet {
        let limits = &config.discovery;
        print_run_header(
            "Discovering",
            base_url.as_str(),
            &[
                ("Max pages", limits.max_pages.to_string()),
                ("Max depth", limits.max_depth.to_string()),
                ("Samples per route", limits.sample_dynamic_routes.to_string()),
                ("Time budget", format!("{}s", limits.timeout.as_secs())),
            ],
        );
    }

    let options = PipelineOptions::new(config)
        .with_artifacts(artifacts_from_args(args))
        .with_progress_bars(!quiet);
    let mut driver = HttpDriverFactory::new(DISCOVERY_REQUEST_TIMEOUT_SECS).build()?;

    let run = execute_discovery(&mut driver, &options).await?;

    print!("{}", generate_discovery_report(&run));
    Ok(true)
}

pub async fn handle_validate(args: &ArgMatches) -> Result<bool> {
    let quiet = args.get_flag("quiet");
    init_logging(quiet);

    let (base_url, urls) = resolve_validation_targets(args)?;

    let mut config = RunConfig::new(base_url);
    config.validation = validation_options_from_args(args);
    config.auth = auth_from_args(args);
    config.gate = gate_from_args(args);

    if !quiet {
        print_run_header(
            "Validating",
            &config.base_url,
            &[
                ("Pages", urls.len().to_string()),
                ("Workers", config.validation.concurrency.to_string()),
                ("Page timeout", format!("{}ms", config.validation.page_timeout.as_millis())),
            ],
        );
    }

    let factory = validation_factory(&config, args);
    let options = PipelineOptions::new(config)
        .with_artifacts(artifacts_from_args(args))
        .with_progress_bars(!quiet);

    let run = execute_validation(Arc::new(factory), urls, &options).await?;

    print!("{}", generate_validation_report(&run.results, &run.summary));
    let failures = run.summary.gate_failures(&options.config.gate);
    print_gate(&failures);
    Ok(failures.is_empty())
}

pub async fn handle_scan(args: &ArgMatches) -> Result<bool> {
    let quiet = args.get_flag("quiet");
    init_logging(quiet);

    let base_url = args
        .get_one::<Url>("url")
        .context("--url or SITEGATE_BASE_URL is required")?;

    let mut config = RunConfig::new(base_url.as_str());
    config.discovery = discovery_limits_from_args(args);
    config.validation = validation_options_from_args(args);
    config.auth = auth_from_args(args);
    config.gate = gate_from_args(args);

    if !quiet {
        print_run_header(
            "Scanning",
            base_url.as_str(),
            &[
                ("Max pages", config.discovery.max_pages.to_string()),
                ("Max depth", config.discovery.max_depth.to_string()),
                ("Workers", config.validation.concurrency.to_string()),
            ],
        );
    }

    let factory = validation_factory(&config, args);
    let options = PipelineOptions::new(config)
        .with_artifacts(artifacts_from_args(args))
        .with_progress_bars(!quiet);

    let (discovery, validation) = execute_scan(Arc::new(factory), &options).await?;

    print!("{}", generate_discovery_report(&discovery));
    print!(
        "{}",
        generate_validation_report(&validation.results, &validation.summary)
    );
    let failures = validation.summary.gate_failures(&options.config.gate);
    print_gate(&failures);
    Ok(failures.is_empty())
}

pub async fn handle_interact(args: &ArgMatches) -> Result<bool> {
    let quiet = args.get_flag("quiet");
    init_logging(quiet);

    let url = args.get_one::<Url>("url").context("--url is required")?;
    let timeout_ms = page_timeout_ms(args);
    let cookie = args.get_one::<String>("auth-cookie").cloned();

    let mut driver = HttpDriverFactory::new(timeout_ms.div_ceil(1000).max(1))
        .with_session_cookie(cookie)
        .build()?;

    let navigation = NavigateOptions::new(
        WaitUntil::DomContentLoaded,
        Duration::from_millis(timeout_ms),
    );
    let response = driver
        .navigate(url.as_str(), navigation)
        .await
        .with_context(|| format!("Failed to load {}", url))?;
    if response.status >= 400 {
        bail!("{} answered with HTTP {}", url, response.status);
    }

    let mut results = exercise_page_buttons(&mut driver).await;
    results.extend(check_navigation_links(&mut driver).await);

    print!("{}", generate_interaction_report(url.as_str(), &results));
    Ok(results
        .iter()
        .all(|r| r.action != InteractionAction::Failed))
}
