use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegate")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegate")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress spinners and info logs")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(discovery_args(
            command!("discover")
                .about(
                    "Discover the pages of a site from its sitemap and a bounded crawl. Writes \
                crawl-urls.json and crawl-discovery-summary.json.",
                )
                .arg(base_url_arg())
                .arg(output_dir_arg()),
        ))
        .subcommand(validation_args(
            command!("validate")
                .about(
                    "Load every page of a URL list and classify its health. Exits non-zero when \
                any page is critical.",
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Discovery output to validate (default: <output-dir>/crawl-urls.json)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with_all(["url", "hosts-file"]),
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Validate a single URL")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to validate")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(output_dir_arg()),
        ))
        .subcommand(validation_args(discovery_args(
            command!("scan")
                .about("Discover a site, then validate every discovered page")
                .arg(base_url_arg())
                .arg(output_dir_arg()),
        )))
        .subcommand(
            command!("interact")
                .about(
                    "Click the safe buttons of one page and check its navigation links. \
                Destructive controls (logout, delete, payment...) are never clicked.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The page to exercise")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(page_timeout_arg())
                .arg(auth_cookie_arg()),
        )
}

fn base_url_arg() -> clap::Arg {
    arg!(-u --"url" <URL>)
        .required(true)
        .env("SITEGATE_BASE_URL")
        .help("Base URL of the site")
        .value_parser(clap::value_parser!(Url))
}

fn output_dir_arg() -> clap::Arg {
    arg!(-o --"output-dir" <DIR>)
        .required(false)
        .help("Directory for the JSON artifacts")
        .value_parser(clap::value_parser!(PathBuf))
        .default_value(".")
}

fn page_timeout_arg() -> clap::Arg {
    arg!(--"page-timeout-ms" <MILLISECONDS>)
        .required(false)
        .env("SITEGATE_PAGE_TIMEOUT_MS")
        .help("Navigation timeout for a single page")
        .value_parser(clap::value_parser!(u64).range(1..))
        .default_value("30000")
}

fn auth_cookie_arg() -> clap::Arg {
    arg!(--"auth-cookie" <COOKIE>)
        .required(false)
        .env("SITEGATE_AUTH_COOKIE")
        .hide_env_values(true)
        .help("Session cookie sent with every request, e.g. 'session=abc123'")
}

fn discovery_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"max-pages" <NUM>)
            .required(false)
            .env("SITEGATE_MAX_PAGES")
            .help("Stop discovery after this many pages")
            .value_parser(clap::value_parser!(usize))
            .default_value("100"),
    )
    .arg(
        arg!(--"max-depth" <NUM>)
            .required(false)
            .env("SITEGATE_MAX_DEPTH")
            .help("Link depth below the entry points that is still expanded")
            .value_parser(clap::value_parser!(usize))
            .default_value("3"),
    )
    .arg(
        arg!(--"sample" <NUM>)
            .required(false)
            .env("SITEGATE_SAMPLE_DYNAMIC_ROUTES")
            .help("Pages kept per dynamic route pattern such as /products/:id")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
    )
    .arg(
        arg!(--"discovery-timeout" <SECONDS>)
            .required(false)
            .env("SITEGATE_DISCOVERY_TIMEOUT_SECS")
            .help("Soft time budget after which discovery reduces its limits")
            .value_parser(clap::value_parser!(u64))
            .default_value("60"),
    )
}

fn validation_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-w --"workers" <NUM_WORKERS>)
            .required(false)
            .env("SITEGATE_WORKERS")
            .help("Number of pages validated concurrently, each in its own browsing context")
            .value_parser(clap::value_parser!(usize))
            .default_value("5"),
    )
    .arg(page_timeout_arg())
    .arg(auth_cookie_arg())
    .arg(
        arg!(--"require-auth")
            .required(false)
            .help("Refuse to run without a session cookie")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"min-pass-rate" <PERCENT>)
            .required(false)
            .env("SITEGATE_MIN_PASS_RATE")
            .help("Fail the run when fewer than this percentage of pages pass")
            .value_parser(clap::value_parser!(u8).range(0..=100))
            .default_value("80"),
    )
    .arg(
        arg!(--"max-broken-links" <NUM>)
            .required(false)
            .env("SITEGATE_MAX_BROKEN_LINKS")
            .help("Fail the run when more pages than this answer with a 404")
            .value_parser(clap::value_parser!(usize))
            .default_value("4"),
    )
    .arg(
        arg!(--"check-subresources")
            .required(false)
            .help("Also request same-origin scripts, stylesheets and images of every page")
            .action(clap::ArgAction::SetTrue),
    )
}
