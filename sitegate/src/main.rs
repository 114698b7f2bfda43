use colored::Colorize;
use sitegate::{
    command_argument_builder, handle_discover, handle_interact, handle_scan, handle_validate,
};
use sitegate_core::print_banner;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let outcome = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => return ExitCode::SUCCESS,
        Some(("discover", sub_matches)) => handle_discover(sub_matches).await,
        Some(("validate", sub_matches)) => handle_validate(sub_matches).await,
        Some(("scan", sub_matches)) => handle_scan(sub_matches).await,
        Some(("interact", sub_matches)) => handle_interact(sub_matches).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
