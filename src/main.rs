mod compress;
mod config;
mod error;
mod profile;
mod release;
mod staging;

use crate::config::AppConfig;
use crate::error::Error;
use crate::profile::ProfileTable;
use clap::error::ErrorKind;
use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Indicates version of the relpack source code
pub const VERSION: &str = "v0.1.0";

/// Exit status for a missing or unrecognized release profile.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "relpack")]
#[command(version = VERSION)]
#[command(about = "Packs the build outputs of named component groups into a release archive")]
struct Cli {
    /// Release profile to package (see --list-profiles)
    profile: Option<String>,

    /// Also stage and bundle the source tree of the same component groups
    #[arg(long = "include-source", visible_alias = "src")]
    include_source: bool,

    /// Read configuration from this file in addition to the discovered ones
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Print the release report as JSON on stdout
    #[arg(long = "json")]
    json: bool,

    /// List the known release profiles and exit
    #[arg(long = "list-profiles")]
    list_profiles: bool,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    // --verbose forces DEBUG; otherwise RUST_LOG, falling back to WARN.
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Moves dash-prefixed selectors such as `-full` behind a `--` so clap reads
/// them as the profile instead of a cluster of short flags.
fn selector_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut out: Vec<OsString> = args.next().into_iter().collect();
    let mut selectors = Vec::new();
    let mut separator_seen = false;
    let mut takes_value = false;

    for arg in args {
        if separator_seen || takes_value {
            takes_value = false;
            out.push(arg);
            continue;
        }
        match arg.to_str() {
            Some("--") => {
                separator_seen = true;
                out.push(arg);
            }
            Some("--config") => {
                takes_value = true;
                out.push(arg);
            }
            Some(s) if s.starts_with('-') && !s.starts_with("--") && s.len() > 2 => selectors.push(arg),
            _ => out.push(arg),
        }
    }

    if !selectors.is_empty() && !separator_seen {
        out.push(OsString::from("--"));
    }
    out.extend(selectors);
    out
}

fn print_usage(table: &ProfileTable) -> ExitCode {
    print!("{}", profile::usage(table));
    ExitCode::from(EXIT_USAGE)
}

fn report_error(e: &Error) -> ExitCode {
    eprintln!("{}", format!("Packaging failed: {}", e.chain()).red());
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(selector_args(std::env::args_os())) {
        Ok(cli) => cli,
        // Unknown arguments get the same guidance as a bad profile name.
        Err(e) if e.kind() == ErrorKind::UnknownArgument => {
            let table = AppConfig::load(None).map(|cfg| cfg.profiles).unwrap_or_default();
            return print_usage(&table);
        }
        Err(e) => e.exit(),
    };
    init_tracing(cli.verbose);

    let cfg = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => return report_error(&e),
    };

    if cli.list_profiles {
        for p in cfg.profiles.iter() {
            println!("  {} - {} [{}]", p.name.bold().cyan(), p.description, p.groups.join(", ").dimmed());
        }
        return ExitCode::SUCCESS;
    }

    let selected = match cli.profile.as_deref().map(|s| cfg.profiles.resolve(s)) {
        Some(Ok(p)) => p.clone(),
        Some(Err(e)) => {
            tracing::debug!("{}", e);
            return print_usage(&cfg.profiles);
        }
        None => return print_usage(&cfg.profiles),
    };

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {elapsed_precise} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Packaging '{}'...", selected.tag()));

    let report = match release::package_release(&cfg, &selected, cli.include_source) {
        Ok(r) => r,
        Err(e) => {
            pb.finish_and_clear();
            return report_error(&e);
        }
    };

    if cli.json {
        pb.finish_and_clear();
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}", format!("Failed to render report: {}", e).red());
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    pb.finish_with_message(
        format!(
            "Created {} from {} staged archive(s).",
            report.release_archive.display(),
            report.staged.len()
        )
        .green()
        .to_string(),
    );
    for staged in &report.staged {
        println!("  {} ({} entries)", staged.file_name.cyan(), staged.entries);
    }
    if let Some(digest) = &report.sha256 {
        println!("  sha256 {}", digest.dimmed());
    }
    ExitCode::SUCCESS
}
