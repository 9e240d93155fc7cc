//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging and maps errors to exit codes; this
//! module parses arguments, builds the `Config`, and dispatches commands.

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use crate::cli::{AnalyzeArgs, Command, RunArgs};
use crate::config::{Config, ConfigError, Credentials, parse_station_overrides, year_range};
use crate::data::RetryPolicy;
use crate::domain::YearRange;
use crate::error::AppError;
use crate::io::ingest::read_merged_csv;
use crate::report;

pub mod pipeline;

/// Entry point for the `crop-shock` binary.
pub fn run() -> Result<(), AppError> {
    // `crop-shock` and `crop-shock --states IA` behave like `crop-shock run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::Fetch(args) => handle_fetch(&args),
        Command::Analyze(args) => handle_analyze(&args),
    }
}

fn handle_run(args: &RunArgs) -> Result<(), AppError> {
    let started = Utc::now();
    let config = config_from_args(args)?;

    let fetched = pipeline::run_fetch(&config)?;
    let analysis = pipeline::run_analysis(&fetched.dataset.rows, &config.results_dir, config.plots)?;
    info!(
        data_files = fetched.files.len(),
        result_files = analysis.files.len(),
        "run complete"
    );

    println!(
        "{}",
        report::format_summary(
            started,
            &config.states,
            config.years,
            Some(&fetched.dataset),
            &analysis.report
        )
    );
    Ok(())
}

fn handle_fetch(args: &RunArgs) -> Result<(), AppError> {
    let started = Utc::now();
    let config = config_from_args(args)?;
    let fetched = pipeline::run_fetch(&config)?;

    println!("{}", report::format_run_header(started, &config.states, config.years));
    println!("{}", report::format_dataset_summary(&fetched.dataset));
    println!("{}", report::format_gaps(&fetched.dataset.gaps));
    for path in &fetched.files {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<(), AppError> {
    let started = Utc::now();
    let ingested = read_merged_csv(&args.input)?;
    for e in &ingested.row_errors {
        warn!(line = e.line, error = %e.message, "skipped row");
    }
    info!(
        path = %args.input.display(),
        rows_read = ingested.rows_read,
        rows_used = ingested.rows.len(),
        "loaded merged table"
    );

    let rows = ingested.rows;
    let mut states: Vec<String> = rows.iter().map(|r| r.state.clone()).collect();
    states.sort();
    states.dedup();
    let years = observed_years(rows.iter().map(|r| r.year)).unwrap_or_default();

    let analysis = pipeline::run_analysis(&rows, &args.results_dir, !args.no_plots)?;
    println!(
        "{}",
        report::format_summary(started, &states, years, None, &analysis.report)
    );
    Ok(())
}

fn observed_years(years: impl Iterator<Item = i32>) -> Option<YearRange> {
    let (lo, hi) = years.fold((i32::MAX, i32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
    YearRange::new(lo, hi)
}

/// Build and validate the run configuration. Reads credentials from the
/// environment (and `.env`).
pub fn config_from_args(args: &RunArgs) -> Result<Config, ConfigError> {
    let credentials = Credentials::from_env()?;
    config_with_credentials(args, credentials)
}

pub fn config_with_credentials(args: &RunArgs, credentials: Credentials) -> Result<Config, ConfigError> {
    let mut config = Config::with_credentials(credentials);
    config.states = args.states.clone();
    config.crops = args.crops.clone();
    config.years = year_range(args.start_year, args.end_year)?;
    config.stations = parse_station_overrides(&args.stations)?;
    config.data_dir = args.data_dir.clone();
    config.results_dir = args.results_dir.clone();

    let min_delay = Duration::from_millis(args.retry_delay_ms);
    config.retry = RetryPolicy {
        max_retries: args.max_retries,
        min_delay,
        max_delay: RetryPolicy::default().max_delay.max(min_delay),
    };
    config.request_delay = Duration::from_millis(args.request_delay_ms);
    config.timeout = Duration::from_secs(args.timeout_secs);
    config.chunk_years = args.chunk_years;
    config.plots = !args.no_plots;
    if let Some(url) = &args.usda_url {
        config.usda_url = url.clone();
    }
    if let Some(url) = &args.noaa_url {
        config.noaa_url = url.clone();
    }

    config.validate()
}

/// Rewrite argv so `crop-shock` defaults to `crop-shock run`.
///
/// Rules:
/// - `crop-shock`                      -> `crop-shock run`
/// - `crop-shock --states IA ...`      -> `crop-shock run --states IA ...`
/// - `crop-shock --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "fetch" | "analyze");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cli::Cli;
    use crate::domain::Crop;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut args = vec!["crop-shock", "run"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Command::Run(a) => a,
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn creds() -> Credentials {
        Credentials {
            usda_api_key: "k".into(),
            noaa_token: "t".into(),
        }
    }

    #[test]
    fn bare_invocation_runs_the_pipeline() {
        assert_eq!(rewrite_args(argv(&["crop-shock"])), argv(&["crop-shock", "run"]));
        assert_eq!(
            rewrite_args(argv(&["crop-shock", "--states", "IA"])),
            argv(&["crop-shock", "run", "--states", "IA"])
        );
        assert_eq!(rewrite_args(argv(&["crop-shock", "--help"])), argv(&["crop-shock", "--help"]));
        assert_eq!(
            rewrite_args(argv(&["crop-shock", "analyze"])),
            argv(&["crop-shock", "analyze"])
        );
    }

    #[test]
    fn args_flow_into_config() {
        let args = run_args(&[
            "--states",
            "ks,ia",
            "--crops",
            "wheat",
            "--start-year",
            "2000",
            "--end-year",
            "2009",
            "--station",
            "KS=GHCND:X",
            "--max-retries",
            "1",
            "--no-plots",
            "--data-dir",
            "out",
        ]);
        let config = config_with_credentials(&args, creds()).unwrap();
        assert_eq!(config.states, vec!["KS".to_string(), "IA".to_string()]);
        assert_eq!(config.crops, vec![Crop::Wheat]);
        assert_eq!(config.years, YearRange::new(2000, 2009).unwrap());
        assert_eq!(config.stations["KS"], vec!["GHCND:X".to_string()]);
        assert_eq!(config.retry.max_retries, 1);
        assert!(!config.plots);
        assert_eq!(config.data_dir, PathBuf::from("out"));
    }

    #[test]
    fn inverted_years_are_a_config_error() {
        let args = run_args(&["--start-year", "2020", "--end-year", "2010"]);
        let err = config_with_credentials(&args, creds()).unwrap_err();
        assert_eq!(err, ConfigError::InvalidYearRange { start: 2020, end: 2010 });
        assert_eq!(AppError::from(err).exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn oversized_chunks_are_rejected() {
        let args = run_args(&["--chunk-years", "11"]);
        assert!(matches!(
            config_with_credentials(&args, creds()),
            Err(ConfigError::InvalidChunkSize { got: 11, .. })
        ));
    }

    #[test]
    fn observed_years_span_rows() {
        assert_eq!(observed_years([2003, 1999, 2001].into_iter()), YearRange::new(1999, 2003));
        assert_eq!(observed_years(std::iter::empty()), None);
    }
}
