//! Command-line parsing.
//!
//! Argument parsing and command dispatch stay separate from the fetch and
//! analysis code; `app` turns these structs into a `Config`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Crop, YearRange};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "crop-shock",
    version,
    about = "Fetch USDA crop yields and NOAA climate, merge them, and analyze the link"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, merge, write data files, analyze, and report (default).
    Run(RunArgs),
    /// Fetch and merge only; write the data CSVs.
    Fetch(RunArgs),
    /// Analyze an existing merged CSV without network access.
    Analyze(AnalyzeArgs),
}

/// Options for commands that fetch data.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// States to cover (comma separated two-letter codes).
    #[arg(
        long,
        env = "CROP_SHOCK_STATES",
        value_delimiter = ',',
        default_values_t = ["CA", "IA", "IL", "KS", "NE"].map(String::from)
    )]
    pub states: Vec<String>,

    /// Crops to fetch.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [Crop::Corn, Crop::Wheat])]
    pub crops: Vec<Crop>,

    /// First year (inclusive).
    #[arg(long, env = "CROP_SHOCK_START_YEAR", default_value_t = YearRange::DEFAULT_START)]
    pub start_year: i32,

    /// Last year (inclusive).
    #[arg(long, env = "CROP_SHOCK_END_YEAR", default_value_t = YearRange::DEFAULT_END)]
    pub end_year: i32,

    /// Climate station for a state, as STATE=STATION_ID. Repeatable; replaces
    /// the built-in station for that state.
    #[arg(long = "station", value_name = "STATE=ID")]
    pub stations: Vec<String>,

    /// Directory for fetched and merged CSV files.
    #[arg(long, env = "CROP_SHOCK_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory for analysis tables and figures.
    #[arg(long, env = "CROP_SHOCK_RESULTS_DIR", default_value = "results")]
    pub results_dir: PathBuf,

    /// Retries per request after the first attempt.
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Initial retry backoff in milliseconds (doubles per attempt).
    #[arg(long, default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Minimum spacing between requests to the same API, in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub request_delay_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Years per climate request (at most 10).
    #[arg(long, default_value_t = 10)]
    pub chunk_years: u32,

    /// Skip SVG figures.
    #[arg(long)]
    pub no_plots: bool,

    /// Quick Stats endpoint.
    #[arg(long, env = "CROP_SHOCK_USDA_URL", hide = true)]
    pub usda_url: Option<String>,

    /// CDO data endpoint.
    #[arg(long, env = "CROP_SHOCK_NOAA_URL", hide = true)]
    pub noaa_url: Option<String>,
}

/// Options for offline analysis.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Merged CSV produced by `fetch` or `run`.
    #[arg(long, value_name = "CSV", default_value = "data/merged.csv")]
    pub input: PathBuf,

    /// Directory for analysis tables and figures.
    #[arg(long, env = "CROP_SHOCK_RESULTS_DIR", default_value = "results")]
    pub results_dir: PathBuf,

    /// Skip SVG figures.
    #[arg(long)]
    pub no_plots: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["crop-shock", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.crops, vec![Crop::Corn, Crop::Wheat]);
        assert_eq!(args.start_year, 1970);
        assert_eq!(args.end_year, 2024);
        assert_eq!(args.chunk_years, 10);
        assert!(!args.no_plots);
    }

    #[test]
    fn lists_and_repeated_stations() {
        let cli = Cli::parse_from([
            "crop-shock",
            "fetch",
            "--states",
            "ia,ks",
            "--crops",
            "wheat",
            "--station",
            "IA=GHCND:A",
            "--station",
            "IA=GHCND:B",
        ]);
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.states, vec!["ia".to_string(), "ks".to_string()]);
        assert_eq!(args.crops, vec![Crop::Wheat]);
        assert_eq!(args.stations.len(), 2);
    }

    #[test]
    fn analyze_takes_input_path() {
        let cli = Cli::parse_from(["crop-shock", "analyze", "--input", "x.csv", "--no-plots"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.input, PathBuf::from("x.csv"));
        assert!(args.no_plots);
    }
}
