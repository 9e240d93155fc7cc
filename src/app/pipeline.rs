//! Shared pipeline steps used by the `run`, `fetch` and `analyze` commands.
//!
//! Fetch (yields, then climate) -> merge -> write data files -> analyze ->
//! write results. Every step takes its inputs explicitly so tests can swap in
//! a local transport or a temporary directory.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::analysis::{AnalysisReport, analyze};
use crate::config::Config;
use crate::data::outcome::all_unreachable;
use crate::data::{ClimateFetcher, HttpTransport, Source, SubRequestOutcome, Transport, YieldFetcher, climate_targets};
use crate::domain::MergedRow;
use crate::error::{AppError, EXIT_CONFIG, EXIT_UNREACHABLE};
use crate::io::export::{write_analysis, write_dataset};
use crate::merge::{MergedDataset, assemble};
use crate::plot::render_figures;

/// Outputs of the fetch step.
#[derive(Debug, Clone)]
pub struct FetchOutput {
    pub dataset: MergedDataset,
    pub files: Vec<PathBuf>,
}

/// Outputs of the analysis step.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub report: AnalysisReport,
    pub files: Vec<PathBuf>,
}

/// Fetch both sources through `transport` and merge them.
///
/// Partial failures become data gaps. A source whose every sub-request ran out
/// of retries on transient errors aborts the run.
pub fn fetch_and_merge<T: Transport>(config: &Config, transport: &T) -> Result<MergedDataset, AppError> {
    let yields = YieldFetcher::new(transport, config).fetch(&config.states, &config.crops, config.years);
    ensure_reachable(Source::Usda, &yields)?;

    let targets = climate_targets(config);
    let climate = ClimateFetcher::new(transport, config).fetch(&targets, config.years);
    ensure_reachable(Source::Noaa, &climate)?;

    Ok(assemble(yields, climate))
}

fn ensure_reachable<R>(source: Source, outcomes: &[SubRequestOutcome<R>]) -> Result<(), AppError> {
    if !all_unreachable(outcomes) {
        return Ok(());
    }
    let last = outcomes
        .iter()
        .rev()
        .find_map(|o| o.outcome.as_ref().err())
        .map(|e| e.to_string())
        .unwrap_or_default();
    error!(%source, requests = outcomes.len(), "source unreachable");
    Err(AppError::new(
        EXIT_UNREACHABLE,
        format!("{source} unreachable: all {} requests exhausted their retries (last error: {last})", outcomes.len()),
    ))
}

/// Fetch over HTTP, merge, and write the data CSVs.
pub fn run_fetch(config: &Config) -> Result<FetchOutput, AppError> {
    let transport = HttpTransport::new(config.timeout)
        .map_err(|e| AppError::new(EXIT_CONFIG, format!("Failed to build HTTP client: {e}")))?;

    info!(
        states = config.states.len(),
        crops = config.crops.len(),
        years = %config.years,
        "fetching"
    );
    let dataset = fetch_and_merge(config, &transport)?;
    let files = write_dataset(&config.data_dir, &dataset, &config.crops)?;
    Ok(FetchOutput { dataset, files })
}

/// Analyze merged rows and write tables (and figures when `plots`).
pub fn run_analysis(rows: &[MergedRow], results_dir: &Path, plots: bool) -> Result<AnalysisOutput, AppError> {
    let report = analyze(rows);
    let mut files = write_analysis(results_dir, &report)?;
    if plots {
        files.extend(render_figures(results_dir, rows, &report)?);
    }
    Ok(AnalysisOutput { report, files })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Credentials;
    use crate::data::DataSourceError;
    use crate::data::http::testing::{ScriptedTransport, server_error};
    use crate::data::http::RetryPolicy;
    use crate::domain::{Crop, YearRange};

    fn config() -> Config {
        let mut config = Config::with_credentials(Credentials {
            usda_api_key: "k".into(),
            noaa_token: "t".into(),
        });
        config.states = vec!["IA".into()];
        config.crops = vec![Crop::Corn];
        config.years = YearRange::single(2020);
        config.retry = RetryPolicy::immediate(0);
        config.request_delay = std::time::Duration::ZERO;
        config
    }

    #[test]
    fn unreachable_source_is_exit_4() {
        let transport = ScriptedTransport::new(vec![Err(server_error())]);
        let err = fetch_and_merge(&config(), &transport).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_UNREACHABLE);
        assert!(err.message().starts_with("USDA unreachable"));
        // Climate is never requested once yields are known to be unreachable.
        assert_eq!(transport.calls.get(), 1);
    }

    #[test]
    fn rejected_only_request_is_a_gap_not_an_abort() {
        let mut config = config();
        config.crops = vec![Crop::Wheat];
        let transport = ScriptedTransport::new(vec![
            Err(DataSourceError::Status {
                url: "u".into(),
                status: 400,
                body: "no data".into(),
            }),
            Ok(json!({})),
        ]);
        let dataset = fetch_and_merge(&config, &transport).unwrap();
        // The 400 is not retried and climate is still fetched.
        assert_eq!(transport.calls.get(), 2);
        assert_eq!(dataset.gaps.len(), 1);
        assert_eq!(dataset.gaps[0].source, Source::Usda);
        assert_eq!(dataset.gaps[0].subject, "WHEAT");
        assert!(dataset.rows.is_empty());
    }

    #[test]
    fn merged_dataset_from_scripted_responses() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"data": [{
                "year": 2020,
                "state_alpha": "IA",
                "short_desc": "CORN, GRAIN - YIELD, MEASURED IN BU / ACRE",
                "reference_period_desc": "YEAR",
                "Value": "178.0"
            }]})),
            Ok(json!({})),
        ]);
        let dataset = fetch_and_merge(&config(), &transport).unwrap();
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.rows[0].corn_yield, Some(178.0));
        assert_eq!(dataset.rows[0].avg_temp_annual, None);
        assert!(dataset.gaps.is_empty());
    }
}
