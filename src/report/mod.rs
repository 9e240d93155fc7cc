//! Terminal summary of a run.

pub mod format;

pub use format::*;

use chrono::{DateTime, Utc};

use crate::analysis::AnalysisReport;
use crate::domain::YearRange;
use crate::merge::MergedDataset;

/// Full summary for `run`; `dataset` is absent in `analyze` mode.
pub fn format_summary(
    started: DateTime<Utc>,
    states: &[String],
    years: YearRange,
    dataset: Option<&MergedDataset>,
    report: &AnalysisReport,
) -> String {
    let mut out = format_run_header(started, states, years);
    if let Some(dataset) = dataset {
        out.push('\n');
        out.push_str(&format_dataset_summary(dataset));
        out.push('\n');
        out.push_str(&format_gaps(&dataset.gaps));
    }
    out.push('\n');
    out.push_str(&format_trends(report));
    out.push('\n');
    out.push_str(&format_correlations(report));
    let skipped = format_skipped(&report.skipped);
    if !skipped.is_empty() {
        out.push('\n');
        out.push_str(&skipped);
    }
    out
}
