//! Figures for the results directory.
//!
//! - `trend_<metric>.svg`: one line per state
//! - `heatmap_<state>.svg`: correlation matrix per state (and `US`)
//! - `scatter_<yield>_<climate>.svg`: observations plus per-state fits

pub mod svg;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::analysis::{AnalysisReport, NATIONAL, national_series};
use crate::domain::{MergedRow, Metric};
use crate::error::AppError;
use crate::io::export::ensure_dir;

pub use svg::*;

/// Render every figure into `dir`. Returns the written paths.
pub fn render_figures(dir: &Path, rows: &[MergedRow], report: &AnalysisReport) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;
    let mut written = Vec::new();

    // The trend charts carry the pooled series alongside the states.
    let mut with_national = rows.to_vec();
    if report.states().contains(&NATIONAL) {
        with_national.extend(national_series(rows));
    }

    for metric in Metric::ALL {
        let series = metric_by_year(&with_national, metric);
        if series.is_empty() {
            debug!(%metric, "no data for trend chart");
            continue;
        }
        let path = dir.join(format!("trend_{}.svg", metric.short_name()));
        draw_trend_chart(&path, metric, &series).map_err(|e| plot_error(&path, e))?;
        written.push(path);
    }

    for state in report.states() {
        let correlations: Vec<_> = report.correlations_for(state).collect();
        let path = dir.join(format!("heatmap_{state}.svg"));
        draw_correlation_heatmap(&path, state, &correlations).map_err(|e| plot_error(&path, e))?;
        written.push(path);
    }

    for response in Metric::YIELDS {
        for predictor in Metric::CLIMATE {
            let series = metric_pairs(rows, predictor, response);
            if series.is_empty() {
                debug!(%response, %predictor, "no data for scatter chart");
                continue;
            }
            let fits: Vec<_> = report
                .regressions
                .iter()
                .filter(|r| r.response == response && r.predictor == predictor)
                .collect();
            let path = dir.join(format!("scatter_{}_{}.svg", response.short_name(), predictor.short_name()));
            draw_scatter_chart(&path, predictor, response, &series, &fits).map_err(|e| plot_error(&path, e))?;
            written.push(path);
        }
    }

    info!(dir = %dir.display(), figures = written.len(), "rendered figures");
    Ok(written)
}

fn plot_error(path: &Path, err: Box<dyn std::error::Error>) -> AppError {
    AppError::io(format!("Failed to render '{}': {err}", path.display()))
}
