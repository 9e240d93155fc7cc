//! Descriptive analysis of the merged state-year table.
//!
//! For each state, plus a pooled national series (`US`) when more than one
//! state is present:
//!
//! - time trend of every metric (OLS on year)
//! - Pearson correlation for each pair of metrics
//! - regression of each yield on each climate variable
//!
//! Only rows where both sides are present are used. A pair with fewer than two
//! such rows, or with a constant side, is reported as skipped.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{MergedRow, Metric};
use crate::math::{Correlation, LinearFit, linear_regression, pearson};

/// Pseudo-state of the pooled national series.
pub const NATIONAL: &str = "US";

const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub state: String,
    pub metric: Metric,
    pub fit: LinearFit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairCorrelation {
    pub state: String,
    pub x: Metric,
    pub y: Metric,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub state: String,
    pub response: Metric,
    pub predictor: Metric,
    pub fit: LinearFit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub state: String,
    pub analysis: String,
    pub observations: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub trends: Vec<Trend>,
    pub correlations: Vec<PairCorrelation>,
    pub regressions: Vec<Regression>,
    pub skipped: Vec<Skipped>,
}

impl AnalysisReport {
    pub fn trend(&self, state: &str, metric: Metric) -> Option<&Trend> {
        self.trends.iter().find(|t| t.state == state && t.metric == metric)
    }

    pub fn correlations_for<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a PairCorrelation> + 'a {
        self.correlations.iter().filter(move |c| c.state == state)
    }

    pub fn regressions_for<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Regression> + 'a {
        self.regressions.iter().filter(move |r| r.state == state)
    }

    /// States (and `US`) in report order.
    pub fn states(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in &self.trends {
            if !out.contains(&t.state.as_str()) {
                out.push(&t.state);
            }
        }
        for c in &self.correlations {
            if !out.contains(&c.state.as_str()) {
                out.push(&c.state);
            }
        }
        out
    }
}

/// Run every analysis over `rows`.
pub fn analyze(rows: &[MergedRow]) -> AnalysisReport {
    let mut by_state: BTreeMap<&str, Vec<&MergedRow>> = BTreeMap::new();
    for row in rows {
        by_state.entry(row.state.as_str()).or_default().push(row);
    }

    let mut report = AnalysisReport::default();
    for (state, state_rows) in &by_state {
        analyze_state(state, state_rows, &mut report);
    }

    if by_state.len() > 1 {
        let national = national_series(rows);
        let national_rows: Vec<&MergedRow> = national.iter().collect();
        analyze_state(NATIONAL, &national_rows, &mut report);
    }

    debug!(
        trends = report.trends.len(),
        correlations = report.correlations.len(),
        regressions = report.regressions.len(),
        skipped = report.skipped.len(),
        "analysis complete"
    );
    report
}

/// Per-year mean of the present state values, as `US` rows.
pub fn national_series(rows: &[MergedRow]) -> Vec<MergedRow> {
    let mut by_year: BTreeMap<i32, Vec<&MergedRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(row);
    }

    by_year
        .into_iter()
        .map(|(year, year_rows)| {
            let avg = |metric: Metric| {
                let present: Vec<f64> = year_rows.iter().filter_map(|r| r.value(metric)).collect();
                (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64)
            };
            MergedRow {
                state: NATIONAL.to_string(),
                year,
                corn_yield: avg(Metric::CornYield),
                wheat_yield: avg(Metric::WheatYield),
                avg_temp_annual: avg(Metric::AvgTemp),
                total_precip_annual: avg(Metric::TotalPrecip),
            }
        })
        .collect()
}

/// Pairwise-complete observations of two series.
pub fn paired<FX, FY>(rows: &[&MergedRow], x: FX, y: FY) -> (Vec<f64>, Vec<f64>)
where
    FX: Fn(&MergedRow) -> Option<f64>,
    FY: Fn(&MergedRow) -> Option<f64>,
{
    rows.iter()
        .filter_map(|&r| Some((x(r)?, y(r)?)))
        .unzip()
}

fn analyze_state(state: &str, rows: &[&MergedRow], report: &mut AnalysisReport) {
    for metric in Metric::ALL {
        let (xs, ys) = paired(rows, |r| Some(r.year as f64), |r| r.value(metric));
        let label = format!("trend {metric}");
        match check_size(state, &label, xs.len(), report).then(|| linear_regression(&xs, &ys)) {
            Some(Some(fit)) => report.trends.push(Trend {
                state: state.to_string(),
                metric,
                fit,
            }),
            Some(None) => skip_degenerate(state, &label, xs.len(), report),
            None => {}
        }
    }

    for (i, &x) in Metric::ALL.iter().enumerate() {
        for &y in &Metric::ALL[i + 1..] {
            let (xs, ys) = paired(rows, |r| r.value(x), |r| r.value(y));
            let label = format!("correlation {x} ~ {y}");
            match check_size(state, &label, xs.len(), report).then(|| pearson(&xs, &ys)) {
                Some(Some(correlation)) => report.correlations.push(PairCorrelation {
                    state: state.to_string(),
                    x,
                    y,
                    correlation,
                }),
                Some(None) => skip_degenerate(state, &label, xs.len(), report),
                None => {}
            }
        }
    }

    for response in Metric::YIELDS {
        for predictor in Metric::CLIMATE {
            let (xs, ys) = paired(rows, |r| r.value(predictor), |r| r.value(response));
            let label = format!("regression {response} ~ {predictor}");
            match check_size(state, &label, xs.len(), report).then(|| linear_regression(&xs, &ys)) {
                Some(Some(fit)) => report.regressions.push(Regression {
                    state: state.to_string(),
                    response,
                    predictor,
                    fit,
                }),
                Some(None) => skip_degenerate(state, &label, xs.len(), report),
                None => {}
            }
        }
    }
}

fn check_size(state: &str, label: &str, n: usize, report: &mut AnalysisReport) -> bool {
    if n >= MIN_OBSERVATIONS {
        return true;
    }
    report.skipped.push(Skipped {
        state: state.to_string(),
        analysis: label.to_string(),
        observations: n,
        reason: format!("fewer than {MIN_OBSERVATIONS} observations"),
    });
    false
}

fn skip_degenerate(state: &str, label: &str, n: usize, report: &mut AnalysisReport) {
    report.skipped.push(Skipped {
        state: state.to_string(),
        analysis: label.to_string(),
        observations: n,
        reason: "no variance".to_string(),
    });
}
