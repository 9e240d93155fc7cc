//! Formatted terminal output.
//!
//! Formatting lives here so analysis code stays free of presentation and
//! output changes stay localized.

use chrono::{DateTime, Utc};

use crate::analysis::{AnalysisReport, Skipped};
use crate::data::DataGap;
use crate::domain::{Metric, YearRange};
use crate::merge::MergedDataset;

/// Header with the run timestamp and scope.
pub fn format_run_header(started: DateTime<Utc>, states: &[String], years: YearRange) -> String {
    let mut out = String::new();
    out.push_str("=== crop-shock: crop yield vs climate ===\n");
    out.push_str(&format!("Run: {}\n", started.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!("States: {} | Years: {years}\n", states.join(",")));
    out
}

/// Row counts of the fetched and merged tables.
pub fn format_dataset_summary(dataset: &MergedDataset) -> String {
    let mut out = String::new();
    out.push_str("Data:\n");
    out.push_str(&format!("- yield records   : {}\n", dataset.yields.len()));
    out.push_str(&format!("- climate months  : {}\n", dataset.climate_months.len()));
    out.push_str(&format!("- climate years   : {}\n", dataset.climate_years.len()));
    out.push_str(&format!("- merged rows     : {}\n", dataset.rows.len()));
    out.push_str(&format!("- data gaps       : {}\n", dataset.gaps.len()));
    out
}

/// Failed sub-requests, one per line.
pub fn format_gaps(gaps: &[DataGap]) -> String {
    if gaps.is_empty() {
        return "No data gaps.\n".to_string();
    }

    let mut out = String::new();
    out.push_str("Data gaps:\n");
    out.push_str(&header_line(&format!(
        "{:<6} {:<6} {:<22} {:<9} {}",
        "source", "state", "subject", "years", "error"
    )));
    for g in gaps {
        let years = if g.start_year == g.end_year {
            g.start_year.to_string()
        } else {
            format!("{}-{}", g.start_year, g.end_year)
        };
        out.push_str(
            format!(
                "{:<6} {:<6} {:<22} {:<9} {}\n",
                g.source.to_string(),
                g.state,
                truncate(&g.subject, 22),
                years,
                truncate(&g.error, 60),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Trend slopes per state, one column per metric.
pub fn format_trends(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str("Trends (slope per year, p-value):\n");

    let mut header = format!("{:<6}", "state");
    for metric in Metric::ALL {
        header.push_str(&format!(" {:>20}", metric.column()));
    }
    out.push_str(&header_line(&header));

    for state in report.states() {
        let mut line = format!("{state:<6}");
        for metric in Metric::ALL {
            let cell = report
                .trend(state, metric)
                .map(|t| format!("{} ({})", fmt_num(t.fit.slope), fmt_p(t.fit.p_value)))
                .unwrap_or_else(|| "-".to_string());
            line.push_str(&format!(" {cell:>20}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Yield-vs-climate correlations per state.
pub fn format_correlations(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str("Yield/climate correlations (r, p-value, n):\n");
    out.push_str(&header_line(&format!(
        "{:<6} {:<12} {:<20} {:>8} {:>10} {:>5}",
        "state", "yield", "climate", "r", "p", "n"
    )));

    for state in report.states() {
        for c in report.correlations_for(state) {
            // Climate-climate and yield-yield pairs stay in correlations.csv.
            let (yield_metric, climate_metric) = match (Metric::YIELDS.contains(&c.x), Metric::YIELDS.contains(&c.y)) {
                (false, true) => (c.y, c.x),
                (true, false) => (c.x, c.y),
                _ => continue,
            };
            out.push_str(
                format!(
                    "{:<6} {:<12} {:<20} {:>8.3} {:>10} {:>5}\n",
                    state,
                    yield_metric.column(),
                    climate_metric.column(),
                    c.correlation.r,
                    fmt_p(c.correlation.p_value),
                    c.correlation.n,
                )
                .trim_end(),
            );
            out.push('\n');
        }
    }
    out
}

/// Analyses that could not be computed.
pub fn format_skipped(skipped: &[Skipped]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let mut out = format!("Skipped analyses ({}):\n", skipped.len());
    for s in skipped {
        out.push_str(&format!(
            "- {:<6} {} ({}, n={})\n",
            s.state, s.analysis, s.reason, s.observations
        ));
    }
    out
}

fn header_line(header: &str) -> String {
    let header = header.trim_end();
    format!("{header}\n{}\n", "-".repeat(header.chars().count()))
}

fn fmt_num(v: f64) -> String {
    if v.abs() >= 100.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.3}")
    }
}

fn fmt_p(p: Option<f64>) -> String {
    match p {
        Some(p) if p < 1e-4 => "<1e-4".to_string(),
        Some(p) => format!("{p:.4}"),
        None => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{PairCorrelation, Trend};
    use crate::data::Source;
    use crate::math::{Correlation, LinearFit};

    fn report() -> AnalysisReport {
        AnalysisReport {
            trends: vec![Trend {
                state: "IA".into(),
                metric: Metric::CornYield,
                fit: LinearFit {
                    n: 20,
                    slope: 1.9,
                    intercept: -3650.0,
                    r_squared: Some(0.7),
                    slope_std_err: Some(0.2),
                    p_value: Some(0.00001),
                },
            }],
            correlations: vec![
                PairCorrelation {
                    state: "IA".into(),
                    x: Metric::AvgTemp,
                    y: Metric::CornYield,
                    correlation: Correlation {
                        n: 20,
                        r: -0.45,
                        p_value: Some(0.0466),
                    },
                },
                PairCorrelation {
                    state: "IA".into(),
                    x: Metric::AvgTemp,
                    y: Metric::TotalPrecip,
                    correlation: Correlation {
                        n: 20,
                        r: 0.1,
                        p_value: None,
                    },
                },
            ],
            ..AnalysisReport::default()
        }
    }

    #[test]
    fn trend_table_marks_missing_cells() {
        let text = format_trends(&report());
        let row = text.lines().find(|l| l.starts_with("IA")).unwrap();
        assert!(row.contains("1.900 (<1e-4)"));
        assert!(row.contains('-'));
    }

    #[test]
    fn correlation_table_lists_yield_climate_pairs_only() {
        let text = format_correlations(&report());
        assert!(text.contains("corn_yield"));
        assert!(text.contains("-0.450"));
        assert!(!text.contains("total_precip_annual"));
    }

    #[test]
    fn gaps_show_year_span_and_truncated_error() {
        let gaps = vec![DataGap {
            source: Source::Noaa,
            state: "KS".into(),
            subject: "GHCND:USW00003928".into(),
            start_year: 1990,
            end_year: 1999,
            error: "x".repeat(100),
        }];
        let text = format_gaps(&gaps);
        assert!(text.contains("NOAA"));
        assert!(text.contains("1990-1999"));
        assert!(!text.contains(&"x".repeat(61)));
        assert_eq!(format_gaps(&[]), "No data gaps.\n");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
