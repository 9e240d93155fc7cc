//! SVG figures rendered with Plotters.
//!
//! All chart inputs are prepared outside the drawing closures; the drawing
//! functions only lay out axes and series.

use std::path::Path;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::analysis::{PairCorrelation, Regression};
use crate::domain::{MergedRow, Metric};

pub type DrawResult<T> = Result<T, Box<dyn std::error::Error>>;

const SIZE: (u32, u32) = (960, 640);
const HEATMAP_SIZE: (u32, u32) = (640, 600);

/// One named series of `(x, y)` points.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Per-state series of `metric` against year, absent values dropped.
pub fn metric_by_year(rows: &[MergedRow], metric: Metric) -> Vec<Series> {
    group_points(rows, |r| Some(r.year as f64), |r| r.value(metric))
}

/// Per-state series of `y` against `x` where both are present.
pub fn metric_pairs(rows: &[MergedRow], x: Metric, y: Metric) -> Vec<Series> {
    group_points(rows, |r| r.value(x), |r| r.value(y))
}

fn group_points<FX, FY>(rows: &[MergedRow], x: FX, y: FY) -> Vec<Series>
where
    FX: Fn(&MergedRow) -> Option<f64>,
    FY: Fn(&MergedRow) -> Option<f64>,
{
    let mut out: Vec<Series> = Vec::new();
    for row in rows {
        let (Some(xv), Some(yv)) = (x(row), y(row)) else { continue };
        match out.iter_mut().find(|s| s.name == row.state) {
            Some(series) => series.points.push((xv, yv)),
            None => out.push(Series {
                name: row.state.clone(),
                points: vec![(xv, yv)],
            }),
        }
    }
    for series in &mut out {
        series.points.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    out
}

/// Padded `[min, max]` over a set of values; `None` when empty.
pub fn padded_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if hi - lo < 1e-12 {
        let pad = if lo.abs() > 1.0 { lo.abs() * 0.05 } else { 1.0 };
        return Some((lo - pad, hi + pad));
    }
    let pad = (hi - lo) * 0.05;
    Some((lo - pad, hi + pad))
}

/// Line chart of one metric over time, one line per state.
pub fn draw_trend_chart(path: &Path, metric: Metric, series: &[Series]) -> DrawResult<()> {
    let all = || series.iter().flat_map(|s| s.points.iter());
    let (Some((x0, x1)), Some((y0, y1))) = (
        padded_bounds(all().map(|p| p.0)),
        padded_bounds(all().map(|p| p.1)),
    ) else {
        return Ok(());
    };

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} by year", metric.label()), ("sans-serif", 22))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc(metric.label())
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .draw()?;

    for (idx, s) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(s.points.iter().copied(), color.stroke_width(2)))?
            .label(s.name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Scatter of a yield against a climate variable, with each state's fitted line.
pub fn draw_scatter_chart(
    path: &Path,
    predictor: Metric,
    response: Metric,
    series: &[Series],
    fits: &[&Regression],
) -> DrawResult<()> {
    let all = || series.iter().flat_map(|s| s.points.iter());
    let (Some((x0, x1)), Some((y0, y1))) = (
        padded_bounds(all().map(|p| p.0)),
        padded_bounds(all().map(|p| p.1)),
    ) else {
        return Ok(());
    };

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} vs {}", response.label(), predictor.label()),
            ("sans-serif", 22),
        )
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(predictor.label())
        .y_desc(response.label())
        .x_label_formatter(&|v| format!("{v:.1}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .draw()?;

    for (idx, s) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(s.points.iter().map(|&(x, y)| Circle::new((x, y), 3, color.filled())))?
            .label(s.name.as_str())
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));

        let Some(fit) = fits.iter().find(|f| f.state == s.name) else {
            continue;
        };
        let Some((lo, hi)) = s
            .points
            .iter()
            .map(|p| p.0)
            .fold(None, |acc: Option<(f64, f64)>, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
        else {
            continue;
        };
        chart.draw_series(LineSeries::new(
            [(lo, fit.fit.predict(lo)), (hi, fit.fit.predict(hi))],
            color.stroke_width(2),
        ))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Diverging blue-white-red fill for a correlation coefficient.
pub fn correlation_color(r: f64) -> RGBColor {
    let r = r.clamp(-1.0, 1.0);
    let fade = |t: f64| (255.0 * (1.0 - t)).round() as u8;
    if r >= 0.0 {
        RGBColor(255, fade(r), fade(r))
    } else {
        RGBColor(fade(-r), fade(-r), 255)
    }
}

/// Symmetric matrix of `r` over `Metric::ALL`; `None` for skipped pairs.
pub fn correlation_matrix(correlations: &[&PairCorrelation]) -> [[Option<f64>; 4]; 4] {
    let index = |m: Metric| Metric::ALL.iter().position(|&x| x == m);
    let mut matrix = [[None; 4]; 4];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = Some(1.0);
    }
    for c in correlations {
        if let (Some(i), Some(j)) = (index(c.x), index(c.y)) {
            matrix[i][j] = Some(c.correlation.r);
            matrix[j][i] = Some(c.correlation.r);
        }
    }
    matrix
}

/// Correlation heatmap of all metrics for one state.
pub fn draw_correlation_heatmap(path: &Path, state: &str, correlations: &[&PairCorrelation]) -> DrawResult<()> {
    let matrix = correlation_matrix(correlations);
    let n = Metric::ALL.len() as f64;

    let root = SVGBackend::new(path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    // Cell (i, j) is centred on (j, n - 1 - i) so the first metric is on top.
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Correlations: {state}"), ("sans-serif", 22))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(-0.5..n - 0.5, -0.5..n - 0.5)?;

    let metric_at = |v: f64| {
        let idx = v.round();
        if (v - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        Metric::ALL
            .get(idx as usize)
            .map(|m| m.short_name().to_string())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(Metric::ALL.len())
        .y_labels(Metric::ALL.len())
        .x_label_formatter(&|v| metric_at(*v))
        .y_label_formatter(&|v| metric_at(n - 1.0 - *v))
        .draw()?;

    let cells: Vec<(f64, f64, Option<f64>)> = matrix
        .iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(move |(j, r)| (j as f64, n - 1.0 - i as f64, *r))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, r)| {
        let fill = r.map(correlation_color).unwrap_or(RGBColor(220, 220, 220));
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], fill.filled())
    }))?;

    let text_style = TextStyle::from(("sans-serif", 16).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(x, y, r)| {
        let label = r.map(|r| format!("{r:.2}")).unwrap_or_else(|| "n/a".to_string());
        Text::new(label, (x, y), text_style.clone())
    }))?;

    root.present()?;
    Ok(())
}
