//! Monthly -> annual climate aggregation.
//!
//! Two steps:
//!
//! 1. per station and year: mean of the present monthly temperatures, sum of
//!    the present monthly precipitation totals
//! 2. per state and year: mean of the present station values
//!
//! A year whose months are all absent keeps its row with absent values.

use std::collections::BTreeMap;

use crate::domain::{ClimateMonthRecord, ClimateYearRecord};

#[derive(Debug, Default, Clone, Copy)]
struct Accum {
    sum: f64,
    n: usize,
}

impl Accum {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }

    fn total(&self) -> Option<f64> {
        (self.n > 0).then_some(self.sum)
    }
}

/// Aggregate monthly records into one record per (state, year).
pub fn aggregate_annual(months: &[ClimateMonthRecord]) -> Vec<ClimateYearRecord> {
    collapse_annual(station_annual(months))
}

/// Annual values per (state, station, year), station id dropped.
///
/// Duplicate months of a station are merged first: present values of the
/// later record win, absent ones fall back to the earlier record.
pub fn station_annual(months: &[ClimateMonthRecord]) -> Vec<ClimateYearRecord> {
    let mut unique: BTreeMap<(&str, &str, i32, u32), (Option<f64>, Option<f64>)> = BTreeMap::new();
    for m in months {
        let entry = unique
            .entry((m.state.as_str(), m.station_id.as_str(), m.year, m.month))
            .or_insert((None, None));
        entry.0 = m.avg_temp.or(entry.0);
        entry.1 = m.total_precip.or(entry.1);
    }

    let mut years: BTreeMap<(&str, &str, i32), (Accum, Accum)> = BTreeMap::new();
    for ((state, station, year, _month), (temp, precip)) in unique {
        let entry = years.entry((state, station, year)).or_default();
        entry.0.push(temp);
        entry.1.push(precip);
    }

    years
        .into_iter()
        .map(|((state, _station, year), (temp, precip))| ClimateYearRecord {
            state: state.to_string(),
            year,
            avg_temp_annual: temp.mean(),
            total_precip_annual: precip.total(),
        })
        .collect()
}

/// Combine records sharing (state, year) by averaging their present values.
///
/// Applying this to its own output returns the same records.
pub fn collapse_annual(records: impl IntoIterator<Item = ClimateYearRecord>) -> Vec<ClimateYearRecord> {
    let mut by_key: BTreeMap<(String, i32), (Accum, Accum)> = BTreeMap::new();
    for r in records {
        let entry = by_key.entry((r.state, r.year)).or_default();
        entry.0.push(r.avg_temp_annual);
        entry.1.push(r.total_precip_annual);
    }

    by_key
        .into_iter()
        .map(|((state, year), (temp, precip))| ClimateYearRecord {
            state,
            year,
            avg_temp_annual: temp.mean(),
            total_precip_annual: precip.mean(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(station: &str, year: i32, month: u32, temp: Option<f64>, precip: Option<f64>) -> ClimateMonthRecord {
        ClimateMonthRecord {
            state: "IA".into(),
            station_id: station.into(),
            year,
            month,
            avg_temp: temp,
            total_precip: precip,
        }
    }

    #[test]
    fn full_year_is_mean_and_sum() {
        let temps: Vec<f64> = (1..=12).map(|m| -5.0 + 2.5 * m as f64).collect();
        let precips: Vec<f64> = (1..=12).map(|m| 10.0 * m as f64).collect();
        let months: Vec<_> = (1..=12u32)
            .map(|m| month("S1", 2001, m, Some(temps[m as usize - 1]), Some(precips[m as usize - 1])))
            .collect();

        let annual = aggregate_annual(&months);
        assert_eq!(annual.len(), 1);
        let expected_temp = temps.iter().sum::<f64>() / 12.0;
        assert!((annual[0].avg_temp_annual.unwrap() - expected_temp).abs() < 1e-12);
        assert!((annual[0].total_precip_annual.unwrap() - 780.0).abs() < 1e-12);
    }

    #[test]
    fn year_without_values_is_absent_not_zero() {
        let months = vec![month("S1", 2001, 1, None, None), month("S1", 2001, 2, None, None)];
        let annual = aggregate_annual(&months);
        assert_eq!(
            annual,
            vec![ClimateYearRecord {
                state: "IA".into(),
                year: 2001,
                avg_temp_annual: None,
                total_precip_annual: None,
            }]
        );
    }

    #[test]
    fn partial_months_use_only_present_values() {
        let months = vec![
            month("S1", 2001, 1, Some(-4.0), None),
            month("S1", 2001, 7, Some(24.0), Some(80.0)),
            month("S1", 2001, 8, None, Some(20.0)),
        ];
        let annual = aggregate_annual(&months);
        assert_eq!(annual[0].avg_temp_annual, Some(10.0));
        assert_eq!(annual[0].total_precip_annual, Some(100.0));
    }

    #[test]
    fn stations_are_averaged_per_state_year() {
        let months = vec![
            month("S1", 2001, 6, Some(20.0), Some(100.0)),
            month("S2", 2001, 6, Some(22.0), Some(50.0)),
            month("S2", 2002, 6, Some(23.0), None),
        ];
        let annual = aggregate_annual(&months);
        assert_eq!(annual.len(), 2);
        assert_eq!(annual[0].avg_temp_annual, Some(21.0));
        assert_eq!(annual[0].total_precip_annual, Some(75.0));
        assert_eq!(annual[1].year, 2002);
        assert_eq!(annual[1].total_precip_annual, None);
    }

    #[test]
    fn duplicate_months_are_last_write_wins() {
        let months = vec![
            month("S1", 2001, 6, Some(20.0), Some(100.0)),
            month("S1", 2001, 6, Some(21.0), None),
        ];
        let annual = aggregate_annual(&months);
        assert_eq!(annual[0].avg_temp_annual, Some(21.0));
        assert_eq!(annual[0].total_precip_annual, Some(100.0));
    }

    #[test]
    fn collapsing_annual_records_is_idempotent() {
        let months = vec![
            month("S1", 2001, 6, Some(20.3), Some(100.1)),
            month("S2", 2001, 6, Some(22.9), Some(50.7)),
            month("S1", 2002, 1, Some(-3.3), None),
            month("S1", 2003, 1, None, None),
        ];
        let once = aggregate_annual(&months);
        let twice = collapse_annual(once.clone());
        assert_eq!(once, twice);
    }
}
