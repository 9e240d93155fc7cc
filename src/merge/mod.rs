//! State-year merge.
//!
//! `merge_outer` is a full outer join of annual yields and annual climate on
//! (state, year): every key present on either side appears exactly once and
//! the missing side stays absent. `assemble` runs the whole step from the
//! fetchers' sub-request outcomes, collecting failures as data gaps.

use std::collections::BTreeMap;

use tracing::info;

use crate::data::climate::aggregate_annual;
use crate::data::outcome::{DataGap, SubRequestOutcome, partition_outcomes};
use crate::data::usda::dedup_yields;
use crate::domain::{ClimateMonthRecord, ClimateYearRecord, MergedRow, YieldRecord};

/// Everything produced by fetch + merge.
#[derive(Debug, Clone, Default)]
pub struct MergedDataset {
    pub yields: Vec<YieldRecord>,
    pub climate_months: Vec<ClimateMonthRecord>,
    pub climate_years: Vec<ClimateYearRecord>,
    pub rows: Vec<MergedRow>,
    pub gaps: Vec<DataGap>,
}

/// Full outer join on (state, year), ordered by state then year.
pub fn merge_outer(yields: &[YieldRecord], climate: &[ClimateYearRecord]) -> Vec<MergedRow> {
    let mut rows: BTreeMap<(&str, i32), MergedRow> = BTreeMap::new();

    for y in yields {
        rows.entry((y.state.as_str(), y.year))
            .or_insert_with(|| MergedRow::empty(&y.state, y.year))
            .set_yield(y.crop, y.yield_value);
    }

    for c in climate {
        let row = rows
            .entry((c.state.as_str(), c.year))
            .or_insert_with(|| MergedRow::empty(&c.state, c.year));
        row.avg_temp_annual = c.avg_temp_annual;
        row.total_precip_annual = c.total_precip_annual;
    }

    rows.into_values().collect()
}

/// Flatten fetch outcomes, aggregate climate, join, and record gaps.
pub fn assemble(
    yield_outcomes: Vec<SubRequestOutcome<YieldRecord>>,
    climate_outcomes: Vec<SubRequestOutcome<ClimateMonthRecord>>,
) -> MergedDataset {
    let (yields, mut gaps) = partition_outcomes(yield_outcomes);
    let (climate_months, climate_gaps) = partition_outcomes(climate_outcomes);
    gaps.extend(climate_gaps);

    let yields = dedup_yields(yields);
    let climate_years = aggregate_annual(&climate_months);
    let rows = merge_outer(&yields, &climate_years);

    info!(
        yields = yields.len(),
        climate_months = climate_months.len(),
        climate_years = climate_years.len(),
        rows = rows.len(),
        gaps = gaps.len(),
        "merged datasets"
    );

    MergedDataset {
        yields,
        climate_months,
        climate_years,
        rows,
        gaps,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::error::DataSourceError;
    use crate::data::outcome::{RequestKey, Source};
    use crate::domain::{Crop, YearRange};

    fn yield_rec(state: &str, crop: Crop, year: i32, v: f64) -> YieldRecord {
        YieldRecord {
            state: state.into(),
            crop,
            year,
            yield_value: v,
        }
    }

    fn climate_rec(state: &str, year: i32, t: Option<f64>, p: Option<f64>) -> ClimateYearRecord {
        ClimateYearRecord {
            state: state.into(),
            year,
            avg_temp_annual: t,
            total_precip_annual: p,
        }
    }

    fn key(source: Source, subject: &str) -> RequestKey {
        RequestKey {
            source,
            state: "CA".into(),
            subject: subject.into(),
            years: YearRange::single(2020),
        }
    }

    #[test]
    fn output_has_one_row_per_key_in_either_input() {
        let yields = vec![
            yield_rec("IA", Crop::Corn, 2010, 165.0),
            yield_rec("IA", Crop::Wheat, 2010, 50.0),
            yield_rec("IA", Crop::Corn, 2011, 172.0),
            yield_rec("KS", Crop::Wheat, 2011, 35.0),
        ];
        let climate = vec![
            climate_rec("IA", 2010, Some(9.8), Some(900.0)),
            climate_rec("IA", 2012, Some(11.4), Some(600.0)),
            climate_rec("NE", 2011, None, Some(700.0)),
        ];

        let rows = merge_outer(&yields, &climate);

        let expected: BTreeSet<(String, i32)> = yields
            .iter()
            .map(|y| (y.state.clone(), y.year))
            .chain(climate.iter().map(|c| (c.state.clone(), c.year)))
            .collect();
        let got: Vec<(String, i32)> = rows.iter().map(|r| (r.state.clone(), r.year)).collect();
        assert_eq!(rows.len(), expected.len());
        assert_eq!(got, expected.into_iter().collect::<Vec<_>>());

        let ia_2010 = &rows[0];
        assert_eq!(ia_2010.corn_yield, Some(165.0));
        assert_eq!(ia_2010.wheat_yield, Some(50.0));
        assert_eq!(ia_2010.avg_temp_annual, Some(9.8));
    }

    #[test]
    fn climate_only_key_keeps_row_with_absent_yields() {
        let climate = vec![climate_rec("CA", 2019, Some(18.1), Some(300.0))];
        let rows = merge_outer(&[], &climate);
        assert_eq!(
            rows,
            vec![MergedRow {
                state: "CA".into(),
                year: 2019,
                corn_yield: None,
                wheat_yield: None,
                avg_temp_annual: Some(18.1),
                total_precip_annual: Some(300.0),
            }]
        );
    }

    #[test]
    fn assemble_single_corn_and_june_climate() {
        let yields = vec![SubRequestOutcome::success(
            key(Source::Usda, "CORN"),
            vec![yield_rec("CA", Crop::Corn, 2020, 180.0)],
        )];
        let climate = vec![SubRequestOutcome::success(
            key(Source::Noaa, "GHCND:USW00023174"),
            vec![ClimateMonthRecord {
                state: "CA".into(),
                station_id: "GHCND:USW00023174".into(),
                year: 2020,
                month: 6,
                avg_temp: Some(22.0),
                total_precip: Some(10.0),
            }],
        )];

        let dataset = assemble(yields, climate);
        assert_eq!(
            dataset.rows,
            vec![MergedRow {
                state: "CA".into(),
                year: 2020,
                corn_yield: Some(180.0),
                wheat_yield: None,
                avg_temp_annual: Some(22.0),
                total_precip_annual: Some(10.0),
            }]
        );
        assert!(dataset.gaps.is_empty());
    }

    #[test]
    fn assemble_records_failures_as_gaps() {
        let yields = vec![
            SubRequestOutcome::success(key(Source::Usda, "CORN"), vec![yield_rec("CA", Crop::Corn, 2020, 180.0)]),
            SubRequestOutcome::failure(
                key(Source::Usda, "WHEAT"),
                DataSourceError::parse("http://usda", "bad payload"),
            ),
        ];
        let climate = vec![SubRequestOutcome::failure(
            key(Source::Noaa, "GHCND:USW00023174"),
            DataSourceError::Status {
                url: "http://noaa".into(),
                status: 503,
                body: String::new(),
            },
        )];

        let dataset = assemble(yields, climate);
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.rows[0].wheat_yield, None);
        assert_eq!(dataset.rows[0].avg_temp_annual, None);
        assert_eq!(dataset.gaps.len(), 2);
        assert_eq!(dataset.gaps[0].source, Source::Usda);
        assert_eq!(dataset.gaps[1].source, Source::Noaa);
    }
}
