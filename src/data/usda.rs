//! USDA NASS Quick Stats integration (state-level crop yields).

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::data::error::DataSourceError;
use crate::data::http::{ApiRequest, RequestPacer, RetryPolicy, Transport, with_retry};
use crate::data::outcome::{RequestKey, Source, SubRequestOutcome};
use crate::domain::{Crop, YearRange, YieldRecord};

pub const QUICKSTATS_URL: &str = "https://quickstats.nass.usda.gov/api/api_GET/";

const ANNUAL_PERIOD: &str = "YEAR";

/// Yield Fetcher: one Quick Stats request per (state, crop).
pub struct YieldFetcher<T> {
    transport: T,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    pacer: RequestPacer,
}

impl<T: Transport> YieldFetcher<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            base_url: config.usda_url.clone(),
            api_key: config.credentials.usda_api_key.clone(),
            retry: config.retry,
            pacer: RequestPacer::new(config.request_delay),
        }
    }

    /// Fetch every (state, crop) combination over `years`.
    ///
    /// A failed sub-request is reported in its outcome; the others still run.
    pub fn fetch(
        &self,
        states: &[String],
        crops: &[Crop],
        years: YearRange,
    ) -> Vec<SubRequestOutcome<YieldRecord>> {
        let mut outcomes = Vec::with_capacity(states.len() * crops.len());

        for state in states {
            for &crop in crops {
                let key = RequestKey {
                    source: Source::Usda,
                    state: state.clone(),
                    subject: crop.to_string(),
                    years,
                };
                let outcome = match self.fetch_one(state, crop, years) {
                    Ok(records) => {
                        info!(%state, %crop, %years, records = records.len(), "fetched yields");
                        SubRequestOutcome::success(key, records)
                    }
                    Err(err) => {
                        warn!(%state, %crop, %years, error = %err, "yield request failed");
                        SubRequestOutcome::failure(key, err)
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    fn fetch_one(&self, state: &str, crop: Crop, years: YearRange) -> Result<Vec<YieldRecord>, DataSourceError> {
        let request = self.request(state, crop, years);
        let label = format!("USDA {state} {crop} {years}");
        let body = with_retry(&self.retry, &label, || {
            self.pacer.wait();
            self.transport.get_json(&request)
        })?;

        let resp: QuickStatsResponse = serde_json::from_value(body)
            .map_err(|e| DataSourceError::parse(&self.base_url, format!("Quick Stats payload: {e}")))?;

        Ok(parse_yields(resp, state, crop, years))
    }

    fn request(&self, state: &str, crop: Crop, years: YearRange) -> ApiRequest {
        ApiRequest::get(&self.base_url)
            .param("key", &self.api_key)
            .param("source_desc", "SURVEY")
            .param("sector_desc", "CROPS")
            .param("group_desc", "FIELD CROPS")
            .param("commodity_desc", crop.commodity())
            .param("statisticcat_desc", "YIELD")
            .param("agg_level_desc", "STATE")
            .param("state_alpha", state)
            .param("year__GE", years.start())
            .param("year__LE", years.end())
            .param("format", "JSON")
    }
}

#[derive(Debug, Deserialize)]
struct QuickStatsResponse {
    #[serde(default)]
    data: Vec<QuickStatsRow>,
}

#[derive(Debug, Deserialize)]
struct QuickStatsRow {
    year: i32,
    #[serde(default)]
    state_alpha: String,
    #[serde(default)]
    short_desc: String,
    #[serde(default)]
    reference_period_desc: String,
    #[serde(rename = "Value")]
    value: String,
}

fn parse_yields(resp: QuickStatsResponse, state: &str, crop: Crop, years: YearRange) -> Vec<YieldRecord> {
    let mut out = Vec::new();
    for row in resp.data {
        if row.short_desc != crop.yield_short_desc() || row.reference_period_desc != ANNUAL_PERIOD {
            continue;
        }
        if !years.contains(row.year) {
            continue;
        }
        if !row.state_alpha.is_empty() && !row.state_alpha.eq_ignore_ascii_case(state) {
            continue;
        }
        let Some(value) = parse_value(&row.value) else {
            continue;
        };
        out.push(YieldRecord {
            state: state.to_string(),
            crop,
            year: row.year,
            yield_value: value,
        });
    }
    out
}

/// Parse a Quick Stats `Value` cell.
///
/// Values carry thousands separators; suppression codes such as `(D)`, `(NA)`
/// or `(Z)` mean no value.
fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('(') {
        return None;
    }
    let v = trimmed.replace(',', "").parse::<f64>().ok()?;
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

/// Union of yield records, unique per (state, crop, year); later records win.
pub fn dedup_yields(records: Vec<YieldRecord>) -> Vec<YieldRecord> {
    let mut by_key: BTreeMap<(String, Crop, i32), YieldRecord> = BTreeMap::new();
    for record in records {
        by_key.insert((record.state.clone(), record.crop, record.year), record);
    }
    by_key.into_values().collect()
}
