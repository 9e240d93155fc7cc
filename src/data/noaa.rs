//! NOAA NCEI Climate Data Online integration (GSOM monthly summaries).
//!
//! The CDO `data` endpoint caps a GSOM request at ten years and returns at
//! most 1000 results per page, so every (source, year range) is split into
//! chunks and each chunk is read page by page.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::error::DataSourceError;
use crate::data::http::{ApiRequest, RequestPacer, RetryPolicy, Transport, with_retry};
use crate::data::outcome::{RequestKey, Source, SubRequestOutcome};
use crate::domain::{ClimateMonthRecord, YearRange};

pub const NOAA_DATA_URL: &str = "https://www.ncei.noaa.gov/cdo-web/api/v2/data";
pub const GSOM_DATASET: &str = "GSOM";
/// Longest span CDO accepts for one GSOM request.
pub const GSOM_MAX_SPAN_YEARS: u32 = 10;

const PAGE_LIMIT: u32 = 1000;
const MAX_PAGES: u32 = 500;

const DATATYPE_TAVG: &str = "TAVG";
const DATATYPE_PRCP: &str = "PRCP";

/// Where climate observations for a state come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClimateSource {
    /// A single GHCND station, e.g. `GHCND:USW00023174`.
    Station(String),
    /// All stations in a CDO location, e.g. `FIPS:06`.
    Location(String),
}

impl ClimateSource {
    pub fn id(&self) -> &str {
        match self {
            ClimateSource::Station(id) | ClimateSource::Location(id) => id,
        }
    }

    fn query_key(&self) -> &'static str {
        match self {
            ClimateSource::Station(_) => "stationid",
            ClimateSource::Location(_) => "locationid",
        }
    }
}

/// One state's climate source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClimateTarget {
    pub state: String,
    pub source: ClimateSource,
}

/// Every (state, source) pair the configuration asks for, in state order.
pub fn climate_targets(config: &Config) -> Vec<ClimateTarget> {
    config
        .states
        .iter()
        .flat_map(|state| {
            config
                .climate_sources(state)
                .into_iter()
                .map(move |source| ClimateTarget {
                    state: state.clone(),
                    source,
                })
        })
        .collect()
}

/// Partition `range` into contiguous chunks of at most `max_span` years.
///
/// Chunks are produced in order; the last one is truncated to `range.end()`.
/// A `max_span` of zero is treated as one.
pub fn chunk_years(range: YearRange, max_span: u32) -> Vec<YearRange> {
    let step = max_span.max(1) as i32;
    let mut chunks = Vec::new();
    let mut start = range.start();
    while start <= range.end() {
        let end = start.saturating_add(step - 1).min(range.end());
        chunks.extend(YearRange::new(start, end));
        match end.checked_add(1) {
            Some(next) => start = next,
            None => break,
        }
    }
    chunks
}

/// Climate Fetcher: one logical request per (source, chunk), paginated.
pub struct ClimateFetcher<T> {
    transport: T,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    pacer: RequestPacer,
    chunk_years: u32,
}

impl<T: Transport> ClimateFetcher<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            base_url: config.noaa_url.clone(),
            token: config.credentials.noaa_token.clone(),
            retry: config.retry,
            pacer: RequestPacer::new(config.request_delay),
            chunk_years: config.chunk_years,
        }
    }

    /// Fetch monthly TAVG/PRCP for every target over `years`.
    ///
    /// A chunk that still fails after retries becomes a failed outcome for
    /// that (source, year sub-range) only.
    pub fn fetch(&self, targets: &[ClimateTarget], years: YearRange) -> Vec<SubRequestOutcome<ClimateMonthRecord>> {
        let chunks = chunk_years(years, self.chunk_years);
        let mut outcomes = Vec::with_capacity(targets.len() * chunks.len());

        for target in targets {
            let source_id = target.source.id();
            for &chunk in &chunks {
                let key = RequestKey {
                    source: Source::Noaa,
                    state: target.state.clone(),
                    subject: source_id.to_string(),
                    years: chunk,
                };
                let outcome = match self.fetch_chunk(target, chunk) {
                    Ok(records) => {
                        info!(state = %target.state, source = source_id, years = %chunk, months = records.len(), "fetched climate chunk");
                        SubRequestOutcome::success(key, records)
                    }
                    Err(err) => {
                        warn!(state = %target.state, source = source_id, years = %chunk, error = %err, "climate chunk failed");
                        SubRequestOutcome::failure(key, err)
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    fn fetch_chunk(&self, target: &ClimateTarget, chunk: YearRange) -> Result<Vec<ClimateMonthRecord>, DataSourceError> {
        let mut observations = Vec::new();
        let mut offset = 1u32;
        let mut complete = false;

        for page in 0..MAX_PAGES {
            let request = self.request(&target.source, chunk, offset);
            let label = format!("NOAA {} {} {chunk} offset={offset}", target.state, target.source.id());
            let body = with_retry(&self.retry, &label, || {
                self.pacer.wait();
                self.transport.get_json(&request)
            })?;

            let resp: DataResponse = serde_json::from_value(body)
                .map_err(|e| DataSourceError::parse(&self.base_url, format!("CDO payload: {e}")))?;

            let received = resp.results.len() as u32;
            observations.extend(resp.results);

            let Some(resultset) = resp.metadata.map(|m| m.resultset) else {
                complete = true;
                break;
            };
            let next = resultset.offset.max(offset) + received;
            debug!(page, offset, received, total = resultset.count, "read CDO page");
            if received == 0 || next > resultset.count {
                complete = true;
                break;
            }
            offset = next;
        }

        if !complete {
            return Err(DataSourceError::parse(
                &self.base_url,
                format!("CDO results not exhausted after {MAX_PAGES} pages (next offset {offset})"),
            ));
        }

        month_records(&self.base_url, &target.state, chunk, observations)
    }

    fn request(&self, source: &ClimateSource, chunk: YearRange, offset: u32) -> ApiRequest {
        ApiRequest::get(&self.base_url)
            .header("token", &self.token)
            .param("datasetid", GSOM_DATASET)
            .param("datatypeid", DATATYPE_TAVG)
            .param("datatypeid", DATATYPE_PRCP)
            .param(source.query_key(), source.id())
            .param("startdate", format!("{}-01-01", chunk.start()))
            .param("enddate", format!("{}-12-31", chunk.end()))
            .param("units", "metric")
            .param("limit", PAGE_LIMIT)
            .param("offset", offset)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DataResponse {
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    results: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    resultset: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    offset: u32,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    datatype: String,
    station: String,
    #[serde(default)]
    value: Option<f64>,
}

/// Fold raw observations into one record per (station, year, month).
///
/// Later observations of the same datatype overwrite earlier ones; months
/// outside `chunk` and unknown datatypes are ignored.
fn month_records(
    url: &str,
    state: &str,
    chunk: YearRange,
    observations: Vec<Observation>,
) -> Result<Vec<ClimateMonthRecord>, DataSourceError> {
    let mut months: BTreeMap<(String, i32, u32), (Option<f64>, Option<f64>)> = BTreeMap::new();

    for obs in observations {
        let date = parse_obs_date(&obs.date)
            .ok_or_else(|| DataSourceError::parse(url, format!("invalid CDO date '{}'", obs.date)))?;
        if !chunk.contains(date.year()) {
            continue;
        }
        let value = obs.value.filter(|v| v.is_finite());
        let entry = months
            .entry((obs.station, date.year(), date.month()))
            .or_insert((None, None));
        match obs.datatype.as_str() {
            DATATYPE_TAVG => entry.0 = value.or(entry.0),
            DATATYPE_PRCP => entry.1 = value.or(entry.1),
            _ => {}
        }
    }

    Ok(months
        .into_iter()
        .map(|((station_id, year, month), (avg_temp, total_precip))| ClimateMonthRecord {
            state: state.to_string(),
            station_id,
            year,
            month,
            avg_temp,
            total_precip,
        })
        .collect())
}

/// CDO dates look like `2020-06-01T00:00:00`.
fn parse_obs_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
