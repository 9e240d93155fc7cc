//! Run configuration.
//!
//! A single `Config` is assembled once (credentials from the environment plus
//! `.env`, run parameters from the CLI) and passed explicitly into each
//! fetcher. Nothing here is process-global.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::data::http::RetryPolicy;
use crate::data::noaa::{ClimateSource, GSOM_MAX_SPAN_YEARS, NOAA_DATA_URL};
use crate::data::usda::QUICKSTATS_URL;
use crate::domain::{Crop, YearRange};

pub const USDA_KEY_VAR: &str = "USDA_API_KEY";
pub const NOAA_TOKEN_VAR: &str = "NOAA_TOKEN";

pub const DEFAULT_STATES: [&str; 5] = ["CA", "IA", "IL", "KS", "NE"];

/// Accepted bounds for `--start-year` / `--end-year`.
pub const MIN_YEAR: i32 = 1800;
pub const MAX_YEAR: i32 = 2100;

/// Two-letter postal code -> two-digit FIPS code.
const STATE_FIPS: [(&str, &str); 50] = [
    ("AL", "01"),
    ("AK", "02"),
    ("AZ", "04"),
    ("AR", "05"),
    ("CA", "06"),
    ("CO", "08"),
    ("CT", "09"),
    ("DE", "10"),
    ("FL", "12"),
    ("GA", "13"),
    ("HI", "15"),
    ("ID", "16"),
    ("IL", "17"),
    ("IN", "18"),
    ("IA", "19"),
    ("KS", "20"),
    ("KY", "21"),
    ("LA", "22"),
    ("ME", "23"),
    ("MD", "24"),
    ("MA", "25"),
    ("MI", "26"),
    ("MN", "27"),
    ("MS", "28"),
    ("MO", "29"),
    ("MT", "30"),
    ("NE", "31"),
    ("NV", "32"),
    ("NH", "33"),
    ("NJ", "34"),
    ("NM", "35"),
    ("NY", "36"),
    ("NC", "37"),
    ("ND", "38"),
    ("OH", "39"),
    ("OK", "40"),
    ("OR", "41"),
    ("PA", "42"),
    ("RI", "44"),
    ("SC", "45"),
    ("SD", "46"),
    ("TN", "47"),
    ("TX", "48"),
    ("UT", "49"),
    ("VT", "50"),
    ("VA", "51"),
    ("WA", "53"),
    ("WV", "54"),
    ("WI", "55"),
    ("WY", "56"),
];

/// Long-record airport stations used when no station is configured for a state.
const DEFAULT_STATIONS: [(&str, &str); 5] = [
    ("CA", "GHCND:USW00023174"), // Los Angeles Intl
    ("IA", "GHCND:USW00014933"), // Des Moines Intl
    ("IL", "GHCND:USW00094846"), // Chicago O'Hare
    ("KS", "GHCND:USW00003928"), // Wichita
    ("NE", "GHCND:USW00014942"), // Omaha Eppley
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing {0} (set it in the environment or .env)")]
    MissingCredential(&'static str),

    #[error("invalid year range {start}..{end}: start must not be after end")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("year {year} is outside {min}..={max}")]
    YearOutOfBounds { year: i32, min: i32, max: i32 },

    #[error("at least one state is required")]
    NoStates,

    #[error("at least one crop is required")]
    NoCrops,

    #[error("unknown state code '{0}' (expected a two-letter US state code)")]
    InvalidState(String),

    #[error("invalid station mapping '{0}' (expected STATE=STATION_ID)")]
    InvalidStation(String),

    #[error("chunk size must be between 1 and {max} years, got {got}")]
    InvalidChunkSize { got: u32, max: u32 },
}

/// API credentials. Never logged.
#[derive(Clone)]
pub struct Credentials {
    pub usda_api_key: String,
    pub noaa_token: String,
}

impl Credentials {
    /// Load both credentials, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            usda_api_key: require_var(USDA_KEY_VAR)?,
            noaa_token: require_var(NOAA_TOKEN_VAR)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("usda_api_key", &"<redacted>")
            .field("noaa_token", &"<redacted>")
            .finish()
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}

/// Everything one fetch run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub states: Vec<String>,
    pub crops: Vec<Crop>,
    pub years: YearRange,
    /// Per-state station overrides.
    pub stations: BTreeMap<String, Vec<String>>,
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Minimum spacing between requests to the same API.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub chunk_years: u32,
    pub usda_url: String,
    pub noaa_url: String,
    pub plots: bool,
}

impl Config {
    /// Config with defaults for everything but credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            states: DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
            crops: Crop::ALL.to_vec(),
            years: YearRange::default(),
            stations: BTreeMap::new(),
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(250),
            timeout: Duration::from_secs(30),
            chunk_years: GSOM_MAX_SPAN_YEARS,
            usda_url: QUICKSTATS_URL.to_string(),
            noaa_url: NOAA_DATA_URL.to_string(),
            plots: true,
        }
    }

    /// Normalize and check run parameters before any request is made.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.credentials.usda_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(USDA_KEY_VAR));
        }
        if self.credentials.noaa_token.trim().is_empty() {
            return Err(ConfigError::MissingCredential(NOAA_TOKEN_VAR));
        }

        let mut states = Vec::with_capacity(self.states.len());
        for raw in &self.states {
            let state = normalize_state(raw)?;
            if !states.contains(&state) {
                states.push(state);
            }
        }
        if states.is_empty() {
            return Err(ConfigError::NoStates);
        }
        self.states = states;

        self.crops.sort();
        self.crops.dedup();
        if self.crops.is_empty() {
            return Err(ConfigError::NoCrops);
        }

        if self.chunk_years == 0 || self.chunk_years > GSOM_MAX_SPAN_YEARS {
            return Err(ConfigError::InvalidChunkSize {
                got: self.chunk_years,
                max: GSOM_MAX_SPAN_YEARS,
            });
        }

        Ok(self)
    }

    /// Climate sources to query for a state: configured stations, else the
    /// built-in station, else the whole state by FIPS location.
    pub fn climate_sources(&self, state: &str) -> Vec<ClimateSource> {
        if let Some(ids) = self.stations.get(state) {
            if !ids.is_empty() {
                return ids.iter().cloned().map(ClimateSource::Station).collect();
            }
        }
        if let Some((_, id)) = DEFAULT_STATIONS.iter().find(|(s, _)| *s == state) {
            return vec![ClimateSource::Station(id.to_string())];
        }
        state_fips(state)
            .map(|fips| vec![ClimateSource::Location(format!("FIPS:{fips}"))])
            .unwrap_or_default()
    }
}

pub fn year_range(start: i32, end: i32) -> Result<YearRange, ConfigError> {
    for year in [start, end] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ConfigError::YearOutOfBounds {
                year,
                min: MIN_YEAR,
                max: MAX_YEAR,
            });
        }
    }
    YearRange::new(start, end).ok_or(ConfigError::InvalidYearRange { start, end })
}

pub fn state_fips(state: &str) -> Option<&'static str> {
    STATE_FIPS
        .iter()
        .find(|(code, _)| *code == state)
        .map(|(_, fips)| *fips)
}

fn normalize_state(raw: &str) -> Result<String, ConfigError> {
    let state = raw.trim().to_ascii_uppercase();
    if state_fips(&state).is_none() {
        return Err(ConfigError::InvalidState(raw.trim().to_string()));
    }
    Ok(state)
}

/// Parse repeated `STATE=STATION_ID` arguments into a per-state map.
pub fn parse_station_overrides(raw: &[String]) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in raw {
        let (state, station) = item
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidStation(item.clone()))?;
        let station = station.trim();
        if station.is_empty() {
            return Err(ConfigError::InvalidStation(item.clone()));
        }
        let state = normalize_state(state)?;
        out.entry(state).or_default().push(station.to_string());
    }
    Ok(out)
}
