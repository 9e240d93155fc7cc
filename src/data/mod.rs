//! Data acquisition.
//!
//! - `usda`: Quick Stats yields, one request per (state, crop)
//! - `noaa`: CDO GSOM climate, chunked by year span and paginated
//! - `climate`: monthly -> annual aggregation
//! - `http`: transport, retry and pacing shared by both fetchers
//! - `outcome`: per-sub-request results and data gaps

pub mod climate;
pub mod error;
pub mod http;
pub mod noaa;
pub mod outcome;
pub mod usda;

pub use error::DataSourceError;
pub use http::{HttpTransport, RetryPolicy, Transport};
pub use noaa::{ClimateFetcher, ClimateSource, ClimateTarget, climate_targets};
pub use outcome::{DataGap, RequestKey, Source, SubRequestOutcome};
pub use usda::YieldFetcher;
