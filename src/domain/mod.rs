//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the crops and year ranges a run covers (`Crop`, `YearRange`)
//! - fetched records (`YieldRecord`, `ClimateMonthRecord`)
//! - derived records (`ClimateYearRecord`, `MergedRow`)
//! - the analysed series of the merged table (`Metric`)

pub mod types;

pub use types::*;
