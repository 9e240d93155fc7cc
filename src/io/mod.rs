//! Input/output helpers.
//!
//! - CSV exports of data and analysis tables (`export`)
//! - `merged.csv` ingest + validation (`ingest`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
