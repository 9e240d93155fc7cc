//! `crop-shock` library crate.
//!
//! Fetches state-level crop yields (USDA Quick Stats) and monthly climate
//! (NOAA CDO GSOM), merges them into a state-year table, and runs descriptive
//! trend, correlation and regression analysis over it.
//!
//! The binary is a thin wrapper around [`app::run`] so the pipeline is testable
//! without spawning processes.

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod merge;
pub mod plot;
pub mod report;
