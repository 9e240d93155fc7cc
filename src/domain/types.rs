//! Shared domain types.
//!
//! Records are plain structs passed between fetchers, merger and analyzer,
//! and serialized to CSV as-is (absent values become empty cells).

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

/// Crops whose state-level yield is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Crop {
    Corn,
    Wheat,
}

impl Crop {
    pub const ALL: [Crop; 2] = [Crop::Corn, Crop::Wheat];

    /// Quick Stats `commodity_desc`.
    pub fn commodity(self) -> &'static str {
        match self {
            Crop::Corn => "CORN",
            Crop::Wheat => "WHEAT",
        }
    }

    /// Quick Stats `short_desc` of the state-level yield statistic in bushels per acre.
    ///
    /// A `YIELD` query also returns silage (tons/acre) and per-class wheat
    /// statistics; only this series is kept.
    pub fn yield_short_desc(self) -> &'static str {
        match self {
            Crop::Corn => "CORN, GRAIN - YIELD, MEASURED IN BU / ACRE",
            Crop::Wheat => "WHEAT - YIELD, MEASURED IN BU / ACRE",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            Crop::Corn => "corn_yield",
            Crop::Wheat => "wheat_yield",
        }
    }
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.commodity())
    }
}

/// Closed interval of calendar years, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub const DEFAULT_START: i32 = 1970;
    pub const DEFAULT_END: i32 = 2024;

    /// Returns `None` when `start > end`.
    pub fn new(start: i32, end: i32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single(year: i32) -> Self {
        Self { start: year, end: year }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Number of years covered (always >= 1, saturating at `u32::MAX`).
    pub fn span(&self) -> u32 {
        self.end.abs_diff(self.start).saturating_add(1)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            end: Self::DEFAULT_END,
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Annual yield for one state and crop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldRecord {
    pub state: String,
    pub crop: Crop,
    pub year: i32,
    /// Bushels per acre.
    pub yield_value: f64,
}

/// One station-month of climate observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateMonthRecord {
    pub state: String,
    pub station_id: String,
    pub year: i32,
    /// 1..=12
    pub month: u32,
    /// Monthly mean temperature (°C).
    pub avg_temp: Option<f64>,
    /// Monthly total precipitation (mm).
    pub total_precip: Option<f64>,
}

/// Annual climate values for a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateYearRecord {
    pub state: String,
    pub year: i32,
    pub avg_temp_annual: Option<f64>,
    pub total_precip_annual: Option<f64>,
}

/// One row of the state-year table. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub state: String,
    pub year: i32,
    pub corn_yield: Option<f64>,
    pub wheat_yield: Option<f64>,
    pub avg_temp_annual: Option<f64>,
    pub total_precip_annual: Option<f64>,
}

impl MergedRow {
    pub fn empty(state: impl Into<String>, year: i32) -> Self {
        Self {
            state: state.into(),
            year,
            corn_yield: None,
            wheat_yield: None,
            avg_temp_annual: None,
            total_precip_annual: None,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::AvgTemp => self.avg_temp_annual,
            Metric::TotalPrecip => self.total_precip_annual,
            Metric::CornYield => self.corn_yield,
            Metric::WheatYield => self.wheat_yield,
        }
    }

    pub fn set_yield(&mut self, crop: Crop, value: f64) {
        match crop {
            Crop::Corn => self.corn_yield = Some(value),
            Crop::Wheat => self.wheat_yield = Some(value),
        }
    }
}

/// The four analysed series of a `MergedRow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    AvgTemp,
    TotalPrecip,
    CornYield,
    WheatYield,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::AvgTemp,
        Metric::TotalPrecip,
        Metric::CornYield,
        Metric::WheatYield,
    ];
    pub const CLIMATE: [Metric; 2] = [Metric::AvgTemp, Metric::TotalPrecip];
    pub const YIELDS: [Metric; 2] = [Metric::CornYield, Metric::WheatYield];

    /// Column name in `merged.csv`.
    pub fn column(self) -> &'static str {
        match self {
            Metric::AvgTemp => "avg_temp_annual",
            Metric::TotalPrecip => "total_precip_annual",
            Metric::CornYield => "corn_yield",
            Metric::WheatYield => "wheat_yield",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::AvgTemp => "Average temperature (°C)",
            Metric::TotalPrecip => "Total precipitation (mm)",
            Metric::CornYield => "Corn yield (bu/acre)",
            Metric::WheatYield => "Wheat yield (bu/acre)",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Metric::AvgTemp => "temp",
            Metric::TotalPrecip => "precip",
            Metric::CornYield => "corn",
            Metric::WheatYield => "wheat",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
