//! Per-sub-request results.
//!
//! Each fetcher returns one `SubRequestOutcome` per logical request instead of
//! aborting on the first failure. The merger flattens the successes and turns
//! the failures into `DataGap`s.

use std::fmt;

use serde::Serialize;

use crate::data::error::DataSourceError;
use crate::domain::YearRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Usda,
    Noaa,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Usda => f.write_str("USDA"),
            Source::Noaa => f.write_str("NOAA"),
        }
    }
}

/// Identifies one sub-request: which source, state, subject and years.
///
/// `subject` is the crop for yield requests and the station/location id for
/// climate requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey {
    pub source: Source,
    pub state: String,
    pub subject: String,
    pub years: YearRange,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.source, self.state, self.subject, self.years)
    }
}

#[derive(Debug, Clone)]
pub struct SubRequestOutcome<T> {
    pub key: RequestKey,
    pub outcome: Result<Vec<T>, DataSourceError>,
}

impl<T> SubRequestOutcome<T> {
    pub fn success(key: RequestKey, records: Vec<T>) -> Self {
        Self { key, outcome: Ok(records) }
    }

    pub fn failure(key: RequestKey, err: DataSourceError) -> Self {
        Self { key, outcome: Err(err) }
    }

    /// Failed with an error that retrying could have fixed (connection,
    /// timeout, 5xx, 429), after the retries ran out.
    pub fn is_unreachable(&self) -> bool {
        self.outcome.as_ref().err().is_some_and(DataSourceError::is_transient)
    }
}

/// A slice of the requested space that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataGap {
    pub source: Source,
    pub state: String,
    pub subject: String,
    pub start_year: i32,
    pub end_year: i32,
    pub error: String,
}

impl DataGap {
    pub fn new(key: &RequestKey, err: &DataSourceError) -> Self {
        Self {
            source: key.source,
            state: key.state.clone(),
            subject: key.subject.clone(),
            start_year: key.years.start(),
            end_year: key.years.end(),
            error: err.to_string(),
        }
    }
}

/// Split outcomes into successful records and gaps, preserving request order.
pub fn partition_outcomes<T>(outcomes: Vec<SubRequestOutcome<T>>) -> (Vec<T>, Vec<DataGap>) {
    let mut records = Vec::new();
    let mut gaps = Vec::new();
    for SubRequestOutcome { key, outcome } in outcomes {
        match outcome {
            Ok(mut batch) => records.append(&mut batch),
            Err(err) => gaps.push(DataGap::new(&key, &err)),
        }
    }
    (records, gaps)
}

/// True when there was at least one sub-request and every one failed with a
/// transient error. Permanent failures (4xx, bad payloads) mean the source
/// answered, so they stay gaps.
pub fn all_unreachable<T>(outcomes: &[SubRequestOutcome<T>]) -> bool {
    !outcomes.is_empty() && outcomes.iter().all(SubRequestOutcome::is_unreachable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(subject: &str) -> RequestKey {
        RequestKey {
            source: Source::Noaa,
            state: "CA".into(),
            subject: subject.into(),
            years: YearRange::new(2000, 2009).unwrap(),
        }
    }

    #[test]
    fn partition_keeps_successes_and_records_gaps() {
        let outcomes = vec![
            SubRequestOutcome::success(key("A"), vec![1, 2]),
            SubRequestOutcome::failure(key("B"), DataSourceError::parse("http://x", "bad")),
            SubRequestOutcome::success(key("C"), vec![3]),
        ];
        assert!(!all_unreachable(&outcomes));

        let (records, gaps) = partition_outcomes(outcomes);
        assert_eq!(records, vec![1, 2, 3]);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].subject, "B");
        assert_eq!((gaps[0].start_year, gaps[0].end_year), (2000, 2009));
    }

    fn status(code: u16) -> DataSourceError {
        DataSourceError::Status {
            url: "http://x".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn unreachable_requires_at_least_one_outcome() {
        let none: Vec<SubRequestOutcome<u8>> = Vec::new();
        assert!(!all_unreachable(&none));

        let failed = vec![
            SubRequestOutcome::<u8>::failure(key("A"), status(503)),
            SubRequestOutcome::<u8>::failure(key("B"), status(429)),
        ];
        assert!(all_unreachable(&failed));
    }

    #[test]
    fn permanent_failures_do_not_count_as_unreachable() {
        let rejected = vec![SubRequestOutcome::<u8>::failure(key("A"), status(400))];
        assert!(!all_unreachable(&rejected));

        let mixed = vec![
            SubRequestOutcome::<u8>::failure(key("A"), status(503)),
            SubRequestOutcome::<u8>::failure(key("B"), DataSourceError::parse("http://x", "bad")),
        ];
        assert!(!all_unreachable(&mixed));
    }
}
