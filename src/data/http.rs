//! Blocking HTTP plumbing shared by both fetchers.
//!
//! - `Transport`: one GET returning parsed JSON (a trait so fetchers can run
//!   against in-memory fakes)
//! - `RetryPolicy` + `with_retry`: bounded exponential backoff on transient
//!   failures, via `backon`
//! - `RequestPacer`: fixed minimum spacing between requests to one API

use std::cell::Cell;
use std::time::{Duration, Instant};

use backon::{BlockingRetryable, ExponentialBuilder};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::data::error::DataSourceError;

const ERROR_BODY_PREVIEW: usize = 200;

/// A fully described GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    /// Query pairs in order; keys may repeat.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of the first query pair named `key`.
    #[cfg(test)]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub trait Transport {
    fn get_json(&self, request: &ApiRequest) -> Result<Value, DataSourceError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_json(&self, request: &ApiRequest) -> Result<Value, DataSourceError> {
        (**self).get_json(request)
    }
}

/// `reqwest` blocking transport with a per-request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crop-shock/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, request: &ApiRequest) -> Result<Value, DataSourceError> {
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .send()
            .map_err(|e| DataSourceError::transport(&request.url, &e))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataSourceError::transport(&request.url, &e))?;

        if !status.is_success() {
            return Err(DataSourceError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        debug!(url = %request.url, bytes = body.len(), "received response");

        // Some endpoints answer an empty result set with an empty body.
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_str(&body)
            .map_err(|e| DataSourceError::parse(&request.url, format!("invalid JSON: {e}")))
    }
}

/// Bounded exponential backoff applied to each sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No waiting between attempts (tests).
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay.max(self.min_delay))
            .with_factor(2.0)
            .with_max_times(self.max_retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Permanent failures return immediately; the last transient failure is
/// returned once retries are exhausted.
pub fn with_retry<T, F>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, DataSourceError>
where
    F: FnMut() -> Result<T, DataSourceError>,
{
    op.retry(policy.backoff())
        .sleep(std::thread::sleep)
        .when(DataSourceError::is_transient)
        .notify(|err: &DataSourceError, after: Duration| {
            warn!(request = label, error = %err, retry_in_ms = after.as_millis() as u64, "transient failure, retrying");
        })
        .call()
}

/// Keeps at least `delay` between consecutive requests.
#[derive(Debug)]
pub struct RequestPacer {
    delay: Duration,
    last: Cell<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Cell::new(None),
        }
    }

    /// Block until the next request may be sent, then mark it as sent.
    pub fn wait(&self) {
        if let Some(last) = self.last.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last.set(Some(Instant::now()));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use serde_json::Value;

    use super::{ApiRequest, Transport};
    use crate::data::error::DataSourceError;

    /// Replays a fixed script of responses and records every request.
    pub(crate) struct ScriptedTransport {
        script: RefCell<VecDeque<Result<Value, DataSourceError>>>,
        pub(crate) calls: Cell<usize>,
        pub(crate) requests: RefCell<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<Value, DataSourceError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                calls: Cell::new(0),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get_json(&self, request: &ApiRequest) -> Result<Value, DataSourceError> {
            self.calls.set(self.calls.get() + 1);
            self.requests.borrow_mut().push(request.clone());
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(DataSourceError::parse(&request.url, "script exhausted")))
        }
    }

    pub(crate) fn server_error() -> DataSourceError {
        DataSourceError::Status {
            url: "http://api".into(),
            status: 503,
            body: "busy".into(),
        }
    }
}
