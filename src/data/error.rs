use thiserror::Error;

/// Failure of a single sub-request against a remote data source.
///
/// Values are cloneable so a failure can be recorded as a data gap after the
/// underlying `reqwest::Error` is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        timeout: bool,
    },

    #[error("{url} responded with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {message}")]
    Parse { url: String, message: String },
}

impl DataSourceError {
    pub fn transport(url: &str, err: &reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
            timeout: err.is_timeout(),
        }
    }

    pub fn parse(url: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures, timeouts, 5xx and 429 are transient. Other 4xx
    /// statuses and malformed payloads are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::Transport { .. } => true,
            DataSourceError::Status { status, .. } => *status >= 500 || *status == 429,
            DataSourceError::Parse { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> DataSourceError {
        DataSourceError::Status {
            url: "http://x".into(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn classifies_transient_failures() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(404).is_transient());
        assert!(!DataSourceError::parse("http://x", "bad json").is_transient());
    }
}
