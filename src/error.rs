//! Binary-facing error type.
//!
//! Library seams use `thiserror` enums (`ConfigError`, `DataSourceError`);
//! everything that reaches `main` is converted into an `AppError` carrying the
//! process exit code.

use crate::config::ConfigError;

/// Missing/invalid credentials or run parameters.
pub const EXIT_CONFIG: u8 = 2;
/// Failure reading or writing local files.
pub const EXIT_IO: u8 = 3;
/// A data source could not be reached for any of its sub-requests.
pub const EXIT_UNREACHABLE: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(EXIT_IO, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::new(EXIT_CONFIG, format!("Configuration error: {err}"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
