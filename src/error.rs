//! Error types for the grade snapshot engine.

use thiserror::Error;

/// Failures from the remote grading client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("request to {path} failed: {detail}")]
    Http { path: String, detail: String },

    /// The server answered with a non-success status.
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    /// The response body did not have the expected shape.
    #[error("could not decode response from {path}: {detail}")]
    Decode { path: String, detail: String },
}

/// Failures from a session store backend.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid course name pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },
}

/// Per-course outcome of bulk population.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PopulateError {
    #[error("no grade available for course {course_id}")]
    NoGrade { course_id: String },
}
