use thiserror::Error;

/// Errors surfaced by the load generator itself.
///
/// Failures of the API under test are never reported through this type:
/// they become failed checks and count towards `http_req_failed`.
#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid threshold `{expression}` for metric `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Setup failed: team creation returned {0}")]
    SetupFailed(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type Result<T, E = LoadTestError> = std::result::Result<T, E>;
