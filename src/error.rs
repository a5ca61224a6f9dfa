//! Error taxonomy for the confluence watcher
//!
//! Every fallible call in the pipeline returns one of the kinds below. Kinds
//! map directly onto the error-handling design: some are locally recovered
//! with backoff, some degrade a job for one tick, none are allowed to
//! fabricate a result (e.g. `PriceMissing` must never be treated as zero
//! profit being "real").

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the confluence watcher
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Upstream adapter errors (C1)
    #[error("Transient upstream error from {provider}: {message}")]
    TransientUpstream { provider: String, message: String },

    #[error("Malformed payload from {provider}: {message}")]
    UpstreamSchema { provider: String, message: String },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited { provider: String, retry_after_ms: u64 },

    // Pricing (C4)
    #[error("No price available for {chain}/{token}")]
    PriceMissing { chain: String, token: String },

    // Persistence
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Policy / heuristic rejections (C2, C3, C8) — expected, not alarming
    #[error("Policy reject: {reason}")]
    PolicyReject { reason: String },

    // Invariant violations - the offending record is quarantined, job continues
    #[error("Fatal invariant violation: {0}")]
    Fatal(String),

    // Generic
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Errors recovered locally with backoff; never fatal to a job.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientUpstream { .. } | Error::RateLimited { .. }
        )
    }

    /// Expected rejections that should be logged at debug level, no alarm.
    pub fn is_policy_reject(&self) -> bool {
        matches!(self, Error::PolicyReject { .. })
    }

    /// Errors that should abort the current job cleanly and retry next interval.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.status().map(|s| s.is_server_error()).unwrap_or(false) {
            Error::TransientUpstream {
                provider: "http".to_string(),
                message: e.to_string(),
            }
        } else {
            Error::UpstreamSchema {
                provider: "http".to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::UpstreamSchema {
            provider: "json".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}
