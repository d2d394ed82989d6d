// Fetch and collection errors.
//
// Transport failures and non-success responses are fatal: the process exits rather than
// serving stale or partial data. Body-shape problems only skip one family for one cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {endpoint} response for {subject}: {source}")]
    Decode {
        endpoint: &'static str,
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} returned no data for {subject}")]
    Empty {
        endpoint: &'static str,
        subject: String,
    },
}

impl FetchError {
    /// True for errors that must stop the exporter.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::Status { .. }
        )
    }
}

/// A fatal fetch error, tagged with where it happened.
#[derive(Debug, Error)]
#[error("fatal error collecting {family} for {scope}: {source}")]
pub struct FatalError {
    pub family: &'static str,
    pub scope: String,
    #[source]
    pub source: FetchError,
}
