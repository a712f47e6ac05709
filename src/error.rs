// src/error.rs
use thiserror::Error;

/// Failure of a single remote call for one account.
///
/// Every variant carries the account so the scheduler can log and skip it
/// without losing context. None of these abort the poll loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("bearer token is not configured (account '{account}')")]
    MissingCredential { account: String },

    #[error("request for account '{account}' failed: {source}")]
    Transport {
        account: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} for account '{account}'")]
    Status { account: String, status: u16 },

    #[error("malformed JSON for account '{account}': {source}")]
    Decode {
        account: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Short failure class, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingCredential { .. } => "config",
            FetchError::Transport { .. } => "transport",
            FetchError::Status { .. } => "status",
            FetchError::Decode { .. } => "decode",
        }
    }

    pub fn account(&self) -> &str {
        match self {
            FetchError::MissingCredential { account }
            | FetchError::Transport { account, .. }
            | FetchError::Status { account, .. }
            | FetchError::Decode { account, .. } => account,
        }
    }
}
