use thiserror::Error;

/// Error surfaced by a single ingestion provider (Alchemy, BitQuery, or
/// Etherscan-style explorers). The fetcher catches these and falls back to
/// the next configured provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider is not configured (missing API credential)")]
    NotConfigured,

    #[error("request to {provider} failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an API-level error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} response could not be parsed: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider} request timed out after {duration:?}")]
    Timeout {
        provider: &'static str,
        duration: std::time::Duration,
    },

    #[error("{provider} rate limit exhausted after retries")]
    RateLimited { provider: &'static str },

    #[error("malformed transfer log: {0}")]
    MalformedLog(String),
}

/// Top-level failure mode of an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid token address: {0}")]
    InvalidAddress(String),

    #[error("analysis exceeded its deadline")]
    Timeout,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
