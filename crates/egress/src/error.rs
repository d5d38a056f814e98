//! Error types for the probing pipeline.
//!
//! Per-probe errors never leave the executor: they are folded into a
//! [`ProbeResult`](crate::model::ProbeResult) with a `failed` or `timeout`
//! status. Only [`ValidationError`] reaches the caller of a run submission.

use thiserror::Error;

use crate::model::ProbeStatus;

/// Egress credentials or gateway settings are missing or unusable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("egress credential `{0}` is not set")]
    MissingCredential(&'static str),
    #[error("invalid egress gateway `{0}`")]
    InvalidGateway(String),
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),
}

/// Failure of one network operation issued through an egress route
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("{0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return TransportError::Timeout;
        }
        if let Some(status) = error.status() {
            return TransportError::HttpStatus(status.as_u16());
        }
        // reqwest hides the interesting part (refused, reset, DNS) in the source chain
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message = format!("{message}: {cause}");
            source = cause.source();
        }
        TransportError::Network(message)
    }
}

/// Reason a probe did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("connection timeout after {after_ms}ms during {stage}")]
    Timeout { stage: &'static str, after_ms: u64 },

    #[error("{stage} returned HTTP {status}")]
    HttpStatus { stage: &'static str, status: u16 },

    #[error("network error during {stage}: {message}")]
    Network { stage: &'static str, message: String },

    #[error("measurement aborted: {0}")]
    Aborted(String),
}

impl ProbeError {
    /// Classify a transport failure that happened during `stage`
    pub fn from_transport(stage: &'static str, after_ms: u64, error: TransportError) -> Self {
        match error {
            TransportError::Timeout => ProbeError::Timeout { stage, after_ms },
            TransportError::HttpStatus(status) => ProbeError::HttpStatus { stage, status },
            TransportError::Network(message) | TransportError::InvalidResponse(message) => {
                ProbeError::Network { stage, message }
            }
        }
    }

    /// Status a result carrying this error ends up with
    pub fn status(&self) -> ProbeStatus {
        match self {
            ProbeError::Timeout { .. } => ProbeStatus::Timeout,
            _ => ProbeStatus::Failed,
        }
    }
}

/// Rejected run submission
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No endpoints provided")]
    EmptyEndpoints,

    #[error("concurrency {value} is out of range (allowed {min}..={max})")]
    ConcurrencyOutOfRange { value: usize, min: usize, max: usize },

    #[error("endpoint #{index} is invalid: {reason}")]
    InvalidEndpoint { index: usize, reason: &'static str },
}

/// Geolocation enrichment failure; never surfaced on a result
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("could not discover egress address: {0}")]
    Address(#[source] TransportError),
    #[error("geolocation lookup timed out")]
    Timeout,
    #[error("geolocation lookup failed: {0}")]
    Lookup(String),
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            EnrichmentError::Timeout
        } else {
            EnrichmentError::Lookup(error.to_string())
        }
    }
}

/// Session store failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("run {0} not found")]
    RunNotFound(uuid::Uuid),
}

/// Endpoint directory failure
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("endpoint directory request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let error = ProbeError::from_transport("full fetch", 15_000, TransportError::Timeout);
        assert_eq!(error.status(), ProbeStatus::Timeout);
        assert_eq!(error.to_string(), "connection timeout after 15000ms during full fetch");
    }

    #[test]
    fn test_non_timeout_errors_are_failures() {
        let status = ProbeError::from_transport("reachability check", 10, TransportError::HttpStatus(503));
        assert_eq!(status.status(), ProbeStatus::Failed);
        assert_eq!(status.to_string(), "reachability check returned HTTP 503");

        let network = ProbeError::from_transport(
            "reachability check",
            10,
            TransportError::Network("connection refused".into()),
        );
        assert_eq!(network.status(), ProbeStatus::Failed);

        let config = ProbeError::from(ConfigurationError::MissingCredential("EGRESS_AUTH_SECRET"));
        assert_eq!(config.status(), ProbeStatus::Failed);
        assert!(config.to_string().starts_with("configuration error"));
    }
}
