// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Error types for Metric Exchange

use std::io;
use thiserror::Error;

use crate::metric::MetricId;

/// Result type alias for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors raised by authorization, dispatch and synchronization
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Credential, scope or metric filter rejected the request.
    ///
    /// Carries no detail so callers cannot tell which check failed.
    #[error("Access denied")]
    AccessDenied,

    /// The metric exists but has never recorded a value
    #[error("No value available for metric {0}")]
    NoValueAvailable(MetricId),

    /// Well-formed fingerprint that names no hosted metric
    #[error("Unknown metric: {0}")]
    UnknownMetric(MetricId),

    /// Payload serialization failed
    #[error("Failed to encode payload: {0}")]
    FailedToEncode(String),

    /// Payload deserialization failed
    #[error("Failed to decode payload: {0}")]
    FailedToDecode(String),

    /// Push attempted on a metric that does not accept remote updates
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Malformed request (missing header, bad fingerprint, bad route)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Transport failure talking to a peer
    #[error("Network error: {0}")]
    Network(String),

    /// Peer answered with a non-success status
    #[error("Peer {url} answered with status {status}")]
    RemoteStatus { status: u16, url: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExchangeError {
    /// Transport status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AccessDenied => 401,
            Self::UnknownMetric(_) => 404,
            Self::NoValueAvailable(_) => 410,
            Self::PreconditionFailed(_) => 412,
            Self::BadRequest(_) | Self::FailedToDecode(_) => 400,
            Self::FailedToEncode(_)
            | Self::Network(_)
            | Self::RemoteStatus { .. }
            | Self::Config(_)
            | Self::Io(_) => 500,
        }
    }

    /// Message safe to hand back to a remote caller.
    ///
    /// Codec and internal failures are logged with detail elsewhere; the caller
    /// only ever sees a generic line.
    pub fn public_message(&self) -> String {
        match self {
            Self::AccessDenied => "Access denied".to_string(),
            Self::NoValueAvailable(_) => "No value available".to_string(),
            Self::UnknownMetric(id) => format!("Unknown metric: {}", id),
            Self::PreconditionFailed(_) => "Metric does not accept remote updates".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::FailedToDecode(_) => "Malformed request body".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::FailedToDecode(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_is_opaque() {
        let err = ExchangeError::AccessDenied;
        assert_eq!(err.to_string(), "Access denied");
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.public_message(), "Access denied");
    }

    #[test]
    fn test_status_codes() {
        let id = MetricId::of("log");
        assert_eq!(ExchangeError::NoValueAvailable(id.clone()).status_code(), 410);
        assert_eq!(ExchangeError::UnknownMetric(id).status_code(), 404);
        assert_eq!(ExchangeError::PreconditionFailed("x".into()).status_code(), 412);
        assert_eq!(ExchangeError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(ExchangeError::FailedToDecode("x".into()).status_code(), 400);
        assert_eq!(ExchangeError::FailedToEncode("x".into()).status_code(), 500);
    }

    #[test]
    fn test_codec_detail_not_exposed() {
        let err = ExchangeError::FailedToDecode("expected `,` at line 1 column 9".into());
        assert!(!err.public_message().contains("column"));

        let err = ExchangeError::FailedToEncode("map key must be a string".into());
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "config missing");
        let err: ExchangeError = io_err.into();
        assert!(err.to_string().contains("config missing"));
    }
}
