//! Error types for the Teamscale client.
//!
//! # Design
//! Every non-200 response becomes a `ServiceError`, whether the server
//! answered 4xx or 5xx. It keeps the method, URL, status code and raw body so
//! the caller sees exactly what the server said. Failures below HTTP (DNS,
//! refused connections, TLS) are carried unmodified in
//! `ClientError::Transport`, and file-open failures while preparing a
//! multipart body surface as `ClientError::Io` before anything is sent.

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::HttpMethod;

/// The server answered with a status other than 200.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("ERROR: {operation} {url}: {status_code}:{body}")]
pub struct ServiceError {
    pub operation: HttpMethod,
    pub url: String,
    pub status_code: u16,
    pub body: String,
}

/// Errors returned by `TeamscaleClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The HTTP transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A file referenced by an upload could not be opened or read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("server api version {api_version} too low and not compatible, this client requires Teamscale 3.0 or newer")]
    IncompatibleServer { api_version: i64 },

    #[error("invalid baseline name {0:?}: must be non-empty and free of path or query characters")]
    InvalidBaselineName(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// The `ServiceError` behind this error, if the server rejected the call.
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            ClientError::Service(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_display_includes_status_and_body() {
        let err = ServiceError {
            operation: HttpMethod::Put,
            url: "http://ts:8080/p/demo/add-external-findings/".to_string(),
            status_code: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "ERROR: PUT http://ts:8080/p/demo/add-external-findings/: 403:forbidden"
        );
    }

    #[test]
    fn as_service_error_only_matches_service_variant() {
        let err = ClientError::from(ServiceError {
            operation: HttpMethod::Get,
            url: "u".to_string(),
            status_code: 500,
            body: String::new(),
        });
        assert_eq!(err.as_service_error().map(|e| e.status_code), Some(500));

        let err = ClientError::InvalidBaselineName("a/b".to_string());
        assert!(err.as_service_error().is_none());
    }
}
