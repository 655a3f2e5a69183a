//! phpIPAM client errors

use crate::response::ApiResponse;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when interacting with the phpIPAM API
///
/// Resource calls never produce an error for a non-success status; the
/// response is handed back as-is. Only the login handshake and the opt-in
/// helpers (`error_for_status`, catalogs, `expand_ids`) turn statuses into
/// errors.
#[derive(Debug, Error)]
pub enum PhpIpamError {
    /// Transport-level failure (DNS, connection refused, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login request was rejected by the server
    #[error("Authentication failed: {status} - {message}")]
    Authentication {
        /// Status code returned by the login endpoint
        status: StatusCode,
        /// Server-provided message, or the raw body when none was given
        message: String,
    },

    /// Client configuration is incomplete or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A response carried a non-success status where success was required
    #[error("phpIPAM API error: {status} - {body}")]
    Status {
        /// Status code of the failed response
        status: StatusCode,
        /// Response body as text
        body: String,
    },

    /// An item used for indexing lacks one of the key fields
    #[error("Missing field '{field}' in item")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// `expand_ids` stopped on a rejected id
    #[error("Error processing ID {id}: {}", .response.text())]
    PartialExpansion {
        /// The id whose lookup failed
        id: String,
        /// Items fetched successfully before the failure
        processed: Vec<serde_json::Value>,
        /// The failing response
        response: Box<ApiResponse>,
    },
}

impl PhpIpamError {
    /// Status code carried by the error, if any
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => e.status(),
            Self::Authentication { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::PartialExpansion { response, .. } => Some(response.status()),
            Self::InvalidConfig(_) | Self::Serialization(_) | Self::MissingField { .. } => None,
        }
    }
}
