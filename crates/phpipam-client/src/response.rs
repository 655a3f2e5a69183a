//! Opaque phpIPAM responses
//!
//! Resource calls hand back the server's answer untouched: status, headers
//! and the raw body. Parsing is opt-in through the helpers below.

use crate::error::PhpIpamError;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Standard phpIPAM JSON envelope
///
/// Every API answer is wrapped as `{code, success, message, data, time}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Status code echoed by phpIPAM
    #[serde(default)]
    pub code: u16,
    /// Whether phpIPAM considers the call successful
    #[serde(default)]
    pub success: bool,
    /// Error or informational message
    #[serde(default)]
    pub message: Option<String>,
    /// Payload; absent on most errors
    pub data: Option<T>,
    /// Server-side processing time in seconds
    #[serde(default)]
    pub time: Option<f64>,
}

/// Raw HTTP response returned by every controller call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    /// Build a response from its parts
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { status, headers, body }
    }

    /// Drain a transport response into an owned `ApiResponse`
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self, PhpIpamError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self::new(status, headers, body))
    }

    /// HTTP status code
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, keeping only the body
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8 (lossy)
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PhpIpamError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse the body as a phpIPAM envelope
    pub fn envelope<T: DeserializeOwned>(&self) -> Result<ApiEnvelope<T>, PhpIpamError> {
        self.json()
    }

    /// Parse the envelope and return its `data` member
    ///
    /// A missing or `null` `data` yields `None`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, PhpIpamError> {
        Ok(self.envelope::<T>()?.data)
    }

    /// Turn a non-success status into [`PhpIpamError::Status`]
    pub fn error_for_status(self) -> Result<Self, PhpIpamError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PhpIpamError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }

    /// Borrowing variant of [`ApiResponse::error_for_status`]
    pub fn error_for_status_ref(&self) -> Result<&Self, PhpIpamError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PhpIpamError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }
}
