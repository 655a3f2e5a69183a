//! Common utilities for the phpIPAM API client
//!
//! Provides the authenticated transport shared by every controller, plus the
//! catalog and id-expansion helpers.

pub mod catalog;
pub mod expand;

use crate::error::PhpIpamError;
use crate::response::ApiResponse;
use crate::session::SessionManager;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, warn};

/// Header carrying the session token on resource requests
pub const TOKEN_HEADER: &str = "token";

/// Request body as handed over by the caller
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Json(Vec<u8>),
    Raw(Vec<u8>),
}

/// HTTP client wrapper with token authentication
///
/// One transport is shared (behind an `Arc`) by a client and all of its
/// controllers. It never reads the token directly; every request asks the
/// session manager for a valid one.
#[derive(Debug)]
pub struct ApiTransport {
    client: Client,
    api_url: String,
    session: SessionManager,
}

impl ApiTransport {
    /// Create a transport for `api_url` (`<host>/api/<app>`)
    pub fn new(client: Client, api_url: String, session: SessionManager) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// `<host>/api/<app>` without trailing slash
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Session manager owning the token
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Send one request and return the raw response
    ///
    /// Non-success statuses are returned, not raised. When the server rejects
    /// the token (401, or 403 naming the token) it is dropped so that the
    /// next request logs in again; the request itself is not retried.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        mut headers: HeaderMap,
        body: Option<RequestBody>,
    ) -> Result<ApiResponse, PhpIpamError> {
        let token = self.session.ensure_token().await?;

        debug!("{} {}", method, url);

        // The session owns the token header
        if headers.remove(TOKEN_HEADER).is_some() {
            warn!("Ignoring caller-supplied {} header", TOKEN_HEADER);
        }

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .headers(headers)
            .header(TOKEN_HEADER, &token);

        if !query.is_empty() {
            request = request.query(query);
        }

        request = match body {
            Some(RequestBody::Json(bytes)) => request.header(CONTENT_TYPE, "application/json").body(bytes),
            Some(RequestBody::Raw(bytes)) => request.body(bytes),
            None => request,
        };

        let response = ApiResponse::from_reqwest(request.send().await?).await?;

        if token_rejected(&response) {
            warn!(
                "{} {} was rejected with {}, dropping session token",
                method,
                url,
                response.status()
            );
            self.session.invalidate_token(&token).await;
        }

        Ok(response)
    }
}

/// Whether `response` says the session token is no longer accepted
///
/// phpIPAM answers 401 for a missing session and 403 with messages such as
/// `Token expired` or `Invalid token`. Other 403s are permission errors and
/// leave the token alone.
fn token_rejected(response: &ApiResponse) -> bool {
    match response.status() {
        StatusCode::UNAUTHORIZED => true,
        StatusCode::FORBIDDEN => response
            .envelope::<serde_json::Value>()
            .ok()
            .and_then(|envelope| envelope.message)
            .is_some_and(|message| message.to_ascii_lowercase().contains("token")),
        _ => false,
    }
}

/// Join a caller-supplied path onto a controller base URL
///
/// `base` ends with `/`. The path's surrounding slashes are trimmed and a
/// trailing slash is added, keeping any `?query` suffix after it.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let path = path.trim_matches('/');
    let mut url = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}{path}/")
    };

    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}
