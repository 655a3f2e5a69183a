//! Token session management
//!
//! phpIPAM issues a session token from `POST /api/<app>/user/` (HTTP basic
//! auth). The token must accompany every later call in the `token` header
//! until it expires. [`SessionManager`] owns that token and hands it out
//! through [`SessionManager::ensure_token`], logging in again whenever the
//! stored token is missing or stale.

use crate::config::{ClientConfig, DEFAULT_EXPIRY_SKEW};
use crate::error::PhpIpamError;
use crate::response::ApiEnvelope;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Session token issued by the phpIPAM server
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    expires: Option<DateTime<Utc>>,
}

impl SessionToken {
    /// Create a token with an optional expiry
    #[must_use]
    pub fn new(value: impl Into<String>, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires,
        }
    }

    /// Opaque token value sent in the `token` header
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry reported by the server, if it could be read
    #[must_use]
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// Whether the token should be treated as expired at `now`
    ///
    /// The token is stale once `now + skew` reaches the expiry. Tokens without
    /// a known expiry never go stale on their own.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        match self.expires {
            Some(expires) => now.checked_add_signed(skew).is_none_or(|deadline| deadline >= expires),
            None => false,
        }
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("expires", &self.expires)
            .finish()
    }
}

/// Authentication state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable token; the next request logs in first
    Unauthenticated,
    /// A non-expired token is stored
    Authenticated,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    #[serde(default)]
    expires: Option<String>,
}

/// Owns the session token and performs the login handshake
pub struct SessionManager {
    http: Client,
    login_url: String,
    user: Option<String>,
    password: Option<String>,
    skew: TimeDelta,
    token: Mutex<Option<SessionToken>>,
}

impl SessionManager {
    /// Create a session manager sharing `http` with the controllers
    ///
    /// A pre-shared token in `config` is stored as the initial session.
    pub fn new(http: Client, config: &ClientConfig) -> Self {
        let initial = config
            .token
            .as_ref()
            .map(|token| SessionToken::new(token.clone(), config.token_expires));

        let skew = TimeDelta::from_std(config.expiry_skew).unwrap_or_else(|e| {
            warn!("Expiry skew out of range ({}), using default", e);
            TimeDelta::from_std(DEFAULT_EXPIRY_SKEW).unwrap_or_default()
        });

        Self {
            http,
            login_url: format!("{}/user/", config.api_url()),
            user: config.user.clone(),
            password: config.password.clone(),
            skew,
            token: Mutex::new(initial),
        }
    }

    /// URL of the authentication endpoint
    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Log in and store the new token, replacing any previous one
    ///
    /// # Errors
    /// * `PhpIpamError::Authentication` - the server rejected the credentials
    /// * `PhpIpamError::InvalidConfig` - no user/password configured
    /// * `PhpIpamError::Http` - the server could not be reached
    pub async fn login(&self) -> Result<SessionToken, PhpIpamError> {
        let mut guard = self.token.lock().await;
        let token = self.authenticate().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Return a valid token, logging in first if none is stored or it expired
    ///
    /// The session lock is held across the whole check-refresh-store sequence,
    /// so concurrent callers wait for a single login instead of racing.
    pub async fn ensure_token(&self) -> Result<String, PhpIpamError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.is_expired_at(Utc::now(), self.skew) {
                return Ok(token.value.clone());
            }
            debug!("Session token expired, logging in again");
        }

        let token = self.authenticate().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    /// Drop the stored token so the next request logs in again
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// Drop the stored token only if it is still `value`
    ///
    /// Used after the server rejected `value`; a token refreshed by another
    /// task in the meantime is kept.
    pub(crate) async fn invalidate_token(&self, value: &str) {
        let mut guard = self.token.lock().await;
        if guard.as_ref().is_some_and(|token| token.value == value) {
            *guard = None;
        }
    }

    /// Current authentication state
    pub async fn state(&self) -> SessionState {
        match self.token.lock().await.as_ref() {
            Some(token) if !token.is_expired_at(Utc::now(), self.skew) => SessionState::Authenticated,
            _ => SessionState::Unauthenticated,
        }
    }

    /// Snapshot of the stored token
    pub async fn token(&self) -> Option<SessionToken> {
        self.token.lock().await.clone()
    }

    /// Perform the login round trip without touching the stored token
    async fn authenticate(&self) -> Result<SessionToken, PhpIpamError> {
        let (Some(user), Some(password)) = (self.user.as_deref(), self.password.as_deref()) else {
            return Err(PhpIpamError::InvalidConfig(
                "user and password are required to log in".to_string(),
            ));
        };

        debug!("POST {}", self.login_url);

        let response = self
            .http
            .post(&self.login_url)
            .basic_auth(user, Some(password))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PhpIpamError::Authentication {
                status,
                message: server_message(&body).unwrap_or_else(|| {
                    if body.is_empty() {
                        status.canonical_reason().unwrap_or_default().to_string()
                    } else {
                        body
                    }
                }),
            });
        }

        let envelope: ApiEnvelope<LoginData> = serde_json::from_str(&body)?;
        let Some(data) = envelope.data else {
            return Err(PhpIpamError::Authentication {
                status,
                message: "login response did not contain a token".to_string(),
            });
        };

        let expires = data.expires.as_deref().and_then(|raw| {
            let parsed = parse_expiry(raw);
            if parsed.is_none() {
                warn!("Could not parse token expiry '{}', treating token as non-expiring", raw);
            }
            parsed
        });

        let mut token = SessionToken::new(data.token, expires);

        // A token that looks stale the moment it is issued means the clocks
        // disagree; rely on the server rejecting it instead.
        if token.is_expired_at(Utc::now(), self.skew) {
            warn!(
                "Token expiry {:?} is already past on this clock, treating token as non-expiring",
                token.expires
            );
            token.expires = None;
        }

        info!("Logged in to phpIPAM as {}", user);
        Ok(token)
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("login_url", &self.login_url)
            .field("user", &self.user)
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}

/// Parse a phpIPAM expiry timestamp
///
/// phpIPAM reports `YYYY-MM-DD HH:MM:SS` without an offset; such values are
/// read as UTC. RFC 3339 and bare dates are accepted too.
#[must_use]
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
