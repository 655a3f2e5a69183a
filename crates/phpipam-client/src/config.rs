//! Client configuration
//!
//! Connection parameters for a phpIPAM server. A [`ClientConfig`] is handed to
//! [`crate::PhpIpamClient`] by value and cannot change afterwards.

use crate::error::PhpIpamError;
use chrono::{DateTime, Utc};
use std::env;
use std::fmt;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default margin subtracted from a token's expiry before it is considered stale
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Connection parameters for a phpIPAM server
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) host: String,
    pub(crate) app: String,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) token: Option<String>,
    pub(crate) token_expires: Option<DateTime<Utc>>,
    pub(crate) verify_tls: bool,
    pub(crate) timeout: Duration,
    pub(crate) expiry_skew: Duration,
}

impl ClientConfig {
    /// Create a configuration for `host` (e.g. "http://phpipam:8080") and API `app`
    pub fn new(host: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            app: app.into().trim_matches('/').to_string(),
            user: None,
            password: None,
            token: None,
            token_expires: None,
            verify_tls: true,
            timeout: DEFAULT_TIMEOUT,
            expiry_skew: DEFAULT_EXPIRY_SKEW,
        }
    }

    /// Set the login credentials
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Use a pre-shared token instead of logging in first
    ///
    /// `expires` of `None` means the token is reused until the server rejects it.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, expires: Option<DateTime<Utc>>) -> Self {
        self.token = Some(token.into());
        self.token_expires = expires;
        self
    }

    /// Enable or disable TLS certificate verification
    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the safety margin applied when comparing token expiry against the clock
    #[must_use]
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Load configuration from environment variables
    ///
    /// * `PHPIPAM_HOST` (required)
    /// * `PHPIPAM_APIAPP` (required)
    /// * `PHPIPAM_USER`, `PHPIPAM_PASSWORD`
    /// * `PHPIPAM_TOKEN`
    /// * `PHPIPAM_VERIFY_TLS` (`true`/`false`, default `true`)
    /// * `PHPIPAM_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self, PhpIpamError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, PhpIpamError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("PHPIPAM_HOST").ok_or_else(|| {
            PhpIpamError::InvalidConfig("PHPIPAM_HOST environment variable is required".to_string())
        })?;
        let app = lookup("PHPIPAM_APIAPP").ok_or_else(|| {
            PhpIpamError::InvalidConfig("PHPIPAM_APIAPP environment variable is required".to_string())
        })?;

        let mut config = Self::new(host, app);
        config.user = lookup("PHPIPAM_USER");
        config.password = lookup("PHPIPAM_PASSWORD");
        config.token = lookup("PHPIPAM_TOKEN");

        if let Some(value) = lookup("PHPIPAM_VERIFY_TLS") {
            config.verify_tls = parse_bool(&value).ok_or_else(|| {
                PhpIpamError::InvalidConfig(format!("PHPIPAM_VERIFY_TLS must be true or false, got '{value}'"))
            })?;
        }

        if let Some(value) = lookup("PHPIPAM_TIMEOUT_SECS") {
            let secs: u64 = value.parse().map_err(|e| {
                PhpIpamError::InvalidConfig(format!("PHPIPAM_TIMEOUT_SECS must be a number of seconds, got '{value}': {e}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can produce requests
    pub fn validate(&self) -> Result<(), PhpIpamError> {
        if self.host.is_empty() {
            return Err(PhpIpamError::InvalidConfig("host must not be empty".to_string()));
        }
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(PhpIpamError::InvalidConfig(format!(
                "host must start with http:// or https://, got '{}'",
                self.host
            )));
        }
        if self.app.is_empty() {
            return Err(PhpIpamError::InvalidConfig("app must not be empty".to_string()));
        }
        Ok(())
    }

    /// Server base URL without trailing slash
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// API application identifier
    #[must_use]
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Login user, if configured
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Whether TLS certificates are verified
    #[must_use]
    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// Per-request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Token expiry safety margin
    #[must_use]
    pub fn expiry_skew(&self) -> Duration {
        self.expiry_skew
    }

    /// `<host>/api/<app>`
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}/api/{}", self.host, self.app)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("app", &self.app)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_expires", &self.token_expires)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("expiry_skew", &self.expiry_skew)
            .finish()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
