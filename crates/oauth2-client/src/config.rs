//! Client configuration.
//!
//! Configuration can be built in code or loaded from environment variables.
//! The client secret is redacted in Debug output.

use crate::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default connection timeout for the HTTP client.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Token URL must use HTTPS, got '{0}'")]
    InsecureTokenUrl(String),
}

/// OAuth 2.0 client-credentials settings.
#[derive(Clone)]
pub struct OAuth2Config {
    /// Token endpoint URL (e.g., `https://api.example.com/oauth/token`).
    pub token_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Requested scopes; sent space-joined.
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuth2Config {
    /// Create a new client-credentials configuration.
    ///
    /// HTTP token URLs are accepted; use [`OAuth2Config::new_secure`] to
    /// refuse anything that would send the secret in plain text.
    #[must_use]
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            scopes,
        }
    }

    /// Create a new configuration requiring an HTTPS token URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InsecureTokenUrl` if the URL doesn't use HTTPS.
    pub fn new_secure(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        scopes: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let token_url = token_url.into();
        if !token_url.starts_with("https://") {
            return Err(ConfigError::InsecureTokenUrl(token_url));
        }
        Ok(Self::new(token_url, client_id, client_secret, scopes))
    }

    /// Scopes as sent on the wire.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Everything needed to build an [`crate::ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,

    /// Client-credentials settings; `None` builds an anonymous client.
    pub oauth2: Option<OAuth2Config>,

    /// Total per-request HTTP timeout applied by the transport, from connect
    /// until the body is read. `None` leaves requests unbounded except by the
    /// caller's [`crate::CallContext`].
    pub http_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for an authenticated client.
    #[must_use]
    pub fn new(base_url: impl Into<String>, oauth2: OAuth2Config) -> Self {
        Self {
            base_url: base_url.into(),
            oauth2: Some(oauth2),
            http_timeout: None,
        }
    }

    /// Configuration for a client that forwards requests without a token.
    #[must_use]
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            oauth2: None,
            http_timeout: None,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    ///
    /// `API_BASE_URL` is required. When `OAUTH2_TOKEN_URL` is present,
    /// `OAUTH2_CLIENT_ID` and `OAUTH2_CLIENT_SECRET` are required too;
    /// otherwise the client is anonymous.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingEnvVar` - a required variable is absent
    /// - `ConfigError::InvalidHttpTimeout` - `HTTP_TIMEOUT_SECONDS` is not a positive integer
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let base_url = require(vars, "API_BASE_URL")?;

        let oauth2 = match vars.get("OAUTH2_TOKEN_URL") {
            Some(token_url) => {
                let client_id = require(vars, "OAUTH2_CLIENT_ID")?;
                let client_secret = SecretString::from(require(vars, "OAUTH2_CLIENT_SECRET")?);
                let scopes = vars
                    .get("OAUTH2_SCOPES")
                    .map(|s| parse_scopes(s))
                    .unwrap_or_default();
                Some(OAuth2Config::new(
                    token_url.clone(),
                    client_id,
                    client_secret,
                    scopes,
                ))
            }
            None => None,
        };

        let http_timeout = match vars.get("HTTP_TIMEOUT_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidHttpTimeout(format!(
                        "HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidHttpTimeout(
                        "HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                Some(Duration::from_secs(value))
            }
            None => None,
        };

        Ok(Self {
            base_url,
            oauth2,
            http_timeout,
        })
    }
}

fn require(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Split a scope list on whitespace and commas, dropping empty entries.
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
