//! OAuth 2.0 Client Credentials Token Manager.
//!
//! Acquires an access token from the token endpoint on first use, caches it,
//! and refreshes it once it is within [`TOKEN_EXPIRY_MARGIN`] of expiring.
//!
//! # Concurrency
//!
//! The cached token lives behind a single `tokio::sync::Mutex` that is held
//! for the whole of [`TokenManager::get_valid_token`], including any refresh
//! it performs. Concurrent callers therefore serialize: a caller that waited
//! on an in-flight refresh sees the token that refresh produced and does not
//! start another one. At most one request to the token endpoint is in flight
//! per manager.
//!
//! # Example
//!
//! ```rust,ignore
//! use oauth2_client::{CallContext, OAuth2Config, TokenManager};
//! use oauth2_client::secret::{ExposeSecret, SecretString};
//!
//! let config = OAuth2Config::new(
//!     "https://api.example.com/oauth/token",
//!     "my-client",
//!     SecretString::from("secret"),
//!     vec!["read".to_string(), "write".to_string()],
//! );
//! let manager = TokenManager::new(config, reqwest::Client::new());
//!
//! let token = manager.get_valid_token(&CallContext::new()).await?;
//! let header = format!("Bearer {}", token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Client secret and access tokens are held as `SecretString` (never logged)
//! - Token endpoint rejections are logged with their status only; the body is
//!   returned to the caller for diagnostics and logged at trace level

use crate::config::OAuth2Config;
use crate::context::CallContext;
use crate::error::{ClientError, Result};
use crate::secret::{ExposeSecret, SecretString};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

/// Safety margin subtracted from the server-reported lifetime.
///
/// A token is treated as expired this long before the server would reject
/// it, so it is never presented while about to expire mid-request.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response from the token endpoint.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

// =============================================================================
// Cached Token
// =============================================================================

/// The single cached token and its absolute expiry.
struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Build a cache entry for a token issued at `issued_at` with the
    /// server-reported lifetime `expires_in` (seconds).
    ///
    /// `expires_in <= 60` yields an entry that is already expired.
    fn issued_at(access_token: SecretString, expires_in: i64, issued_at: DateTime<Utc>) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let margin = TOKEN_EXPIRY_MARGIN.as_secs() as i64;
        let lifetime = expires_in.saturating_sub(margin);

        let expires_at = TimeDelta::try_seconds(lifetime)
            .and_then(|delta| issued_at.checked_add_signed(delta))
            .unwrap_or(if lifetime > 0 {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            });

        Self {
            access_token,
            expires_at,
        }
    }

    /// A token is valid only if non-empty and `now` is strictly before expiry.
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.expose_secret().is_empty() && now < self.expires_at
    }
}

// =============================================================================
// Token Manager
// =============================================================================

/// Produces a currently valid bearer token on demand.
///
/// One manager holds one token; it is meant to be owned by a single
/// [`crate::ApiClient`] and shared across concurrent calls through it.
pub struct TokenManager {
    config: OAuth2Config,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager with an empty cache. No request is made until the
    /// first token is needed.
    #[must_use]
    pub fn new(config: OAuth2Config, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            cache: Mutex::new(None),
        }
    }

    /// The credentials this manager authenticates with.
    #[must_use]
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Return the cached token, refreshing first if it is missing or expired.
    ///
    /// # Errors
    ///
    /// - `ClientError::TokenAcquisition` - token endpoint unreachable
    /// - `ClientError::TokenRejected` - token endpoint returned a non-2xx status
    /// - `ClientError::TokenDecode` - token endpoint returned a malformed body
    /// - `ClientError::Timeout` / `ClientError::Cancelled` - `ctx` fired during the refresh
    #[instrument(skip_all)]
    pub async fn get_valid_token(&self, ctx: &CallContext) -> Result<SecretString> {
        let mut cache = self.cache.lock().await;

        if let Some(token) = cache.as_ref().filter(|t| t.is_valid_at(Utc::now())) {
            trace!(target: "oauth2_client.token_manager", "Using cached token");
            return Ok(token.access_token.clone());
        }

        let token = self.fetch_token(ctx).await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    /// Request a new token from the token endpoint, replacing the cached one.
    ///
    /// Always performs a network round trip, even if the cached token has not
    /// expired. On failure the previously cached token (if any) is kept.
    ///
    /// # Errors
    ///
    /// Same as [`TokenManager::get_valid_token`].
    #[instrument(skip_all)]
    pub async fn refresh(&self, ctx: &CallContext) -> Result<()> {
        let mut cache = self.cache.lock().await;
        *cache = Some(self.fetch_token(ctx).await?);
        Ok(())
    }

    /// Drop the cached token so the next [`TokenManager::get_valid_token`]
    /// refreshes.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Perform the client-credentials exchange. Caller must hold the cache lock.
    async fn fetch_token(&self, ctx: &CallContext) -> Result<CachedToken> {
        debug!(
            target: "oauth2_client.token_manager",
            client_id = %self.config.client_id,
            token_url = %self.config.token_url,
            "Requesting access token"
        );

        let form_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("scope", &self.config.scope_param())
            .finish();

        let response = ctx
            .run(async {
                self.http
                    .post(&self.config.token_url)
                    .header(AUTHORIZATION, self.basic_auth_header()?)
                    .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .body(form_body)
                    .send()
                    .await
                    .map_err(|e| token_transport_error(&e))
            })
            .await?;

        let status = response.status();
        let body = ctx
            .run(async { response.bytes().await.map_err(|e| token_transport_error(&e)) })
            .await?;

        if !status.is_success() {
            warn!(
                target: "oauth2_client.token_manager",
                status = %status,
                "Token request rejected"
            );
            let body = String::from_utf8_lossy(&body).into_owned();
            trace!(
                target: "oauth2_client.token_manager",
                body = %body,
                "Token rejection response body"
            );
            return Err(ClientError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token_response: OAuthTokenResponse = serde_json::from_slice(&body).map_err(|e| {
            warn!(target: "oauth2_client.token_manager", error = %e, "Failed to parse token response");
            ClientError::TokenDecode(e.to_string())
        })?;

        debug!(
            target: "oauth2_client.token_manager",
            expires_in_secs = token_response.expires_in,
            "Access token acquired"
        );

        Ok(CachedToken::issued_at(
            SecretString::from(token_response.access_token),
            token_response.expires_in,
            Utc::now(),
        ))
    }

    fn basic_auth_header(&self) -> Result<HeaderValue> {
        let credentials = STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id,
            self.config.client_secret.expose_secret()
        ));
        let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

fn token_transport_error(err: &reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::TokenAcquisition {
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
