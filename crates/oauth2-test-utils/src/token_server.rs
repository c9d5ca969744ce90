//! Token endpoint harness for client-credentials tests.
//!
//! Provides `TestTokenServer`, a wiremock server answering
//! `POST /token` for the test credentials and counting how many tokens it
//! issued.

use crate::fixtures::{basic_auth_header, TOKEN_PATH};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock OAuth 2.0 token endpoint.
///
/// Only requests carrying the test client's Basic credentials and
/// `grant_type=client_credentials` are answered; anything else gets
/// wiremock's default 404.
///
/// # Example
/// ```rust,ignore
/// let tokens = TestTokenServer::builder()
///     .token("T1")
///     .expires_in(3600)
///     .start()
///     .await;
///
/// let config = OAuth2Config::new(tokens.token_url(), TEST_CLIENT_ID, secret, scopes);
/// ```
pub struct TestTokenServer {
    server: MockServer,
    issued: Arc<AtomicU32>,
}

impl TestTokenServer {
    /// Start a server issuing `token-1`, `token-2`, ... valid for an hour.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> TestTokenServerBuilder {
        TestTokenServerBuilder::default()
    }

    /// Full token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}{}", self.server.uri(), TOKEN_PATH)
    }

    /// Number of token requests answered so far.
    pub fn request_count(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }

    /// The underlying mock server, for extra expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }
}

/// Builder for `TestTokenServer`.
pub struct TestTokenServerBuilder {
    token: Option<String>,
    expires_in: i64,
    delay: Duration,
    status: u16,
}

impl Default for TestTokenServerBuilder {
    fn default() -> Self {
        Self {
            token: None,
            expires_in: 3600,
            delay: Duration::ZERO,
            status: 200,
        }
    }
}

impl TestTokenServerBuilder {
    /// Always issue this token instead of a numbered sequence.
    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Lifetime reported in `expires_in`.
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = seconds;
        self
    }

    /// Delay every response.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer with this status and an `invalid_client` error body.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub async fn start(self) -> TestTokenServer {
        let server = MockServer::start().await;
        let issued = Arc::new(AtomicU32::new(0));
        let counter = issued.clone();

        let Self {
            token,
            expires_in,
            delay,
            status,
        } = self;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(header("authorization", basic_auth_header().as_str()))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(move |_: &Request| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let template = if status == 200 {
                    let access_token = token.clone().unwrap_or_else(|| format!("token-{n}"));
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "access_token": access_token,
                        "token_type": "Bearer",
                        "expires_in": expires_in,
                        "scope": "api:read api:write"
                    }))
                } else {
                    ResponseTemplate::new(status).set_body_string(r#"{"error":"invalid_client"}"#)
                };
                template.set_delay(delay)
            })
            .mount(&server)
            .await;

        TestTokenServer { server, issued }
    }
}
