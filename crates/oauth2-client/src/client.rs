//! Authenticated API client.
//!
//! [`ApiClient`] turns an [`ApiRequest`] into an outbound HTTP request,
//! attaching a bearer token from its [`TokenManager`] when it has one. A 401
//! response to an authenticated request triggers exactly one forced token
//! refresh and one retry of the whole request; a second 401 is returned to
//! the caller like any other failed status.
//!
//! Two call surfaces share the same dispatch path:
//! - [`ApiClient::call`] reads the whole body, undoing `Content-Encoding: gzip`,
//!   and accepts 200 and 201.
//! - [`ApiClient::download_file`] streams the raw body to disk and accepts 200 only.

use crate::body::RequestBody;
use crate::config::{ClientConfig, OAuth2Config, DEFAULT_CONNECT_TIMEOUT};
use crate::context::CallContext;
use crate::download;
use crate::error::{ClientError, Result};
use crate::secret::{ExposeSecret, SecretString};
use crate::token_manager::TokenManager;
use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_ENCODING,
    CONTENT_TYPE,
};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

// =============================================================================
// Authentication
// =============================================================================

/// How requests are authenticated.
#[derive(Debug)]
pub enum Authentication {
    /// Requests are forwarded without an `Authorization` header and a 401 is
    /// never retried.
    Anonymous,
    /// Requests carry a bearer token from the client-credentials flow.
    OAuth2(TokenManager),
}

impl Authentication {
    /// The bearer token to attach, if any.
    async fn bearer_token(&self, ctx: &CallContext) -> Result<Option<SecretString>> {
        match self {
            Self::Anonymous => Ok(None),
            Self::OAuth2(manager) => manager.get_valid_token(ctx).await.map(Some),
        }
    }

    /// React to a 401. Returns whether the request should be sent again.
    async fn reauthorize(&self, ctx: &CallContext) -> Result<bool> {
        match self {
            Self::Anonymous => Ok(false),
            Self::OAuth2(manager) => {
                manager.refresh(ctx).await?;
                Ok(true)
            }
        }
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// One API call: method, path below the base URL, body and extra headers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Appended verbatim to the client's base URL. The joined URL is then
    /// parsed, which resolves `.` and `..` segments: `/api/../test` is sent
    /// as `/test`.
    pub path: String,
    pub body: RequestBody,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    /// A request with no body and no extra headers.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header. Later headers with the same name replace earlier ones,
    /// and all of them override `Authorization` and `Content-Type`.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful `call` response with its body already decoded.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body bytes, decompressed if the server sent gzip.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Serialization` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Serialization(e.to_string()))
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for one API base URL.
///
/// Safe to share across tasks (`&self` methods); the only mutable state is
/// the token cache inside the [`TokenManager`].
#[derive(Debug)]
pub struct ApiClient {
    auth: Authentication,
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Authenticated client. Only connecting is time-limited; bound whole
    /// calls with a [`CallContext`] or [`ClientConfig::with_http_timeout`].
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, oauth2: OAuth2Config) -> Result<Self> {
        Self::from_config(ClientConfig::new(base_url, oauth2))
    }

    /// Client without authentication, a thin forwarding wrapper.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn anonymous(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(ClientConfig::anonymous(base_url))
    }

    /// Build a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.http_timeout)?;
        Ok(Self::from_parts(config.base_url, config.oauth2, http))
    }

    /// Build a client around an existing `reqwest::Client`, shared with the
    /// token manager.
    #[must_use]
    pub fn from_parts(
        base_url: impl Into<String>,
        oauth2: Option<OAuth2Config>,
        http: reqwest::Client,
    ) -> Self {
        let auth = match oauth2 {
            Some(config) => Authentication::OAuth2(TokenManager::new(config, http.clone())),
            None => Authentication::Anonymous,
        };
        Self {
            auth,
            base_url: base_url.into(),
            http,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token manager, or `None` for an anonymous client.
    #[must_use]
    pub fn token_manager(&self) -> Option<&TokenManager> {
        match &self.auth {
            Authentication::Anonymous => None,
            Authentication::OAuth2(manager) => Some(manager),
        }
    }

    /// Send `request` and return its decoded body and status.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::call_with_context`].
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.call_with_context(request, &CallContext::new()).await
    }

    /// Send `request` under `ctx` and return its decoded body and status.
    ///
    /// # Errors
    ///
    /// - Token errors from [`TokenManager`]; no request is sent
    /// - `ClientError::Serialization` / `ClientError::InvalidRequest` - request could not be built
    /// - `ClientError::Transport` - send or body read failed
    /// - `ClientError::Decompression` - `Content-Encoding: gzip` body was not gzip
    /// - `ClientError::ApiCall` - final status is neither 200 nor 201
    /// - `ClientError::Timeout` / `ClientError::Cancelled`
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn call_with_context(
        &self,
        request: &ApiRequest,
        ctx: &CallContext,
    ) -> Result<ApiResponse> {
        let response = self.dispatch(request, ctx).await?;
        let status = response.status();
        let headers = response.headers().clone();

        let raw = ctx
            .run(async {
                response
                    .bytes()
                    .await
                    .map_err(|e| ClientError::from_transport(&e))
            })
            .await?;

        let body = if is_gzip(&headers) {
            gunzip(&raw)?
        } else {
            raw
        };

        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(ClientError::ApiCall {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// Send `request` and write the response body to `dest`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::download_file_with_context`].
    pub async fn download_file(
        &self,
        request: &ApiRequest,
        dest: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        self.download_file_with_context(request, dest, &CallContext::new())
            .await
    }

    /// Send `request` under `ctx` and write the response body to `dest`.
    ///
    /// If `dest` is an existing directory and the response names a file in
    /// `Content-Disposition`, the file is created inside `dest`; otherwise
    /// `dest` is the file path. Returns the path written. The body is written
    /// exactly as received (no decompression).
    ///
    /// # Errors
    ///
    /// - Same request-side errors as [`ApiClient::call_with_context`]
    /// - `ClientError::ApiCall` - final status is not 200
    /// - `ClientError::FileCreation` - destination cannot be opened
    /// - `ClientError::Io` - copying the body failed partway
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn download_file_with_context(
        &self,
        request: &ApiRequest,
        dest: impl AsRef<Path>,
        ctx: &CallContext,
    ) -> Result<PathBuf> {
        let response = self.dispatch(request, ctx).await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = ctx
                .run(async {
                    response
                        .bytes()
                        .await
                        .map_err(|e| ClientError::from_transport(&e))
                })
                .await?;
            return Err(ClientError::ApiCall {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let path = download::resolve_destination(dest.as_ref(), disposition.as_deref()).await;

        debug!(
            target: "oauth2_client.client",
            path = %path.display(),
            "Writing download"
        );

        download::write_response(response, &path, ctx).await?;
        Ok(path)
    }

    /// Send the request, resending it at most once after a 401 that the
    /// authentication could recover from.
    async fn dispatch(&self, request: &ApiRequest, ctx: &CallContext) -> Result<reqwest::Response> {
        let mut retried = false;
        loop {
            let response = self.send(request, ctx).await?;
            if retried
                || response.status() != StatusCode::UNAUTHORIZED
                || !self.auth.reauthorize(ctx).await?
            {
                return Ok(response);
            }

            debug!(
                target: "oauth2_client.client",
                "Received 401, retrying once with a refreshed token"
            );
            retried = true;
        }
    }

    async fn send(&self, request: &ApiRequest, ctx: &CallContext) -> Result<reqwest::Response> {
        let token = self.auth.bearer_token(ctx).await?;
        let encoded = request.body.negotiate()?;

        let url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid URL: {e}")))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ClientError::InvalidRequest(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(encoded) = &encoded {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(encoded.content_type));
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(encoded) = encoded {
            builder = builder.body(encoded.bytes);
        }

        debug!(
            target: "oauth2_client.client",
            authenticated = token.is_some(),
            "Sending request"
        );

        let response = ctx
            .run(async {
                builder
                    .send()
                    .await
                    .map_err(|e| ClientError::from_transport(&e))
            })
            .await?;

        debug!(
            target: "oauth2_client.client",
            status = %response.status(),
            "Received response"
        );
        Ok(response)
    }
}

/// Build the shared transport. Only connecting is bounded by default; a
/// total timeout applies only when one is configured.
fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let connect_timeout = timeout.map_or(DEFAULT_CONNECT_TIMEOUT, |t| DEFAULT_CONNECT_TIMEOUT.min(t));
    let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {e}")))
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

fn gunzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ClientError::Decompression(e.to_string()))?;
    Ok(Bytes::from(decompressed))
}
