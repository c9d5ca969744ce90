//! OAuth 2.0 client-credentials API client.
//!
//! Acquires and caches an access token, attaches it to API calls, retries
//! once with a refreshed token on a 401, negotiates request body encoding,
//! transparently undoes gzip responses, and supports deadlines and
//! cancellation.
//!
//! # Example
//!
//! ```rust,ignore
//! use oauth2_client::{ApiClient, ApiRequest, OAuth2Config, RequestBody};
//! use oauth2_client::secret::SecretString;
//!
//! let config = OAuth2Config::new(
//!     "https://api.example.com/oauth/token",
//!     "your_client_id",
//!     SecretString::from("your_client_secret"),
//!     vec!["read".to_string(), "write".to_string()],
//! );
//! let client = ApiClient::new("https://api.example.com", config)?;
//!
//! let response = client.call(&ApiRequest::get("/users")).await?;
//! println!("{} {}", response.status(), response.text());
//!
//! let body = RequestBody::json(&serde_json::json!({"name": "John Doe"}))?;
//! client.call(&ApiRequest::post("/users").body(body)).await?;
//!
//! client
//!     .download_file(&ApiRequest::get("/files/document.pdf"), "./document.pdf")
//!     .await?;
//! ```

#![warn(clippy::pedantic)]

/// Module for request body variants and content negotiation
pub mod body;

/// Module for the authenticated API client
pub mod client;

/// Module for client configuration
pub mod config;

/// Module for per-call deadlines and cancellation
pub mod context;

/// Module for download destination handling
mod download;

/// Module for error types
pub mod error;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for OAuth 2.0 token management
pub mod token_manager;

pub use body::RequestBody;
pub use client::{ApiClient, ApiRequest, ApiResponse, Authentication};
pub use config::{ClientConfig, ConfigError, OAuth2Config};
pub use context::CallContext;
pub use error::{ClientError, Result};
pub use token_manager::TokenManager;
