//! Secret types for client secrets and bearer tokens.
//!
//! Re-exports [`secrecy`] so that credentials and access tokens never show up
//! in `{:?}` output or tracing fields. `SecretString` implements `Debug` with
//! redaction and zeroizes its contents on drop.
//!
//! # Example
//!
//! ```rust
//! use oauth2_client::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("client-secret");
//! assert!(!format!("{secret:?}").contains("client-secret"));
//!
//! // Reading the value is always an explicit call.
//! let raw: &str = secret.expose_secret();
//! assert_eq!(raw, "client-secret");
//! ```
//!
//! Wrap in `SecretString`:
//! - OAuth client secrets
//! - Access tokens returned by the token endpoint
//! - Bearer values handed to callers

pub use secrecy::{ExposeSecret, SecretString};
