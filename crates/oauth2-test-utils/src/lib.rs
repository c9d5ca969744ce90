//! # OAuth2 Client Test Utilities
//!
//! Shared test utilities for the `oauth2-client` crate.
//!
//! This crate provides:
//! - Token endpoint harness (`TestTokenServer`) with request counting
//! - Fixed test credentials (`TEST_CLIENT_ID`, `TEST_CLIENT_SECRET`, ...)
//! - Response fixtures (`gzip`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oauth2_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let tokens = TestTokenServer::builder().token("T1").start().await;
//!
//!     // ... point the client at tokens.token_url() ...
//!
//!     assert_eq!(tokens.request_count(), 1);
//! }
//! ```

pub mod fixtures;
pub mod token_server;

// Re-export commonly used items
pub use fixtures::*;
pub use token_server::*;
