//! Fixed credentials and response fixtures for deterministic tests.

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

// Client credentials
pub const TEST_CLIENT_ID: &str = "test_client_id";
pub const TEST_CLIENT_SECRET: &str = "test_client_secret";

// Scopes
pub const SCOPE_READ: &str = "api:read";
pub const SCOPE_WRITE: &str = "api:write";

/// Token endpoint path served by `TestTokenServer`.
pub const TOKEN_PATH: &str = "/token";

/// `Authorization` header value the token endpoint expects for the test credentials.
pub fn basic_auth_header() -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{TEST_CLIENT_ID}:{TEST_CLIENT_SECRET}"))
    )
}

/// Gzip-compress `data`, for building `Content-Encoding: gzip` responses.
///
/// # Panics
///
/// Panics if compression into memory fails.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
