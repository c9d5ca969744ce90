//! Client construction shared by the integration tests.

use oauth2_client::secret::SecretString;
use oauth2_client::{ApiClient, OAuth2Config};
use oauth2_test_utils::{TestTokenServer, SCOPE_READ, SCOPE_WRITE, TEST_CLIENT_ID, TEST_CLIENT_SECRET};
use wiremock::MockServer;

/// Client-credentials settings pointing at `tokens`.
pub fn oauth2_config(tokens: &TestTokenServer) -> OAuth2Config {
    OAuth2Config::new(
        tokens.token_url(),
        TEST_CLIENT_ID,
        SecretString::from(TEST_CLIENT_SECRET),
        vec![SCOPE_READ.to_string(), SCOPE_WRITE.to_string()],
    )
}

/// Authenticated client for `api`, getting tokens from `tokens`.
pub fn authenticated_client(
    api: &MockServer,
    tokens: &TestTokenServer,
) -> Result<ApiClient, anyhow::Error> {
    Ok(ApiClient::new(api.uri(), oauth2_config(tokens))?)
}
