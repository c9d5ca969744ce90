//! OAuth2 Client Demo
//!
//! Calls a protected API with GET, creates a resource with POST and
//! downloads a file, using configuration from the environment:
//!
//! ```text
//! API_BASE_URL=http://localhost:5001 \
//! OAUTH2_TOKEN_URL=http://localhost:5000/token \
//! OAUTH2_CLIENT_ID=test_client_id \
//! OAUTH2_CLIENT_SECRET=test_client_secret \
//! OAUTH2_SCOPES="api:read api:write" \
//! cargo run -p oauth2-client-demo
//! ```

use anyhow::Context;
use oauth2_client::{ApiClient, ApiRequest, ClientConfig, RequestBody};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DOWNLOAD_PATH: &str = "./example.txt";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauth2_client=debug,oauth2_client_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        base_url = %config.base_url,
        authenticated = config.oauth2.is_some(),
        http_timeout = ?config.http_timeout,
        "Configuration loaded successfully"
    );

    let client = ApiClient::from_config(config).context("Failed to build API client")?;

    info!("Calling protected API with GET...");
    let response = client
        .call(&ApiRequest::get("/api/protected"))
        .await
        .context("GET /api/protected failed")?;
    info!(status = %response.status(), body = %response.text(), "GET response");

    info!("Calling resource API with POST...");
    let body = RequestBody::json(&serde_json::json!({"name": "example resource"}))
        .context("Failed to encode request body")?;
    let response = client
        .call(&ApiRequest::post("/api/resource").body(body))
        .await
        .context("POST /api/resource failed")?;
    info!(status = %response.status(), body = %response.text(), "POST response");

    info!("Downloading file...");
    let path = client
        .download_file(&ApiRequest::get("/api/download"), Path::new(DOWNLOAD_PATH))
        .await
        .context("Download of /api/download failed")?;

    let content = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read downloaded file {}", path.display()))?;
    info!(
        path = %path.display(),
        content = %String::from_utf8_lossy(&content),
        "File downloaded successfully"
    );

    tokio::fs::remove_file(&path)
        .await
        .with_context(|| format!("Failed to remove {}", path.display()))?;

    Ok(())
}
