//! Integration tests for the one-shot 401 retry
//!
//! A 401 on an authenticated request forces exactly one token refresh and
//! one retry. Anonymous clients never retry.

use crate::support::authenticated_client;
use oauth2_client::{ApiClient, ApiRequest, ClientError, RequestBody};
use oauth2_test_utils::TestTokenServer;
use reqwest::StatusCode;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_401_refreshes_token_and_retries_once() -> Result<(), anyhow::Error> {
    // Arrange: the first token is rejected, the refreshed one accepted
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    // Act
    let response = client.call(&ApiRequest::get("/api/protected")).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    assert_eq!(tokens.request_count(), 2, "Exactly one forced refresh");

    Ok(())
}

#[tokio::test]
async fn test_retry_resends_the_same_body() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resource"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource"))
        .and(header("authorization", "Bearer token-2"))
        .and(header("content-type", "text/plain"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    let response = client
        .call(&ApiRequest::post("/api/resource").body(RequestBody::from("payload")))
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_second_401_is_returned_without_another_retry() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .respond_with(ResponseTemplate::new(401).set_body_string("still unauthorized"))
        .expect(2)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    let err = client
        .call(&ApiRequest::get("/api/protected"))
        .await
        .expect_err("persistent 401 should fail");

    match err {
        ClientError::ApiCall { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "still unauthorized");
        }
        other => panic!("expected ApiCall, got {other:?}"),
    }
    assert_eq!(tokens.request_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_after_401_is_token_error() -> Result<(), anyhow::Error> {
    // A token issued once, then the endpoint is gone
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    // Prime the cache, then break the token endpoint
    let manager = client
        .token_manager()
        .expect("authenticated client has a token manager");
    manager
        .get_valid_token(&oauth2_client::CallContext::new())
        .await?;
    tokens.server().reset().await;

    let err = client
        .call(&ApiRequest::get("/api/protected"))
        .await
        .expect_err("refresh failure should surface");

    assert!(err.is_token_error(), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_anonymous_client_does_not_retry_401() -> Result<(), anyhow::Error> {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&api)
        .await;
    let client = ApiClient::anonymous(api.uri())?;

    let err = client
        .call(&ApiRequest::get("/api/protected"))
        .await
        .expect_err("401 should fail");

    assert_eq!(err.status(), Some(401));
    Ok(())
}
