//! Integration tests for per-call deadlines and cancellation

use crate::support::authenticated_client;
use oauth2_client::{ApiRequest, CallContext, ClientError};
use oauth2_test_utils::TestTokenServer;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_deadline_expires_during_slow_response() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;
    let ctx = CallContext::with_timeout(Duration::from_millis(200));

    let err = client
        .call_with_context(&ApiRequest::get("/api/slow"), &ctx)
        .await
        .expect_err("deadline should expire");

    assert!(matches!(err, ClientError::Timeout), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_deadline_covers_token_fetch() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::builder()
        .delay(Duration::from_secs(5))
        .start()
        .await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;
    let ctx = CallContext::with_timeout(Duration::from_millis(200));

    let err = client
        .call_with_context(&ApiRequest::get("/api/test"), &ctx)
        .await
        .expect_err("token fetch should time out");

    assert!(matches!(err, ClientError::Timeout), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    let cancel = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let err = client
        .call_with_context(&ApiRequest::get("/api/slow"), &ctx)
        .await
        .expect_err("call should be cancelled");

    assert!(matches!(err, ClientError::Cancelled), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = CallContext::new().with_cancellation(cancel);

    let err = client
        .call_with_context(&ApiRequest::get("/api/test"), &ctx)
        .await
        .expect_err("pre-cancelled context");

    assert!(matches!(err, ClientError::Cancelled), "got {err:?}");
    assert_eq!(tokens.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_download_honours_deadline() -> Result<(), anyhow::Error> {
    let tokens = TestTokenServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&api)
        .await;
    let client = authenticated_client(&api, &tokens)?;
    let dir = tempfile::tempdir()?;
    let ctx = CallContext::with_timeout(Duration::from_millis(200));

    let err = client
        .download_file_with_context(
            &ApiRequest::get("/api/download"),
            dir.path().join("late.txt"),
            &ctx,
        )
        .await
        .expect_err("deadline should expire");

    assert!(matches!(err, ClientError::Timeout), "got {err:?}");
    Ok(())
}
