//! Per-call deadline and cancellation.
//!
//! A [`CallContext`] is threaded through every network wait of one logical
//! call: the token refresh, the API request, and reading or streaming the
//! response body. A retry after a 401 reuses the same context, so it does not
//! get a fresh deadline.

use crate::error::{ClientError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Optional deadline and cancellation handle for a call.
///
/// The default context never times out and cannot be cancelled; the
/// client's own HTTP timeout still applies.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel_token: Option<CancellationToken>,
}

impl CallContext {
    /// A context with no deadline and no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// The deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    ///
    /// Dropping `fut` on cancellation or expiry aborts the in-flight request.
    pub(crate) async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self
            .cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(ClientError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(ClientError::Timeout);
        }

        let cancelled = async {
            match &self.cancel_token {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(ClientError::Cancelled),
            () = expired => Err(ClientError::Timeout),
            result = fut => result,
        }
    }
}
