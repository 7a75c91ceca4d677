use std::sync::Arc;

use async_trait::async_trait;

use super::Transport;
use crate::backoff::{self, BackoffPolicy};
use crate::context::CallContext;
use crate::error::GraphError;
use crate::request::Request;
use crate::response::Response;

/// Re-issues a request on transport failures and 5xx responses.
///
/// Any response below 500 is handed back as is, including 4xx and bodies
/// carrying a structured remote error.
pub struct RetryTransport {
    next: Arc<dyn Transport>,
    policy: BackoffPolicy,
}

impl RetryTransport {
    pub fn new(next: Arc<dyn Transport>, policy: BackoffPolicy) -> Self {
        Self { next, policy }
    }
}

#[async_trait]
impl Transport for RetryTransport {
    async fn round_trip(
        &self,
        ctx: &CallContext,
        request: Request,
    ) -> Result<Response, GraphError> {
        backoff::retry(ctx, self.policy, is_retryable, |attempt| {
            let request = request.clone();
            async move {
                let response = self.next.round_trip(ctx, request).await?;
                if response.status().is_server_error() {
                    return Err(GraphError::ServerStatus {
                        status: response.status(),
                        attempt,
                    });
                }
                Ok(response)
            }
        })
        .await
    }
}

fn is_retryable(err: &GraphError) -> bool {
    err.is_transport() || matches!(err, GraphError::ServerStatus { .. })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;

    use super::*;
    use crate::transport::testing::{Reply, Scripted};

    fn fast() -> BackoffPolicy {
        BackoffPolicy::requests()
            .with_initial_interval(Duration::from_millis(5))
            .with_max_interval(Duration::from_millis(20))
            .with_max_elapsed_time(Duration::from_secs(5))
    }

    fn request() -> Request {
        Request::builder()
            .url("https://graph.facebook.com/v19.0/me")
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_server_errors_until_success() {
        let scripted = Arc::new(Scripted::new([
            Reply::Status(500, ""),
            Reply::Status(502, ""),
            Reply::Status(503, ""),
            Reply::Status(200, r#"{"id":"1"}"#),
        ]));
        let retry = RetryTransport::new(scripted.clone(), fast());

        let response = retry
            .round_trip(&CallContext::new(), request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(scripted.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_failures() {
        let scripted = Arc::new(Scripted::new([
            Reply::Fail,
            Reply::Status(200, "{}"),
        ]));
        let retry = RetryTransport::new(scripted.clone(), fast());

        retry
            .round_trip(&CallContext::new(), request())
            .await
            .unwrap();
        assert_eq!(scripted.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_returned_without_retry() {
        let scripted = Arc::new(Scripted::new([Reply::Status(404, "{}")]));
        let retry = RetryTransport::new(scripted.clone(), fast());

        let response = retry
            .round_trip(&CallContext::new(), request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(scripted.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let replies = (0..64).map(|_| Reply::Status(500, ""));
        let scripted = Arc::new(Scripted::new(replies));
        let policy = fast().with_max_elapsed_time(Duration::from_millis(30));
        let retry = RetryTransport::new(scripted.clone(), policy);

        let err = retry
            .round_trip(&CallContext::new(), request())
            .await
            .unwrap_err();

        match err {
            GraphError::ServerStatus { status, attempt } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(attempt > 1);
                assert_eq!(attempt as usize, scripted.calls());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_retry() {
        let scripted = Arc::new(Scripted::new([Reply::Status(500, "")]));
        let retry = RetryTransport::new(
            scripted.clone(),
            fast().with_initial_interval(Duration::from_secs(1)),
        );
        let ctx = CallContext::new();
        ctx.cancellation().cancel();

        let err = retry.round_trip(&ctx, request()).await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
        assert_eq!(scripted.calls(), 1);
    }
}
