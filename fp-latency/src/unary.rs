use std::future::Future;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::metadata::delay_for;

/// Client-side interceptor delaying unary calls.
///
/// The delay is read from the request with [`delay_for`] and applied
/// before the call is handed to the invoker. By default the sleep runs to
/// completion even if the caller gives up on the call; use
/// [`cancellable`](Self::cancellable) to race it against the request's
/// [`CancellationToken`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnaryLatencyInterceptor {
    cancellable: bool,
}

impl UnaryLatencyInterceptor {
    /// Create an interceptor whose injected sleep cannot be interrupted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an interceptor that abandons the injected sleep when the
    /// request's cancellation token fires.
    pub fn cancellable() -> Self {
        Self { cancellable: true }
    }

    /// Whether the injected sleep races against call cancellation.
    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Apply the requested delay, then run `invoker` with the request.
    pub async fn intercept<Req, Resp, F, Fut>(
        &self,
        request: Request<Req>,
        invoker: F,
    ) -> Result<Response<Resp>, Status>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        if let Some(delay) = delay_for(&request) {
            debug!(?delay, "Injecting latency before unary call");

            let token = request.extensions().get::<CancellationToken>().cloned();
            match token {
                Some(token) if self.cancellable => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => {
                            return Err(Status::cancelled(
                                "call cancelled during injected latency",
                            ));
                        }
                    }
                }
                _ => tokio::time::sleep(delay).await,
            }
        }

        invoker(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::metadata::{set_cancellation, set_latency};

    async fn echo(request: Request<u32>) -> Result<Response<u32>, Status> {
        Ok(Response::new(request.into_inner() + 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applied() {
        let mut request = Request::new(41);
        set_latency(&mut request, "250ms").unwrap();

        let start = Instant::now();
        let response = UnaryLatencyInterceptor::new()
            .intercept(request, echo)
            .await
            .unwrap();

        assert_eq!(response.into_inner(), 42);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_without_metadata() {
        let start = Instant::now();
        UnaryLatencyInterceptor::new()
            .intercept(Request::new(1), echo)
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_latency_is_ignored() {
        let mut request = Request::new(1);
        set_latency(&mut request, "soon").unwrap();

        let start = Instant::now();
        let response = UnaryLatencyInterceptor::new()
            .intercept(request, echo)
            .await
            .unwrap();

        assert_eq!(response.into_inner(), 2);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_sleep_ignores_cancellation() {
        let token = CancellationToken::new();
        let mut request = Request::new(1);
        set_latency(&mut request, "100ms").unwrap();
        set_cancellation(&mut request, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let start = Instant::now();
        let result = UnaryLatencyInterceptor::new()
            .intercept(request, echo)
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(100));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_sleep() {
        let token = CancellationToken::new();
        let mut request = Request::new(1);
        set_latency(&mut request, "100ms").unwrap();
        set_cancellation(&mut request, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();

        let start = Instant::now();
        let status = UnaryLatencyInterceptor::cancellable()
            .intercept(request, move |req| async move {
                flag.store(true, Ordering::SeqCst);
                echo(req).await
            })
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(status.code(), tonic::Code::Cancelled);
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(100));
        assert!(!invoked.load(Ordering::SeqCst));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_without_token_sleeps_fully() {
        let mut request = Request::new(1);
        set_latency(&mut request, "30ms").unwrap();

        let start = Instant::now();
        UnaryLatencyInterceptor::cancellable()
            .intercept(request, echo)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
