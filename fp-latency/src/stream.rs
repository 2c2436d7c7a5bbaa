use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::Sleep;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::metadata::delay_for;

/// Client-side interceptor delaying every receive on a server stream.
///
/// Opening the stream is not delayed. The delay is resolved once from the
/// request and applies to each message received afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamLatencyInterceptor;

impl StreamLatencyInterceptor {
    pub fn new() -> Self {
        Self
    }

    /// Open the stream through `invoker` and wrap it in a [`DelayedStream`].
    ///
    /// The wrapped stream is bound to the request's [`CancellationToken`]
    /// if one was attached, or to a fresh token otherwise (see
    /// [`DelayedStream::cancellation`]).
    pub async fn intercept<Req, S, F, Fut>(
        &self,
        request: Request<Req>,
        invoker: F,
    ) -> Result<Response<DelayedStream<S>>, Status>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<S>, Status>>,
    {
        let delay = delay_for(&request);
        let token = request
            .extensions()
            .get::<CancellationToken>()
            .cloned()
            .unwrap_or_default();

        if let Some(delay) = delay {
            debug!(?delay, "Injecting latency on stream receives");
        }

        let response = invoker(request).await?;
        let (metadata, inner, extensions) = response.into_parts();

        Ok(Response::from_parts(
            metadata,
            DelayedStream::new(inner, delay, token),
            extensions,
        ))
    }
}

/// A server stream whose receives wait for an injected delay.
///
/// Each receive waits for the delay to elapse or for the cancellation
/// token to fire, whichever comes first. Once the token is cancelled, every
/// further receive returns a `Cancelled` status, so a cancelled stream is
/// never mistaken for one the server closed. `None` only ever means the
/// server finished the stream.
pub struct DelayedStream<S> {
    inner: S,
    delay: Option<Duration>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    // Pending wait for the next message; kept after it elapses until the
    // inner stream yields, so a slow message is not delayed twice.
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl<S> DelayedStream<S> {
    pub fn new(inner: S, delay: Option<Duration>, token: CancellationToken) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        Self {
            inner,
            delay,
            token,
            cancelled,
            sleep: None,
            done: false,
        }
    }

    /// Delay applied before each received message.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Token that aborts pending receives when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Consume the wrapper, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, T> DelayedStream<S>
where
    S: Stream<Item = Result<T, Status>> + Unpin,
{
    /// Receive the next message, mirroring `tonic::Streaming::message`.
    pub async fn message(&mut self) -> Result<Option<T>, Status> {
        self.next().await.transpose()
    }
}

impl<S, T> Stream for DelayedStream<S>
where
    S: Stream<Item = Result<T, Status>> + Unpin,
{
    type Item = Result<T, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.token.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            this.sleep = None;
            return Poll::Ready(Some(Err(Status::cancelled("stream cancelled"))));
        }

        if this.done {
            return Poll::Ready(None);
        }

        if let Some(delay) = this.delay {
            let sleep = this
                .sleep
                .get_or_insert_with(|| Box::pin(tokio::time::sleep(delay)));
            ready!(sleep.as_mut().poll(cx));
        }

        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        this.sleep = None;
        if item.is_none() {
            this.done = true;
        }
        Poll::Ready(item)
    }
}
