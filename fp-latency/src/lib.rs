//! Latency injection for gRPC clients.
//!
//! A caller requests artificial delay by attaching a `latency` entry to a
//! call's metadata, holding a Go-style duration string such as `"250ms"`.
//! The interceptors in this crate honor it:
//!
//! - [`UnaryLatencyInterceptor`] sleeps before invoking a unary call.
//! - [`StreamLatencyInterceptor`] wraps a server stream so that every
//!   receive waits for the delay, or returns early if the call is cancelled.
//!
//! Malformed values never fail a call: they are logged and treated as
//! "no delay".
//!
//! # Example
//!
//! ```ignore
//! use fp_latency::{UnaryLatencyInterceptor, set_latency};
//!
//! let mut request = tonic::Request::new(GetRequest::default());
//! set_latency(&mut request, "250ms")?;
//!
//! let mut client = client.clone();
//! let response = UnaryLatencyInterceptor::new()
//!     .intercept(request, move |req| async move { client.get(req).await })
//!     .await?;
//! ```

pub mod duration;
pub mod metadata;
pub mod stream;
pub mod unary;

pub use duration::{DurationError, parse_duration};
pub use metadata::{
    IncomingMetadata, LATENCY_KEY, delay, delay_for, set_cancellation, set_latency,
};
pub use stream::{DelayedStream, StreamLatencyInterceptor};
pub use unary::UnaryLatencyInterceptor;

/// Unary interceptor with the default, non-cancellable sleep.
pub fn unary_client_interceptor() -> UnaryLatencyInterceptor {
    UnaryLatencyInterceptor::new()
}

/// Stream interceptor delaying every receive on the returned stream.
pub fn stream_client_interceptor() -> StreamLatencyInterceptor {
    StreamLatencyInterceptor::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(!unary_client_interceptor().is_cancellable());
        assert!(UnaryLatencyInterceptor::cancellable().is_cancellable());

        let stream = stream_client_interceptor();
        assert_eq!(format!("{stream:?}"), "StreamLatencyInterceptor");
    }
}
