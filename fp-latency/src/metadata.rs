//! Reading the requested latency from call metadata.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::metadata::errors::InvalidMetadataValue;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tracing::warn;

use crate::duration::parse_duration;

/// Metadata key carrying the requested delay as a Go duration string.
pub const LATENCY_KEY: &str = "latency";

/// Metadata a server handler received, forwarded onto an outgoing call.
///
/// Stored as a request extension. [`delay_for`] consults it when the
/// request's own metadata carries no latency entry.
#[derive(Debug, Clone, Default)]
pub struct IncomingMetadata(pub MetadataMap);

/// Resolve the delay requested by `outgoing` metadata, falling back to
/// `incoming` metadata when the outgoing side has no latency entry.
///
/// Returns `None` when the key is absent or its value is not a valid
/// duration. Only the first value is honored if several are present.
pub fn delay(outgoing: Option<&MetadataMap>, incoming: Option<&MetadataMap>) -> Option<Duration> {
    let values = outgoing
        .and_then(latency_values)
        .or_else(|| incoming.and_then(latency_values))?;

    if values.len() > 1 {
        warn!(
            count = values.len(),
            "Multiple latency values in metadata, using the first"
        );
    }

    let raw = match values[0].to_str() {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Ignoring non-ASCII latency metadata");
            return None;
        }
    };

    match parse_duration(raw) {
        Ok(delay) => Some(delay),
        Err(e) => {
            warn!(value = raw, error = %e, "Ignoring invalid latency metadata");
            None
        }
    }
}

fn latency_values(md: &MetadataMap) -> Option<Vec<&AsciiMetadataValue>> {
    let values: Vec<_> = md.get_all(LATENCY_KEY).iter().collect();
    if values.is_empty() { None } else { Some(values) }
}

/// Resolve the delay requested for `request`.
///
/// The request's metadata is the outgoing side; an [`IncomingMetadata`]
/// extension, if any, is the incoming side.
pub fn delay_for<T>(request: &Request<T>) -> Option<Duration> {
    let incoming = request
        .extensions()
        .get::<IncomingMetadata>()
        .map(|md| &md.0);
    delay(Some(request.metadata()), incoming)
}

/// Request a delay for `request` by setting its latency metadata entry.
pub fn set_latency<T>(request: &mut Request<T>, value: &str) -> Result<(), InvalidMetadataValue> {
    let value: AsciiMetadataValue = value.parse()?;
    request.metadata_mut().insert(LATENCY_KEY, value);
    Ok(())
}

/// Bind `request` to `token`, letting interceptors abandon an injected
/// wait once the token is cancelled.
pub fn set_cancellation<T>(request: &mut Request<T>, token: CancellationToken) {
    request.extensions_mut().insert(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn metadata(values: &[&str]) -> MetadataMap {
        let mut md = MetadataMap::new();
        for value in values {
            md.append(LATENCY_KEY, value.parse().unwrap());
        }
        md
    }

    #[test]
    fn test_valid_latency() {
        let md = metadata(&["10ms"]);
        assert_eq!(delay(Some(&md), None), Some(Duration::from_millis(10)));
    }

    #[traced_test]
    #[test]
    fn test_invalid_latency() {
        let md = metadata(&["invalid"]);
        assert_eq!(delay(Some(&md), None), None);
        assert!(logs_contain("Ignoring invalid latency metadata"));
    }


    #[test]
    fn test_absent_latency() {
        assert_eq!(delay(None, None), None);
        assert_eq!(delay(Some(&MetadataMap::new()), None), None);

        let mut md = MetadataMap::new();
        md.insert("username", "admin".parse().unwrap());
        assert_eq!(delay(Some(&md), None), None);
    }

    #[traced_test]
    #[test]
    fn test_first_value_wins() {
        let md = metadata(&["20ms", "5s"]);
        assert_eq!(delay(Some(&md), None), Some(Duration::from_millis(20)));
        assert!(logs_contain("Multiple latency values in metadata"));
    }

    #[test]
    fn test_incoming_fallback() {
        let outgoing = MetadataMap::new();
        let incoming = metadata(&["1.5s"]);
        assert_eq!(
            delay(Some(&outgoing), Some(&incoming)),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            delay(None, Some(&incoming)),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_outgoing_takes_precedence() {
        let outgoing = metadata(&["10ms"]);
        let incoming = metadata(&["10s"]);
        assert_eq!(
            delay(Some(&outgoing), Some(&incoming)),
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn test_invalid_outgoing_does_not_fall_back() {
        let outgoing = metadata(&["bogus"]);
        let incoming = metadata(&["10s"]);
        assert_eq!(delay(Some(&outgoing), Some(&incoming)), None);
    }

    #[test]
    fn test_delay_for_request() {
        let mut request = Request::new(());
        assert_eq!(delay_for(&request), None);

        request
            .extensions_mut()
            .insert(IncomingMetadata(metadata(&["3s"])));
        assert_eq!(delay_for(&request), Some(Duration::from_secs(3)));

        set_latency(&mut request, "250ms").unwrap();
        assert_eq!(delay_for(&request), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_set_latency_replaces() {
        let mut request = Request::new(());
        set_latency(&mut request, "1s").unwrap();
        set_latency(&mut request, "2s").unwrap();

        assert_eq!(request.metadata().get_all(LATENCY_KEY).iter().count(), 1);
        assert_eq!(delay_for(&request), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_set_latency_rejects_control_characters() {
        let mut request = Request::new(());
        assert!(set_latency(&mut request, "1s\n").is_err());
    }
}
