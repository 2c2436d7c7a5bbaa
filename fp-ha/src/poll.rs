use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PollError;

/// Probe a device until it reaches the expected state.
///
/// Up to `max_retries` times, sleeps `interval` and then calls `probe`.
/// Returns the 1-based attempt on which `probe` first returned `Ok(true)`.
/// Probe errors are logged and count as a failed attempt. The overall
/// budget is therefore `max_retries * interval` plus probe time.
pub async fn poll_until<F, Fut>(
    what: &str,
    max_retries: usize,
    interval: Duration,
    mut probe: F,
) -> Result<usize, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let start = Instant::now();

    for attempt in 1..=max_retries {
        tokio::time::sleep(interval).await;

        match probe().await {
            Ok(true) => {
                info!(what, attempt, "Expected state reached");
                return Ok(attempt);
            }
            Ok(false) => {
                debug!(what, attempt, max_retries, "Still waiting");
            }
            Err(e) => {
                warn!(what, attempt, error = %e, "Probe failed");
            }
        }
    }

    Err(PollError::Exhausted {
        what: what.to_string(),
        attempts: max_retries,
        elapsed: start.elapsed(),
    })
}
