//! gNMI subscription loop

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::GnmiClient;
use crate::config::{GnmiTarget, ListMode};
use crate::error::Result;
use crate::gnmi::subscribe_response::Response;
use crate::telemetry::points_from_notification;

/// Streams a target's telemetry as JSON lines
pub struct GnmiSubscriber {
    target: GnmiTarget,
}

impl GnmiSubscriber {
    pub fn new(target: GnmiTarget) -> Self {
        Self { target }
    }

    /// Run until `token` is cancelled, reconnecting after failures.
    ///
    /// A `ONCE` subscription returns after its first complete session.
    pub async fn run<W>(&self, out: &mut W, token: CancellationToken) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        info!(
            "Starting gNMI subscriber for {} at {}",
            self.target.name, self.target.address
        );

        loop {
            let result = async {
                let client = GnmiClient::connect(self.target.clone()).await?;
                self.stream_to(&client, &mut *out, token.clone()).await
            }
            .await;

            match result {
                Ok(count) => {
                    info!(
                        "Subscription completed for {} ({} points)",
                        self.target.name, count
                    );
                    if self.target.list_mode == ListMode::Once {
                        return Ok(());
                    }
                }
                Err(e) if token.is_cancelled() => {
                    debug!("Subscription for {} stopped: {}", self.target.name, e);
                }
                Err(e) => {
                    error!(
                        "Subscription error for {}: {}. Reconnecting in {:?}...",
                        self.target.name,
                        e,
                        self.target.reconnect_delay()
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.target.reconnect_delay()) => {}
                _ = token.cancelled() => {
                    info!("gNMI subscriber for {} stopped", self.target.name);
                    return Ok(());
                }
            }
        }
    }

    /// Run one subscription session on `client`, writing each point as a
    /// JSON line to `out`. Returns the number of points written.
    pub async fn stream_to<W>(
        &self,
        client: &GnmiClient,
        out: &mut W,
        token: CancellationToken,
    ) -> Result<usize>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut stream = client.subscribe(token).await?;
        let mut count = 0;

        while let Some(msg) = stream.message().await? {
            match msg.response {
                Some(Response::Update(notification)) => {
                    for point in points_from_notification(&self.target.name, &notification) {
                        let mut line = serde_json::to_vec(&point)?;
                        line.push(b'\n');
                        out.write_all(&line).await?;
                        count += 1;
                    }
                    out.flush().await?;
                }
                Some(Response::SyncResponse(sync)) => {
                    debug!("Received sync response: {}", sync);
                }
                None => {}
            }
        }

        Ok(count)
    }
}
