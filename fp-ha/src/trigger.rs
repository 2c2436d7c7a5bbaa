use async_trait::async_trait;

/// A disruptive action run once by a [`Command`](crate::Command).
///
/// Only [`name`](Self::name) and [`run`](Self::run) are required. The
/// other hooks default to no-ops.
#[async_trait]
pub trait Trigger: Send + Sync + 'static {
    /// Name used in logs, status updates and errors.
    fn name(&self) -> &str;

    /// Prepare the trigger before it is scheduled, e.g. snapshot the PIDs
    /// that `verify` will compare against.
    async fn register(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Perform the action.
    async fn run(&self) -> anyhow::Result<()>;

    /// Abort an in-flight [`run`](Self::run) after a timeout or
    /// cancellation.
    async fn cancel(&self) {}

    /// Check that the device recovered after a successful run.
    async fn verify(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
