//! Command run loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CommandError;
use crate::status::{Status, StatusUpdate};
use crate::trigger::Trigger;

/// A trigger scheduled to run once.
///
/// # Example
///
/// ```ignore
/// let mut handle = Command::new(ProcessRestart::new(dut, "emsd"))
///     .with_delay(Duration::from_secs(5))
///     .with_timeout(Duration::from_secs(60))
///     .start();
///
/// while let Some(update) = handle.next_update().await {
///     println!("{} -> {}", update.trigger, update.status);
/// }
/// handle.wait().await?;
/// ```
pub struct Command {
    trigger: Arc<dyn Trigger>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    registered: bool,
}

impl Command {
    pub fn new(trigger: impl Trigger) -> Self {
        Self::from_arc(Arc::new(trigger))
    }

    /// Schedule a shared trigger.
    pub fn from_arc(trigger: Arc<dyn Trigger>) -> Self {
        Self {
            trigger,
            delay: None,
            timeout: None,
            registered: false,
        }
    }

    /// Wait `delay` before running the trigger.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the command if the trigger's run exceeds `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        self.trigger.name()
    }

    /// Register the trigger ahead of [`start`](Self::start).
    ///
    /// A registered command skips registration in its run loop, so state
    /// captured here (e.g. PIDs) predates anything started afterwards.
    pub async fn register(&mut self) -> Result<(), CommandError> {
        if !self.registered {
            register_trigger(self.trigger.as_ref()).await?;
            self.registered = true;
        }
        Ok(())
    }

    /// Spawn the run loop on the current tokio runtime.
    pub fn start(self) -> CommandHandle {
        let name = self.trigger.name().to_string();
        let (updates_tx, updates) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(Status::Unknown);
        let token = CancellationToken::new();

        let reporter = Reporter {
            trigger: name.clone(),
            updates: updates_tx,
            status: status_tx,
        };
        let task = tokio::spawn(run_loop(self, token.clone(), reporter));

        CommandHandle {
            name,
            updates,
            status,
            token,
            task,
        }
    }
}

/// Handle to a started [`Command`].
pub struct CommandHandle {
    name: String,
    updates: mpsc::UnboundedReceiver<StatusUpdate>,
    status: watch::Receiver<Status>,
    token: CancellationToken,
    task: JoinHandle<Result<(), CommandError>>,
}

impl CommandHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest published status.
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Watch the latest status independently of the transition channel.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Next status transition, or `None` once the run loop has finished
    /// and every transition has been received.
    pub async fn next_update(&mut self) -> Option<StatusUpdate> {
        self.updates.recv().await
    }

    /// Request cancellation. A waiting command fails without running; a
    /// running trigger is cancelled through [`Trigger::cancel`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the run loop to finish.
    pub async fn wait(self) -> Result<(), CommandError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(CommandError::Aborted {
                trigger: self.name,
                reason: e.to_string(),
            }),
        }
    }
}

struct Reporter {
    trigger: String,
    updates: mpsc::UnboundedSender<StatusUpdate>,
    status: watch::Sender<Status>,
}

impl Reporter {
    fn publish(&self, status: Status) {
        debug!(trigger = %self.trigger, %status, "Trigger status changed");
        self.status.send_replace(status);
        // The handle may have stopped listening.
        let _ = self
            .updates
            .send(StatusUpdate::new(self.trigger.clone(), status));
    }

    fn fail(&self, error: CommandError) -> Result<(), CommandError> {
        warn!(trigger = %self.trigger, %error, "Trigger failed");
        self.publish(Status::Failed);
        Err(error)
    }
}

async fn run_loop(
    command: Command,
    token: CancellationToken,
    reporter: Reporter,
) -> Result<(), CommandError> {
    let Command {
        trigger,
        delay,
        timeout,
        registered,
    } = command;
    let name = trigger.name().to_string();

    if !registered {
        if let Err(e) = register_trigger(trigger.as_ref()).await {
            return reporter.fail(e);
        }
    }

    if let Some(delay) = delay {
        reporter.publish(Status::Waiting);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = token.cancelled() => {
                return reporter.fail(CommandError::Cancelled { trigger: name });
            }
        }
    }

    reporter.publish(Status::Running);
    info!(trigger = %name, ?timeout, "Running trigger");

    let run = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, trigger.run())
                .await
                .map_err(|_| limit),
            None => Ok(trigger.run().await),
        }
    };

    let outcome = tokio::select! {
        outcome = run => outcome,
        _ = token.cancelled() => {
            trigger.cancel().await;
            return reporter.fail(CommandError::Cancelled { trigger: name });
        }
    };

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return reporter.fail(CommandError::Run {
                trigger: name,
                reason: format!("{e:#}"),
            });
        }
        Err(limit) => {
            trigger.cancel().await;
            return reporter.fail(CommandError::Timeout {
                trigger: name,
                timeout: limit,
            });
        }
    }

    if let Err(e) = trigger.verify().await {
        return reporter.fail(CommandError::Verify {
            trigger: name,
            reason: format!("{e:#}"),
        });
    }

    reporter.publish(Status::Done);
    info!(trigger = %name, "Trigger completed");
    Ok(())
}

async fn register_trigger(trigger: &dyn Trigger) -> Result<(), CommandError> {
    trigger
        .register()
        .await
        .map_err(|e| CommandError::Register {
            trigger: trigger.name().to_string(),
            reason: format!("{e:#}"),
        })
}

/// Run `commands` and collect each outcome by trigger name.
///
/// Every trigger is registered before any of them runs. With `parallel`
/// the registered commands start at once; otherwise each one starts only
/// after the previous one finished. A command that fails to register is
/// not started. Outcomes keep the input order.
pub async fn run_all(
    commands: Vec<Command>,
    parallel: bool,
) -> Vec<(String, Result<(), CommandError>)> {
    let mut registered = Vec::with_capacity(commands.len());
    for mut command in commands {
        let name = command.name().to_string();
        match command.register().await {
            Ok(()) => registered.push((name, Ok(command))),
            Err(e) => {
                warn!(trigger = %name, error = %e, "Skipping trigger");
                registered.push((name, Err(e)));
            }
        }
    }

    let mut outcomes = Vec::with_capacity(registered.len());

    if parallel {
        let handles: Vec<_> = registered
            .into_iter()
            .map(|(name, command)| (name, command.map(Command::start)))
            .collect();
        for (name, handle) in handles {
            let outcome = match handle {
                Ok(handle) => handle.wait().await,
                Err(e) => Err(e),
            };
            outcomes.push((name, outcome));
        }
    } else {
        for (name, command) in registered {
            let outcome = match command {
                Ok(command) => command.start().wait().await,
                Err(e) => Err(e),
            };
            outcomes.push((name, outcome));
        }
    }

    outcomes
}
