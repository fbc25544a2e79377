use actor_protocol::{BridgeError, SystemEvent};
use async_trait::async_trait;
use futures::stream::StreamExt;
use futures_channel::mpsc;
use tokio::task::JoinHandle;

/// A component that owns its state and is driven only by its inbox
///
/// Messages are handled one at a time, in arrival order. Everything an
/// actor touches from `handle()` therefore needs no locking: the bridge
/// relies on this to keep the classifier and correlator single-threaded.
///
/// # Lifecycle
///
/// 1. **init()** - once, before the first message
/// 2. **handle()** - per message; an `Err` is reported, not fatal
/// 3. **shutdown()** - after every sender is gone
///
/// # Example
///
/// ```ignore
/// struct LineCounter {
///     lines: usize,
/// }
///
/// #[async_trait]
/// impl Actor for LineCounter {
///     type Message = String;
///
///     fn name(&self) -> &'static str {
///         "LineCounter"
///     }
///
///     async fn handle(&mut self, _line: String) -> Result<(), BridgeError> {
///         self.lines += 1;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Actor: Send + 'static {
    /// Message type this actor processes
    type Message: Send + 'static;

    /// Actor name (used for logging and debugging)
    fn name(&self) -> &'static str;

    /// Initialize the actor before processing messages
    async fn init(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Handle a single message
    ///
    /// An error is reported as [`SystemEvent::Error`]; the actor keeps running.
    async fn handle(&mut self, msg: Self::Message) -> Result<(), BridgeError>;

    /// Clean up before shutdown
    ///
    /// Called once the message channel is closed.
    async fn shutdown(&mut self) {}

    /// Drive the actor until its inbox closes
    ///
    /// Handler errors go to `event_tx` as [`SystemEvent::Error`].
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Self::Message>,
        event_tx: mpsc::Sender<SystemEvent>,
    ) where
        Self: Sized,
    {
        if let Err(e) = self.init().await {
            crate::actor_error!("{} init failed: {}", self.name(), e);
            let _ = event_tx.clone().try_send(SystemEvent::Error {
                message: format!("{} init failed: {}", self.name(), e),
            });
            return;
        }

        crate::actor_debug!("{} started", self.name());

        while let Some(msg) = rx.next().await {
            if let Err(e) = self.handle(msg).await {
                crate::actor_warn!("{} error: {}", self.name(), e);
                let _ = event_tx.clone().try_send(SystemEvent::Error {
                    message: format!("{} error: {}", self.name(), e),
                });
            }
        }

        self.shutdown().await;

        crate::actor_debug!("{} stopped", self.name());
    }
}

/// Spawn an actor on the current tokio runtime
pub fn spawn_actor<A>(
    actor: A,
    rx: mpsc::Receiver<A::Message>,
    event_tx: mpsc::Sender<SystemEvent>,
) -> JoinHandle<()>
where
    A: Actor,
{
    tokio::spawn(actor.run(rx, event_tx))
}
