//! Shutdown triggered by an external event, such as an OS signal.

use std::future::Future;

use super::{LifecycleReport, RootScope};
use crate::cancellation::Context;
#[cfg(unix)]
use crate::error::{DiError, DiResult};
#[cfg(unix)]
use tokio::signal::unix::signal;
#[cfg(unix)]
use tokio::sync::mpsc;
#[cfg(unix)]
use tokio::task::JoinHandle;

#[cfg(unix)]
pub use tokio::signal::unix::SignalKind;

impl RootScope {
    /// Waits for `event`, then shuts the injector down.
    ///
    /// Returns the event's output along with the shutdown report.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_injector::{Context, RootScope};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let root = RootScope::new();
    /// let (stop, stopped) = oneshot::channel::<&str>();
    ///
    /// stop.send("maintenance").unwrap();
    /// let (reason, report) = root.shutdown_on(&Context::background(), stopped).await;
    ///
    /// assert_eq!(reason.unwrap(), "maintenance");
    /// assert!(report.is_empty());
    /// assert!(root.is_shut_down());
    /// # }
    /// ```
    pub async fn shutdown_on<F>(&self, ctx: &Context, event: F) -> (F::Output, LifecycleReport)
    where
        F: Future,
    {
        let output = event.await;
        self.shared().log("shutdown event received");
        let report = self.shutdown(ctx).await;
        (output, report)
    }

    /// Blocks until one of `signals` is received, then shuts the injector down.
    ///
    /// An empty slice listens for `SIGINT` and `SIGTERM`. Listeners are
    /// installed before waiting and torn down once a signal has been
    /// consumed, before the shutdown starts.
    #[cfg(unix)]
    pub async fn shutdown_on_signals(
        &self,
        ctx: &Context,
        signals: &[SignalKind],
    ) -> DiResult<(SignalKind, LifecycleReport)> {
        let kinds = if signals.is_empty() {
            vec![SignalKind::interrupt(), SignalKind::terminate()]
        } else {
            signals.to_vec()
        };

        let mut listeners = SignalListeners::install(&kinds)?;
        tracing::debug!(signals = kinds.len(), "waiting for shutdown signal");

        let received = async {
            let kind = listeners.next().await;
            listeners.close().await;
            kind
        };

        match self.shutdown_on(ctx, received).await {
            (Some(kind), report) => Ok((kind, report)),
            (None, _) => Err(DiError::Signal("signal listeners stopped".to_string())),
        }
    }
}

/// One task per signal kind, forwarding into a single channel.
#[cfg(unix)]
struct SignalListeners {
    receiver: mpsc::Receiver<SignalKind>,
    tasks: Vec<JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalListeners {
    fn install(kinds: &[SignalKind]) -> DiResult<Self> {
        let mut streams = Vec::with_capacity(kinds.len());
        for kind in kinds.iter().copied() {
            let stream = signal(kind).map_err(|err| DiError::Signal(err.to_string()))?;
            streams.push((kind, stream));
        }

        let (sender, receiver) = mpsc::channel(kinds.len().max(1));
        let tasks = streams
            .into_iter()
            .map(|(kind, mut stream)| {
                let sender = sender.clone();
                tokio::spawn(async move {
                    if stream.recv().await.is_some() {
                        let _ = sender.send(kind).await;
                    }
                })
            })
            .collect();
        Ok(Self { receiver, tasks })
    }

    async fn next(&mut self) -> Option<SignalKind> {
        self.receiver.recv().await
    }

    /// Stops every listener and waits until their signal streams are dropped.
    async fn close(&mut self) {
        self.receiver.close();
        for task in &self.tasks {
            task.abort();
        }
        for task in &mut self.tasks {
            // Cancellation is the expected outcome.
            let _ = task.await;
        }
    }
}
