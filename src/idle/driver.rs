use super::config::IdleTimeoutConfig;
use super::monitor::{IdleEvent, IdleMonitor};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

const SIGNAL_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleSignal {
    Activity,
    Acknowledge,
}

/// Feeds user activity into a running [`IdleTimeoutDriver`].
///
/// Dropping every handle stops the driver without logging out.
#[derive(Debug, Clone)]
pub struct IdleHandle {
    tx: mpsc::Sender<IdleSignal>,
}

impl IdleHandle {
    /// Returns `false` if the driver has stopped.
    pub async fn activity(&self) -> bool {
        self.tx.send(IdleSignal::Activity).await.is_ok()
    }

    /// Returns `false` if the driver has stopped.
    pub async fn acknowledge(&self) -> bool {
        self.tx.send(IdleSignal::Acknowledge).await.is_ok()
    }
}

/// Runs an [`IdleMonitor`] on tokio timers.
///
/// # Example
///
/// ```rust,ignore
/// let mut driver = IdleTimeoutDriver::spawn(config, move || async move {
///     sessions.invalidate(&session_id).await;
/// });
///
/// while let Some(event) = driver.events.recv().await {
///     match event {
///         IdleEvent::WarningShown { countdown } => show_banner(countdown),
///         IdleEvent::LoggedOut { redirect_to } => redirect(&redirect_to),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct IdleTimeoutDriver {
    pub handle: IdleHandle,
    pub events: mpsc::Receiver<IdleEvent>,
    pub task: JoinHandle<()>,
}

impl IdleTimeoutDriver {
    /// Start the timers. `on_logout` runs exactly once, before the
    /// `LoggedOut` event is emitted, and only if the session times out.
    pub fn spawn<F, Fut>(config: IdleTimeoutConfig, on_logout: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, signals) = mpsc::channel(SIGNAL_BUFFER);
        let (events_tx, events) = mpsc::channel(SIGNAL_BUFFER);
        let monitor = IdleMonitor::new(config, Instant::now());
        let task = tokio::spawn(run(monitor, signals, events_tx, on_logout));

        Self {
            handle: IdleHandle { tx },
            events,
            task,
        }
    }
}

async fn run<F, Fut>(
    mut monitor: IdleMonitor,
    mut signals: mpsc::Receiver<IdleSignal>,
    events: mpsc::Sender<IdleEvent>,
    on_logout: F,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut on_logout = Some(on_logout);

    while let Some(deadline) = monitor.next_deadline() {
        tokio::select! {
            () = sleep_until(deadline) => {
                let Some(event) = monitor.poll(Instant::now()) else {
                    continue;
                };
                if let IdleEvent::LoggedOut { .. } = event {
                    if let Some(callback) = on_logout.take() {
                        callback().await;
                    }
                    tracing::info!(target: "session.idle.logged_out", "Idle session logged out");
                } else {
                    tracing::debug!(target: "session.idle.warning", "Idle warning shown");
                }
                // The receiver may be gone; the logout has already happened.
                let _ = events.send(event).await;
            }
            signal = signals.recv() => match signal {
                Some(IdleSignal::Activity) => {
                    monitor.record_activity(Instant::now());
                }
                Some(IdleSignal::Acknowledge) => {
                    monitor.acknowledge(Instant::now());
                    tracing::debug!(target: "session.idle.acknowledged", "Idle warning acknowledged");
                }
                None => break,
            },
        }
    }
}
