use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use hasslink_api::state::{STATE_OFF, STATE_ON, StateChangedEvent};

use crate::link::coordinator::SyncCoordinator;

/// Change events of the local entity whose state is pushed to the remote.
pub struct SourceSubscription {
    entity_id: String,
    events: Receiver<StateChangedEvent>,
}

impl SourceSubscription {
    #[must_use]
    pub const fn new(entity_id: String, events: Receiver<StateChangedEvent>) -> Self {
        Self { entity_id, events }
    }

    /// Next change event for the source entity, or `None` once the event
    /// bus is gone.
    async fn next_change(&mut self) -> Option<StateChangedEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.entity_id == self.entity_id => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => {
                    log::warn!(
                        "Missed {count} state change events while watching {}",
                        self.entity_id
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

async fn next_change(source: &mut Option<SourceSubscription>) -> Option<StateChangedEvent> {
    match source {
        Some(sub) => sub.next_change().await,
        None => std::future::pending().await,
    }
}

/// Disposer for a running link. Stopping it cancels the poll timer and the
/// source subscription; a remote request already in flight is left to finish
/// on its own.
pub struct LinkHandle {
    coordinator: Arc<SyncCoordinator>,
    task: Option<JoinHandle<()>>,
}

impl LinkHandle {
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn stop(&mut self) {
        if self.task.take().is_some() {
            log::debug!("[{}] Detaching link", self.coordinator.name());
        }
        self.coordinator.retired().cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.coordinator.retired().is_cancelled()
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Attach a coordinator: poll the remote every `period` (starting right
/// away), and forward on/off changes of the source entity, if any.
#[must_use]
pub fn start(
    coordinator: Arc<SyncCoordinator>,
    period: Duration,
    source: Option<SourceSubscription>,
) -> LinkHandle {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!(
        "[{}] Attaching link as {} (poll every {}s{})",
        coordinator.name(),
        coordinator.entity_id(),
        period.as_secs(),
        source
            .as_ref()
            .map(|src| format!(", following {}", src.entity_id))
            .unwrap_or_default()
    );

    let task = tokio::spawn(event_loop(
        coordinator.clone(),
        ticker,
        source,
        coordinator.retired().clone(),
    ));

    LinkHandle {
        coordinator,
        task: Some(task),
    }
}

async fn event_loop(
    coordinator: Arc<SyncCoordinator>,
    mut ticker: Interval,
    mut source: Option<SourceSubscription>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            _ = ticker.tick() => {
                coordinator.poll().await;
            }

            event = next_change(&mut source) => {
                let Some(event) = event else {
                    log::debug!("[{}] Event bus closed, no longer following source", coordinator.name());
                    source = None;
                    continue;
                };

                match event.new_state_str() {
                    Some(STATE_ON) => {
                        coordinator.turn_on().await;
                    }
                    Some(STATE_OFF) => {
                        coordinator.turn_off().await;
                    }
                    other => {
                        log::trace!(
                            "[{}] Ignoring source state {other:?}",
                            coordinator.name()
                        );
                    }
                }
            }
        }
    }
}
