use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use hasslink_api::link::LinkConfig;
use hasslink_api::state::SwitchState;

use crate::link::client::{RemoteOutcome, RemoteSwitch};
use crate::registry::Registry;

/// Owns the mirrored state of one linked switch.
///
/// Every remote request sequence (a bare read, or a write followed by its
/// confirming read) runs while holding `state`, so at most one is in flight
/// at any time. The cached state only moves on a confirmed read.
pub struct SyncCoordinator {
    name: String,
    entity_id: String,
    attributes: Map<String, Value>,
    remote: Arc<dyn RemoteSwitch>,
    state: Mutex<SwitchState>,
    registry: Arc<Mutex<Registry>>,
    retired: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(
        entity_id: String,
        config: &LinkConfig,
        remote: Arc<dyn RemoteSwitch>,
        registry: Arc<Mutex<Registry>>,
    ) -> Self {
        let mut attributes = Map::new();
        attributes.insert(
            "friendly_name".to_string(),
            Value::String(config.name.clone()),
        );
        attributes.insert(
            "remote_entity_id".to_string(),
            Value::String(config.remote_entity_id.clone()),
        );
        if let Some(source) = &config.source_entity_id {
            attributes.insert(
                "source_entity_id".to_string(),
                Value::String(source.clone()),
            );
        }

        Self {
            name: config.name.clone(),
            entity_id,
            attributes,
            remote,
            state: Mutex::new(SwitchState::Unknown),
            registry,
            retired: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Cancelled once the link is detached. After that, nothing is
    /// published anymore.
    #[must_use]
    pub fn retired(&self) -> &CancellationToken {
        &self.retired
    }

    pub async fn state(&self) -> SwitchState {
        *self.state.lock().await
    }

    async fn refresh_locked(&self, state: &mut SwitchState) {
        match self.remote.fetch_state().await {
            RemoteOutcome::Confirmed(on) => {
                let new = SwitchState::from_on(on);
                if *state != new {
                    log::debug!("[{}] Remote state is now {new}", self.name);
                }
                *state = new;
            }
            RemoteOutcome::Unreachable(err) => {
                log::warn!("[{}] Remote unreachable: {err}", self.name);
            }
            RemoteOutcome::ProtocolError(err) => {
                log::warn!("[{}] Unexpected reply from remote: {err}", self.name);
            }
        }
    }

    /// Read the remote state, and update the cached state if the read
    /// succeeded.
    pub async fn refresh(&self) -> SwitchState {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await;
        *state
    }

    async fn switch(&self, on: bool) -> SwitchState {
        let mut state = self.state.lock().await;

        match self.remote.set_state(on).await {
            RemoteOutcome::Confirmed(()) => {
                log::debug!(
                    "[{}] Requested remote turn_{}",
                    self.name,
                    if on { "on" } else { "off" }
                );
            }
            RemoteOutcome::Unreachable(err) | RemoteOutcome::ProtocolError(err) => {
                log::warn!("[{}] Remote write failed: {err}", self.name);
            }
        }

        // the write itself never changes local state, only the confirmed read does
        self.refresh_locked(&mut state).await;
        let current = *state;
        drop(state);

        self.publish(current).await;
        current
    }

    pub async fn turn_on(&self) -> SwitchState {
        self.switch(true).await
    }

    pub async fn turn_off(&self) -> SwitchState {
        self.switch(false).await
    }

    /// Timer tick: refresh, then publish whatever is cached.
    pub async fn poll(&self) -> SwitchState {
        let current = self.refresh().await;
        self.publish(current).await;
        current
    }

    /// Write the given state into the registry, as this link's entity.
    pub async fn publish(&self, state: SwitchState) {
        let mut registry = self.registry.lock().await;
        // the link may have been retired while waiting for the lock
        if self.retired.is_cancelled() {
            return;
        }
        registry.set_state(&self.entity_id, state.as_str(), self.attributes.clone());
    }
}
