use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::broadcast::{Receiver, Sender};

use hasslink_api::state::{EntityState, StateChangedEvent};

/// Local entity states, and the change event bus that linked switches
/// listen on.
#[derive(Clone, Debug)]
pub struct Registry {
    entities: BTreeMap<String, EntityState>,
    events: Sender<StateChangedEvent>,
}

impl Registry {
    const EVENTS_BUFFER_SIZE: usize = 64;

    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            events: Sender::new(Self::EVENTS_BUFFER_SIZE),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<StateChangedEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    #[must_use]
    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    #[must_use]
    pub fn list(&self) -> Vec<EntityState> {
        self.entities.values().cloned().collect()
    }

    fn notify(&self, event: StateChangedEvent) {
        log::trace!(
            "State of {} changed to {:?}",
            event.entity_id,
            event.new_state_str()
        );
        // no receivers is fine
        let _ = self.events.send(event);
    }

    /// Create or update an entity. Returns the new state, and whether the
    /// entity was created by this call.
    pub fn set_state(
        &mut self,
        entity_id: &str,
        state: &str,
        attributes: Map<String, Value>,
    ) -> (EntityState, bool) {
        let now = Utc::now();
        let old = self.entities.get(entity_id).cloned();

        let last_changed = match &old {
            Some(old) if old.state == state => old.last_changed,
            _ => now,
        };

        let new = EntityState {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            attributes,
            last_changed,
            last_updated: now,
        };
        self.entities.insert(entity_id.to_string(), new.clone());

        let created = old.is_none();
        if old.as_ref().is_none_or(|old| old.state != state) {
            self.notify(StateChangedEvent {
                entity_id: entity_id.to_string(),
                old_state: old,
                new_state: Some(new.clone()),
            });
        }

        (new, created)
    }

    pub fn remove(&mut self, entity_id: &str) -> Option<EntityState> {
        let old = self.entities.remove(entity_id)?;
        self.notify(StateChangedEvent {
            entity_id: entity_id.to_string(),
            old_state: Some(old.clone()),
            new_state: None,
        });
        Some(old)
    }

    fn slugify(text: &str) -> String {
        let mut out = String::new();
        let mut last_sep = false;
        for ch in text.chars() {
            let low = ch.to_ascii_lowercase();
            if low.is_ascii_alphanumeric() {
                out.push(low);
                last_sep = false;
            } else if !last_sep {
                out.push('_');
                last_sep = true;
            }
        }
        out.trim_matches('_').to_string()
    }

    /// Pick an entity id of the form `{domain}.{slug}` that is not in use yet.
    #[must_use]
    pub fn unique_entity_id(&self, domain: &str, name: &str) -> String {
        let mut slug = Self::slugify(name);
        if slug.is_empty() {
            slug = "link".to_string();
        }

        let base = format!("{domain}.{slug}");
        if !self.contains(&base) {
            return base;
        }

        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|id| !self.contains(id))
            .unwrap_or(base)
    }
}
