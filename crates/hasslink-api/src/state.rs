use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_UNKNOWN: &str = "unknown";

/// Mirrored state of a linked switch.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    #[default]
    Unknown,
    On,
    Off,
}

impl SwitchState {
    #[must_use]
    pub const fn from_on(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    #[must_use]
    pub const fn is_on(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::On => Some(true),
            Self::Off => Some(false),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => STATE_UNKNOWN,
            Self::On => STATE_ON,
            Self::Off => STATE_OFF,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub last_changed: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Emitted whenever an entity appears, disappears, or changes its state
/// string. Attribute-only updates are not reported.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: Option<EntityState>,
}

impl StateChangedEvent {
    #[must_use]
    pub fn new_state_str(&self) -> Option<&str> {
        self.new_state.as_ref().map(|st| st.state.as_str())
    }
}

/// Body of `POST /api/states/{entity_id}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StateUpdate {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Body of `POST /api/services/switch/{service}`
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServiceCall {
    pub entity_id: String,
}
