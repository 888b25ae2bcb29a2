use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_NAME: &str = "Linked Switch";
pub const DEFAULT_POLL_INTERVAL: u32 = 5;
pub const MIN_POLL_INTERVAL: u32 = 1;
pub const MAX_POLL_INTERVAL: u32 = 3600;

pub const FIELD_REMOTE_URL: &str = "remote_url";
pub const FIELD_REMOTE_ENTITY_ID: &str = "remote_entity_id";
pub const FIELD_POLL_INTERVAL: &str = "poll_interval";

pub const ERR_INVALID_URL: &str = "invalid_url";
pub const ERR_INVALID_POLL_INTERVAL: &str = "invalid_poll_interval";
pub const ERR_REQUIRED: &str = "required";

/// Validated configuration of a single link between a local and a remote switch.
#[derive(Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkConfig {
    pub name: String,
    pub remote_url: Url,
    pub remote_token: String,
    pub remote_entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    pub poll_interval: u32,
}

impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("name", &self.name)
            .field("remote_url", &self.remote_url.as_str())
            .field("remote_token", &"<<REDACTED>>")
            .field("remote_entity_id", &self.remote_entity_id)
            .field("source_entity_id", &self.source_entity_id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl LinkConfig {
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_interval))
    }

    /// Render this config back into form input, e.g. as the starting point
    /// for an options edit.
    #[must_use]
    pub fn to_form(&self) -> LinkForm {
        LinkForm {
            name: Some(self.name.clone()),
            remote_url: self.remote_url.to_string(),
            remote_token: self.remote_token.clone(),
            remote_entity_id: self.remote_entity_id.clone(),
            source_entity_id: self.source_entity_id.clone(),
            poll_interval: Some(i64::from(self.poll_interval)),
        }
    }

    #[must_use]
    pub fn public(&self) -> LinkConfigPublic {
        LinkConfigPublic {
            name: self.name.clone(),
            remote_url: self.remote_url.to_string(),
            remote_entity_id: self.remote_entity_id.clone(),
            source_entity_id: self.source_entity_id.clone(),
            poll_interval: self.poll_interval,
            token_present: !self.remote_token.is_empty(),
        }
    }
}

/// [`LinkConfig`] as shown to api clients: the token is never echoed back.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkConfigPublic {
    pub name: String,
    pub remote_url: String,
    pub remote_entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    pub poll_interval: u32,
    pub token_present: bool,
}

/// Raw setup form input, before validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub remote_url: String,
    pub remote_token: String,
    pub remote_entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<i64>,
}

/// Field name -> error code, as reported back to the form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Error)]
#[error("Invalid link configuration: {}", self.describe())]
pub struct FormErrors(pub BTreeMap<String, String>);

impl FormErrors {
    fn add(&mut self, field: &str, code: &str) {
        self.0.insert(field.to_string(), code.to_string());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(|(field, code)| format!("{field}={code}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
}

impl LinkForm {
    fn parse_url(raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return None;
        }
        Url::parse(raw.trim_end_matches('/')).ok()
    }

    pub fn validate(&self) -> Result<LinkConfig, FormErrors> {
        let mut errors = FormErrors::default();

        let remote_url = Self::parse_url(&self.remote_url);
        if remote_url.is_none() {
            errors.add(FIELD_REMOTE_URL, ERR_INVALID_URL);
        }

        let remote_entity_id = self.remote_entity_id.trim();
        if remote_entity_id.is_empty() {
            errors.add(FIELD_REMOTE_ENTITY_ID, ERR_REQUIRED);
        }

        let poll_interval = self
            .poll_interval
            .unwrap_or_else(|| i64::from(DEFAULT_POLL_INTERVAL));
        let poll_interval = u32::try_from(poll_interval)
            .ok()
            .filter(|x| (MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(x));
        if poll_interval.is_none() {
            errors.add(FIELD_POLL_INTERVAL, ERR_INVALID_POLL_INTERVAL);
        }

        match (remote_url, poll_interval) {
            (Some(remote_url), Some(poll_interval)) if errors.is_empty() => Ok(LinkConfig {
                name: non_empty(self.name.as_deref()).unwrap_or_else(|| DEFAULT_NAME.to_string()),
                remote_url,
                remote_token: self.remote_token.trim().to_string(),
                remote_entity_id: remote_entity_id.to_string(),
                source_entity_id: non_empty(self.source_entity_id.as_deref()),
                poll_interval,
            }),
            _ => Err(errors),
        }
    }
}

/// Partial form input for editing an existing link. Missing fields keep
/// their current value; an empty `source_entity_id` clears it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<i64>,
}

impl LinkOptions {
    #[must_use]
    pub fn merge_over(&self, current: &LinkConfig) -> LinkForm {
        let mut form = current.to_form();
        if let Some(name) = &self.name {
            form.name = Some(name.clone());
        }
        if let Some(remote_url) = &self.remote_url {
            form.remote_url.clone_from(remote_url);
        }
        if let Some(remote_token) = &self.remote_token {
            form.remote_token.clone_from(remote_token);
        }
        if let Some(remote_entity_id) = &self.remote_entity_id {
            form.remote_entity_id.clone_from(remote_entity_id);
        }
        if let Some(source_entity_id) = &self.source_entity_id {
            form.source_entity_id = Some(source_entity_id.clone());
        }
        if let Some(poll_interval) = self.poll_interval {
            form.poll_interval = Some(poll_interval);
        }
        form
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Declared in the static config file
    Yaml,
    /// Created through the setup form
    Form,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkEntry {
    pub entry_id: Uuid,
    pub entity_id: String,
    pub source: EntrySource,
    pub config: LinkConfig,
}

impl LinkEntry {
    #[must_use]
    pub fn public(&self) -> LinkEntryPublic {
        LinkEntryPublic {
            entry_id: self.entry_id,
            entity_id: self.entity_id.clone(),
            source: self.source,
            title: self.config.name.clone(),
            config: self.config.public(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LinkEntryPublic {
    pub entry_id: Uuid,
    pub entity_id: String,
    pub source: EntrySource,
    pub title: String,
    pub config: LinkConfigPublic,
}
