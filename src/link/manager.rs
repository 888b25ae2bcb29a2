use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use hasslink_api::link::{EntrySource, LinkEntry, LinkForm, LinkOptions};

use crate::error::{ApiError, ApiResult};
use crate::link::bridge::{self, LinkHandle, SourceSubscription};
use crate::link::client::RemoteSwitchClient;
use crate::link::coordinator::SyncCoordinator;
use crate::model::links::LinkStore;
use crate::registry::Registry;

const LINK_DOMAIN: &str = "switch";

struct ActiveLink {
    entry: LinkEntry,
    handle: LinkHandle,
}

/// Lifecycle of all configured links: setup, option edits, removal.
pub struct LinkManager {
    http: reqwest::Client,
    registry: Arc<Mutex<Registry>>,
    store: LinkStore,
    links: BTreeMap<Uuid, ActiveLink>,
}

impl LinkManager {
    #[must_use]
    pub const fn new(http: reqwest::Client, registry: Arc<Mutex<Registry>>, store: LinkStore) -> Self {
        Self {
            http,
            registry,
            store,
            links: BTreeMap::new(),
        }
    }

    fn yaml_entry_id(key: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("hasslink:yaml:{key}").as_bytes())
    }

    /// Attach stored form entries, followed by the links declared in the
    /// config file. Invalid declared links are reported and skipped.
    pub async fn load(&mut self, declared: &BTreeMap<String, LinkForm>) {
        for entry in self.store.load() {
            match entry.config.to_form().validate() {
                Ok(config) => self.attach(LinkEntry { config, ..entry }).await,
                Err(err) => {
                    log::warn!(
                        "Skipping stored link [{}] ({}): {err}",
                        entry.config.name,
                        entry.entry_id
                    );
                }
            }
        }

        for (key, form) in declared {
            let mut form = form.clone();
            if form.name.is_none() {
                form.name = Some(key.clone());
            }
            let config = match form.validate() {
                Ok(config) => config,
                Err(err) => {
                    log::error!("Skipping link [{key}] from config file: {err}");
                    continue;
                }
            };
            let entity_id = self
                .registry
                .lock()
                .await
                .unique_entity_id(LINK_DOMAIN, &config.name);
            let entry = LinkEntry {
                entry_id: Self::yaml_entry_id(key),
                entity_id,
                source: EntrySource::Yaml,
                config,
            };
            self.attach(entry).await;
        }

        log::info!("Loaded {} link(s)", self.links.len());
    }

    async fn attach(&mut self, entry: LinkEntry) {
        let remote = Arc::new(RemoteSwitchClient::new(self.http.clone(), &entry.config));
        let coordinator = Arc::new(SyncCoordinator::new(
            entry.entity_id.clone(),
            &entry.config,
            remote,
            self.registry.clone(),
        ));

        let source = {
            let registry = self.registry.lock().await;
            entry
                .config
                .source_entity_id
                .as_ref()
                .map(|id| SourceSubscription::new(id.clone(), registry.subscribe()))
        };

        // the entity shows up right away, as unknown until the first poll
        coordinator.publish(coordinator.state().await).await;

        let handle = bridge::start(coordinator, entry.config.poll_period(), source);
        self.links
            .insert(entry.entry_id, ActiveLink { entry, handle });
    }

    /// Save the form entries as they will be once `skip` is gone and
    /// `extra` is in place. Callers only change running links after this
    /// succeeds.
    fn persist(&self, skip: Uuid, extra: Option<&LinkEntry>) -> ApiResult<()> {
        let entries = self
            .links
            .values()
            .map(|link| &link.entry)
            .filter(|entry| entry.entry_id != skip)
            .chain(extra);
        self.store.save(entries)
    }

    fn editable(&self, entry_id: Uuid) -> ApiResult<&ActiveLink> {
        let link = self
            .links
            .get(&entry_id)
            .ok_or(ApiError::EntryNotFound(entry_id))?;
        if link.entry.source == EntrySource::Yaml {
            return Err(ApiError::EntryReadOnly(entry_id));
        }
        Ok(link)
    }

    /// Setup flow: validate the form, and start a new link.
    pub async fn create(&mut self, form: &LinkForm) -> ApiResult<LinkEntry> {
        let config = form.validate()?;
        let entity_id = self
            .registry
            .lock()
            .await
            .unique_entity_id(LINK_DOMAIN, &config.name);

        let entry = LinkEntry {
            entry_id: Uuid::new_v4(),
            entity_id,
            source: EntrySource::Form,
            config,
        };
        log::info!(
            "Creating link [{}] ({}) to {}",
            entry.config.name,
            entry.entry_id,
            entry.config.remote_url
        );

        self.persist(entry.entry_id, Some(&entry))?;
        self.attach(entry.clone()).await;
        Ok(entry)
    }

    /// Options flow: merge over the current config, then replace the running
    /// link with a freshly initialized one. The entity id is kept.
    pub async fn update(&mut self, entry_id: Uuid, options: &LinkOptions) -> ApiResult<LinkEntry> {
        let current = self.editable(entry_id)?;
        let config = options.merge_over(&current.entry.config).validate()?;
        let entry = LinkEntry {
            config,
            ..current.entry.clone()
        };

        self.persist(entry_id, Some(&entry))?;

        let Some(mut old) = self.links.remove(&entry_id) else {
            return Err(ApiError::EntryNotFound(entry_id));
        };
        old.handle.stop();
        log::info!("Updating link [{}] ({})", entry.config.name, entry.entry_id);

        self.attach(entry.clone()).await;
        Ok(entry)
    }

    pub async fn remove(&mut self, entry_id: Uuid) -> ApiResult<()> {
        self.editable(entry_id)?;
        self.persist(entry_id, None)?;

        let Some(mut link) = self.links.remove(&entry_id) else {
            return Err(ApiError::EntryNotFound(entry_id));
        };
        link.handle.stop();
        log::info!("Removing link [{}] ({})", link.entry.config.name, entry_id);

        self.registry.lock().await.remove(&link.entry.entity_id);
        Ok(())
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LinkEntry> {
        self.links.values().map(|link| link.entry.clone()).collect()
    }

    #[must_use]
    pub fn get(&self, entry_id: Uuid) -> Option<&LinkEntry> {
        self.links.get(&entry_id).map(|link| &link.entry)
    }

    /// The coordinator publishing `entity_id`, if that entity is a linked switch.
    #[must_use]
    pub fn coordinator_for(&self, entity_id: &str) -> Option<Arc<SyncCoordinator>> {
        self.links
            .values()
            .find(|link| link.entry.entity_id == entity_id)
            .map(|link| link.handle.coordinator().clone())
    }

    pub fn shutdown(&mut self) {
        log::info!("Detaching {} link(s)", self.links.len());
        for link in self.links.values_mut() {
            link.handle.stop();
        }
        self.links.clear();
    }
}
