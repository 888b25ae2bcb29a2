use std::fs::File;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use hasslink_api::link::{EntrySource, LinkEntry};

use crate::error::ApiResult;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct LinksFile {
    #[serde(default)]
    entries: Vec<LinkEntry>,
}

/// Persistence for links created through the setup form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkStore {
    file: Utf8PathBuf,
}

impl LinkStore {
    #[must_use]
    pub const fn new(file: Utf8PathBuf) -> Self {
        Self { file }
    }

    /// Load stored entries. A missing file means no entries; a broken one is
    /// reported and ignored.
    #[must_use]
    pub fn load(&self) -> Vec<LinkEntry> {
        if !self.file.is_file() {
            log::debug!("No links file [{}] found, starting empty", self.file);
            return vec![];
        }

        match File::open(&self.file).and_then(|fd| {
            serde_yml::from_reader::<_, LinksFile>(fd).map_err(std::io::Error::other)
        }) {
            Ok(links) => links
                .entries
                .into_iter()
                .filter(|entry| entry.source == EntrySource::Form)
                .collect(),
            Err(err) => {
                log::warn!("Failed to parse {}, ignoring stored links: {}", self.file, err);
                vec![]
            }
        }
    }

    pub fn save<'a>(&self, entries: impl IntoIterator<Item = &'a LinkEntry>) -> ApiResult<()> {
        let links = LinksFile {
            entries: entries
                .into_iter()
                .filter(|entry| entry.source == EntrySource::Form)
                .cloned()
                .collect(),
        };
        let file = File::create(&self.file)?;
        serde_yml::to_writer(file, &links)?;
        log::debug!("Saved {} link(s) to [{}]", links.entries.len(), self.file);
        Ok(())
    }
}
