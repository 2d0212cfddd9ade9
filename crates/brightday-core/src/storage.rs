use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// String-keyed blob storage: `getItem` / `setItem` and nothing else.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: String) -> anyhow::Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        (**self).set_item(key, value)
    }
}

/// Keys and values kept in one JSON object file.
#[derive(Debug)]
pub struct FileStore {
    pub path: PathBuf,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "store.json";

    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join(Self::FILE_NAME);
        info!(path = %path.display(), "opened file store");
        Ok(Self { path })
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), keys = map.len(), "saving store atomically");
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, map)?;
        writeln!(temp)?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "store file unreadable; starting a fresh one");
                BTreeMap::new()
            }
        };
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }
}

/// In-process store. `with_failing_writes` makes every `set_item` fail, the
/// way a full or disabled browser storage would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, key: &str, value: impl Into<String>) -> Self {
        self.items.insert(key.to_string(), value.into());
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        if self.fail_writes {
            return Err(anyhow!("storage quota exceeded writing {key}"));
        }
        self.items.insert(key.to_string(), value);
        Ok(())
    }
}
