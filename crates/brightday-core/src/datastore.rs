use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::entry::BirthdayEntry;
use crate::storage::KeyValueStore;

/// Versioned key holding the whole collection.
pub const STORAGE_KEY: &str = "brightday.birthdays.v1";

/// The birthday collection as one JSON array under [`STORAGE_KEY`].
#[derive(Debug)]
pub struct BirthdayStore<S> {
    store: S,
}

impl<S: KeyValueStore> BirthdayStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Loads the collection. Never fails: a missing, unreadable or
    /// non-array blob is an empty collection, and records that do not
    /// validate are skipped.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Vec<BirthdayEntry> {
        let raw = match self.store.get_item(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = STORAGE_KEY, "no stored collection");
                return vec![];
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "load failed; starting empty");
                return vec![];
            }
        };

        let records = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(other) => {
                warn!(kind = json_kind(&other), "stored collection is not an array; ignoring");
                return vec![];
            }
            Err(err) => {
                warn!(error = %err, "stored collection is not valid json; ignoring");
                return vec![];
            }
        };

        let mut out = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<BirthdayEntry>(record) {
                Ok(entry) if out.iter().any(|e: &BirthdayEntry| e.id() == entry.id()) => {
                    warn!(index = idx, id = entry.id(), "duplicate id in stored collection; skipping");
                }
                Ok(entry) => out.push(entry),
                Err(err) => {
                    warn!(index = idx, error = %err, "invalid stored record; skipping");
                }
            }
        }

        debug!(count = out.len(), "loaded collection");
        out
    }

    #[tracing::instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn save(&mut self, entries: &[BirthdayEntry]) -> anyhow::Result<()> {
        let serialized =
            serde_json::to_string(entries).context("failed to serialize collection")?;
        self.store
            .set_item(STORAGE_KEY, serialized)
            .with_context(|| format!("failed to write {STORAGE_KEY}"))?;
        info!(count = entries.len(), "saved collection");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
