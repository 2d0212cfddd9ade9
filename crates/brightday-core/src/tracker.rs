use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::datastore::BirthdayStore;
use crate::datetime::{LeapDayPolicy, format_iso};
use crate::entry::{BirthdayEntry, EntryDraft, EntryPatch, generate_id};
use crate::error::EntryError;
use crate::filter::{ListQuery, ListedEntry, Summary, build_view};
use crate::storage::KeyValueStore;

/// The application context: the collection, where it is persisted, and how
/// leap-day birthdays resolve.
///
/// Every mutation validates first, then changes the collection, then saves
/// it whole. Saving is best effort; see [`Tracker::last_save_ok`].
#[derive(Debug)]
pub struct Tracker<S> {
    entries: Vec<BirthdayEntry>,
    store: BirthdayStore<S>,
    policy: LeapDayPolicy,
    last_save_ok: bool,
}

impl<S: KeyValueStore> Tracker<S> {
    #[tracing::instrument(skip(store))]
    pub fn open(store: S, policy: LeapDayPolicy) -> Self {
        let store = BirthdayStore::new(store);
        let entries = store.load();
        info!(count = entries.len(), %policy, "opened tracker");
        Self {
            entries,
            store,
            policy,
            last_save_ok: true,
        }
    }

    pub fn entries(&self) -> &[BirthdayEntry] {
        &self.entries
    }

    pub fn policy(&self) -> LeapDayPolicy {
        self.policy
    }

    pub fn store(&self) -> &BirthdayStore<S> {
        &self.store
    }

    /// Whether the most recent save reached the store.
    pub fn last_save_ok(&self) -> bool {
        self.last_save_ok
    }

    pub fn get(&self, id: &str) -> Option<&BirthdayEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub fn add(&mut self, draft: EntryDraft) -> Result<&BirthdayEntry, EntryError> {
        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                if self.get(id).is_some() {
                    return Err(EntryError::DuplicateId { id: id.to_string() });
                }
                id.to_string()
            }
            _ => self.fresh_id(),
        };

        let entry = BirthdayEntry::from_draft(&draft, id)?;
        debug!(id = entry.id(), date = %entry.date(), "adding entry");
        self.entries.push(entry);
        self.persist();
        Ok(&self.entries[self.entries.len() - 1])
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update(&mut self, id: &str, patch: &EntryPatch) -> Result<&BirthdayEntry, EntryError> {
        let idx = self.index_of(id)?;
        let updated = self.entries[idx].patched(patch)?;
        debug!(id, "updating entry");
        self.entries[idx] = updated;
        self.persist();
        Ok(&self.entries[idx])
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Result<BirthdayEntry, EntryError> {
        let idx = self.index_of(id)?;
        let removed = self.entries.remove(idx);
        debug!(id, remaining = self.entries.len(), "removed entry");
        self.persist();
        Ok(removed)
    }

    /// Appends three demo people: one in three days, one in ten, one today.
    #[tracing::instrument(skip(self))]
    pub fn import_samples(&mut self, today: NaiveDate) -> usize {
        let samples = [
            ("Alice Morgan", 3, "Brunch at 11"),
            ("Ben Carter", 10, "Surprise"),
            ("Jia Chen", 0, "Send card"),
        ];

        let mut added = 0;
        for (name, offset, note) in samples {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                warn!(offset, "sample date out of range; skipping");
                continue;
            };
            let id = self.fresh_id();
            match BirthdayEntry::new(id, name, &format_iso(date), Some(note)) {
                Ok(entry) => {
                    self.entries.push(entry);
                    added += 1;
                }
                Err(err) => warn!(error = %err, name, "sample entry rejected"),
            }
        }

        if added > 0 {
            self.persist();
        }
        info!(added, "imported sample entries");
        added
    }

    pub fn view(&self, query: &ListQuery, today: NaiveDate) -> Vec<ListedEntry<'_>> {
        build_view(&self.entries, query, today, self.policy)
    }

    pub fn summary(&self, today: NaiveDate) -> Summary<'_> {
        Summary::compute(&self.entries, today, self.policy)
    }

    fn index_of(&self, id: &str) -> Result<usize, EntryError> {
        self.entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| EntryError::NotFound { id: id.to_string() })
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = generate_id();
            if self.get(&id).is_none() {
                return id;
            }
            debug!(%id, "generated id collided; drawing again");
        }
    }

    fn persist(&mut self) {
        match self.store.save(&self.entries) {
            Ok(()) => self.last_save_ok = true,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "save failed; keeping in-memory changes");
                self.last_save_ok = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::datastore::STORAGE_KEY;
    use crate::filter::FilterMode;
    use crate::storage::MemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 20).expect("valid date")
    }

    fn draft(name: &str, date: &str) -> EntryDraft {
        EntryDraft {
            name: name.to_string(),
            date: date.to_string(),
            ..EntryDraft::default()
        }
    }

    #[test]
    fn add_assigns_id_and_persists() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        let id = tracker
            .add(draft("Alice", "2024-06-21"))
            .expect("add")
            .id()
            .to_string();
        assert!(id.starts_with("id_"));

        let raw = tracker
            .store()
            .inner()
            .get_item(STORAGE_KEY)
            .expect("get")
            .expect("stored");
        assert!(raw.contains(&id));

        let view = tracker.view(&ListQuery::default(), today());
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].days, 1);
    }

    #[test]
    fn add_with_empty_name_changes_nothing() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        tracker.add(draft("Bob", "2024-01-01")).expect("add");

        let err = tracker.add(draft("   ", "2024-06-21")).expect_err("rejected");
        assert_eq!(err, EntryError::MissingName);
        assert_eq!(tracker.entries().len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_explicit_id() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        let mut first = draft("Bob", "2024-01-01");
        first.id = Some("id_bob".to_string());
        tracker.add(first.clone()).expect("first add");

        let err = tracker.add(first).expect_err("duplicate");
        assert_eq!(
            err,
            EntryError::DuplicateId {
                id: "id_bob".to_string()
            }
        );
    }

    #[test]
    fn update_validates_before_mutating() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        let id = tracker
            .add(draft("Ben", "2024-03-01"))
            .expect("add")
            .id()
            .to_string();

        let bad = EntryPatch {
            date: Some("31/31/31".to_string()),
            ..EntryPatch::default()
        };
        assert!(tracker.update(&id, &bad).is_err());
        assert_eq!(tracker.entries()[0].date().to_string(), "2024-03-01");

        let good = EntryPatch {
            note: Some("Surprise".to_string()),
            ..EntryPatch::default()
        };
        let updated = tracker.update(&id, &good).expect("update");
        assert_eq!(updated.note(), Some("Surprise"));

        assert_eq!(
            tracker.update("id_missing", &good).map(|e| e.id().to_string()),
            Err(EntryError::NotFound {
                id: "id_missing".to_string()
            })
        );
    }

    #[test]
    fn remove_drops_entry_and_persists() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        let id = tracker
            .add(draft("Ben", "2024-03-01"))
            .expect("add")
            .id()
            .to_string();

        let removed = tracker.remove(&id).expect("remove");
        assert_eq!(removed.name(), "Ben");
        assert!(tracker.entries().is_empty());
        assert!(tracker.store().load().is_empty());
        assert!(tracker.remove(&id).is_err());
    }

    #[test]
    fn failed_save_keeps_in_memory_state() {
        let mut tracker = Tracker::open(
            MemoryStore::new().with_failing_writes(),
            LeapDayPolicy::default(),
        );
        tracker.add(draft("Alice", "2024-06-21")).expect("add still succeeds");
        assert_eq!(tracker.entries().len(), 1);
        assert!(!tracker.last_save_ok());
    }

    #[test]
    fn samples_land_today_and_later() {
        let mut tracker = Tracker::open(MemoryStore::new(), LeapDayPolicy::default());
        assert_eq!(tracker.import_samples(today()), 3);

        let todays = tracker.view(
            &ListQuery {
                filter: FilterMode::Today,
                ..ListQuery::default()
            },
            today(),
        );
        assert_eq!(todays.len(), 1);
        assert_eq!(todays[0].entry.name(), "Jia Chen");

        let summary = tracker.summary(today());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.this_week, 2);
    }
}
