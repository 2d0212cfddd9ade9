use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{format_iso, parse_birth_date};
use crate::error::EntryError;

/// One tracked person. Only constructed through validation, so a value of
/// this type always has an id, a non-empty name and a real date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredEntry", into = "StoredEntry")]
pub struct BirthdayEntry {
    id: String,
    name: String,
    date: NaiveDate,
    note: Option<String>,
}

/// Wire shape of an entry inside the persisted blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// Unvalidated input for a new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryDraft {
    pub id: Option<String>,
    pub name: String,
    pub date: String,
    pub note: Option<String>,
}

/// Unvalidated changes to an existing entry. `None` keeps the current value;
/// an empty note clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub date: Option<String>,
    pub note: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.date.is_none() && self.note.is_none()
    }
}

impl BirthdayEntry {
    pub fn new(
        id: impl Into<String>,
        name: &str,
        date: &str,
        note: Option<&str>,
    ) -> Result<Self, EntryError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(EntryError::MissingId);
        }
        let name = normalize_name(name)?;
        let date = parse_birth_date(date)?;
        Ok(Self {
            id,
            name,
            date,
            note: note.and_then(normalize_note),
        })
    }

    pub fn from_draft(draft: &EntryDraft, id: String) -> Result<Self, EntryError> {
        Self::new(id, &draft.name, &draft.date, draft.note.as_deref())
    }

    /// Returns the entry with `patch` applied, re-validated as a whole.
    pub fn patched(&self, patch: &EntryPatch) -> Result<Self, EntryError> {
        let name = match &patch.name {
            Some(name) => normalize_name(name)?,
            None => self.name.clone(),
        };
        let date = match &patch.date {
            Some(date) => parse_birth_date(date)?,
            None => self.date,
        };
        let note = match &patch.note {
            Some(note) => normalize_note(note),
            None => self.note.clone(),
        };
        Ok(Self {
            id: self.id.clone(),
            name,
            date,
            note,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

impl TryFrom<StoredEntry> for BirthdayEntry {
    type Error = EntryError;

    fn try_from(raw: StoredEntry) -> Result<Self, Self::Error> {
        Self::new(raw.id, &raw.name, &raw.date, raw.note.as_deref())
    }
}

impl From<BirthdayEntry> for StoredEntry {
    fn from(entry: BirthdayEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            date: format_iso(entry.date),
            note: entry.note,
        }
    }
}

/// `id_` followed by seven characters of a fresh v4 uuid.
pub fn generate_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("id_{}", &simple[..7])
}

fn normalize_name(name: &str) -> Result<String, EntryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EntryError::MissingName);
    }
    Ok(trimmed.to_string())
}

fn normalize_note(note: &str) -> Option<String> {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_trims_and_drops_empty_note() {
        let entry = BirthdayEntry::new("id_1", "  Alice  ", "2024-06-21", Some("   "))
            .expect("valid entry");
        assert_eq!(entry.name(), "Alice");
        assert_eq!(entry.note(), None);
        assert_eq!(entry.date().to_string(), "2024-06-21");
    }

    #[test]
    fn new_rejects_missing_fields() {
        assert_eq!(
            BirthdayEntry::new("id_1", "", "2024-06-21", None),
            Err(EntryError::MissingName)
        );
        assert_eq!(
            BirthdayEntry::new("id_1", "Alice", "", None),
            Err(EntryError::MissingDate)
        );
        assert_eq!(
            BirthdayEntry::new(" ", "Alice", "2024-06-21", None),
            Err(EntryError::MissingId)
        );
    }

    #[test]
    fn serializes_with_iso_date_and_no_empty_note() {
        let entry = BirthdayEntry::new("id_1", "Bob", "20240101", None).expect("valid entry");
        let json = serde_json::to_string(&entry).expect("serialize");
        assert_eq!(json, r#"{"id":"id_1","name":"Bob","date":"2024-01-01"}"#);
    }

    #[test]
    fn deserialization_validates() {
        let ok: BirthdayEntry = serde_json::from_str(
            r#"{"id":"id_1","name":"Jia Chen","date":"2024-06-21","note":"Send card"}"#,
        )
        .expect("valid record");
        assert_eq!(ok.note(), Some("Send card"));

        let bad = serde_json::from_str::<BirthdayEntry>(
            r#"{"id":"id_2","name":"","date":"2024-06-21"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn patch_keeps_unset_fields_and_clears_note() {
        let entry = BirthdayEntry::new("id_1", "Ben", "2024-03-01", Some("Surprise"))
            .expect("valid entry");
        let patched = entry
            .patched(&EntryPatch {
                name: Some("Ben Carter".to_string()),
                date: None,
                note: Some(String::new()),
            })
            .expect("valid patch");
        assert_eq!(patched.id(), "id_1");
        assert_eq!(patched.name(), "Ben Carter");
        assert_eq!(patched.date(), entry.date());
        assert_eq!(patched.note(), None);
    }

    #[test]
    fn patch_with_bad_date_fails() {
        let entry = BirthdayEntry::new("id_1", "Ben", "2024-03-01", None).expect("valid entry");
        let err = entry
            .patched(&EntryPatch {
                date: Some("someday".to_string()),
                ..EntryPatch::default()
            })
            .expect_err("invalid date");
        assert!(matches!(err, EntryError::InvalidDate { .. }));
    }

    #[test]
    fn generated_ids_have_prefix_and_length() {
        let id = generate_id();
        assert!(id.starts_with("id_"));
        assert_eq!(id.len(), 10);
        assert!(id[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
