use chrono::NaiveDate;
use thiserror::Error;

/// Why an entry could not be created, changed or found.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("an id is required")]
    MissingId,

    #[error("a name is required")]
    MissingName,

    #[error("a date is required")]
    MissingDate,

    #[error("invalid date \"{input}\" (expected YYYY-MM-DD or YYYYMMDD)")]
    InvalidDate { input: String },

    #[error("id {id} is already in use")]
    DuplicateId { id: String },

    #[error("no birthday with id {id}")]
    NotFound { id: String },

    #[error("{date} is too close to the end of the calendar to find a next birthday")]
    OutOfRange { date: NaiveDate },
}
