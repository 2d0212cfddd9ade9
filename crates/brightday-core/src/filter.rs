use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  NaiveDate
};
use tracing::{
  trace,
  warn
};

use crate::datetime::{
  LeapDayPolicy,
  days_until
};
use crate::entry::BirthdayEntry;

/// Upper bound (inclusive) of the
/// `this-week` window.
pub const THIS_WEEK_DAYS: u32 = 7;

/// How many entries the this-month list
/// shows.
pub const MONTH_LIST_LIMIT: usize = 6;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum FilterMode {
  #[default]
  All,
  Today,
  ThisWeek
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum SortMode {
  #[default]
  Soonest,
  Name
}

impl FilterMode {
  #[must_use]
  pub fn keeps(self, days: u32) -> bool {
    match self {
      | Self::All => true,
      | Self::Today => days == 0,
      | Self::ThisWeek => {
        days <= THIS_WEEK_DAYS
      }
    }
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "today" => Ok(Self::Today),
      | "this-week" | "thisweek"
      | "week" => Ok(Self::ThisWeek),
      | other => {
        Err(anyhow!(
          "unknown filter: {other} \
           (expected all, today or \
           this-week)"
        ))
      }
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::All => "all",
      | Self::Today => "today",
      | Self::ThisWeek => "this-week"
    })
  }
}

impl FromStr for SortMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "soonest" | "soon" | "days" => {
        Ok(Self::Soonest)
      }
      | "name" => Ok(Self::Name),
      | other => {
        Err(anyhow!(
          "unknown sort: {other} \
           (expected soonest or name)"
        ))
      }
    }
  }
}

impl fmt::Display for SortMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Self::Soonest => "soonest",
      | Self::Name => "name"
    })
  }
}

/// Search text plus filter and sort
/// mode.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct ListQuery {
  pub search: String,
  pub filter: FilterMode,
  pub sort:   SortMode
}

/// An entry with its computed
/// days-until.
#[derive(Debug, Clone, Copy)]
pub struct ListedEntry<'a> {
  pub entry: &'a BirthdayEntry,
  pub days:  u32
}

/// Pairs each entry with its days-until.
/// Entries with no representable next
/// occurrence are left out.
#[must_use]
pub fn annotate(
  entries: &[BirthdayEntry],
  today: NaiveDate,
  policy: LeapDayPolicy
) -> Vec<ListedEntry<'_>> {
  entries
    .iter()
    .filter_map(|entry| {
      match days_until(
        entry.date(),
        today,
        policy
      ) {
        | Ok(days) => {
          Some(ListedEntry {
            entry,
            days
          })
        }
        | Err(err) => {
          warn!(
            id = entry.id(),
            error = %err,
            "skipping entry"
          );
          None
        }
      }
    })
    .collect()
}

/// Annotates, sorts, then filters by
/// mode and search text.
#[tracing::instrument(skip(
  entries, today, policy
))]
#[must_use]
pub fn build_view<'a>(
  entries: &'a [BirthdayEntry],
  query: &ListQuery,
  today: NaiveDate,
  policy: LeapDayPolicy
) -> Vec<ListedEntry<'a>> {
  let mut rows =
    annotate(entries, today, policy);

  // sort_by is stable; ties keep
  // collection order
  match query.sort {
    | SortMode::Name => {
      rows.sort_by(|a, b| {
        compare_names(
          a.entry.name(),
          b.entry.name()
        )
      });
    }
    | SortMode::Soonest => {
      rows.sort_by_key(|row| row.days);
    }
  }

  let needle =
    query.search.trim().to_lowercase();
  let view: Vec<ListedEntry<'a>> = rows
    .into_iter()
    .filter(|row| {
      query.filter.keeps(row.days)
    })
    .filter(|row| {
      matches_search(row.entry, &needle)
    })
    .collect();

  trace!(
    total = entries.len(),
    shown = view.len(),
    "built list view"
  );
  view
}

fn compare_names(
  a: &str,
  b: &str
) -> Ordering {
  a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| a.cmp(b))
}

fn matches_search(
  entry: &BirthdayEntry,
  needle: &str
) -> bool {
  if needle.is_empty() {
    return true;
  }
  entry
    .name()
    .to_lowercase()
    .contains(needle)
    || entry.note().is_some_and(|note| {
      note.to_lowercase().contains(needle)
    })
}

/// Counts over the whole collection,
/// independent of the current query.
#[derive(Debug, Clone)]
pub struct Summary<'a> {
  pub total:      usize,
  pub this_week:  usize,
  pub today:      usize,
  pub this_month: Vec<&'a BirthdayEntry>
}

impl<'a> Summary<'a> {
  #[must_use]
  pub fn compute(
    entries: &'a [BirthdayEntry],
    today: NaiveDate,
    policy: LeapDayPolicy
  ) -> Self {
    let rows =
      annotate(entries, today, policy);
    let this_week = rows
      .iter()
      .filter(|row| {
        row.days <= THIS_WEEK_DAYS
      })
      .count();
    let today_count = rows
      .iter()
      .filter(|row| row.days == 0)
      .count();
    let this_month = entries
      .iter()
      .filter(|entry| {
        entry.date().month()
          == today.month()
      })
      .take(MONTH_LIST_LIMIT)
      .collect();

    Self {
      total: entries.len(),
      this_week,
      today: today_count,
      this_month
    }
  }
}
