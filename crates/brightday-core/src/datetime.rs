use std::fmt;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::EntryError;

const TIMEZONE_CONFIG_FILE: &str =
  "brightday-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "BRIGHTDAY_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "BRIGHTDAY_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// How February 29 resolves in a year
/// that has no such day.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum LeapDayPolicy {
  /// Roll over to March 1, the way a
  /// lenient calendar normalises
  /// `Feb 29` in a common year.
  #[default]
  MarchFirst,
  /// Clamp to February 28.
  FebruaryLast
}

impl FromStr for LeapDayPolicy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "mar1" | "march1" | "rollover" => {
        Ok(Self::MarchFirst)
      }
      | "feb28" | "february28"
      | "clamp" => Ok(Self::FebruaryLast),
      | other => {
        Err(anyhow!(
          "invalid leapday setting: \
           {other} (expected mar1 or \
           feb28)"
        ))
      }
    }
  }
}

impl fmt::Display for LeapDayPolicy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::MarchFirst => {
        f.write_str("mar1")
      }
      | Self::FebruaryLast => {
        f.write_str("feb28")
      }
    }
  }
}

/// The zone "today" is evaluated in.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum TrackerZone {
  Local,
  Named(Tz)
}

impl TrackerZone {
  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Self::Local => {
        now.with_timezone(&Local)
          .date_naive()
      }
      | Self::Named(tz) => {
        now.with_timezone(tz).date_naive()
      }
    }
  }
}

impl fmt::Display for TrackerZone {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Local => f.write_str("local"),
      | Self::Named(tz) => {
        write!(f, "{}", tz.name())
      }
    }
  }
}

/// Resolves the tracker timezone from
/// the configured value, then
/// `BRIGHTDAY_TIMEZONE`, then the TOML
/// time config, falling back to the
/// system zone.
#[tracing::instrument]
pub fn resolve_timezone(
  configured: Option<&str>
) -> TrackerZone {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return TrackerZone::Named(tz);
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return TrackerZone::Named(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return TrackerZone::Named(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  TrackerZone::Local
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty()
    || trimmed
      .eq_ignore_ascii_case("local")
  {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "resolved tracker timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

/// Parses the date a user typed or the
/// store held.
///
/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, and
/// an ISO timestamp whose date part is
/// taken as-is.
pub fn parse_birth_date(
  text: &str
) -> Result<NaiveDate, EntryError> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    return Err(EntryError::MissingDate);
  }

  if let Ok(d) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
  {
    return Ok(d);
  }

  if trimmed.len() == 8
    && let Ok(d) =
      NaiveDate::parse_from_str(
        trimmed, "%Y%m%d"
      )
  {
    return Ok(d);
  }

  if let Some((date_part, _)) =
    trimmed.split_once('T')
    && let Ok(d) =
      NaiveDate::parse_from_str(
        date_part, "%Y-%m-%d"
      )
  {
    return Ok(d);
  }

  Err(EntryError::InvalidDate {
    input: trimmed.to_string()
  })
}

/// Parses a `--today` override. Same
/// formats as [`parse_birth_date`], but
/// the following year must exist too.
pub fn parse_today(
  text: &str
) -> Result<NaiveDate, EntryError> {
  let today = parse_birth_date(text)?;
  ensure_next_year_exists(today)
}

/// Rejects a `today` whose successor
/// year runs off the end of the
/// calendar, where no next occurrence
/// can be resolved.
pub fn ensure_next_year_exists(
  today: NaiveDate
) -> Result<NaiveDate, EntryError> {
  today
    .year()
    .checked_add(1)
    .and_then(|year| {
      NaiveDate::from_ymd_opt(
        year, 12, 31
      )
    })
    .map(|_| today)
    .ok_or(EntryError::OutOfRange {
      date: today
    })
}

/// The anniversary of `date` in `year`,
/// or `None` when `year` is outside the
/// calendar.
#[must_use]
pub fn anniversary_in(
  date: NaiveDate,
  year: i32,
  policy: LeapDayPolicy
) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(
    year,
    date.month(),
    date.day()
  )
  .or_else(|| {
    // only Feb 29 in a common year
    // gets here
    match policy {
      | LeapDayPolicy::MarchFirst => {
        NaiveDate::from_ymd_opt(
          year, 3, 1
        )
      }
      | LeapDayPolicy::FebruaryLast => {
        NaiveDate::from_ymd_opt(
          year, 2, 28
        )
      }
    }
  })
}

/// The first anniversary of `date` on or
/// after `today`.
#[must_use]
pub fn next_occurrence(
  date: NaiveDate,
  today: NaiveDate,
  policy: LeapDayPolicy
) -> Option<NaiveDate> {
  let candidate = anniversary_in(
    date,
    today.year(),
    policy
  )?;
  if candidate >= today {
    return Some(candidate);
  }
  anniversary_in(
    date,
    today.year().checked_add(1)?,
    policy
  )
}

/// Days from `today` until the next
/// anniversary of `date`; 0 means today.
/// Always in `0..366`. Fails only when
/// that anniversary is past the end of
/// the calendar.
pub fn days_until(
  date: NaiveDate,
  today: NaiveDate,
  policy: LeapDayPolicy
) -> Result<u32, EntryError> {
  let out_of_range =
    || EntryError::OutOfRange {
      date: today
    };
  let next =
    next_occurrence(date, today, policy)
      .ok_or_else(out_of_range)?;
  u32::try_from(
    (next - today).num_days()
  )
  .map_err(|_| out_of_range())
}

/// [`days_until`] for unparsed text.
/// Unparseable input is an error, never
/// zero days.
pub fn days_until_text(
  text: &str,
  today: NaiveDate,
  policy: LeapDayPolicy
) -> Result<u32, EntryError> {
  let date = parse_birth_date(text)?;
  days_until(date, today, policy)
}

/// `Jun 21`
#[must_use]
pub fn format_short(
  date: NaiveDate
) -> String {
  date.format("%b %-d").to_string()
}

#[must_use]
pub fn format_iso(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}
