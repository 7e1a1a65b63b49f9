use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Days,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "checklist-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CHECKLIST_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CHECKLIST_TIME_CONFIG";

pub const DUE_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Where one calendar day ends and the
/// next begins. Due dates are compared
/// against "today" on this boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayBoundary {
  Zone(Tz),
  SystemLocal
}

impl DayBoundary {
  #[must_use]
  pub fn date_of(
    &self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DayBoundary::Zone(tz) => {
        instant
          .with_timezone(tz)
          .date_naive()
      }
      | DayBoundary::SystemLocal => {
        instant
          .with_timezone(&Local)
          .date_naive()
      }
    }
  }
}

pub fn day_boundary()
-> &'static DayBoundary {
  static BOUNDARY: OnceLock<
    DayBoundary
  > = OnceLock::new();
  BOUNDARY
    .get_or_init(resolve_day_boundary)
}

fn resolve_day_boundary() -> DayBoundary
{
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return DayBoundary::Zone(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return DayBoundary::Zone(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  DayBoundary::SystemLocal
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
  path: &PathBuf
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
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured day boundary timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a due date typed by a user.
/// `none` clears the date.
#[tracing::instrument(skip(today))]
pub fn parse_due_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "" | "none" => return Ok(None),
    | "today" => return Ok(Some(today)),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .map(Some)
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             tomorrow"
          )
        });
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .map(Some)
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  NaiveDate::parse_from_str(
    token,
    DUE_DATE_FORMAT
  )
  .map(Some)
  .map_err(|err| {
    anyhow!(
      "invalid due date {token:?} \
       (expected YYYY-MM-DD, today, \
       tomorrow or yesterday): {err}"
    )
  })
}


// Stored records outlive this code, so
// a bad timestamp or due date degrades
// the field instead of losing the task.
pub mod iso_millis_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Millis,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    let Some(raw) = opt else {
      return Ok(missing());
    };

    match DateTime::parse_from_rfc3339(
      raw.trim()
    ) {
      | Ok(dt) => {
        Ok(dt.with_timezone(&Utc))
      }
      | Err(err) => {
        tracing::warn!(
          raw = %raw,
          error = %err,
          "unreadable createdAt; using load time"
        );
        Ok(Utc::now())
      }
    }
  }

  pub fn missing() -> DateTime<Utc> {
    tracing::warn!(
      "record has no createdAt; using \
       load time"
    );
    Utc::now()
  }
}

pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::DUE_DATE_FORMAT;

  pub fn serialize<S>(
    due: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match due {
      | Some(value) => {
        serializer.serialize_str(
          &value
            .format(DUE_DATE_FORMAT)
            .to_string()
        )
      }
      | None => {
        serializer.serialize_none()
      }
    }
  }

  // An empty string is what a cleared
  // date input leaves behind. Anything
  // unparsable reads as no deadline.
  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    match opt.as_deref().map(str::trim) {
      | None | Some("") => Ok(None),
      | Some(raw) => {
        match NaiveDate::parse_from_str(
          raw,
          DUE_DATE_FORMAT
        ) {
          | Ok(date) => Ok(Some(date)),
          | Err(err) => {
            tracing::warn!(
              raw,
              error = %err,
              "unreadable due date; treating as no deadline"
            );
            Ok(None)
          }
        }
      }
    }
  }
}
