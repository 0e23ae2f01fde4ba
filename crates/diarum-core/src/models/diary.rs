//! Diary model

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of the free-text `mood` and `weather` fields.
pub const MAX_TAG_FIELD_CHARS: usize = 50;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error returned when a diary date cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid diary date '{0}', expected YYYY-MM-DD")]
pub struct InvalidDiaryDate(pub String);

/// Calendar date a diary entry belongs to. At most one entry exists per date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiaryDate(NaiveDate);

impl DiaryDate {
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in the local timezone.
    #[must_use]
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    #[must_use]
    pub const fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Timestamp the backend stores in the `date` column for this day.
    #[must_use]
    pub fn backend_timestamp(&self) -> String {
        format!("{} 00:00:00.000Z", self.0.format(DATE_FORMAT))
    }

    /// Inclusive `(start, end)` bounds used to filter records for this day.
    #[must_use]
    pub fn backend_range(&self) -> (String, String) {
        let day = self.0.format(DATE_FORMAT);
        (
            format!("{day} 00:00:00.000Z"),
            format!("{day} 23:59:59.999Z"),
        )
    }
}

impl fmt::Display for DiaryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DiaryDate {
    type Err = InvalidDiaryDate;

    /// Accepts `YYYY-MM-DD` and the backend's `YYYY-MM-DD HH:MM:SS.sssZ` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || InvalidDiaryDate(trimmed.to_string());

        let (day, rest) = if trimmed.len() > 10 {
            let day = trimmed.get(..10).ok_or_else(invalid)?;
            let rest = trimmed.get(10..).ok_or_else(invalid)?;
            (day, rest)
        } else {
            (trimmed, "")
        };
        if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('T')) {
            return Err(invalid());
        }

        NaiveDate::parse_from_str(day, DATE_FORMAT)
            .map(Self)
            .map_err(|_| invalid())
    }
}

impl TryFrom<String> for DiaryDate {
    type Error = InvalidDiaryDate;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiaryDate> for String {
    fn from(value: DiaryDate) -> Self {
        value.to_string()
    }
}

/// A diary record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diary {
    /// Backend record identifier
    pub id: String,
    /// Day this entry belongs to
    pub date: DiaryDate,
    /// Rich-text body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub weather: String,
    /// Owning user record id
    #[serde(default)]
    pub owner: String,
    /// Server-side modification timestamp
    #[serde(default)]
    pub updated: String,
}

impl Diary {
    /// Check the field limits the backend schema enforces.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [("mood", &self.mood), ("weather", &self.weather)] {
            if value.chars().count() > MAX_TAG_FIELD_CHARS {
                return Err(format!(
                    "{field} must be at most {MAX_TAG_FIELD_CHARS} characters"
                ));
            }
        }
        Ok(())
    }

    /// Server timestamp, or `None` when the backend left it blank.
    #[must_use]
    pub fn updated_at(&self) -> Option<&str> {
        let updated = self.updated.trim();
        if updated.is_empty() {
            None
        } else {
            Some(updated)
        }
    }
}
