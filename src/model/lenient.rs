//! Lenient decoding for backend payloads.
//!
//! The backend is not strict about scalar types: identifiers arrive as JSON
//! numbers or strings, coordinates as numbers or numeric strings, timestamps as
//! RFC 3339 strings or epoch milliseconds. Everything is normalized here so the
//! rest of the crate works with one representation.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend identifier (assignment, truck, order, notification, ...).
///
/// Numeric ids are stored in their decimal text form so that `1` and `"1"`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank ids are treated as absent.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl RawScalar {
    fn into_text(self) -> String {
        match self {
            RawScalar::Int(v) => v.to_string(),
            RawScalar::UInt(v) => v.to_string(),
            RawScalar::Float(v) => v.to_string(),
            RawScalar::Text(v) => v,
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawScalar::deserialize(deserializer).map(|raw| Id(raw.into_text()))
    }
}

/// `Option<f64>` from a number, a numeric string, null or a missing field.
///
/// Unparseable strings decode to `None` instead of failing the whole payload.
pub mod f64_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(raw.and_then(|raw| match raw {
            RawScalar::Int(v) => Some(v as f64),
            RawScalar::UInt(v) => Some(v as f64),
            RawScalar::Float(v) => Some(v),
            RawScalar::Text(s) => s.trim().parse::<f64>().ok(),
        })
        .filter(|v| v.is_finite()))
    }
}

/// `Option<String>` from a string or a number (ETAs, phone numbers).
pub mod text_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(raw.map(RawScalar::into_text))
    }
}

/// `Option<Id>` where an empty string counts as absent.
pub mod id_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Id>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(raw.map(|raw| Id(raw.into_text())).filter(|id| !id.is_empty()))
    }
}

/// `Option<DateTime<Utc>>` from RFC 3339 text or epoch milliseconds.
pub mod timestamp_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawScalar>::deserialize(deserializer)?;
        Ok(raw.and_then(|raw| match raw {
            RawScalar::Int(ms) => Utc.timestamp_millis_opt(ms).single(),
            RawScalar::UInt(ms) => i64::try_from(ms)
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            RawScalar::Float(ms) => Utc.timestamp_millis_opt(ms as i64).single(),
            RawScalar::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }))
    }
}
