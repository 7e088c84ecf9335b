//! Calendar dates in data and config files.
//!
//! Dates are written as `YYYY-MM-DD`. Files saved by earlier tooling carry a
//! midnight time of day (`2025-09-01 00:00:00`); the time part is accepted
//! and dropped on read.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{de, Deserialize, Deserializer, Serializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `YYYY-MM-DD` with an optional ` HH:MM:SS[.fff]` or `THH:MM:SS`
/// suffix.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok().or_else(|| {
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
            .map(|dt| dt.date())
    })
}

fn invalid<E: de::Error>(raw: &str) -> E {
    E::custom(format!(
        "invalid date '{raw}': expected YYYY-MM-DD with an optional HH:MM:SS"
    ))
}

pub(crate) fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| invalid(&raw))
}

/// Same format for a map of dates keyed by name.
pub(crate) mod map {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        dates: &BTreeMap<String, NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            dates
                .iter()
                .map(|(key, date)| (key, date.format(super::DATE_FORMAT).to_string())),
        )
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, NaiveDate>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| match super::parse_date(&value) {
                Some(date) => Ok((key, date)),
                None => Err(super::invalid(&value)),
            })
            .collect()
    }
}
