// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Timestamp encoding.
//!
//! Every timestamp on the wire and on disk is ISO-8601 in UTC with exactly
//! millisecond precision and a `Z` suffix, e.g. `2025-03-01T06:00:00.000Z`.
//! Parsing truncates anything finer than a millisecond so that a parsed value
//! always re-encodes to the same string.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::{KernelError, KernelResult};

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> KernelResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(3))
        .map_err(|_| KernelError::InvalidTimestamp(s.to_string()))
}

/// `#[serde(with = "crate::time::iso8601")]`
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

/// Optional variant of [`iso8601`]; pair with `default` and `skip_serializing_if`.
pub mod iso8601_opt {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&super::format_timestamp(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => super::parse_timestamp(&raw).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
