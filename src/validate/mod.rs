// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Validate/sanitize gate for externally sourced records.
//!
//! `validate_*` reports what is wrong with a raw JSON record; errors reject
//! it, warnings accept it with a default. `sanitize_*` turns a record into a
//! typed entity, substituting those defaults and migrating legacy states. It
//! returns `None` only when nothing usable is left (not an object, no id).
//! Sanitize is idempotent: feeding its serialized output back in yields the
//! same entity.

pub mod sprout;
pub mod leaf;
pub mod sun;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::time::parse_timestamp;

pub use leaf::{sanitize_leaf, validate_leaf, LeafRecord};
pub use sprout::{sanitize_sprout, validate_sprout, SproutRecord, WaterRecord, MAX_TITLE_LEN};
pub use sun::{sanitize_sun_entry, validate_sun_entry, SunRecord};

/// Twig assigned to records that arrive without one.
pub const UNASSIGNED_TWIG: &str = "unassigned";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub(crate) fn new() -> Self {
        Self { valid: true, errors: Vec::new(), warnings: Vec::new() }
    }

    pub(crate) fn error(&mut self, msg: impl Into<String>) {
        self.valid = false;
        self.errors.push(msg.into());
    }

    pub(crate) fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Record-level context, e.g. `sprout s1: title is missing`.
    pub fn prefixed(self, prefix: &str) -> Self {
        Self {
            valid: self.valid,
            errors: self.errors.into_iter().map(|e| format!("{prefix}: {e}")).collect(),
            warnings: self.warnings.into_iter().map(|w| format!("{prefix}: {w}")).collect(),
        }
    }
}

// --- JSON field helpers shared by the record kinds ---

pub(crate) fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

pub(crate) fn opt_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn opt_date(obj: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    obj.get(key).and_then(Value::as_str).and_then(|s| parse_timestamp(s).ok())
}

/// Present but not a parseable date string. Absent and `null` are fine.
pub(crate) fn bad_date(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => false,
        Some(v) => v.as_str().map_or(true, |s| parse_timestamp(s).is_err()),
    }
}

/// Present but not a string.
pub(crate) fn bad_str(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(v) if !v.is_null() && !v.is_string())
}
