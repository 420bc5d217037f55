// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sun entries from entity snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::TwigId;
use crate::validate::{non_empty_str, opt_date, opt_str, ValidationReport, UNASSIGNED_TWIG};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunRecord {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub twig_id: TwigId,
    pub twig_label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Older snapshots nest the twig under `context`.
fn twig_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    non_empty_str(obj, key).or_else(|| obj.get("context").and_then(Value::as_object).and_then(|c| non_empty_str(c, key)))
}

pub fn validate_sun_entry(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(obj) = value.as_object() else {
        report.error("sun entry is not an object");
        return report;
    };
    if opt_date(obj, "timestamp").is_none() {
        report.error("timestamp must be a date string");
    }
    if obj.get("content").and_then(Value::as_str).is_none() {
        report.error("content must be a string");
    }
    if twig_field(obj, "twigId").is_none() {
        report.warn("twigId missing; record will be unassigned");
    }
    if twig_field(obj, "twigLabel").is_none() {
        report.warn("twigLabel missing");
    }
    report
}

/// A sun entry has no id; without a timestamp or content it is unusable.
pub fn sanitize_sun_entry(value: &Value) -> Option<SunRecord> {
    let obj = value.as_object()?;
    Some(SunRecord {
        timestamp: opt_date(obj, "timestamp")?,
        content: opt_str(obj, "content")?,
        twig_id: TwigId::new(twig_field(obj, "twigId").unwrap_or(UNASSIGNED_TWIG)),
        twig_label: twig_field(obj, "twigLabel").unwrap_or_default().to_string(),
        prompt: opt_str(obj, "prompt"),
    })
}
