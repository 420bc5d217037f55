// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Leaf records from entity snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{LeafId, TwigId};
use crate::validate::{bad_date, non_empty_str, opt_date, ValidationReport, UNASSIGNED_TWIG};

pub const DEFAULT_LEAF_NAME: &str = "Untitled saga";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafRecord {
    pub id: LeafId,
    pub twig_id: TwigId,
    pub name: String,
    #[serde(with = "crate::time::iso8601")]
    pub created_at: DateTime<Utc>,
}

/// Only the id is fatal; older snapshots stored leaves without names.
pub fn validate_leaf(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(obj) = value.as_object() else {
        report.error("leaf is not an object");
        return report;
    };
    if non_empty_str(obj, "id").is_none() {
        report.error("id must be a non-empty string");
    }
    if non_empty_str(obj, "name").is_none() {
        report.warn("name missing; default used");
    }
    if non_empty_str(obj, "twigId").is_none() {
        report.warn("twigId missing; record will be unassigned");
    }
    if bad_date(obj, "createdAt") {
        report.warn("createdAt is not a date string");
    }
    report
}

pub fn sanitize_leaf(value: &Value, fallback_time: DateTime<Utc>) -> Option<LeafRecord> {
    let obj = value.as_object()?;
    let id = non_empty_str(obj, "id")?;
    Some(LeafRecord {
        id: LeafId::new(id),
        twig_id: TwigId::new(non_empty_str(obj, "twigId").unwrap_or(UNASSIGNED_TWIG)),
        name: non_empty_str(obj, "name").unwrap_or(DEFAULT_LEAF_NAME).to_string(),
        created_at: opt_date(obj, "createdAt").unwrap_or(fallback_time),
    })
}
