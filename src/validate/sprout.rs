// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sprout records from entity snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ResourceConfig, FALLBACK_RESULT};
use crate::formula;
use crate::types::{Environment, LeafId, Season, SproutId, SproutState, TwigId};
use crate::validate::{bad_date, bad_str, non_empty_str, opt_date, opt_str, ValidationReport, UNASSIGNED_TWIG};

pub const MAX_TITLE_LEN: usize = 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterRecord {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// A complete, typed sprout entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutRecord {
    pub id: SproutId,
    pub twig_id: TwigId,
    pub title: String,
    pub season: Season,
    pub environment: Environment,
    pub state: SproutState,
    pub soil_cost: f64,
    #[serde(with = "crate::time::iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<LeafId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_wither: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_budding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_flourish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::time::iso8601_opt")]
    pub harvested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::time::iso8601_opt")]
    pub uprooted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub water_entries: Vec<WaterRecord>,
}

impl SproutRecord {
    pub fn end_date(&self) -> DateTime<Utc> {
        self.created_at + self.season.duration()
    }
}

fn result_in_range(v: &Value) -> Option<u8> {
    v.as_u64().filter(|r| (1..=5).contains(r)).and_then(|r| u8::try_from(r).ok())
}

fn water_entry(v: &Value) -> Option<WaterRecord> {
    let obj = v.as_object()?;
    Some(WaterRecord {
        timestamp: opt_date(obj, "timestamp")?,
        content: opt_str(obj, "content")?,
        prompt: opt_str(obj, "prompt"),
    })
}

pub fn validate_sprout(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(obj) = value.as_object() else {
        report.error("sprout is not an object");
        return report;
    };

    if non_empty_str(obj, "id").is_none() {
        report.error("id must be a non-empty string");
    }
    match obj.get("title").and_then(Value::as_str) {
        None => report.error("title must be a string"),
        Some(t) if t.chars().count() > MAX_TITLE_LEN => {
            report.warn(format!("title longer than {MAX_TITLE_LEN} characters will be truncated"))
        }
        Some(_) => {}
    }
    if obj.get("season").and_then(Value::as_str).and_then(Season::parse).is_none() {
        report.error("season is not a known season");
    }
    if obj.get("environment").and_then(Value::as_str).and_then(Environment::parse).is_none() {
        report.error("environment is not a known environment");
    }
    if obj.get("state").and_then(Value::as_str).and_then(SproutState::from_legacy).is_none() {
        report.error("state is not a known state");
    }

    if non_empty_str(obj, "twigId").is_none() {
        report.warn("twigId missing; record will be unassigned");
    }
    if matches!(obj.get("soilCost"), Some(v) if !v.is_number()) || obj.get("soilCost").is_none() {
        report.warn("soilCost is not a number; cost table value used");
    }
    if let Some(r) = obj.get("result").filter(|v| !v.is_null()) {
        if result_in_range(r).is_none() {
            report.warn("result must be a number between 1 and 5");
        }
    }
    if bad_str(obj, "leafId") {
        report.warn("leafId is not a string");
    }
    if matches!(obj.get("createdAt"), None | Some(Value::Null)) {
        report.warn("createdAt missing; planted just before its earliest recorded activity");
    }
    for key in ["createdAt", "endDate", "harvestedAt", "uprootedAt"] {
        if bad_date(obj, key) {
            report.warn(format!("{key} is not a date string"));
        }
    }
    match obj.get("waterEntries") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            let dropped = entries.iter().filter(|e| water_entry(e).is_none()).count();
            if dropped > 0 {
                report.warn(format!("{dropped} water entries lack timestamp or content and will be dropped"));
            }
        }
        Some(_) => report.warn("waterEntries is not an array"),
    }

    report
}

fn truncate(title: &str) -> String {
    title.chars().take(MAX_TITLE_LEN).collect()
}

/// Typed sprout or `None` when the record has no usable id.
///
/// A missing or unparseable `createdAt` becomes one millisecond before the
/// earliest water, harvest or uproot timestamp, so the history still follows
/// the planting. `fallback_time` is used only when there is no such timestamp.
pub fn sanitize_sprout(value: &Value, cfg: &ResourceConfig, fallback_time: DateTime<Utc>) -> Option<SproutRecord> {
    let obj: &Map<String, Value> = value.as_object()?;
    let id = non_empty_str(obj, "id")?;

    let season = obj.get("season").and_then(Value::as_str).and_then(Season::parse).unwrap_or(Season::OneMonth);
    let environment = obj
        .get("environment")
        .and_then(Value::as_str)
        .and_then(Environment::parse)
        .unwrap_or(Environment::Firm);
    let state = obj
        .get("state")
        .and_then(Value::as_str)
        .and_then(SproutState::from_legacy)
        .unwrap_or(SproutState::Active);
    let soil_cost = obj
        .get("soilCost")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite() && *c >= 0.0)
        .unwrap_or_else(|| f64::from(formula::soil_cost(cfg, season, environment)));

    let mut result = obj.get("result").and_then(result_in_range);
    if state == SproutState::Completed && result.is_none() {
        result = Some(FALLBACK_RESULT);
    }

    let water_entries: Vec<WaterRecord> = match obj.get("waterEntries") {
        Some(Value::Array(entries)) => entries.iter().filter_map(water_entry).collect(),
        _ => Vec::new(),
    };

    let harvested_at = opt_date(obj, "harvestedAt");
    let uprooted_at = opt_date(obj, "uprootedAt");
    let created_at = opt_date(obj, "createdAt").unwrap_or_else(|| {
        water_entries
            .iter()
            .map(|w: &WaterRecord| w.timestamp)
            .chain(harvested_at)
            .chain(uprooted_at)
            .min()
            .map_or(fallback_time, |earliest| earliest - Duration::milliseconds(1))
    });

    Some(SproutRecord {
        id: SproutId::new(id),
        twig_id: TwigId::new(non_empty_str(obj, "twigId").unwrap_or(UNASSIGNED_TWIG)),
        title: truncate(obj.get("title").and_then(Value::as_str).unwrap_or_default()),
        season,
        environment,
        state,
        soil_cost,
        created_at,
        leaf_id: non_empty_str(obj, "leafId").map(LeafId::new),
        result,
        reflection: opt_str(obj, "reflection"),
        bloom_wither: opt_str(obj, "bloomWither"),
        bloom_budding: opt_str(obj, "bloomBudding"),
        bloom_flourish: opt_str(obj, "bloomFlourish"),
        harvested_at,
        uprooted_at,
        water_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-06-01T00:00:00.000Z").unwrap()
    }

    #[test]
    fn test_missing_fatal_fields_reported() {
        let report = validate_sprout(&json!({"id": "", "season": "5w", "environment": "firm", "state": "active"}));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3); // id, title, season
    }

    #[test]
    fn test_legacy_state_accepted_with_optional_warnings() {
        let report = validate_sprout(&json!({
            "id": "s1", "title": "Read", "season": "1m", "environment": "fertile",
            "state": "draft", "result": 9, "createdAt": "not a date"
        }));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 4); // twigId, soilCost, result, createdAt
    }

    #[test]
    fn test_missing_created_at_follows_earliest_activity() {
        let cfg = ResourceConfig::default();
        let raw = json!({
            "id": "s1", "title": "Read", "season": "1m", "environment": "firm", "state": "uprooted",
            "uprootedAt": "2025-02-10T00:00:00.000Z",
            "waterEntries": [{"timestamp": "2025-02-03T12:00:00.000Z", "content": "ch. 1"}]
        });
        assert!(validate_sprout(&raw).warnings.iter().any(|w| w.starts_with("createdAt missing")));

        let sprout = sanitize_sprout(&raw, &cfg, now()).unwrap();
        assert_eq!(sprout.created_at, parse_timestamp("2025-02-03T11:59:59.999Z").unwrap());

        let bare = sanitize_sprout(&json!({"id": "s2", "title": "x"}), &cfg, now()).unwrap();
        assert_eq!(bare.created_at, now());
    }

    #[test]
    fn test_sanitize_migrates_legacy_states() {
        let cfg = ResourceConfig::default();
        let draft = sanitize_sprout(&json!({"id": "a", "title": "x", "state": "draft"}), &cfg, now()).unwrap();
        assert_eq!(draft.state, SproutState::Active);
        let failed = sanitize_sprout(&json!({"id": "b", "title": "x", "state": "failed"}), &cfg, now()).unwrap();
        assert_eq!(failed.state, SproutState::Completed);
        assert_eq!(failed.result, Some(FALLBACK_RESULT));
    }

    #[test]
    fn test_sanitize_filters_water_entries_individually() {
        let cfg = ResourceConfig::default();
        let sprout = sanitize_sprout(
            &json!({
                "id": "a", "title": "x", "season": "2w", "environment": "barren", "state": "active",
                "waterEntries": [
                    {"timestamp": "2025-01-01T00:00:00.000Z", "content": "ok"},
                    {"timestamp": "2025-01-02T00:00:00.000Z"},
                    {"content": "no time"},
                    "junk"
                ]
            }),
            &cfg,
            now(),
        )
        .unwrap();
        assert_eq!(sprout.water_entries.len(), 1);
        assert_eq!(sprout.soil_cost, 4.0);
    }

    #[test]
    fn test_sanitize_rejects_only_unusable_records() {
        let cfg = ResourceConfig::default();
        assert!(sanitize_sprout(&json!("sprout"), &cfg, now()).is_none());
        assert!(sanitize_sprout(&json!({"title": "no id"}), &cfg, now()).is_none());
        assert!(sanitize_sprout(&json!({"id": "bare"}), &cfg, now()).is_some());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let cfg = ResourceConfig::default();
        let raw = json!({
            "id": "a", "title": "x".repeat(80), "season": "6m", "state": "failed",
            "soilCost": "lots", "leafId": 7, "waterEntries": [{"timestamp": "2025-01-01T00:00:00Z", "content": "c"}]
        });
        let once = sanitize_sprout(&raw, &cfg, now()).unwrap();
        let twice = sanitize_sprout(&serde_json::to_value(&once).unwrap(), &cfg, now()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.title.chars().count(), MAX_TITLE_LEN);
    }
}
