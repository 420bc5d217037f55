// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Export and import documents.
//!
//! Version 1 is the event-log export: the whole log plus the owner's id.
//! Versions 3 and 4 are the older entity snapshots (`sprouts`, `leaves`,
//! `sunEntries`); importing one passes every record through validate and
//! sanitize and then rewrites it as the events that would have produced it.
//! Synthetic events carry client ids derived (uuid v5) from the importing
//! user and the record's content. Importing the same snapshot twice does not
//! duplicate anything, while equal records of two different users, or two
//! different records at the same array position, never share an id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::ResourceConfig;
use crate::error::{KernelError, KernelResult};
use crate::event::{
    EventPayload, LeafCreated, SproutHarvested, SproutPlanted, SproutUprooted, SproutWatered, SunShone, TrunkEvent,
};
use crate::formula;
use crate::replay::sort_events;
use crate::time::format_timestamp;
use crate::types::SproutState;
use crate::validate::{
    sanitize_leaf, sanitize_sprout, sanitize_sun_entry, validate_leaf, validate_sprout, validate_sun_entry, SproutRecord,
    ValidationReport,
};

pub const EXPORT_VERSION: u64 = 1;
pub const LEGACY_VERSIONS: [u64; 2] = [3, 4];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u64,
    #[serde(with = "crate::time::iso8601")]
    pub exported_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub events: Vec<TrunkEvent>,
}

impl ExportDocument {
    pub fn new(events: &[TrunkEvent], user_id: Option<String>, exported_at: DateTime<Utc>) -> Self {
        Self {
            version: EXPORT_VERSION,
            exported_at,
            user_id,
            events: events.to_vec(),
        }
    }

    pub fn to_json_pretty(&self) -> KernelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Everything an import produced. `events` are sorted and ready to append;
/// `errors` name the records that were rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportOutcome {
    pub version: u64,
    pub user_id: Option<String>,
    pub events: Vec<TrunkEvent>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportOutcome {
    fn absorb(&mut self, report: ValidationReport) -> bool {
        self.errors.extend(report.errors);
        self.warnings.extend(report.warnings);
        report.valid
    }
}

/// Namespace for the client ids of synthetic import events.
const IMPORT_NAMESPACE: Uuid = Uuid::from_u128(0x5f1c_2b7e_9a43_4d0e_8c61_7e2a_d4b9_0f33);

pub fn import_json(
    json: &str,
    user_id: Option<&str>,
    cfg: &ResourceConfig,
    now: DateTime<Utc>,
) -> KernelResult<ImportOutcome> {
    let value: Value = serde_json::from_str(json).map_err(|e| KernelError::InvalidDocument(e.to_string()))?;
    import_document(&value, user_id, cfg, now)
}

/// `user_id` is the importing user; it scopes the synthetic client ids and
/// falls back to the document's `userId`. `now` stands in for timestamps a
/// legacy record lacks entirely.
pub fn import_document(
    doc: &Value,
    user_id: Option<&str>,
    cfg: &ResourceConfig,
    now: DateTime<Utc>,
) -> KernelResult<ImportOutcome> {
    let obj = doc
        .as_object()
        .ok_or_else(|| KernelError::InvalidDocument("document is not an object".into()))?;
    let version = obj
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| KernelError::InvalidDocument("version is missing".into()))?;

    let mut outcome = ImportOutcome {
        version,
        user_id: obj.get("userId").and_then(Value::as_str).map(str::to_string),
        ..ImportOutcome::default()
    };

    if version == EXPORT_VERSION {
        let events = obj
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| KernelError::InvalidDocument("events must be an array".into()))?;
        for (i, raw) in events.iter().enumerate() {
            match TrunkEvent::from_value(raw.clone()) {
                Ok(event) => outcome.events.push(event),
                Err(e) => outcome.errors.push(format!("event #{i}: {e}")),
            }
        }
    } else if LEGACY_VERSIONS.contains(&version) {
        let owner = user_id.map(str::to_string).or_else(|| outcome.user_id.clone()).unwrap_or_default();
        let ids = SyntheticIds { owner: &owner };
        import_entities(obj, &ids, cfg, now, &mut outcome);
    } else {
        return Err(KernelError::UnsupportedVersion(version));
    }

    sort_events(&mut outcome.events);
    Ok(outcome)
}

fn records<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> &'a [Value] {
    obj.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

struct SyntheticIds<'a> {
    owner: &'a str,
}

impl SyntheticIds<'_> {
    /// Stable id over the owner, the event kind, and the identifying fields.
    fn id(&self, kind: &str, parts: &[&str]) -> String {
        let mut key = format!("{}\u{1f}{}", self.owner, kind);
        for part in parts {
            key.push('\u{1f}');
            key.push_str(part);
        }
        Uuid::new_v5(&IMPORT_NAMESPACE, key.as_bytes()).to_string()
    }
}

fn synthetic(payload: EventPayload, timestamp: DateTime<Utc>, client_id: String) -> TrunkEvent {
    TrunkEvent::new(payload, timestamp).with_client_id(client_id)
}

fn import_entities(
    obj: &serde_json::Map<String, Value>,
    ids: &SyntheticIds<'_>,
    cfg: &ResourceConfig,
    now: DateTime<Utc>,
    out: &mut ImportOutcome,
) {
    for (i, raw) in records(obj, "leaves").iter().enumerate() {
        let label = raw.get("id").and_then(Value::as_str).map_or_else(|| format!("#{i}"), str::to_string);
        if !out.absorb(validate_leaf(raw).prefixed(&format!("leaf {label}"))) {
            continue;
        }
        if let Some(leaf) = sanitize_leaf(raw, now) {
            let client_id = ids.id("leaf", &[leaf.id.as_str(), &format_timestamp(&leaf.created_at)]);
            out.events.push(synthetic(
                EventPayload::LeafCreated(LeafCreated {
                    leaf_id: leaf.id.clone(),
                    twig_id: leaf.twig_id,
                    name: leaf.name,
                }),
                leaf.created_at,
                client_id,
            ));
        }
    }

    let mut harvested: Vec<SproutRecord> = Vec::new();
    for (i, raw) in records(obj, "sprouts").iter().enumerate() {
        let label = raw.get("id").and_then(Value::as_str).map_or_else(|| format!("#{i}"), str::to_string);
        if !out.absorb(validate_sprout(raw).prefixed(&format!("sprout {label}"))) {
            continue;
        }
        let Some(sprout) = sanitize_sprout(raw, cfg, now) else {
            continue;
        };
        sprout_events(&sprout, ids, cfg, out);
        if sprout.state == SproutState::Completed {
            harvested.push(sprout);
        }
    }

    for (i, raw) in records(obj, "sunEntries").iter().enumerate() {
        if !out.absorb(validate_sun_entry(raw).prefixed(&format!("sun entry #{i}"))) {
            continue;
        }
        if let Some(sun) = sanitize_sun_entry(raw) {
            let client_id = ids.id("sun", &[sun.twig_id.as_str(), &format_timestamp(&sun.timestamp), &sun.content]);
            out.events.push(synthetic(
                EventPayload::SunShone(SunShone {
                    twig_id: sun.twig_id,
                    twig_label: sun.twig_label,
                    content: sun.content,
                    prompt: sun.prompt,
                }),
                sun.timestamp,
                client_id,
            ));
        }
    }

    // Harvest rewards depend on the capacity at harvest time, so they are
    // computed in replay order once every harvest is placed.
    sort_events(&mut out.events);
    let mut capacity = cfg.starting_capacity;
    for event in out.events.iter_mut() {
        if let EventPayload::SproutHarvested(h) = &mut event.payload {
            if let Some(s) = harvested.iter().find(|s| s.id == h.sprout_id) {
                h.capacity_gained = formula::capacity_reward(cfg, s.season, s.environment, h.result, capacity);
                capacity += h.capacity_gained;
            }
        }
    }
}

fn sprout_events(sprout: &SproutRecord, ids: &SyntheticIds<'_>, cfg: &ResourceConfig, out: &mut ImportOutcome) {
    let id = &sprout.id;
    let planted = format_timestamp(&sprout.created_at);
    // Nothing of a sprout may sort before or tie with its planting.
    let after_planting = sprout.created_at + chrono::Duration::milliseconds(1);
    out.events.push(synthetic(
        EventPayload::SproutPlanted(SproutPlanted {
            sprout_id: id.clone(),
            twig_id: sprout.twig_id.clone(),
            title: sprout.title.clone(),
            season: sprout.season,
            environment: sprout.environment,
            soil_cost: sprout.soil_cost,
            leaf_id: sprout.leaf_id.clone(),
            bloom_wither: sprout.bloom_wither.clone(),
            bloom_budding: sprout.bloom_budding.clone(),
            bloom_flourish: sprout.bloom_flourish.clone(),
        }),
        sprout.created_at,
        ids.id("plant", &[id.as_str(), &planted]),
    ));

    for (n, water) in sprout.water_entries.iter().enumerate() {
        out.events.push(synthetic(
            EventPayload::SproutWatered(SproutWatered {
                sprout_id: id.clone(),
                content: water.content.clone(),
                prompt: water.prompt.clone(),
            }),
            water.timestamp.max(after_planting),
            ids.id(
                "water",
                &[id.as_str(), &planted, &n.to_string(), &format_timestamp(&water.timestamp), &water.content],
            ),
        ));
    }

    match sprout.state {
        SproutState::Active => {}
        SproutState::Completed => {
            let at = sprout.harvested_at.unwrap_or_else(|| sprout.end_date()).max(after_planting);
            out.events.push(synthetic(
                EventPayload::SproutHarvested(SproutHarvested {
                    sprout_id: id.clone(),
                    result: sprout.result.unwrap_or(crate::config::FALLBACK_RESULT),
                    capacity_gained: 0.0,
                    reflection: sprout.reflection.clone(),
                }),
                at,
                ids.id("harvest", &[id.as_str(), &planted, &format_timestamp(&at)]),
            ));
        }
        SproutState::Uprooted => {
            let at = sprout.uprooted_at.unwrap_or(after_planting).max(after_planting);
            out.events.push(synthetic(
                EventPayload::SproutUprooted(SproutUprooted {
                    sprout_id: id.clone(),
                    soil_returned: formula::uproot_refund(cfg, sprout.soil_cost),
                }),
                at,
                ids.id("uproot", &[id.as_str(), &planted, &format_timestamp(&at)]),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::derive_state;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-06-01T00:00:00.000Z").unwrap()
    }

    fn snapshot() -> Value {
        json!({
            "version": 4,
            "userId": "u-1",
            "leaves": [{"id": "l1", "twigId": "branch-0-twig-0", "name": "Marathon", "createdAt": "2025-01-01T00:00:00.000Z"}],
            "sprouts": [
                {
                    "id": "s1", "twigId": "branch-0-twig-0", "title": "10k", "season": "3m",
                    "environment": "firm", "state": "completed", "soilCost": 8, "result": 4,
                    "leafId": "l1", "createdAt": "2025-01-02T00:00:00.000Z",
                    "harvestedAt": "2025-04-02T00:00:00.000Z",
                    "waterEntries": [{"timestamp": "2025-01-03T00:00:00.000Z", "content": "ran 3k"}]
                },
                {
                    "id": "s2", "twigId": "branch-0-twig-1", "title": "Stretch", "season": "2w",
                    "environment": "fertile", "state": "uprooted", "soilCost": 2,
                    "createdAt": "2025-02-01T00:00:00.000Z", "uprootedAt": "2025-02-03T00:00:00.000Z"
                },
                {"id": "", "title": "broken"}
            ],
            "sunEntries": [{"timestamp": "2025-01-05T00:00:00.000Z", "twigId": "branch-0-twig-0", "twigLabel": "Running", "content": "good"}]
        })
    }

    #[test]
    fn test_legacy_snapshot_becomes_events() {
        let cfg = ResourceConfig::default();
        let outcome = import_document(&snapshot(), None, &cfg, now()).unwrap();
        assert_eq!(outcome.user_id.as_deref(), Some("u-1"));
        // leaf, plant, water, harvest, plant, uproot, sun
        assert_eq!(outcome.events.len(), 7);
        assert!(!outcome.errors.is_empty());

        let state = derive_state(&outcome.events);
        assert_eq!(state.sprouts.len(), 2);
        assert_eq!(state.leaves.len(), 1);
        let expected_gain = formula::capacity_reward(
            &cfg,
            crate::types::Season::ThreeMonths,
            crate::types::Environment::Firm,
            4,
            cfg.starting_capacity,
        );
        assert!((state.soil_capacity - (10.0 + expected_gain)).abs() < 1e-12);
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_synthetic_ids_are_stable() {
        let cfg = ResourceConfig::default();
        let a = import_document(&snapshot(), None, &cfg, now()).unwrap();
        let b = import_document(&snapshot(), None, &cfg, now()).unwrap();
        assert_eq!(a.events, b.events);
    }

    fn client_ids(outcome: &ImportOutcome) -> Vec<String> {
        outcome
            .events
            .iter()
            .filter_map(|e| e.client_id.as_ref().map(|id| id.as_str().to_string()))
            .collect()
    }

    #[test]
    fn test_synthetic_ids_are_scoped_to_the_importing_user() {
        let cfg = ResourceConfig::default();
        let alice = import_document(&snapshot(), Some("alice"), &cfg, now()).unwrap();
        let bob = import_document(&snapshot(), Some("bob"), &cfg, now()).unwrap();

        let alice_ids = client_ids(&alice);
        assert_eq!(alice_ids.len(), alice.events.len());
        assert!(client_ids(&bob).iter().all(|id| !alice_ids.contains(id)));

        // Without an explicit user the document's own userId scopes the ids
        let implicit = import_document(&snapshot(), None, &cfg, now()).unwrap();
        let explicit = import_document(&snapshot(), Some("u-1"), &cfg, now()).unwrap();
        assert_eq!(client_ids(&implicit), client_ids(&explicit));
    }

    #[test]
    fn test_different_sun_entries_at_same_position_get_distinct_ids() {
        let cfg = ResourceConfig::default();
        let doc = |content: &str| {
            json!({
                "version": 4,
                "sunEntries": [{"timestamp": "2025-01-05T00:00:00.000Z", "twigId": "branch-0-twig-0", "twigLabel": "Running", "content": content}]
            })
        };
        let first = import_document(&doc("calm week"), Some("u-1"), &cfg, now()).unwrap();
        let second = import_document(&doc("rough week"), Some("u-1"), &cfg, now()).unwrap();
        assert_ne!(client_ids(&first), client_ids(&second));
    }

    #[test]
    fn test_sprout_without_created_at_keeps_its_history() {
        let cfg = ResourceConfig::default();
        let doc = json!({
            "version": 4,
            "sprouts": [{
                "id": "s9", "twigId": "branch-0-twig-0", "title": "Swim", "season": "1m",
                "environment": "firm", "state": "active", "soilCost": 5,
                "waterEntries": [{"timestamp": "2025-03-02T08:00:00.000Z", "content": "20 laps"}]
            }]
        });
        let outcome = import_document(&doc, Some("u-1"), &cfg, now()).unwrap();
        assert!(outcome.warnings.iter().any(|w| w.contains("createdAt missing")));

        let planted = &outcome.events[0];
        assert!(matches!(planted.payload, EventPayload::SproutPlanted(_)));
        assert_eq!(planted.timestamp, parse_timestamp("2025-03-02T07:59:59.999Z").unwrap());

        let state = derive_state(&outcome.events);
        assert_eq!(state.sprouts[&crate::types::SproutId::from("s9")].water_entries.len(), 1);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = import_document(&json!({"version": 2, "events": []}), None, &ResourceConfig::default(), now());
        assert_eq!(err, Err(KernelError::UnsupportedVersion(2)));
        assert!(import_json("[]", None, &ResourceConfig::default(), now()).is_err());
    }
}
