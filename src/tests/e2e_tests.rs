// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::ResourceConfig;
use crate::export::{import_json, ExportDocument};
use crate::replay::derive_state;
use crate::tests::support::*;
use crate::validate::{sanitize_leaf, sanitize_sprout};
use crate::verify::state_hash;

#[test]
fn test_export_then_import_reproduces_state() {
    let cfg = ResourceConfig::default();
    let log = random_log(&mut Pcg32::new(2025), 70);
    let original = derive_state(&log);

    let doc = ExportDocument::new(&log, Some("user-1".into()), at_day(100));
    let json = doc.to_json_pretty().unwrap();
    let imported = import_json(&json, None, &cfg, at_day(100)).unwrap();

    assert!(imported.errors.is_empty(), "{:?}", imported.errors);
    assert_eq!(imported.user_id.as_deref(), Some("user-1"));
    assert_eq!(imported.events.len(), log.len());
    let restored = derive_state(&imported.events);
    assert_eq!(state_hash(&restored), state_hash(&original));
    assert_eq!(restored, original);
}

#[test]
fn test_bad_events_in_export_are_itemized() {
    let cfg = ResourceConfig::default();
    let json = r#"{
        "version": 1,
        "exportedAt": "2025-05-01T00:00:00.000Z",
        "events": [
            {"type": "leaf_created", "timestamp": "2025-01-01T00:00:00.000Z", "leafId": "l1", "twigId": "t", "name": "n"},
            {"type": "sprout_planted", "timestamp": "2025-01-01T00:00:00.000Z", "sproutId": "s1"},
            {"type": "mystery", "timestamp": "2025-01-01T00:00:00.000Z"}
        ]
    }"#;
    let outcome = import_json(json, None, &cfg, at_day(0)).unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.errors.len(), 2);
    assert!(outcome.errors[0].starts_with("event #1"));
}

#[test]
fn test_sanitized_entities_reach_fixed_point() {
    let cfg = ResourceConfig::default();
    let raws = [
        serde_json::json!({"id": "a", "state": "draft", "season": "1y", "environment": "barren"}),
        serde_json::json!({"id": "b", "title": "t", "state": "failed", "result": 2, "harvestedAt": "2025-02-01T00:00:00Z"}),
        serde_json::json!({"id": "c", "title": "t", "state": "uprooted", "waterEntries": "nope"}),
    ];
    for raw in raws {
        let once = sanitize_sprout(&raw, &cfg, at_day(0)).unwrap();
        let again = sanitize_sprout(&serde_json::to_value(&once).unwrap(), &cfg, at_day(5)).unwrap();
        assert_eq!(once, again);
    }
    let leaf = sanitize_leaf(&serde_json::json!({"id": "l", "name": "n"}), at_day(0)).unwrap();
    assert_eq!(sanitize_leaf(&serde_json::to_value(&leaf).unwrap(), at_day(9)), Some(leaf));
}
