// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Log as Primary Truth
//!
//! Every user action is expressed as a [`TrunkEvent`]. The payload is a tagged
//! union with one variant per kind; each variant owns its required and optional
//! fields, so a structurally incomplete event cannot be represented past the
//! deserialization edge.
//!
//! # Invariants
//! - Events are immutable once appended
//! - Same event set => same derived state (after sorting)
//! - The `type` tag and camelCase field names are the cross-client wire format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KernelError, KernelResult};
use crate::time::format_timestamp;
use crate::types::{ClientId, Environment, EventKind, LeafId, Season, SproutId, TwigId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutPlanted {
    pub sprout_id: SproutId,
    pub twig_id: TwigId,
    pub title: String,
    pub season: Season,
    pub environment: Environment,
    pub soil_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<LeafId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_wither: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_budding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_flourish: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutWatered {
    pub sprout_id: SproutId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutHarvested {
    pub sprout_id: SproutId,
    /// 1 (withered) ..= 5 (flourished).
    pub result: u8,
    pub capacity_gained: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutUprooted {
    pub sprout_id: SproutId,
    pub soil_returned: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunShone {
    pub twig_id: TwigId,
    pub twig_label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafCreated {
    pub leaf_id: LeafId,
    pub twig_id: TwigId,
    pub name: String,
}

/// Sparse edit: only the fields present are merged into the sprout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SproutEdited {
    pub sprout_id: SproutId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_wither: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_budding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_flourish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<LeafId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SproutPlanted(SproutPlanted),
    SproutWatered(SproutWatered),
    SproutHarvested(SproutHarvested),
    SproutUprooted(SproutUprooted),
    SunShone(SunShone),
    LeafCreated(LeafCreated),
    SproutEdited(SproutEdited),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::SproutPlanted(_) => EventKind::SproutPlanted,
            EventPayload::SproutWatered(_) => EventKind::SproutWatered,
            EventPayload::SproutHarvested(_) => EventKind::SproutHarvested,
            EventPayload::SproutUprooted(_) => EventKind::SproutUprooted,
            EventPayload::SunShone(_) => EventKind::SunShone,
            EventPayload::LeafCreated(_) => EventKind::LeafCreated,
            EventPayload::SproutEdited(_) => EventKind::SproutEdited,
        }
    }

    /// The sprout this event targets, if any.
    pub fn sprout_id(&self) -> Option<&SproutId> {
        match self {
            EventPayload::SproutPlanted(p) => Some(&p.sprout_id),
            EventPayload::SproutWatered(p) => Some(&p.sprout_id),
            EventPayload::SproutHarvested(p) => Some(&p.sprout_id),
            EventPayload::SproutUprooted(p) => Some(&p.sprout_id),
            EventPayload::SproutEdited(p) => Some(&p.sprout_id),
            EventPayload::SunShone(_) | EventPayload::LeafCreated(_) => None,
        }
    }
}

/// A single immutable fact in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrunkEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    /// Assigned by the event store on append when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TrunkEvent {
    pub fn new(payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            payload,
            timestamp,
            client_id: None,
            user_id: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<ClientId>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Two submissions are the same logical action when their payloads match,
    /// regardless of when they were made or which identity they carry.
    pub fn same_action(&self, other: &TrunkEvent) -> bool {
        self.payload == other.payload
    }

    /// Rejects events that deserialized but carry values replay must not
    /// apply: empty identities, negative or non-finite soil amounts, results
    /// outside 1..=5.
    pub fn check(&self) -> KernelResult<()> {
        fn non_empty(field: &str, empty: bool) -> KernelResult<()> {
            if empty {
                return Err(KernelError::MalformedEvent(format!("{field} is empty")));
            }
            Ok(())
        }
        fn amount(field: &str, v: f64) -> KernelResult<()> {
            if !v.is_finite() || v < 0.0 {
                return Err(KernelError::MalformedEvent(format!("{field} must be a non-negative number, got {v}")));
            }
            Ok(())
        }

        match &self.payload {
            EventPayload::SproutPlanted(p) => {
                non_empty("sproutId", p.sprout_id.is_empty())?;
                non_empty("twigId", p.twig_id.is_empty())?;
                amount("soilCost", p.soil_cost)
            }
            EventPayload::SproutWatered(p) => non_empty("sproutId", p.sprout_id.is_empty()),
            EventPayload::SproutHarvested(p) => {
                non_empty("sproutId", p.sprout_id.is_empty())?;
                if !(1..=5).contains(&p.result) {
                    return Err(KernelError::MalformedEvent(format!("result must be 1-5, got {}", p.result)));
                }
                amount("capacityGained", p.capacity_gained)
            }
            EventPayload::SproutUprooted(p) => {
                non_empty("sproutId", p.sprout_id.is_empty())?;
                amount("soilReturned", p.soil_returned)
            }
            EventPayload::SunShone(p) => non_empty("twigId", p.twig_id.is_empty()),
            EventPayload::LeafCreated(p) => {
                non_empty("leafId", p.leaf_id.is_empty())?;
                non_empty("twigId", p.twig_id.is_empty())
            }
            EventPayload::SproutEdited(p) => non_empty("sproutId", p.sprout_id.is_empty()),
        }
    }

    /// Decodes one loosely typed JSON event and checks it.
    pub fn from_value(value: Value) -> KernelResult<Self> {
        let event: TrunkEvent = serde_json::from_value(value)
            .map_err(|e| KernelError::MalformedEvent(e.to_string()))?;
        event.check()?;
        Ok(event)
    }
}

/// Persisted event record, local and remote.
///
/// The payload is nested rather than flattened so the remote table has a
/// fixed set of columns. `id` is assigned by the server and never used for
/// ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub client_id: ClientId,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    #[serde(with = "crate::time::iso8601")]
    pub client_timestamp: DateTime<Utc>,
}

const ENVELOPE_KEYS: [&str; 4] = ["type", "timestamp", "clientId", "userId"];

impl EventRow {
    pub fn from_event(event: &TrunkEvent, user_id: &str) -> KernelResult<Self> {
        let client_id = event.client_id.clone().ok_or(KernelError::MissingClientId)?;
        let mut payload = match serde_json::to_value(&event.payload)? {
            Value::Object(map) => map,
            other => return Err(KernelError::MalformedEvent(format!("payload is not an object: {other}"))),
        };
        for key in ENVELOPE_KEYS {
            payload.remove(key);
        }
        Ok(Self {
            id: None,
            client_id,
            user_id: user_id.to_string(),
            kind: event.kind().as_str().to_string(),
            payload: Value::Object(payload),
            client_timestamp: event.timestamp,
        })
    }

    pub fn into_event(&self) -> KernelResult<TrunkEvent> {
        let mut obj = match &self.payload {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => return Err(KernelError::MalformedEvent(format!("payload is not an object: {other}"))),
        };
        obj.insert("type".into(), Value::String(self.kind.clone()));
        obj.insert("timestamp".into(), Value::String(format_timestamp(&self.client_timestamp)));
        obj.insert("clientId".into(), Value::String(self.client_id.0.clone()));
        obj.insert("userId".into(), Value::String(self.user_id.clone()));
        TrunkEvent::from_value(Value::Object(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;
    use serde_json::json;

    fn planted() -> TrunkEvent {
        TrunkEvent::new(
            EventPayload::SproutPlanted(SproutPlanted {
                sprout_id: "s1".into(),
                twig_id: "branch-0-twig-1".into(),
                title: "Run a 10k".into(),
                season: Season::ThreeMonths,
                environment: Environment::Firm,
                soil_cost: 8.0,
                leaf_id: None,
                bloom_wither: None,
                bloom_budding: None,
                bloom_flourish: Some("sub 50 minutes".into()),
            }),
            parse_timestamp("2025-01-10T09:00:00.000Z").unwrap(),
        )
        .with_client_id("c-1")
    }

    #[test]
    fn test_wire_shape_is_flat_and_tagged() {
        let value = serde_json::to_value(planted()).unwrap();
        assert_eq!(value["type"], "sprout_planted");
        assert_eq!(value["sproutId"], "s1");
        assert_eq!(value["season"], "3m");
        assert_eq!(value["timestamp"], "2025-01-10T09:00:00.000Z");
        assert_eq!(value["clientId"], "c-1");
        assert!(value.get("leafId").is_none());
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let value = json!({
            "type": "sprout_planted",
            "timestamp": "2025-01-10T09:00:00.000Z",
            "sproutId": "s1",
            "twigId": "t",
            "title": "x",
            "season": "3m",
            "environment": "firm"
        });
        assert!(matches!(TrunkEvent::from_value(value), Err(KernelError::MalformedEvent(_))));
    }

    #[test]
    fn test_out_of_range_result_is_malformed() {
        let value = json!({
            "type": "sprout_harvested",
            "timestamp": "2025-01-10T09:00:00.000Z",
            "sproutId": "s1",
            "result": 9,
            "capacityGained": 1.0
        });
        assert!(TrunkEvent::from_value(value).is_err());
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let value = json!({"type": "sprout_composted", "timestamp": "2025-01-10T09:00:00.000Z"});
        assert!(TrunkEvent::from_value(value).is_err());
    }

    #[test]
    fn test_row_nests_payload_without_envelope() {
        let row = EventRow::from_event(&planted(), "user-1").unwrap();
        assert_eq!(row.kind, "sprout_planted");
        assert_eq!(row.client_id, ClientId::from("c-1"));
        assert!(row.payload.get("type").is_none());
        assert!(row.payload.get("timestamp").is_none());
        assert_eq!(row.payload["soilCost"], 8.0);

        let back = row.into_event().unwrap();
        assert_eq!(back.payload, planted().payload);
        assert_eq!(back.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_row_requires_client_id() {
        let mut event = planted();
        event.client_id = None;
        assert_eq!(EventRow::from_event(&event, "u"), Err(KernelError::MissingClientId));
    }

    #[test]
    fn test_same_action_ignores_identity_and_time() {
        let a = planted();
        let mut b = planted().with_client_id("c-2");
        b.timestamp = parse_timestamp("2025-01-10T09:00:00.300Z").unwrap();
        assert!(a.same_action(&b));
    }
}
