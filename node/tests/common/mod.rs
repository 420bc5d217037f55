// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use trunk_kernel::event::{EventPayload, LeafCreated, SproutPlanted, SproutWatered};
use trunk_kernel::time::parse_timestamp;
use trunk_kernel::types::{Environment, Season};
use trunk_kernel::TrunkEvent;
use trunk_node::config::NodeConfig;
use trunk_node::events::EventStore;
use trunk_node::network::MemoryRemote;
use trunk_node::sync::SyncEngine;
use trunk_node::table::EventTable;

pub fn t0() -> DateTime<Utc> {
    parse_timestamp("2025-04-07T09:00:00.000Z").unwrap()
}

pub fn config(user_id: &str) -> NodeConfig {
    NodeConfig {
        user_id: user_id.to_string(),
        network_timeout: Duration::from_millis(300),
        debounce_window: Duration::ZERO,
        reconnect_delay: Duration::from_millis(50),
        log_path: None,
        ..NodeConfig::default()
    }
}

pub fn plant(sprout: &str, minutes: i64) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutPlanted(SproutPlanted {
            sprout_id: sprout.into(),
            twig_id: "branch-0-twig-0".into(),
            title: format!("Goal {sprout}"),
            season: Season::OneMonth,
            environment: Environment::Firm,
            soil_cost: 5.0,
            leaf_id: None,
            bloom_wither: None,
            bloom_budding: None,
            bloom_flourish: None,
        }),
        t0() + ChronoDuration::minutes(minutes),
    )
}

pub fn water(sprout: &str, minutes: i64) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutWatered(SproutWatered {
            sprout_id: sprout.into(),
            content: format!("worked on {sprout} at +{minutes}m"),
            prompt: None,
        }),
        t0() + ChronoDuration::minutes(minutes),
    )
}

pub fn leaf(id: &str, minutes: i64) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::LeafCreated(LeafCreated {
            leaf_id: id.into(),
            twig_id: "branch-0-twig-0".into(),
            name: format!("Saga {id}"),
        }),
        t0() + ChronoDuration::minutes(minutes),
    )
}

pub struct Device {
    pub store: Arc<EventStore>,
    pub engine: Arc<SyncEngine>,
}

/// A device for `user_id` syncing against `remote`.
pub fn device(remote: &Arc<MemoryRemote>, user_id: &str) -> Device {
    let cfg = config(user_id);
    let store = Arc::new(EventStore::in_memory(cfg.debounce_window));
    let engine = Arc::new(SyncEngine::new(Arc::clone(&store), remote.clone(), &cfg));
    Device { store, engine }
}

pub fn memory_remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new(Arc::new(EventTable::new())))
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
