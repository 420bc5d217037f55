// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event builders and a seeded RNG shared by the kernel tests.

use chrono::{DateTime, Duration, Utc};

use crate::event::*;
use crate::time::parse_timestamp;
use crate::types::{Environment, Season};

/// A simple deterministic RNG for tests.
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed, inc: 1 }
    }

    pub fn next_u32(&mut self) -> u32 {
        let oldstate = self.state;
        self.state = oldstate.wrapping_mul(6364136223846793005).wrapping_add(self.inc);
        let xorshifted = (((oldstate >> 18) ^ oldstate) >> 27) as u32;
        let rot = (oldstate >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    /// Fisher-Yates.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i as u32 + 1) as usize;
            items.swap(i, j);
        }
    }
}

pub fn t0() -> DateTime<Utc> {
    parse_timestamp("2025-01-01T09:00:00.000Z").unwrap()
}

pub fn at_day(day: i64) -> DateTime<Utc> {
    t0() + Duration::days(day)
}

pub fn plant(id: &str, season: Season, env: Environment, cost: f64, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutPlanted(SproutPlanted {
            sprout_id: id.into(),
            twig_id: "branch-0-twig-0".into(),
            title: format!("goal {id}"),
            season,
            environment: env,
            soil_cost: cost,
            leaf_id: None,
            bloom_wither: None,
            bloom_budding: None,
            bloom_flourish: None,
        }),
        ts,
    )
}

pub fn water(id: &str, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutWatered(SproutWatered {
            sprout_id: id.into(),
            content: "did the thing".into(),
            prompt: None,
        }),
        ts,
    )
}

pub fn harvest(id: &str, result: u8, gained: f64, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutHarvested(SproutHarvested {
            sprout_id: id.into(),
            result,
            capacity_gained: gained,
            reflection: None,
        }),
        ts,
    )
}

pub fn uproot(id: &str, returned: f64, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutUprooted(SproutUprooted {
            sprout_id: id.into(),
            soil_returned: returned,
        }),
        ts,
    )
}

pub fn sun(twig: &str, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SunShone(SunShone {
            twig_id: twig.into(),
            twig_label: "Health".into(),
            content: "a good week".into(),
            prompt: None,
        }),
        ts,
    )
}

pub fn leaf(id: &str, twig: &str, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::LeafCreated(LeafCreated {
            leaf_id: id.into(),
            twig_id: twig.into(),
            name: format!("saga {id}"),
        }),
        ts,
    )
}

pub fn edit_title(id: &str, title: &str, ts: DateTime<Utc>) -> TrunkEvent {
    TrunkEvent::new(
        EventPayload::SproutEdited(SproutEdited {
            sprout_id: id.into(),
            title: Some(title.into()),
            bloom_wither: None,
            bloom_budding: None,
            bloom_flourish: None,
            leaf_id: None,
        }),
        ts,
    )
}

/// A random well-formed log. Timestamps are drawn from a small pool so ties
/// are common; client ids are unique.
pub fn random_log(rng: &mut Pcg32, len: usize) -> Vec<TrunkEvent> {
    (0..len)
        .map(|i| {
            let ts = t0() + Duration::hours(i64::from(rng.below(48)));
            let sprout = format!("s{}", rng.below(6));
            let event = match rng.below(7) {
                0 | 1 => plant(&sprout, Season::ALL[rng.below(5) as usize], Environment::ALL[rng.below(3) as usize], f64::from(rng.below(12) + 1), ts),
                2 => water(&sprout, ts),
                3 => harvest(&sprout, (rng.below(5) + 1) as u8, f64::from(rng.below(20)) / 10.0, ts),
                4 => uproot(&sprout, f64::from(rng.below(8)) / 4.0, ts),
                5 => sun(&format!("branch-{}-twig-0", rng.below(3)), ts),
                _ => leaf(&format!("l{}", rng.below(3)), "branch-0-twig-0", ts),
            };
            event.with_client_id(format!("c-{i:04}"))
        })
        .collect()
}
