//! Deterministic Hashing and Verification.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{DateTime, Utc};

use crate::state::DerivedState;

/// Length-prefixed so `("ab", "c")` and `("a", "bc")` hash differently.
fn put_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn put_opt_str(hasher: &mut blake3::Hasher, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update(&[1]);
            put_str(hasher, s);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn put_f64(hasher: &mut blake3::Hasher, v: f64) {
    hasher.update(&v.to_bits().to_le_bytes());
}

fn put_ts(hasher: &mut blake3::Hasher, ts: &DateTime<Utc>) {
    hasher.update(&ts.timestamp_millis().to_le_bytes());
}

fn put_opt_ts(hasher: &mut blake3::Hasher, ts: Option<&DateTime<Utc>>) {
    match ts {
        Some(ts) => {
            hasher.update(&[1]);
            put_ts(hasher, ts);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Fingerprint of a derived state.
///
/// Two clients that derived the same state from the same log produce the
/// same 32 bytes. Floats are hashed by bit pattern, so any divergence in the
/// soil arithmetic shows up here.
///
/// Covers soil figures, sprouts, leaves and sun entries in canonical order.
/// Excludes the secondary indexes (derived from the maps) and the soil
/// history (derived from the log).
pub fn state_hash(state: &DerivedState) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();

    // 1. Soil
    put_f64(&mut hasher, state.soil_capacity);
    put_f64(&mut hasher, state.soil_available);

    // 2. Sprouts (BTreeMap: by id)
    hasher.update(&(state.sprouts.len() as u64).to_le_bytes());
    for sprout in state.sprouts.values() {
        put_str(&mut hasher, sprout.id.as_str());
        put_str(&mut hasher, sprout.twig_id.as_str());
        put_str(&mut hasher, &sprout.title);
        put_str(&mut hasher, sprout.season.as_str());
        put_str(&mut hasher, sprout.environment.as_str());
        put_f64(&mut hasher, sprout.soil_cost);
        put_str(&mut hasher, sprout.state.as_str());
        put_ts(&mut hasher, &sprout.planted_at);
        put_opt_str(&mut hasher, sprout.leaf_id.as_ref().map(|l| l.as_str()));
        put_opt_str(&mut hasher, sprout.bloom_wither.as_deref());
        put_opt_str(&mut hasher, sprout.bloom_budding.as_deref());
        put_opt_str(&mut hasher, sprout.bloom_flourish.as_deref());
        hasher.update(&[sprout.result.unwrap_or(0)]);
        put_opt_str(&mut hasher, sprout.reflection.as_deref());
        put_opt_ts(&mut hasher, sprout.harvested_at.as_ref());
        put_opt_ts(&mut hasher, sprout.uprooted_at.as_ref());

        hasher.update(&(sprout.water_entries.len() as u64).to_le_bytes());
        for water in &sprout.water_entries {
            put_ts(&mut hasher, &water.timestamp);
            put_str(&mut hasher, &water.content);
            put_opt_str(&mut hasher, water.prompt.as_deref());
        }
    }

    // 3. Leaves (BTreeMap: by id)
    hasher.update(&(state.leaves.len() as u64).to_le_bytes());
    for leaf in state.leaves.values() {
        put_str(&mut hasher, leaf.id.as_str());
        put_str(&mut hasher, leaf.twig_id.as_str());
        put_str(&mut hasher, &leaf.name);
        put_ts(&mut hasher, &leaf.created_at);
    }

    // 4. Sun entries (fold order)
    hasher.update(&(state.sun_entries.len() as u64).to_le_bytes());
    for sun in &state.sun_entries {
        put_ts(&mut hasher, &sun.timestamp);
        put_str(&mut hasher, sun.twig_id.as_str());
        put_str(&mut hasher, &sun.twig_label);
        put_str(&mut hasher, &sun.content);
        put_opt_str(&mut hasher, sun.prompt.as_deref());
    }

    *hasher.finalize().as_bytes()
}

pub fn state_hash_hex(state: &DerivedState) -> String {
    blake3::Hash::from(state_hash(state)).to_hex().to_string()
}
