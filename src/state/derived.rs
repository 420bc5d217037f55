// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Derived State definition.
//!
//! Recomputed from the log on demand and never persisted as authoritative.
//! Primary maps are `BTreeMap`s so iteration, encoding and hashing are
//! independent of insertion order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ResourceConfig;
use crate::formula;
use crate::state::index::StateIndexes;
use crate::types::{Environment, LeafId, Season, SproutId, SproutState, TwigId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterEntry {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSprout {
    pub id: SproutId,
    pub twig_id: TwigId,
    pub title: String,
    pub season: Season,
    pub environment: Environment,
    pub soil_cost: f64,
    pub state: SproutState,
    #[serde(with = "crate::time::iso8601")]
    pub planted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_id: Option<LeafId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_wither: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_budding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_flourish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::time::iso8601_opt")]
    pub harvested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::time::iso8601_opt")]
    pub uprooted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub water_entries: Vec<WaterEntry>,
}

impl DerivedSprout {
    pub fn is_active(&self) -> bool {
        self.state == SproutState::Active
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.planted_at + self.season.duration()
    }

    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        formula::progress(self.planted_at, self.season.duration(), now)
    }

    /// Active and past the end of its season.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.end_date()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedLeaf {
    pub id: LeafId,
    pub twig_id: TwigId,
    pub name: String,
    #[serde(with = "crate::time::iso8601")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SunEntry {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub twig_id: TwigId,
    pub twig_label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Soil figures right after one applied event; the series behind the soil chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilSnapshot {
    #[serde(with = "crate::time::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub capacity: f64,
    pub available: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedState {
    pub soil_capacity: f64,
    pub soil_available: f64,
    pub sprouts: BTreeMap<SproutId, DerivedSprout>,
    pub leaves: BTreeMap<LeafId, DerivedLeaf>,
    pub sun_entries: Vec<SunEntry>,
    pub soil_history: Vec<SoilSnapshot>,
    #[serde(skip)]
    pub indexes: StateIndexes,
}

impl DerivedState {
    /// Empty state: full soil at the starting capacity.
    pub fn new(cfg: &ResourceConfig) -> Self {
        Self {
            soil_capacity: cfg.starting_capacity,
            soil_available: cfg.starting_capacity,
            sprouts: BTreeMap::new(),
            leaves: BTreeMap::new(),
            sun_entries: Vec::new(),
            soil_history: Vec::new(),
            indexes: StateIndexes::default(),
        }
    }

    /// Indexes are not serialized; call after deserializing a state.
    pub fn rebuild_indexes(&mut self) {
        self.indexes = StateIndexes::build(&self.sprouts, &self.leaves);
    }

    // --- Read APIs ---

    pub fn sprout(&self, id: &SproutId) -> Option<&DerivedSprout> {
        self.sprouts.get(id)
    }

    pub fn leaf(&self, id: &LeafId) -> Option<&DerivedLeaf> {
        self.leaves.get(id)
    }

    fn resolve<'a>(&'a self, ids: Option<&'a Vec<SproutId>>) -> Vec<&'a DerivedSprout> {
        ids.map(|ids| ids.iter().filter_map(|id| self.sprouts.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn sprouts_for_twig(&self, twig: &TwigId) -> Vec<&DerivedSprout> {
        self.resolve(self.indexes.sprouts_by_twig.get(twig))
    }

    pub fn active_sprouts_for_twig(&self, twig: &TwigId) -> Vec<&DerivedSprout> {
        self.resolve(self.indexes.active_sprouts_by_twig.get(twig))
    }

    pub fn sprouts_for_leaf(&self, leaf: &LeafId) -> Vec<&DerivedSprout> {
        self.resolve(self.indexes.sprouts_by_leaf.get(leaf))
    }

    pub fn leaves_for_twig(&self, twig: &TwigId) -> Vec<&DerivedLeaf> {
        self.indexes
            .leaves_by_twig
            .get(twig)
            .map(|ids| ids.iter().filter_map(|id| self.leaves.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn active_sprouts(&self) -> impl Iterator<Item = &DerivedSprout> {
        self.sprouts.values().filter(|s| s.state == SproutState::Active)
    }

    pub fn completed_sprouts(&self) -> impl Iterator<Item = &DerivedSprout> {
        self.sprouts.values().filter(|s| s.state == SproutState::Completed)
    }

    pub fn ready_sprouts(&self, now: DateTime<Utc>) -> impl Iterator<Item = &DerivedSprout> {
        self.sprouts.values().filter(move |s| s.is_ready(now))
    }
}
