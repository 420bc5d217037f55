// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Secondary indexes over the primary maps.
//!
//! Lists are ordered by planting (creation) time, ties by id, so every client
//! presents the same order.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::state::derived::{DerivedLeaf, DerivedSprout};
use crate::types::{LeafId, SproutId, TwigId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateIndexes {
    pub sprouts_by_twig: FxHashMap<TwigId, Vec<SproutId>>,
    pub active_sprouts_by_twig: FxHashMap<TwigId, Vec<SproutId>>,
    pub sprouts_by_leaf: FxHashMap<LeafId, Vec<SproutId>>,
    pub leaves_by_twig: FxHashMap<TwigId, Vec<LeafId>>,
}

impl StateIndexes {
    pub fn build(sprouts: &BTreeMap<SproutId, DerivedSprout>, leaves: &BTreeMap<LeafId, DerivedLeaf>) -> Self {
        let mut idx = StateIndexes::default();

        let mut ordered: Vec<&DerivedSprout> = sprouts.values().collect();
        ordered.sort_by(|a, b| a.planted_at.cmp(&b.planted_at).then_with(|| a.id.cmp(&b.id)));
        for sprout in ordered {
            idx.sprouts_by_twig
                .entry(sprout.twig_id.clone())
                .or_default()
                .push(sprout.id.clone());
            if sprout.is_active() {
                idx.active_sprouts_by_twig
                    .entry(sprout.twig_id.clone())
                    .or_default()
                    .push(sprout.id.clone());
            }
            if let Some(leaf) = &sprout.leaf_id {
                idx.sprouts_by_leaf.entry(leaf.clone()).or_default().push(sprout.id.clone());
            }
        }

        let mut ordered: Vec<&DerivedLeaf> = leaves.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        for leaf in ordered {
            idx.leaves_by_twig.entry(leaf.twig_id.clone()).or_default().push(leaf.id.clone());
        }

        idx
    }
}
