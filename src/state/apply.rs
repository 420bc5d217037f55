// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! One step of the derivation fold.
//!
//! `apply_event` never fails: an event that cannot act on the current state is
//! reported as ignored and leaves every field untouched.

use chrono::{DateTime, Utc};

use crate::config::ResourceConfig;
use crate::error::{KernelError, KernelResult};
use crate::event::{EventPayload, TrunkEvent};
use crate::state::derived::{DerivedLeaf, DerivedSprout, DerivedState, SoilSnapshot, SunEntry, WaterEntry};
use crate::types::{LeafId, SproutId, SproutState};

/// Tolerance for accumulated float error in invariant checks.
const EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Ignored(IgnoreReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    DuplicateSprout(SproutId),
    DuplicateLeaf(LeafId),
    UnknownSprout(SproutId),
    /// Harvest or uproot aimed at a sprout that already left `active`.
    NotActive(SproutId, SproutState),
}

impl DerivedState {
    fn credit(&mut self, amount: f64) {
        self.soil_available = (self.soil_available + amount).min(self.soil_capacity);
    }

    fn debit(&mut self, amount: f64) {
        self.soil_available = (self.soil_available - amount).max(0.0);
    }

    fn record_soil(&mut self, timestamp: DateTime<Utc>) {
        self.soil_history.push(SoilSnapshot {
            timestamp,
            capacity: self.soil_capacity,
            available: self.soil_available,
        });
    }

    /// Folds one event into the state. Indexes are not touched; rebuild them
    /// once the fold is finished.
    pub fn apply_event(&mut self, event: &TrunkEvent, cfg: &ResourceConfig) -> ApplyOutcome {
        let ts = event.timestamp;
        let outcome = match &event.payload {
            EventPayload::SproutPlanted(p) => {
                if self.sprouts.contains_key(&p.sprout_id) {
                    return ApplyOutcome::Ignored(IgnoreReason::DuplicateSprout(p.sprout_id.clone()));
                }
                self.debit(p.soil_cost);
                self.sprouts.insert(
                    p.sprout_id.clone(),
                    DerivedSprout {
                        id: p.sprout_id.clone(),
                        twig_id: p.twig_id.clone(),
                        title: p.title.clone(),
                        season: p.season,
                        environment: p.environment,
                        soil_cost: p.soil_cost,
                        state: SproutState::Active,
                        planted_at: ts,
                        leaf_id: p.leaf_id.clone(),
                        bloom_wither: p.bloom_wither.clone(),
                        bloom_budding: p.bloom_budding.clone(),
                        bloom_flourish: p.bloom_flourish.clone(),
                        result: None,
                        reflection: None,
                        harvested_at: None,
                        uprooted_at: None,
                        water_entries: Vec::new(),
                    },
                );
                ApplyOutcome::Applied
            }
            EventPayload::SproutWatered(p) => {
                // Dangling references still recover soil.
                if let Some(sprout) = self.sprouts.get_mut(&p.sprout_id) {
                    sprout.water_entries.push(WaterEntry {
                        timestamp: ts,
                        content: p.content.clone(),
                        prompt: p.prompt.clone(),
                    });
                }
                self.credit(cfg.water_recovery);
                ApplyOutcome::Applied
            }
            EventPayload::SproutHarvested(p) => {
                let Some(sprout) = self.sprouts.get_mut(&p.sprout_id) else {
                    return ApplyOutcome::Ignored(IgnoreReason::UnknownSprout(p.sprout_id.clone()));
                };
                if sprout.state != SproutState::Active {
                    return ApplyOutcome::Ignored(IgnoreReason::NotActive(p.sprout_id.clone(), sprout.state));
                }
                sprout.state = SproutState::Completed;
                sprout.result = Some(p.result);
                sprout.reflection = p.reflection.clone();
                sprout.harvested_at = Some(ts);
                let returned = sprout.soil_cost;

                self.soil_capacity += p.capacity_gained;
                self.credit(returned);
                ApplyOutcome::Applied
            }
            EventPayload::SproutUprooted(p) => {
                let Some(sprout) = self.sprouts.get_mut(&p.sprout_id) else {
                    return ApplyOutcome::Ignored(IgnoreReason::UnknownSprout(p.sprout_id.clone()));
                };
                if sprout.state != SproutState::Active {
                    return ApplyOutcome::Ignored(IgnoreReason::NotActive(p.sprout_id.clone(), sprout.state));
                }
                sprout.state = SproutState::Uprooted;
                sprout.uprooted_at = Some(ts);
                self.credit(p.soil_returned);
                ApplyOutcome::Applied
            }
            EventPayload::SunShone(p) => {
                self.sun_entries.push(SunEntry {
                    timestamp: ts,
                    twig_id: p.twig_id.clone(),
                    twig_label: p.twig_label.clone(),
                    content: p.content.clone(),
                    prompt: p.prompt.clone(),
                });
                self.credit(cfg.sun_recovery);
                ApplyOutcome::Applied
            }
            EventPayload::LeafCreated(p) => {
                if self.leaves.contains_key(&p.leaf_id) {
                    return ApplyOutcome::Ignored(IgnoreReason::DuplicateLeaf(p.leaf_id.clone()));
                }
                self.leaves.insert(
                    p.leaf_id.clone(),
                    DerivedLeaf {
                        id: p.leaf_id.clone(),
                        twig_id: p.twig_id.clone(),
                        name: p.name.clone(),
                        created_at: ts,
                    },
                );
                ApplyOutcome::Applied
            }
            EventPayload::SproutEdited(p) => {
                let Some(sprout) = self.sprouts.get_mut(&p.sprout_id) else {
                    return ApplyOutcome::Ignored(IgnoreReason::UnknownSprout(p.sprout_id.clone()));
                };
                if let Some(title) = &p.title {
                    sprout.title = title.clone();
                }
                if let Some(v) = &p.bloom_wither {
                    sprout.bloom_wither = Some(v.clone());
                }
                if let Some(v) = &p.bloom_budding {
                    sprout.bloom_budding = Some(v.clone());
                }
                if let Some(v) = &p.bloom_flourish {
                    sprout.bloom_flourish = Some(v.clone());
                }
                if let Some(leaf) = &p.leaf_id {
                    sprout.leaf_id = Some(leaf.clone());
                }
                ApplyOutcome::Applied
            }
        };

        if event.kind().affects_soil() {
            self.record_soil(ts);
        }
        outcome
    }

    /// Soil bounds only; holds after every step of the fold.
    pub fn check_soil_invariants(&self) -> KernelResult<()> {
        if !self.soil_capacity.is_finite() || !self.soil_available.is_finite() {
            return Err(KernelError::InvariantViolation("soil figures must be finite".into()));
        }
        if self.soil_available < -EPSILON {
            return Err(KernelError::InvariantViolation(format!(
                "soilAvailable {} below zero",
                self.soil_available
            )));
        }
        if self.soil_available > self.soil_capacity + EPSILON {
            return Err(KernelError::InvariantViolation(format!(
                "soilAvailable {} exceeds soilCapacity {}",
                self.soil_available, self.soil_capacity
            )));
        }

        for pair in self.soil_history.windows(2) {
            if pair[1].capacity + EPSILON < pair[0].capacity {
                return Err(KernelError::InvariantViolation(format!(
                    "soilCapacity decreased from {} to {}",
                    pair[0].capacity, pair[1].capacity
                )));
            }
        }
        Ok(())
    }

    /// Soil bounds, sprout lifecycle fields, and index agreement. Only
    /// meaningful once indexes have been rebuilt.
    pub fn check_invariants(&self) -> KernelResult<()> {
        self.check_soil_invariants()?;

        for (id, sprout) in &self.sprouts {
            if id != &sprout.id {
                return Err(KernelError::InvariantViolation(format!("sprout keyed {id} carries id {}", sprout.id)));
            }
            match sprout.state {
                SproutState::Completed if sprout.harvested_at.is_none() => {
                    return Err(KernelError::InvariantViolation(format!("completed sprout {id} has no harvestedAt")));
                }
                SproutState::Uprooted if sprout.uprooted_at.is_none() => {
                    return Err(KernelError::InvariantViolation(format!("uprooted sprout {id} has no uprootedAt")));
                }
                _ => {}
            }
        }

        let indexed: usize = self.indexes.sprouts_by_twig.values().map(Vec::len).sum();
        if indexed != self.sprouts.len() {
            return Err(KernelError::InvariantViolation(format!(
                "twig index holds {indexed} sprouts, map holds {}",
                self.sprouts.len()
            )));
        }
        for ids in self.indexes.active_sprouts_by_twig.values() {
            for id in ids {
                if !self.sprouts.get(id).is_some_and(|s| s.is_active()) {
                    return Err(KernelError::InvariantViolation(format!("active index lists inactive sprout {id}")));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SproutHarvested, SproutPlanted, SproutUprooted, SproutWatered};
    use crate::time::parse_timestamp;
    use crate::types::{Environment, Season};

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn plant(id: &str, cost: f64) -> TrunkEvent {
        TrunkEvent::new(
            EventPayload::SproutPlanted(SproutPlanted {
                sprout_id: id.into(),
                twig_id: "branch-0-twig-0".into(),
                title: "t".into(),
                season: Season::TwoWeeks,
                environment: Environment::Firm,
                soil_cost: cost,
                leaf_id: None,
                bloom_wither: None,
                bloom_budding: None,
                bloom_flourish: None,
            }),
            at("2025-01-01T10:00:00.000Z"),
        )
    }

    #[test]
    fn test_plant_deducts_and_clamps_at_zero() {
        let cfg = ResourceConfig::default();
        let mut state = DerivedState::new(&cfg);
        state.apply_event(&plant("a", 8.0), &cfg);
        assert_eq!(state.soil_available, 2.0);
        state.apply_event(&plant("b", 8.0), &cfg);
        assert_eq!(state.soil_available, 0.0);
        assert_eq!(state.soil_history.len(), 2);
    }

    #[test]
    fn test_second_plant_with_same_id_ignored() {
        let cfg = ResourceConfig::default();
        let mut state = DerivedState::new(&cfg);
        state.apply_event(&plant("a", 3.0), &cfg);
        let outcome = state.apply_event(&plant("a", 3.0), &cfg);
        assert_eq!(outcome, ApplyOutcome::Ignored(IgnoreReason::DuplicateSprout("a".into())));
        assert_eq!(state.soil_available, 7.0);
    }

    #[test]
    fn test_harvest_returns_cost_clamped_to_new_capacity() {
        let cfg = ResourceConfig::default();
        let mut state = DerivedState::new(&cfg);
        state.apply_event(&plant("a", 3.0), &cfg);
        let harvest = TrunkEvent::new(
            EventPayload::SproutHarvested(SproutHarvested {
                sprout_id: "a".into(),
                result: 5,
                capacity_gained: 0.5,
                reflection: None,
            }),
            at("2025-01-15T10:00:00.000Z"),
        );
        assert_eq!(state.apply_event(&harvest, &cfg), ApplyOutcome::Applied);
        assert_eq!(state.soil_capacity, 10.5);
        assert_eq!(state.soil_available, 10.0);
        assert_eq!(state.sprouts[&SproutId::from("a")].state, SproutState::Completed);

        // Terminal now: neither a second harvest nor an uproot moves soil.
        let before = (state.soil_capacity, state.soil_available);
        assert!(matches!(state.apply_event(&harvest, &cfg), ApplyOutcome::Ignored(_)));
        let uproot = TrunkEvent::new(
            EventPayload::SproutUprooted(SproutUprooted { sprout_id: "a".into(), soil_returned: 1.0 }),
            at("2025-01-16T10:00:00.000Z"),
        );
        assert!(matches!(state.apply_event(&uproot, &cfg), ApplyOutcome::Ignored(_)));
        assert_eq!((state.soil_capacity, state.soil_available), before);
    }

    #[test]
    fn test_watering_unknown_sprout_recovers_soil_only() {
        let cfg = ResourceConfig::default();
        let mut state = DerivedState::new(&cfg);
        state.apply_event(&plant("a", 5.0), &cfg);
        let water = TrunkEvent::new(
            EventPayload::SproutWatered(SproutWatered {
                sprout_id: "ghost".into(),
                content: "ran".into(),
                prompt: None,
            }),
            at("2025-01-02T10:00:00.000Z"),
        );
        state.apply_event(&water, &cfg);
        assert!((state.soil_available - 5.05).abs() < 1e-12);
        assert!(state.sprouts.values().all(|s| s.water_entries.is_empty()));
    }

    #[test]
    fn test_invariants_catch_overfull_soil() {
        let cfg = ResourceConfig::default();
        let mut state = DerivedState::new(&cfg);
        assert!(state.check_invariants().is_ok());
        state.soil_available = 11.0;
        assert!(state.check_invariants().is_err());
    }
}
