// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Planting cost and harvest reward.

use crate::config::{ResourceConfig, FALLBACK_RESULT, FALLBACK_SOIL_COST};
use crate::types::{Environment, Season};

/// Soil deducted when planting. Falls back to [`FALLBACK_SOIL_COST`] if the
/// configured table lacks the pair.
pub fn soil_cost(cfg: &ResourceConfig, season: Season, environment: Environment) -> u32 {
    cfg.planting_costs
        .get(&season)
        .and_then(|row| row.get(&environment))
        .copied()
        .unwrap_or(FALLBACK_SOIL_COST)
}

/// `max(0, 1 - c/max)^p`.
///
/// p = 1.5 and p = 2 are evaluated with `sqrt`/multiplication only, which
/// IEEE-754 rounds identically everywhere. Other exponents go through `powf`
/// and are not guaranteed bit-identical across platforms.
pub fn diminishing_factor(cfg: &ResourceConfig, current_capacity: f64) -> f64 {
    if cfg.max_capacity <= 0.0 {
        return 0.0;
    }
    let x = (1.0 - current_capacity / cfg.max_capacity).max(0.0);
    let p = cfg.diminishing_exponent;
    if p == 1.5 {
        x * x.sqrt()
    } else if p == 2.0 {
        x * x
    } else if p == 1.0 {
        x
    } else {
        x.powf(p)
    }
}

/// Unknown results count as "good".
pub fn result_multiplier(cfg: &ResourceConfig, result: u8) -> f64 {
    let key = if (1..=5).contains(&result) { result } else { FALLBACK_RESULT };
    cfg.result_multipliers.get(&key).copied().unwrap_or(0.0)
}

/// Capacity gained by a harvest, evaluated at harvest time and stored on the
/// event as `capacityGained`.
pub fn capacity_reward(
    cfg: &ResourceConfig,
    season: Season,
    environment: Environment,
    result: u8,
    current_capacity: f64,
) -> f64 {
    let base = cfg.base_rewards.get(&season).copied().unwrap_or(0.0);
    let env = cfg.environment_multipliers.get(&environment).copied().unwrap_or(1.0);
    base * env * result_multiplier(cfg, result) * diminishing_factor(cfg, current_capacity)
}

/// Soil handed back when an active sprout is uprooted.
pub fn uproot_refund(cfg: &ResourceConfig, soil_cost: f64) -> f64 {
    (soil_cost * cfg.uproot_refund_rate).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_table() {
        let cfg = ResourceConfig::default();
        assert_eq!(soil_cost(&cfg, Season::ThreeMonths, Environment::Firm), 8);
        assert_eq!(soil_cost(&cfg, Season::TwoWeeks, Environment::Fertile), 2);
        assert_eq!(soil_cost(&cfg, Season::OneYear, Environment::Barren), 24);
    }

    #[test]
    fn test_missing_cost_falls_back() {
        let mut cfg = ResourceConfig::default();
        cfg.planting_costs.remove(&Season::SixMonths);
        assert_eq!(soil_cost(&cfg, Season::SixMonths, Environment::Firm), FALLBACK_SOIL_COST);
    }

    #[test]
    fn test_diminishing_factor_bounds() {
        let cfg = ResourceConfig::default();
        assert_eq!(diminishing_factor(&cfg, 0.0), 1.0);
        assert_eq!(diminishing_factor(&cfg, 120.0), 0.0);
        assert_eq!(diminishing_factor(&cfg, 500.0), 0.0);
    }

    #[test]
    fn test_unknown_result_counts_as_good() {
        let cfg = ResourceConfig::default();
        assert_eq!(result_multiplier(&cfg, 0), result_multiplier(&cfg, 3));
        assert_eq!(result_multiplier(&cfg, 7), 0.7);
    }
}
