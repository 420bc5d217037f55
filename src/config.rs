// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Soil economy constants.
//!
//! These numbers are part of the cross-client contract: two clients that
//! disagree on any of them derive different soil figures from the same log.
//! Bump [`CONTRACT_VERSION`] whenever a value changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::KernelResult;
use crate::types::{Environment, Season};

pub const CONTRACT_VERSION: u32 = 1;

/// Used when a season/environment pair is missing from a custom cost table.
/// Never reached with the default table.
pub const FALLBACK_SOIL_COST: u32 = 5;

/// Result used when a harvest carries a result outside 1..=5 ("good").
pub const FALLBACK_RESULT: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(&self) -> chrono::Weekday {
        match self {
            WeekStart::Monday => chrono::Weekday::Mon,
            WeekStart::Sunday => chrono::Weekday::Sun,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub contract_version: u32,
    pub starting_capacity: f64,
    pub max_capacity: f64,
    /// Exponent `p` of the diminishing factor `(1 - c/max)^p`.
    pub diminishing_exponent: f64,
    pub planting_costs: BTreeMap<Season, BTreeMap<Environment, u32>>,
    pub base_rewards: BTreeMap<Season, f64>,
    pub environment_multipliers: BTreeMap<Environment, f64>,
    /// Keyed by result 1..=5.
    pub result_multipliers: BTreeMap<u8, f64>,
    /// Share of the planting cost handed back when a sprout is uprooted.
    pub uproot_refund_rate: f64,
    pub water_recovery: f64,
    pub sun_recovery: f64,
    pub water_daily_capacity: u32,
    pub sun_weekly_capacity: u32,
    /// Local hour (0-23) at which the daily and weekly allowances reset.
    pub reset_hour: u32,
    pub week_start: WeekStart,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        use Environment::*;
        use Season::*;

        let costs = [
            (TwoWeeks, [2, 3, 4]),
            (OneMonth, [3, 5, 6]),
            (ThreeMonths, [5, 8, 10]),
            (SixMonths, [8, 12, 16]),
            (OneYear, [12, 18, 24]),
        ];
        let planting_costs = costs
            .into_iter()
            .map(|(season, [fertile, firm, barren])| {
                (
                    season,
                    BTreeMap::from([(Fertile, fertile), (Firm, firm), (Barren, barren)]),
                )
            })
            .collect();

        Self {
            contract_version: CONTRACT_VERSION,
            starting_capacity: 10.0,
            max_capacity: 120.0,
            diminishing_exponent: 1.5,
            planting_costs,
            base_rewards: BTreeMap::from([
                (TwoWeeks, 0.26),
                (OneMonth, 0.56),
                (ThreeMonths, 1.95),
                (SixMonths, 4.16),
                (OneYear, 8.84),
            ]),
            environment_multipliers: BTreeMap::from([(Fertile, 1.1), (Firm, 1.75), (Barren, 2.4)]),
            result_multipliers: BTreeMap::from([
                (1, 0.4),
                (2, 0.55),
                (3, 0.7),
                (4, 0.85),
                (5, 1.0),
            ]),
            uproot_refund_rate: 0.25,
            water_recovery: 0.05,
            sun_recovery: 0.35,
            water_daily_capacity: 3,
            sun_weekly_capacity: 1,
            reset_hour: 6,
            week_start: WeekStart::Monday,
        }
    }
}

impl ResourceConfig {
    /// Loads a shared constants file. Missing keys are an error: a partial
    /// contract is worse than none.
    pub fn from_json(json: &str) -> KernelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> KernelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
