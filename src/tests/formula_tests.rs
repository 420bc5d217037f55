// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{FixedOffset, TimeZone};

use crate::config::ResourceConfig;
use crate::formula::*;
use crate::time::parse_timestamp;
use crate::types::{Environment, Season};

#[test]
fn test_three_month_firm_costs_eight() {
    assert_eq!(soil_cost(&ResourceConfig::default(), Season::ThreeMonths, Environment::Firm), 8);
}

#[test]
fn test_reward_at_half_capacity() {
    // 1.95 * 1.75 * 0.85 * (1 - 50/120)^1.5
    let cfg = ResourceConfig::default();
    let factor = diminishing_factor(&cfg, 50.0);
    assert!((factor - 0.445528).abs() < 1e-6);
    let reward = capacity_reward(&cfg, Season::ThreeMonths, Environment::Firm, 4, 50.0);
    assert!((reward - 1.2923).abs() < 1e-4, "reward {reward}");
}

#[test]
fn test_squared_exponent_is_configurable() {
    let cfg = ResourceConfig { diminishing_exponent: 2.0, ..ResourceConfig::default() };
    assert_eq!(diminishing_factor(&cfg, 60.0), 0.25);
}

#[test]
fn test_reward_shrinks_as_capacity_grows() {
    let cfg = ResourceConfig::default();
    let mut last = f64::MAX;
    for c in [10.0, 30.0, 60.0, 90.0, 119.0] {
        let r = capacity_reward(&cfg, Season::OneYear, Environment::Barren, 5, c);
        assert!(r < last);
        last = r;
    }
}

#[test]
fn test_daily_reset_boundary_scenario() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let last = tz.with_ymd_and_hms(2025, 3, 10, 23, 0, 0).unwrap().with_timezone(&chrono::Utc);
    let before = tz.with_ymd_and_hms(2025, 3, 11, 5, 59, 0).unwrap();
    let after = tz.with_ymd_and_hms(2025, 3, 11, 6, 1, 0).unwrap();
    assert!(!should_reset_daily(&last, &before, 6));
    assert!(should_reset_daily(&last, &after, 6));
}

#[test]
fn test_weekly_reset_needs_week_start_boundary() {
    let last = parse_timestamp("2025-03-12T12:00:00.000Z").unwrap(); // Wednesday
    let sunday = parse_timestamp("2025-03-16T23:00:00.000Z").unwrap();
    let monday_early = parse_timestamp("2025-03-17T05:00:00.000Z").unwrap();
    let monday = parse_timestamp("2025-03-17T06:00:00.000Z").unwrap();
    assert!(!should_reset_weekly(&last, &sunday, 6, chrono::Weekday::Mon));
    assert!(!should_reset_weekly(&last, &monday_early, 6, chrono::Weekday::Mon));
    assert!(should_reset_weekly(&last, &monday, 6, chrono::Weekday::Mon));
}
