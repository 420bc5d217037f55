// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Water and sun allowances.
//!
//! Not stored anywhere: counted from the log against the most recent reset
//! boundary, so the figure is right for whatever `now` the caller passes and
//! no timer has to decrement anything.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::ResourceConfig;
use crate::event::TrunkEvent;
use crate::formula::{daily_boundary, next_daily_reset, next_weekly_reset, weekly_boundary};
use crate::types::EventKind;

fn count_since(events: &[TrunkEvent], kind: EventKind, since: DateTime<Utc>) -> u32 {
    let n = events
        .iter()
        .filter(|e| e.kind() == kind && e.timestamp >= since)
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub fn water_used<Tz: TimeZone>(events: &[TrunkEvent], now: &DateTime<Tz>, cfg: &ResourceConfig) -> u32 {
    let since = daily_boundary(now, cfg.reset_hour).with_timezone(&Utc);
    count_since(events, EventKind::SproutWatered, since)
}

pub fn sun_used<Tz: TimeZone>(events: &[TrunkEvent], now: &DateTime<Tz>, cfg: &ResourceConfig) -> u32 {
    let since = weekly_boundary(now, cfg.reset_hour, cfg.week_start.weekday()).with_timezone(&Utc);
    count_since(events, EventKind::SunShone, since)
}

/// Waterings left before the next daily reset.
pub fn water_available<Tz: TimeZone>(events: &[TrunkEvent], now: &DateTime<Tz>, cfg: &ResourceConfig) -> u32 {
    cfg.water_daily_capacity.saturating_sub(water_used(events, now, cfg))
}

/// Sun reflections left before the next weekly reset.
pub fn sun_available<Tz: TimeZone>(events: &[TrunkEvent], now: &DateTime<Tz>, cfg: &ResourceConfig) -> u32 {
    cfg.sun_weekly_capacity.saturating_sub(sun_used(events, now, cfg))
}

pub fn next_water_reset<Tz: TimeZone>(now: &DateTime<Tz>, cfg: &ResourceConfig) -> DateTime<Utc> {
    next_daily_reset(now, cfg.reset_hour).with_timezone(&Utc)
}

pub fn next_sun_reset<Tz: TimeZone>(now: &DateTime<Tz>, cfg: &ResourceConfig) -> DateTime<Utc> {
    next_weekly_reset(now, cfg.reset_hour, cfg.week_start.weekday()).with_timezone(&Utc)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowances {
    pub water_available: u32,
    pub water_capacity: u32,
    #[serde(with = "crate::time::iso8601")]
    pub next_water_reset: DateTime<Utc>,
    pub sun_available: u32,
    pub sun_capacity: u32,
    #[serde(with = "crate::time::iso8601")]
    pub next_sun_reset: DateTime<Utc>,
}

pub fn allowances<Tz: TimeZone>(events: &[TrunkEvent], now: &DateTime<Tz>, cfg: &ResourceConfig) -> Allowances {
    Allowances {
        water_available: water_available(events, now, cfg),
        water_capacity: cfg.water_daily_capacity,
        next_water_reset: next_water_reset(now, cfg),
        sun_available: sun_available(events, now, cfg),
        sun_capacity: cfg.sun_weekly_capacity,
        next_sun_reset: next_sun_reset(now, cfg),
    }
}
