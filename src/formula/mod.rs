// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Resource Formula Engine.
//!
//! Pure functions over [`crate::config::ResourceConfig`]. No state, no clocks:
//! callers pass `now` in.

pub mod soil;
pub mod reset;
pub mod progress;

pub use progress::progress;
pub use reset::{
    daily_boundary, next_daily_reset, next_weekly_reset, should_reset_daily, should_reset_weekly,
    weekly_boundary,
};
pub use soil::{capacity_reward, diminishing_factor, result_multiplier, soil_cost, uproot_refund};
