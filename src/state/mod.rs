// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Derived state: what the event log means right now.

pub mod derived;
pub mod index;
pub mod apply;

pub use apply::{ApplyOutcome, IgnoreReason};
pub use derived::{DerivedLeaf, DerivedSprout, DerivedState, SoilSnapshot, SunEntry, WaterEntry};
pub use index::StateIndexes;
