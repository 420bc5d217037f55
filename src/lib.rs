// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! trunk-kernel: the deterministic core of Trunk.
//!
//! Event types, the soil economy formulas, the replay fold that turns an event
//! log into [`state::DerivedState`], and the validate/sanitize gate for
//! externally supplied data. Everything here is synchronous and free of I/O so
//! that every client derives the same state from the same log.

pub mod config;
pub mod error;
pub mod time;
pub mod types;
pub mod event;
pub mod formula;
pub mod state;
pub mod replay;
pub mod resources;
pub mod validate;
pub mod export;
pub mod verify;

pub use config::ResourceConfig;
pub use error::{KernelError, KernelResult};
pub use event::{EventPayload, EventRow, TrunkEvent};
pub use replay::{derive, derive_state, Derivation};
pub use state::DerivedState;

#[cfg(test)]
mod tests;
