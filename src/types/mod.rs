// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod id;
pub mod enums;

pub use enums::{Environment, EventKind, Season, SproutState};
pub use id::{ClientId, LeafId, SproutId, TwigId};
