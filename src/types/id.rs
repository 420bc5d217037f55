// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity types.
//!
//! All identities are opaque strings minted by clients. They are wrapped so a
//! sprout id can never be passed where a twig id is expected.

use core::fmt;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// A goal.
    SproutId
);
string_id!(
    /// A position on the tree; sprouts, leaves and sun entries hang off twigs.
    TwigId
);
string_id!(
    /// A saga grouping sprouts.
    LeafId
);
string_id!(
    /// Client-generated idempotency key of an event. Unique across devices.
    ClientId
);
