// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Domain enums.

use chrono::Duration;
use core::fmt;
use serde::{Deserialize, Serialize};

/// How long a sprout runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    #[serde(rename = "2w")]
    TwoWeeks,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Season {
    pub const ALL: [Season; 5] = [
        Season::TwoWeeks,
        Season::OneMonth,
        Season::ThreeMonths,
        Season::SixMonths,
        Season::OneYear,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2w" => Some(Season::TwoWeeks),
            "1m" => Some(Season::OneMonth),
            "3m" => Some(Season::ThreeMonths),
            "6m" => Some(Season::SixMonths),
            "1y" => Some(Season::OneYear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::TwoWeeks => "2w",
            Season::OneMonth => "1m",
            Season::ThreeMonths => "3m",
            Season::SixMonths => "6m",
            Season::OneYear => "1y",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Season::TwoWeeks => 14,
            Season::OneMonth => 30,
            Season::ThreeMonths => 90,
            Season::SixMonths => 182,
            Season::OneYear => 365,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.days())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How hard a sprout is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Fertile,
    Firm,
    Barren,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Fertile, Environment::Firm, Environment::Barren];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fertile" => Some(Environment::Fertile),
            "firm" => Some(Environment::Firm),
            "barren" => Some(Environment::Barren),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Fertile => "fertile",
            Environment::Firm => "firm",
            Environment::Barren => "barren",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a derived sprout. `Completed` and `Uprooted` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SproutState {
    Active,
    Completed,
    Uprooted,
}

impl SproutState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SproutState::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SproutState::Active => "active",
            SproutState::Completed => "completed",
            SproutState::Uprooted => "uprooted",
        }
    }

    /// Maps stored state strings, including the retired `draft` and `failed`
    /// values, onto the current state machine. Showing up counts, so a
    /// `failed` sprout becomes `completed`.
    pub fn from_legacy(s: &str) -> Option<Self> {
        match s {
            "active" | "draft" => Some(SproutState::Active),
            "completed" | "failed" => Some(SproutState::Completed),
            "uprooted" => Some(SproutState::Uprooted),
            _ => None,
        }
    }
}

/// Discriminant of an event, matching the `type` tag on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SproutPlanted,
    SproutWatered,
    SproutHarvested,
    SproutUprooted,
    SunShone,
    LeafCreated,
    SproutEdited,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SproutPlanted => "sprout_planted",
            EventKind::SproutWatered => "sprout_watered",
            EventKind::SproutHarvested => "sprout_harvested",
            EventKind::SproutUprooted => "sprout_uprooted",
            EventKind::SunShone => "sun_shone",
            EventKind::LeafCreated => "leaf_created",
            EventKind::SproutEdited => "sprout_edited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sprout_planted" => Some(EventKind::SproutPlanted),
            "sprout_watered" => Some(EventKind::SproutWatered),
            "sprout_harvested" => Some(EventKind::SproutHarvested),
            "sprout_uprooted" => Some(EventKind::SproutUprooted),
            "sun_shone" => Some(EventKind::SunShone),
            "leaf_created" => Some(EventKind::LeafCreated),
            "sprout_edited" => Some(EventKind::SproutEdited),
            _ => None,
        }
    }

    /// Kinds whose replay step touches the soil figures.
    pub fn affects_soil(&self) -> bool {
        !matches!(self, EventKind::LeafCreated | EventKind::SproutEdited)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_wire_names() {
        for season in Season::ALL {
            let json = serde_json::to_string(&season).unwrap();
            assert_eq!(json, format!("\"{}\"", season.as_str()));
            assert_eq!(Season::parse(season.as_str()), Some(season));
        }
    }

    #[test]
    fn test_legacy_states_migrate() {
        assert_eq!(SproutState::from_legacy("draft"), Some(SproutState::Active));
        assert_eq!(SproutState::from_legacy("failed"), Some(SproutState::Completed));
        assert_eq!(SproutState::from_legacy("wilted"), None);
    }
}
