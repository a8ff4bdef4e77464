//! Bracket value types: round names, slots and seeds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TournamentError;
use crate::registration::EntrantId;

/// Canonical knockout round names, earliest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundName {
    RoundOf32,
    RoundOf16,
    Quarterfinal,
    Semifinal,
    Final,
}

impl RoundName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundName::RoundOf32 => "ROUND_OF_32",
            RoundName::RoundOf16 => "ROUND_OF_16",
            RoundName::Quarterfinal => "QUARTERFINAL",
            RoundName::Semifinal => "SEMIFINAL",
            RoundName::Final => "FINAL",
        }
    }

    /// Name of the round that holds `match_count` matches
    pub fn for_match_count(match_count: usize) -> Option<Self> {
        match match_count {
            1 => Some(RoundName::Final),
            2 => Some(RoundName::Semifinal),
            4 => Some(RoundName::Quarterfinal),
            8 => Some(RoundName::RoundOf16),
            16 => Some(RoundName::RoundOf32),
            _ => None,
        }
    }

    pub fn match_count(&self) -> usize {
        match self {
            RoundName::RoundOf32 => 16,
            RoundName::RoundOf16 => 8,
            RoundName::Quarterfinal => 4,
            RoundName::Semifinal => 2,
            RoundName::Final => 1,
        }
    }
}

impl fmt::Display for RoundName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundName {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ROUND_OF_32" => Ok(RoundName::RoundOf32),
            "ROUND_OF_16" => Ok(RoundName::RoundOf16),
            "QUARTERFINAL" => Ok(RoundName::Quarterfinal),
            "SEMIFINAL" => Ok(RoundName::Semifinal),
            "FINAL" => Ok(RoundName::Final),
            other => Err(TournamentError::InvalidBracket(format!(
                "unknown round '{other}'"
            ))),
        }
    }
}

/// Address of a bracket match: round plus 0-based position in that round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchSlot {
    pub round: RoundName,
    pub position: u32,
}

impl MatchSlot {
    pub fn new(round: RoundName, position: u32) -> Self {
        Self { round, position }
    }
}

impl fmt::Display for MatchSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.round, self.position)
    }
}

/// Side of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    A,
    B,
}

/// Occupant of one side of a bracket match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entrant_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Slot {
    /// Waiting for the feeder match
    Open,
    Entrant(EntrantId),
    /// No opponent; the other side advances
    Bye,
}

impl Slot {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Slot::Open)
    }

    pub fn entrant(&self) -> Option<EntrantId> {
        match self {
            Slot::Entrant(id) => Some(*id),
            _ => None,
        }
    }

    /// Storage discriminator
    pub fn kind_str(&self) -> &'static str {
        match self {
            Slot::Open => "open",
            Slot::Entrant(_) => "entrant",
            Slot::Bye => "bye",
        }
    }

    /// Rebuild a slot from its storage columns
    pub fn from_parts(kind: &str, entrant: Option<EntrantId>) -> Result<Self, TournamentError> {
        match (kind, entrant) {
            ("open", None) => Ok(Slot::Open),
            ("bye", None) => Ok(Slot::Bye),
            ("entrant", Some(id)) => Ok(Slot::Entrant(id)),
            (kind, entrant) => Err(TournamentError::Corrupt(format!(
                "invalid slot kind '{kind}' with entrant {entrant:?}"
            ))),
        }
    }
}

/// Final score of a bracket match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score_a: u32,
    pub score_b: u32,
}

impl MatchResult {
    pub fn winning_side(&self) -> Option<Side> {
        match self.score_a.cmp(&self.score_b) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Bracket seed derived from zone standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// 1 is the strongest
    pub seed: u32,
    pub entrant_id: EntrantId,
    pub zone_name: String,
    /// 1-based finishing position inside the zone
    pub zone_position: u32,
    pub has_bye: bool,
}

/// Seeds plus the bracket dimensions they imply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPlan {
    pub seeds: Vec<Seed>,
    pub bracket_size: usize,
    pub byes: usize,
}
