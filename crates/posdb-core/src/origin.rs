//! Game provenance, results and the (level, result) key used to segregate counters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provenance of a game in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameLevel {
    Human,
    Engine,
    Server,
}

impl GameLevel {
    pub const ALL: [GameLevel; 3] = [GameLevel::Human, GameLevel::Engine, GameLevel::Server];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameLevel::Human => "human",
            GameLevel::Engine => "engine",
            GameLevel::Server => "server",
        }
    }
}

/// Outcome of a game from White's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Draw,
    Loss,
}

impl GameResult {
    pub const ALL: [GameResult; 3] = [GameResult::Win, GameResult::Draw, GameResult::Loss];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "win",
            GameResult::Draw => "draw",
            GameResult::Loss => "loss",
        }
    }

    /// PGN result tag ("1-0", "1/2-1/2", "0-1").
    pub fn pgn(&self) -> &'static str {
        match self {
            GameResult::Win => "1-0",
            GameResult::Draw => "1/2-1/2",
            GameResult::Loss => "0-1",
        }
    }
}

/// Relationship of a child position to the queried position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Select {
    Continuations,
    Transpositions,
}

impl Select {
    pub const ALL: [Select; 2] = [Select::Continuations, Select::Transpositions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Select::Continuations => "continuations",
            Select::Transpositions => "transpositions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for GameLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "game level",
                value: s.to_string(),
            })
    }
}

impl FromStr for GameResult {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameResult::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "game result",
                value: s.to_string(),
            })
    }
}

impl FromStr for Select {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Select::ALL
            .into_iter()
            .find(|sel| sel.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "select",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for GameLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (level, result) pair. Raw counters are segregated by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    pub level: GameLevel,
    pub result: GameResult,
}

impl Origin {
    pub fn new(level: GameLevel, result: GameResult) -> Self {
        Self { level, result }
    }
}
