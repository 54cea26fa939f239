//! Decoded `query` response and the cached payload built from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::entry::SegregatedEntries;
use crate::origin::Select;
use crate::position::NULL_MOVE;
use crate::score::Score;

/// Position a result refers to: `fen`, optionally followed by `move`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPosition {
    pub fen: String,
    #[serde(default, rename = "move", skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
}

/// Root entry plus one entry per child move (SAN keyed) for one select.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, SegregatedEntries>")]
pub struct SelectResult {
    #[serde(rename = "--")]
    pub root: SegregatedEntries,
    #[serde(flatten)]
    pub children: BTreeMap<String, SegregatedEntries>,
}

impl TryFrom<BTreeMap<String, SegregatedEntries>> for SelectResult {
    type Error = String;

    fn try_from(mut raw: BTreeMap<String, SegregatedEntries>) -> Result<Self, Self::Error> {
        let root = raw
            .remove(NULL_MOVE)
            .ok_or_else(|| format!("missing root entry '{NULL_MOVE}'"))?;
        Ok(Self {
            root,
            children: raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub position: QueryPosition,
    #[serde(default)]
    pub continuations: Option<SelectResult>,
    #[serde(default)]
    pub transpositions: Option<SelectResult>,
}

impl PositionResult {
    pub fn by_select(&self, select: Select) -> Option<&SelectResult> {
        match select {
            Select::Continuations => self.continuations.as_ref(),
            Select::Transpositions => self.transpositions.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<PositionResult>,
}

impl QueryResponse {
    /// The result for the single queried position.
    pub fn first(&self) -> Option<&PositionResult> {
        self.results.first()
    }
}

/// Everything the scheduler caches for one signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCacheEntry {
    pub stats: QueryResponse,
    /// Engine evaluation per move (canonical SAN) of the current position.
    pub scores: HashMap<String, Score>,
}

impl QueryCacheEntry {
    pub fn new(stats: QueryResponse, scores: HashMap<String, Score>) -> Self {
        Self { stats, scores }
    }

    /// The highest evaluation among all moves, i.e. the position's evaluation.
    pub fn best_score(&self) -> Option<Score> {
        self.scores.values().copied().max_by_key(|s| s.value)
    }
}
