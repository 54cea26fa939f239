//! Raw per-origin counters as decoded from a query response.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::game_header::GameHeader;
use crate::origin::{GameLevel, GameResult, Origin};

/// Leaf statistic for a single origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub count: u64,
    /// Sum over all games of (WhiteElo - BlackElo).
    #[serde(default)]
    pub elo_diff: i64,
    #[serde(default)]
    pub first_game: Option<GameHeader>,
    #[serde(default)]
    pub last_game: Option<GameHeader>,
}

impl Entry {
    pub fn new(count: u64, elo_diff: i64) -> Self {
        Self {
            count,
            elo_diff,
            first_game: None,
            last_game: None,
        }
    }
}

type RawSegregated = HashMap<String, HashMap<String, Entry>>;

/// Entries of one position keyed by origin. At most one entry per origin.
///
/// On the wire this is `{"<level>": {"<result>": Entry}}`; unknown level or
/// result names fail decoding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawSegregated")]
pub struct SegregatedEntries {
    entries: BTreeMap<Origin, Entry>,
}

impl SegregatedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns the entry back if the origin is already taken.
    pub fn add(&mut self, level: GameLevel, result: GameResult, entry: Entry) -> Result<(), Entry> {
        let origin = Origin::new(level, result);
        if self.entries.contains_key(&origin) {
            return Err(entry);
        }
        self.entries.insert(origin, entry);
        Ok(())
    }

    pub fn get(&self, level: GameLevel, result: GameResult) -> Option<&Entry> {
        self.entries.get(&Origin::new(level, result))
    }

    /// Iterates in (level, result) order.
    pub fn iter(&self) -> impl Iterator<Item = (&Origin, &Entry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.entries.values().map(|e| e.count).sum()
    }
}

impl TryFrom<RawSegregated> for SegregatedEntries {
    type Error = String;

    fn try_from(raw: RawSegregated) -> Result<Self, Self::Error> {
        let mut segregated = SegregatedEntries::new();
        for (level, by_result) in raw {
            let level: GameLevel = level.parse().map_err(|e| format!("{e}"))?;
            for (result, entry) in by_result {
                let result: GameResult = result.parse().map_err(|e| format!("{e}"))?;
                segregated
                    .add(level, result, entry)
                    .map_err(|_| format!("duplicate entry for {level}/{result}"))?;
            }
        }
        Ok(segregated)
    }
}

impl Serialize for SegregatedEntries {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested: BTreeMap<&str, BTreeMap<&str, &Entry>> = BTreeMap::new();
        for (origin, entry) in &self.entries {
            nested
                .entry(origin.level.as_str())
                .or_default()
                .insert(origin.result.as_str(), entry);
        }
        nested.serialize(serializer)
    }
}

impl FromIterator<(Origin, Entry)> for SegregatedEntries {
    /// Later duplicates are ignored.
    fn from_iter<I: IntoIterator<Item = (Origin, Entry)>>(iter: I) -> Self {
        let mut segregated = SegregatedEntries::new();
        for (origin, entry) in iter {
            let _ = segregated.add(origin.level, origin.result, entry);
        }
        segregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nested_levels() {
        let json = r#"{
            "human": {"win": {"count": 10, "elo_diff": 250}, "loss": {"count": 4}},
            "engine": {"draw": {"count": 3, "first_game": {"white": "Stockfish", "black": "Leela"}}}
        }"#;
        let entries: SegregatedEntries = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.get(GameLevel::Human, GameResult::Win).unwrap().count, 10);
        assert_eq!(entries.get(GameLevel::Human, GameResult::Win).unwrap().elo_diff, 250);
        assert_eq!(entries.get(GameLevel::Human, GameResult::Loss).unwrap().elo_diff, 0);
        assert!(entries.get(GameLevel::Server, GameResult::Win).is_none());
        assert_eq!(entries.total_count(), 17);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let json = r#"{"robot": {"win": {"count": 1}}}"#;
        assert!(serde_json::from_str::<SegregatedEntries>(json).is_err());
    }

    #[test]
    fn test_missing_count_is_rejected() {
        let json = r#"{"human": {"win": {"elo_diff": 3}}}"#;
        assert!(serde_json::from_str::<SegregatedEntries>(json).is_err());
    }

    #[test]
    fn test_one_entry_per_origin() {
        let mut entries = SegregatedEntries::new();
        assert!(entries.add(GameLevel::Human, GameResult::Win, Entry::new(1, 0)).is_ok());
        assert!(entries.add(GameLevel::Human, GameResult::Win, Entry::new(2, 0)).is_err());
        assert_eq!(entries.get(GameLevel::Human, GameResult::Win).unwrap().count, 1);
    }

    #[test]
    fn test_serialize_roundtrips_shape() {
        let mut entries = SegregatedEntries::new();
        entries.add(GameLevel::Server, GameResult::Draw, Entry::new(5, -20)).unwrap();
        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value["server"]["draw"]["count"], 5);
        assert_eq!(value["server"]["draw"]["elo_diff"], -20);
    }
}
