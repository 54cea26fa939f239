//! Rolled-up statistics over a selection of origins.

use serde::Serialize;

use crate::entry::SegregatedEntries;
use crate::game_header::GameHeader;
use crate::origin::{GameLevel, GameResult};

/// Union of the entries of selected origins.
///
/// `combine` sums all counters and keeps the first game already present, so
/// aggregation is associative and commutative with `AggregatedEntry::default()`
/// as identity (up to which first game is reported when both sides have one).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedEntry {
    pub count: u64,
    pub win_count: u64,
    pub draw_count: u64,
    pub loss_count: u64,
    pub total_elo_diff: i64,
    pub first_game: Option<GameHeader>,
}

impl AggregatedEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum the entries whose level is in `levels`.
    pub fn from_segregated(entries: &SegregatedEntries, levels: &[GameLevel]) -> Self {
        let mut aggregated = AggregatedEntry::new();
        for (origin, entry) in entries.iter() {
            if !levels.contains(&origin.level) {
                continue;
            }

            aggregated.count += entry.count;
            match origin.result {
                GameResult::Win => aggregated.win_count += entry.count,
                GameResult::Draw => aggregated.draw_count += entry.count,
                GameResult::Loss => aggregated.loss_count += entry.count,
            }
            aggregated.total_elo_diff += entry.elo_diff;

            if aggregated.first_game.is_none() {
                aggregated.first_game = entry.first_game.clone();
            }
        }
        aggregated
    }

    pub fn combine(&mut self, other: &AggregatedEntry) {
        self.count += other.count;
        self.win_count += other.win_count;
        self.draw_count += other.draw_count;
        self.loss_count += other.loss_count;
        self.total_elo_diff += other.total_elo_diff;
        if self.first_game.is_none() {
            self.first_game = other.first_game.clone();
        }
    }

    pub fn combined(mut self, other: &AggregatedEntry) -> Self {
        self.combine(other);
        self
    }

    /// Counters of `self` not accounted for by `part` (which must be a subset).
    pub fn without(&self, part: &AggregatedEntry) -> AggregatedEntry {
        AggregatedEntry {
            count: self.count.saturating_sub(part.count),
            win_count: self.win_count.saturating_sub(part.win_count),
            draw_count: self.draw_count.saturating_sub(part.draw_count),
            loss_count: self.loss_count.saturating_sub(part.loss_count),
            total_elo_diff: self.total_elo_diff - part.total_elo_diff,
            first_game: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// White's score rate, (W + D/2) / N. NaN when empty.
    pub fn perf(&self) -> f64 {
        (self.win_count as f64 + self.draw_count as f64 * 0.5) / self.count as f64
    }

    /// D / N. NaN when empty.
    pub fn draw_rate(&self) -> f64 {
        self.draw_count as f64 / self.count as f64
    }

    /// Mean WhiteElo - BlackElo, 0 when empty.
    pub fn average_elo_diff(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_elo_diff as f64 / self.count as f64
        }
    }
}
