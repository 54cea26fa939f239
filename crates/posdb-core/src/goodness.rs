//! Composite move quality ("goodness") from game statistics and evaluation.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::aggregate::AggregatedEntry;
use crate::elo;
use crate::score::Score;

/// User-weighted terms of the goodness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodnessOptions {
    pub use_human_games: bool,
    pub use_engine_games: bool,
    pub use_eval: bool,
    pub use_combined_games: bool,
    /// Replace the separate human and engine terms by one term over all games.
    pub combine_games: bool,
    /// Scale each games term by its number of games.
    pub use_count: bool,
    /// Divide by the best goodness of the list.
    pub normalize: bool,

    pub human_weight: f64,
    pub engine_weight: f64,
    pub eval_weight: f64,
    pub combined_games_weight: f64,
}

impl Default for GoodnessOptions {
    fn default() -> Self {
        Self {
            use_human_games: true,
            use_engine_games: true,
            use_eval: true,
            use_combined_games: true,
            combine_games: false,
            use_count: true,
            normalize: true,
            human_weight: 1.0,
            engine_weight: 3.0,
            eval_weight: 2.0,
            combined_games_weight: 1.0,
        }
    }
}

/// Flip a White-perspective rate to the side to move.
pub fn for_side(value: f64, side: Color) -> f64 {
    match side {
        Color::White => value,
        Color::Black => 1.0 - value,
    }
}

/// Elo-adjusted performance of `entry` for `side`. NaN when empty.
pub fn adjusted_perf_for(entry: &AggregatedEntry, side: Color) -> f64 {
    if entry.is_empty() {
        return f64::NAN;
    }
    let expected = elo::expected_performance(entry.average_elo_diff());
    for_side(elo::adjusted_performance(entry.perf(), expected), side)
}

fn games_term(value: f64, weight: f64, count: u64, use_count: bool) -> f64 {
    if count == 0 || !value.is_finite() {
        return 0.0;
    }
    let term = value * weight;
    if use_count {
        term * count as f64
    } else {
        term
    }
}

/// Goodness of one move.
///
/// `entry` covers all selected levels, `non_engine` only the human and server
/// levels among them. `score` is the evaluation for the side to move.
pub fn calculate_goodness(
    side: Color,
    entry: &AggregatedEntry,
    non_engine: &AggregatedEntry,
    score: Option<&Score>,
    options: &GoodnessOptions,
) -> f64 {
    let mut goodness = 0.0;

    if options.combine_games {
        if options.use_combined_games {
            goodness += games_term(
                adjusted_perf_for(entry, side),
                options.combined_games_weight,
                entry.count,
                options.use_count,
            );
        }
    } else {
        if options.use_human_games {
            goodness += games_term(
                adjusted_perf_for(non_engine, side),
                options.human_weight,
                non_engine.count,
                options.use_count,
            );
        }
        if options.use_engine_games {
            let engine = entry.without(non_engine);
            goodness += games_term(
                for_side(engine.perf(), side),
                options.engine_weight,
                engine.count,
                options.use_count,
            );
        }
    }

    if options.use_eval {
        if let Some(score) = score {
            if score.perf().is_finite() {
                goodness += score.perf() * options.eval_weight;
            }
        }
    }

    goodness
}

/// Scale all values so the largest positive one becomes exactly 1.0.
/// Returns the best value before scaling.
pub fn normalize(values: &mut [f64]) -> f64 {
    let best = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    if best > 0.0 {
        for value in values.iter_mut() {
            *value /= best;
        }
    }
    best
}
