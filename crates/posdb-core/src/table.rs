//! Turns a cached query response into display rows for the current position.

use serde::Serialize;
use shakmaty::Color;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::AggregatedEntry;
use crate::elo;
use crate::game_header::GameHeader;
use crate::goodness::{self, GoodnessOptions};
use crate::origin::{GameLevel, Select};
use crate::position::{self, PositionError, NULL_MOVE};
use crate::response::{QueryCacheEntry, QueryResponse};
use crate::score::Score;

/// Average Elo differences are displayed clamped to this magnitude.
pub const MAX_DISPLAYED_ELO_DIFF: i64 = 400;

/// What to aggregate and how to score it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOptions {
    pub levels: Vec<GameLevel>,
    pub selects: Vec<Select>,
    pub hide_never_played: bool,
    pub goodness: GoodnessOptions,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            levels: GameLevel::ALL.to_vec(),
            selects: Select::ALL.to_vec(),
            hide_never_played: false,
            goodness: GoodnessOptions::default(),
        }
    }
}

/// Accumulate the root (`--`) and child entries of `select` into `into`.
pub fn gather(
    response: &QueryResponse,
    select: Select,
    levels: &[GameLevel],
    into: &mut BTreeMap<String, AggregatedEntry>,
) {
    let Some(by_select) = response.first().and_then(|r| r.by_select(select)) else {
        return;
    };

    into.entry(NULL_MOVE.to_string())
        .or_default()
        .combine(&AggregatedEntry::from_segregated(&by_select.root, levels));

    for (san, entries) in &by_select.children {
        into.entry(san.clone())
            .or_default()
            .combine(&AggregatedEntry::from_segregated(entries, levels));
    }
}

/// Per-move aggregates for one repopulation pass.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    /// All selected levels and selects.
    pub entries: BTreeMap<String, AggregatedEntry>,
    /// Human and server levels only.
    pub non_engine: BTreeMap<String, AggregatedEntry>,
    /// Moves with at least one continuation game.
    pub continuation_moves: BTreeSet<String>,
}

impl Aggregates {
    pub fn build(response: &QueryResponse, levels: &[GameLevel], selects: &[Select]) -> Self {
        let mut continuations = BTreeMap::new();
        gather(response, Select::Continuations, levels, &mut continuations);

        let mut entries = BTreeMap::new();
        for select in selects {
            gather(response, *select, levels, &mut entries);
        }

        let non_engine_levels: Vec<GameLevel> = levels
            .iter()
            .copied()
            .filter(|l| *l != GameLevel::Engine)
            .collect();
        let mut non_engine = BTreeMap::new();
        if !non_engine_levels.is_empty() {
            for select in selects {
                gather(response, *select, &non_engine_levels, &mut non_engine);
            }
        }

        Self {
            entries,
            non_engine,
            continuation_moves: continuations
                .into_iter()
                .filter(|(_, e)| !e.is_empty())
                .map(|(k, _)| k)
                .collect(),
        }
    }

    fn non_engine_for(&self, key: &str) -> AggregatedEntry {
        self.non_engine.get(key).cloned().unwrap_or_default()
    }
}

/// One row of the move table. Rates are for the side to move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub san: String,
    pub count: u64,
    pub win_count: u64,
    pub draw_count: u64,
    pub loss_count: u64,
    pub perf: f64,
    pub adjusted_perf: f64,
    pub draw_rate: f64,
    pub human_rate: f64,
    pub avg_elo_diff: Option<i64>,
    pub elo_error: f64,
    pub eval: Option<Score>,
    pub eval_pct: Option<f64>,
    pub goodness: Option<f64>,
    pub is_only_transposition: bool,
    pub first_game: Option<GameHeader>,
}

impl TableRow {
    fn new(
        san: &str,
        side: Color,
        total: &AggregatedEntry,
        non_engine: &AggregatedEntry,
        score: Option<Score>,
    ) -> Self {
        let avg_elo_diff = if total.is_empty() {
            None
        } else {
            Some(
                (total.average_elo_diff().round() as i64)
                    .clamp(-MAX_DISPLAYED_ELO_DIFF, MAX_DISPLAYED_ELO_DIFF),
            )
        };

        Self {
            san: san.to_string(),
            count: total.count,
            win_count: total.win_count,
            draw_count: total.draw_count,
            loss_count: total.loss_count,
            perf: goodness::for_side(total.perf(), side),
            adjusted_perf: goodness::adjusted_perf_for(total, side),
            draw_rate: total.draw_rate(),
            human_rate: non_engine.count as f64 / total.count as f64,
            avg_elo_diff,
            elo_error: elo::elo_error_99pct(total.win_count, total.draw_count, total.loss_count),
            eval: score,
            eval_pct: score.map(|s| s.perf()),
            goodness: None,
            is_only_transposition: false,
            first_game: total.first_game.clone(),
        }
    }
}

/// The move rows plus the "Root" and "Children" summary rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub side_to_move: String,
    pub rows: Vec<TableRow>,
    pub root: Option<TableRow>,
    pub children_total: TableRow,
    /// Best goodness before normalization.
    pub best_goodness: f64,
}

impl Table {
    pub fn row(&self, san: &str) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.san == san)
    }
}

fn score_for(entry: &QueryCacheEntry, fen: &str, san: &str) -> Option<Score> {
    if let Some(score) = entry.scores.get(san) {
        return Some(*score);
    }
    let canonical = position::normalize_san(fen, san).ok()?;
    entry.scores.get(&canonical).copied()
}

/// Build the table for `fen`, the position the cached response describes.
pub fn populate(
    entry: &QueryCacheEntry,
    fen: &str,
    options: &TableOptions,
) -> Result<Table, PositionError> {
    let side = position::side_to_move(fen)?;
    let aggregates = Aggregates::build(&entry.stats, &options.levels, &options.selects);
    let best_score = entry.best_score();

    let mut rows = Vec::new();
    let mut root = None;
    let mut total = AggregatedEntry::new();
    let mut total_non_engine = AggregatedEntry::new();

    for (san, aggregated) in &aggregates.entries {
        if options.hide_never_played && aggregated.is_empty() {
            continue;
        }
        let non_engine = aggregates.non_engine_for(san);

        if san == NULL_MOVE {
            root = Some(TableRow::new("Root", side, aggregated, &non_engine, best_score));
            continue;
        }

        let score = score_for(entry, fen, san);
        let mut row = TableRow::new(san, side, aggregated, &non_engine, score);
        row.goodness = Some(goodness::calculate_goodness(
            side,
            aggregated,
            &non_engine,
            score.as_ref(),
            &options.goodness,
        ));
        row.is_only_transposition = !aggregates.continuation_moves.contains(san);
        rows.push(row);

        total.combine(aggregated);
        total_non_engine.combine(&non_engine);
    }

    let children_total = TableRow::new("Children", side, &total, &total_non_engine, best_score);

    let mut table = Table {
        side_to_move: match side {
            Color::White => "white".to_string(),
            Color::Black => "black".to_string(),
        },
        rows,
        root,
        children_total,
        best_goodness: 0.0,
    };
    finish_goodness(&mut table, options.goodness.normalize);

    tracing::debug!(
        rows = table.rows.len(),
        best_goodness = table.best_goodness,
        "Table populated"
    );

    Ok(table)
}

/// Recompute goodness of existing rows after the options changed.
pub fn update_goodness(
    table: &mut Table,
    entry: &QueryCacheEntry,
    fen: &str,
    options: &TableOptions,
) -> Result<(), PositionError> {
    let side = position::side_to_move(fen)?;
    let aggregates = Aggregates::build(&entry.stats, &options.levels, &options.selects);

    for row in table.rows.iter_mut() {
        let Some(aggregated) = aggregates.entries.get(&row.san) else {
            continue;
        };
        let non_engine = aggregates.non_engine_for(&row.san);
        let score = score_for(entry, fen, &row.san);
        row.goodness = Some(goodness::calculate_goodness(
            side,
            aggregated,
            &non_engine,
            score.as_ref(),
            &options.goodness,
        ));
    }

    finish_goodness(table, options.goodness.normalize);
    Ok(())
}

fn finish_goodness(table: &mut Table, normalize: bool) {
    let mut values: Vec<f64> = table.rows.iter().map(|r| r.goodness.unwrap_or(0.0)).collect();
    table.best_goodness = if normalize {
        goodness::normalize(&mut values)
    } else {
        values.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max)
    };
    for (row, value) in table.rows.iter_mut().zip(values) {
        row.goodness = Some(value);
    }

    table.rows.sort_by(|a, b| {
        b.goodness
            .unwrap_or(0.0)
            .total_cmp(&a.goodness.unwrap_or(0.0))
            .then(b.count.cmp(&a.count))
            .then(a.san.cmp(&b.san))
    });
}
