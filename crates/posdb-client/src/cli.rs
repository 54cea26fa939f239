use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use posdb_core::origin::{GameLevel, Select};
use posdb_core::table::{Table, TableRow};

#[derive(Parser)]
#[clap(author, version)]
#[clap(name = "posdb-explorer")]
#[clap(about = "Explores a chess position database through its backend process", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Info(InfoCommand),
    Query(QueryCommand),
    Dump(DumpCommand),
    Create(CreateCommand),
}

/// Print supported database types and, with a database, its statistics.
#[derive(Args)]
pub struct InfoCommand {
    #[clap(short, long)]
    pub database: Option<PathBuf>,
}

/// Tabulate the moves of a position.
#[derive(Args)]
pub struct QueryCommand {
    #[clap(short, long)]
    pub database: PathBuf,

    /// Position to query; the move is played from it when given
    pub fen: String,

    pub san: Option<String>,

    #[clap(long, value_delimiter = ',', default_values_t = GameLevel::ALL.to_vec())]
    pub levels: Vec<GameLevel>,

    #[clap(long, value_delimiter = ',', default_values_t = Select::ALL.to_vec())]
    pub selects: Vec<Select>,

    #[clap(long)]
    pub hide_never_played: bool,

    #[clap(long)]
    pub no_eval: bool,
}

/// Dump positions occurring at least `min_count` times in the given PGNs.
#[derive(Args)]
pub struct DumpCommand {
    #[clap(short, long)]
    pub output: PathBuf,

    #[clap(short, long)]
    pub temporary: Option<PathBuf>,

    #[clap(short, long, default_value_t = 1)]
    pub min_count: u64,

    #[clap(required = true)]
    pub pgns: Vec<PathBuf>,
}

/// Create a database from PGN files.
#[derive(Args)]
pub struct CreateCommand {
    #[clap(short, long)]
    pub destination: PathBuf,

    #[clap(long)]
    pub merge: bool,

    #[clap(long)]
    pub human: Vec<PathBuf>,

    #[clap(long)]
    pub engine: Vec<PathBuf>,

    #[clap(long)]
    pub server: Vec<PathBuf>,

    #[clap(long)]
    pub temporary: Vec<PathBuf>,
}

const SIZE_SUFFIXES: [&str; 7] = ["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Human readable size with decimal (1000-based) units, e.g. "1.5 MB".
pub fn format_size(value: u64, decimal_places: usize) -> String {
    if value == 0 {
        return format!("{:.*} bytes", decimal_places, 0.0);
    }

    let mut mag = 0;
    while mag + 1 < SIZE_SUFFIXES.len()
        && 1000u64
            .checked_pow(mag as u32 + 1)
            .is_some_and(|unit| value >= unit)
    {
        mag += 1;
    }

    let mut adjusted = value as f64 / 1000f64.powi(mag as i32);
    let scale = 10f64.powi(decimal_places as i32);
    if (adjusted * scale).round() / scale >= 1000.0 && mag + 1 < SIZE_SUFFIXES.len() {
        mag += 1;
        adjusted /= 1000.0;
    }

    format!("{:.*} {}", decimal_places, adjusted, SIZE_SUFFIXES[mag])
}

fn pct(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}%", value * 100.0)
    } else {
        "-".to_string()
    }
}

fn format_row(row: &TableRow) -> String {
    format!(
        "{:<8} {:>9} {:>7} {:>7} {:>7} {:>7} {:>7} {:>6} {:>5.0} {:>9} {:>7} {:>6} {}",
        row.san,
        row.count,
        pct(row.perf),
        pct(row.adjusted_perf),
        pct(row.draw_rate),
        pct(row.human_rate),
        row.avg_elo_diff.map(|d| d.to_string()).unwrap_or_default(),
        row.goodness.map(|g| format!("{g:.3}")).unwrap_or_default(),
        row.elo_error,
        row.eval.map(|s| s.to_string()).unwrap_or_default(),
        row.eval_pct.map(pct).unwrap_or_default(),
        if row.is_only_transposition { "T" } else { "" },
        row.first_game.as_ref().map(|g| g.summary()).unwrap_or_default(),
    )
}

pub fn render_table(table: &Table) -> String {
    let mut out = format!(
        "{:<8} {:>9} {:>7} {:>7} {:>7} {:>7} {:>7} {:>6} {:>5} {:>9} {:>7} {:>6} {}\n",
        "Move", "Count", "Perf", "AdjPerf", "Draw%", "Human%", "AvgElo", "Good", "±Elo", "Eval",
        "Ev%", "Trans", "First game"
    );
    for row in &table.rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    if let Some(root) = &table.root {
        out.push_str(&format_row(root));
        out.push('\n');
    }
    out.push_str(&format_row(&table.children_total));
    out.push('\n');
    out
}
