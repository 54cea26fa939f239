//! Position database explorer
//!
//! Spawns the `chess_pos_db` backend, then runs one command against it.

use clap::Parser;
use tracing::{info, warn};

use posdb_client::cli::{self, Cli, Commands};
use posdb_client::config::ClientConfig;
use posdb_client::explorer::Explorer;
use posdb_client::protocol::{CreateRequest, DumpRequest, Progress};
use posdb_core::table::TableOptions;

fn print_progress(progress: &Progress) {
    let operation = progress.operation.as_deref().unwrap_or("?");
    match (progress.overall_progress, &progress.imported_file_path) {
        (_, Some(path)) => println!("[{operation}] imported {path}"),
        (Some(p), None) => println!("[{operation}] {:.1}%", p * 100.0),
        (None, None) if progress.finished => println!("[{operation}] finished"),
        (None, None) => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Commands::Query(query) = &args.command {
        config.query_eval &= !query.no_eval;
    }
    info!(executable = %config.executable, port = config.port, "Config loaded");

    let (mut explorer, _events) = Explorer::launch(&config).await?;

    match args.command {
        Commands::Info(command) => {
            let proxy = explorer.proxy();
            for database_type in proxy.supported_database_types().await? {
                let extensions = proxy
                    .supported_extensions(&database_type)
                    .await?
                    .unwrap_or_default();
                println!("{database_type}: {}", extensions.join(", "));
            }

            if let Some(path) = command.database {
                proxy.open(&path).await?;
            }
            let info = proxy.info().await?;
            match (&info.path, &info.stats) {
                (Some(path), Some(stats)) => {
                    println!("Path: {}", path.display());
                    println!(
                        "Games: {} | Plies: {}",
                        stats.total_games(),
                        stats.total_positions()
                    );
                    if let Some(length) = stats.average_game_length() {
                        println!("Avg game length: {length} moves");
                    }
                }
                _ => println!("No database open."),
            }
            proxy.close().await;
        }

        Commands::Query(command) => {
            explorer.options = TableOptions {
                levels: command.levels,
                selects: command.selects,
                hide_never_played: command.hide_never_played,
                ..TableOptions::default()
            };

            explorer.open(&command.database).await?;
            let entry = match &command.san {
                Some(san) => explorer.entry_for_move(&command.fen, san)?,
                None => explorer.entry_for_position(&command.fen),
            };
            let table = explorer.table(entry).await?;
            print!("{}", cli::render_table(&table));
            explorer.close().await;
        }

        Commands::Dump(command) => {
            let output_path = command.output.clone();
            explorer
                .proxy()
                .dump(
                    DumpRequest {
                        output_path: command.output,
                        temporary_path: command.temporary,
                        min_count: command.min_count,
                        report_progress: true,
                        pgns: command.pgns,
                    },
                    print_progress,
                )
                .await?;

            match tokio::fs::metadata(&output_path).await {
                Ok(meta) => println!(
                    "Dumped {} ({})",
                    output_path.display(),
                    cli::format_size(meta.len(), 1)
                ),
                Err(e) => warn!(path = %output_path.display(), error = %e, "Cannot stat dump output"),
            }
        }

        Commands::Create(command) => {
            explorer
                .proxy()
                .create(
                    CreateRequest {
                        destination_path: command.destination.clone(),
                        merge: command.merge,
                        report_progress: true,
                        human_pgns: command.human,
                        engine_pgns: command.engine,
                        server_pgns: command.server,
                        temporary_paths: (!command.temporary.is_empty())
                            .then_some(command.temporary),
                    },
                    print_progress,
                )
                .await?;
            println!("Created {}", command.destination.display());
        }
    }

    explorer.proxy().exit().await;
    Ok(())
}
