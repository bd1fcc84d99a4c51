//! Command-line front end for the game history.
//!
//! Opens the record database (see [`game_history::config`] for where it
//! lives), loads the history and runs one command against it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chess::fen::position_to_fen;
use clap::{Parser, Subcommand};
use game_history::config;
use game_history::persistence::{Database, SqliteGameRecordRepository};
use game_history::{import_pgn, restore_archive, Archive, GameRecordStore};

#[derive(Parser)]
#[command(name = "game-history", about = "Import, inspect and edit a stored chess game")]
struct Cli {
    /// Database file to use instead of the one in the data directory.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the history with a PGN game. Use `-` to read standard input.
    Import { file: PathBuf },
    /// Show a record (the latest when no id is given).
    Show { id: Option<u32> },
    /// List the recorded moves.
    List,
    /// Take back the latest move.
    Undo,
    /// Clear the history back to the start position.
    Reset,
    /// Print the changed-squares mask between two records.
    Diff { a: u32, b: u32 },
    /// Write the whole history to a JSON archive.
    Export { file: PathBuf },
    /// Replace the history with a JSON archive.
    Restore { file: PathBuf },
}

fn read_input(file: &Path) -> anyhow::Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = config::database_path(cli.db.as_deref());
    tracing::info!("Using database: {}", db_path.display());

    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    let repo = Arc::new(SqliteGameRecordRepository::new(db.pool().clone()));
    let mut store = GameRecordStore::new(repo);
    store.load().await?;

    match cli.command {
        Commands::Import { file } => {
            let text = read_input(&file)?;
            let count = import_pgn(&mut store, &text).await?;
            println!("Imported {} positions", count);
        }
        Commands::Show { id } => {
            let record = match id {
                Some(id) => store.get(id),
                None => store.latest(),
            }
            .context("no such record")?;
            println!("id:     {}", record.id);
            println!("move:   {}", record.move_san);
            println!("board:  {}", record.position.board_string());
            println!("state:  {}", record.position.state_string());
            println!("fen:    {}", position_to_fen(&record.position));
            println!("status: {:?}", record.position.state.status);
        }
        Commands::List => {
            for (id, san) in store.move_list() {
                println!("{:>4}  {}", id, san);
            }
        }
        Commands::Undo => {
            if store.undo().await? {
                let latest = store.latest().map_or(0, |r| r.id);
                println!("Undone, latest record is {}", latest);
            } else {
                println!("Nothing to undo");
            }
        }
        Commands::Reset => {
            store.reset().await?;
            println!("History reset");
        }
        Commands::Diff { a, b } => {
            println!("{:#066b}", store.board_square_changes(a, b));
        }
        Commands::Export { file } => {
            let archive = Archive::from_store(&store);
            archive.write(&file)?;
            println!("Exported {} records to {}", archive.records.len(), file.display());
        }
        Commands::Restore { file } => {
            let archive = Archive::read(&file)?;
            let count = restore_archive(&mut store, &archive).await?;
            println!("Restored {} records", count);
        }
    }

    db.pool().close().await;
    Ok(())
}
