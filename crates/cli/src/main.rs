//! `canvas-history` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a graph document for consistency.
//! - `replay`: apply an editing script to a graph and print the result.

mod script;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use graph::{validate_graph, GraphSnapshot, PartialGraph};
use history::HistoryConfig;

use crate::script::parse_script;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "canvas-history", about = "Undo/redo engine for workflow canvases", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a graph document JSON file.
    Validate {
        /// Path to the graph JSON file.
        path: PathBuf,
    },
    /// Replay an editing script against a graph document.
    Replay {
        /// Path to the graph JSON file.
        graph: PathBuf,
        /// Path to the script JSON file.
        script: PathBuf,
        /// Oldest history entries are dropped past this many.
        #[arg(long, default_value_t = 100)]
        max_undo: usize,
    },
}

fn read_document(path: &Path) -> Result<PartialGraph> {
    let content = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid graph document {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let document = read_document(&path)?;
            let order = validate_graph(&GraphSnapshot::from_document(&document))
                .with_context(|| format!("{} is not a valid graph", path.display()))?;
            println!("Graph is valid. Step order: {order:?}");
        }
        Command::Replay {
            graph,
            script,
            max_undo,
        } => {
            let document = read_document(&graph)?;
            let content =
                std::fs::read_to_string(&script).with_context(|| format!("cannot read {}", script.display()))?;
            let operations = parse_script(&content).with_context(|| format!("invalid script {}", script.display()))?;

            let config = HistoryConfig {
                max_undo_actions: max_undo,
                ..HistoryConfig::default()
            };
            let mut session = Session::new(&document, config);
            info!(operations = operations.len(), "replaying script");
            session.replay(&operations).await?;

            validate_graph(&session.stores.snapshot()).context("replay produced an inconsistent graph")?;
            println!("{}", serde_json::to_string_pretty(&session.stores.to_document())?);
            for (id, name) in session.history.undo_names() {
                eprintln!("{id} {name}");
            }
            for (id, name) in session.history.redo_names().into_iter().rev() {
                eprintln!("{id} {name} (undone)");
            }
        }
    }

    Ok(())
}
