//! Command-line entry points: the HTTP server plus one-shot queries against a fresh snapshot.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::entities::search::{self, SearchFilters};
use crate::entities::stats;
use crate::render;
use crate::sources::firestore::FirestoreClient;
use crate::store::{Refresher, Snapshot, SnapshotStore};

pub mod health;

#[derive(Parser, Debug)]
#[command(name = "pipeline-search", version, about = "Search service for pharma pipeline news")]
pub struct Cli {
    /// Print machine-readable JSON where a command defaults to markdown
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value_t = 8001)]
        port: u16,
    },

    /// Load the collection once and print matching records
    Search {
        /// Case-insensitive keyword matched against title, drug, company, and text fields
        #[arg(short, long)]
        q: Option<String>,

        #[arg(long)]
        event_type: Option<String>,

        #[arg(long)]
        disease_area: Option<String>,

        #[arg(long)]
        company: Option<String>,
    },

    /// Print the distinct values available for each filter
    Filters,

    /// Print frequency statistics
    Stats,

    /// Print every record in snapshot order
    Data,

    /// Probe the document source and front-end build directory
    Health,
}

impl Commands {
    /// Default log level when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "info",
            _ => "warn",
        }
    }
}

/// Output of a one-shot command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

#[derive(Serialize)]
struct DataOutput<'a> {
    total: usize,
    data: &'a [crate::entities::record::Record],
}

async fn load_snapshot(config: &Config) -> anyhow::Result<Arc<Snapshot>> {
    let source = FirestoreClient::new(&config.firestore)?;
    let store = Arc::new(SnapshotStore::new());
    let refresher = Refresher::new(Arc::new(source), store.clone(), config.on_fetch_failure);
    refresher.refresh().await;
    Ok(store.current())
}

/// Runs a one-shot command. `Serve` is dispatched by the binary via [`crate::server::run`].
///
/// # Errors
///
/// Returns an error when the source client cannot be built or output cannot be rendered.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<CommandOutput> {
    match cli.command {
        Commands::Serve { .. } => Err(anyhow::anyhow!(
            "serve is handled by the binary entry point"
        )),
        Commands::Search {
            q,
            event_type,
            disease_area,
            company,
        } => {
            let snapshot = load_snapshot(&config).await?;
            let filters = SearchFilters {
                q,
                event_type,
                disease_area,
                company,
            };
            let results = search::search(snapshot.records(), &filters);
            Ok(CommandOutput::ok(render::json::to_pretty(&results)?))
        }
        Commands::Filters => {
            let snapshot = load_snapshot(&config).await?;
            let options = stats::filter_options(snapshot.records());
            Ok(CommandOutput::ok(render::json::to_pretty(&options)?))
        }
        Commands::Stats => {
            let snapshot = load_snapshot(&config).await?;
            let summary = stats::stats(snapshot.records());
            Ok(CommandOutput::ok(render::json::to_pretty(&summary)?))
        }
        Commands::Data => {
            let snapshot = load_snapshot(&config).await?;
            let output = DataOutput {
                total: snapshot.len(),
                data: snapshot.records(),
            };
            Ok(CommandOutput::ok(render::json::to_pretty(&output)?))
        }
        Commands::Health => {
            let source = FirestoreClient::new(&config.firestore)?;
            let report = health::check(&source, &config.frontend_dir).await;
            let text = if cli.json {
                render::json::to_pretty(&report)?
            } else {
                report.to_markdown()
            };
            Ok(CommandOutput {
                text,
                success: report.all_healthy(),
            })
        }
    }
}
