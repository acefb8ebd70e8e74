//! MU CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mu")]
#[command(about = "Queryable semantic code graph for source repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Workspace path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    path: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, parse, and build the graph database
    Build,
    /// Execute a MUQL query against the graph
    Query {
        /// The MUQL query string
        muql: String,
    },
    /// Show everything reachable from a node
    Impact {
        /// Node reference (id or name)
        node: String,

        /// Restrict traversal to these edge types
        #[arg(long = "edge-types", value_delimiter = ',')]
        edge_types: Vec<String>,
    },
    /// Show graph statistics
    Status,
    /// Run the daemon (watcher, worker, HTTP service)
    Daemon {
        /// Port to listen on
        #[arg(short = 'P', long, default_value = "7791")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Delete the graph database
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("mu={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Build => commands::build(cli.path),
        Commands::Query { muql } => commands::query(cli.path, muql),
        Commands::Impact { node, edge_types } => commands::impact(cli.path, node, edge_types),
        Commands::Status => commands::status(cli.path),
        Commands::Daemon { port, host } => commands::daemon(cli.path, host, port).await,
        Commands::Clear => commands::clear(cli.path),
    }
}
