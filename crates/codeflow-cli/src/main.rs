//! Codeflow CLI - Command-line interface for Codeflow
//!
//! Drives the synchronization engine from a terminal: inspect the handles
//! of a file, browse a project tree, load files into the stored graph and
//! perform extractions against it.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "codeflow")]
#[command(author = "Codeflow Contributors")]
#[command(version)]
#[command(about = "Keep a canvas of code nodes and their import edges in sync", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Codeflow in a directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List the handles found in a source file
    Handles {
        /// File to inspect
        file: PathBuf,

        /// Output as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show the project folder tree
    Tree {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Load files into the stored graph as editor nodes
    Open {
        /// File ids, relative to the project root
        #[arg(required = true)]
        files: Vec<String>,

        /// Project root (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Extract a handle's code into a new node, or into another node
    Extract {
        /// Node owning the handle
        node: String,

        /// Handle id, e.g. 1:function:foo
        handle: String,

        /// Move into this existing node instead of creating one
        #[arg(long)]
        into: Option<String>,

        /// Line of the target node to insert before
        #[arg(long, default_value = "1")]
        line: u32,

        /// Project root (defaults to current directory)
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Export the stored graph to JSON
    Export {
        /// Output file
        #[arg(short, long, default_value = "codeflow-graph.json")]
        output: PathBuf,

        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show stored graph status and statistics
    Status {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Handles { file, json } => commands::handles(&file, json),
        Commands::Tree { path } => commands::tree(&path),
        Commands::Open { files, path } => commands::open(&path, &files).await,
        Commands::Extract {
            node,
            handle,
            into,
            line,
            path,
        } => commands::extract(&path, &node, &handle, into.as_deref(), line),
        Commands::Export { output, path } => commands::export(&path, &output),
        Commands::Status { path } => commands::status(&path),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
