//! CLI command implementations.

use codeflow_core::{Config, HandleType, Position, SymbolExtractor, PROJECT_DIR};
use codeflow_graph::{CodeGraph, DocumentStore, Viewport};
use codeflow_loader::{FileLoader, FolderTree, ROOT_KEY};
use codeflow_session::{Gesture, LoadTarget, SessionConfig, SessionHandle, SessionMessage};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn store_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join("db")
}

/// Opens the stored graph, or an empty one when nothing was saved yet.
fn load_graph(store: &DocumentStore) -> Result<(CodeGraph, Viewport)> {
    match store.load_document()? {
        Some(document) => {
            let viewport = document.viewport;
            Ok((CodeGraph::from_document(document)?, viewport))
        }
        None => Ok((CodeGraph::new()?, Viewport::default())),
    }
}

fn require_initialized(root: &Path) -> Result<bool> {
    if root.join(PROJECT_DIR).exists() {
        return Ok(true);
    }
    println!("{} Codeflow not initialized in this directory", "✗".red());
    println!("  Run {} to initialize", "codeflow init".cyan());
    Ok(false)
}

/// Initialize Codeflow in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = Config::project_path(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    Config::default().save(&config_path)?;

    println!("{} Initialized Codeflow in {}", "✓".green(), path.display());
    println!("  Run {} to load files", "codeflow open <file>".cyan());

    Ok(())
}

/// List the handles of a single file.
pub fn handles(file: &Path, json: bool) -> Result<()> {
    let text = fs::read_to_string(file)?;
    let mut extractor = SymbolExtractor::new()?;
    let extraction = extractor.extract("file", &text);

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction.handles)?);
        return Ok(());
    }

    if !extraction.complete {
        println!("{} {} has syntax errors, some symbols may be missing", "⚠".yellow(), file.display());
    }
    if extraction.handles.is_empty() {
        println!("No handles found in {}", file.display());
        return Ok(());
    }

    println!("Found {} handles:\n", extraction.handles.len());
    for handle in &extraction.handles {
        let kind = match handle.handle_type {
            HandleType::Function => handle.handle_type.to_string().yellow(),
            HandleType::Selection => handle.handle_type.to_string().magenta(),
            HandleType::PlainImport => handle.handle_type.to_string().blue(),
        };
        let exported = if handle.exported { " export" } else { "" };
        println!(
            "  {} {}{} {}",
            kind,
            handle.name.cyan(),
            exported.green(),
            format!("(lines {})", handle.source_range).dimmed()
        );
    }

    Ok(())
}

/// Print the project folder tree.
pub fn tree(path: &Path) -> Result<()> {
    let config = Config::discover(path)?;
    let tree = FolderTree::scan(path, &config)?;

    println!("{}", path.display().to_string().cyan().bold());
    print_children(&tree, ROOT_KEY, 1);
    println!();
    println!("  {} {}", "Files:".dimmed(), tree.files().len());

    Ok(())
}

fn print_children(tree: &FolderTree, key: &str, depth: usize) {
    let Some(item) = tree.get(key) else {
        return;
    };
    for child in &item.children {
        let Some(entry) = tree.get(child) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        if entry.is_folder {
            println!("{}{}/", indent, entry.data.blue());
            print_children(tree, child, depth + 1);
        } else {
            println!("{}{}", indent, entry.data);
        }
    }
}

/// Load files into the stored graph through a session.
pub async fn open(path: &Path, files: &[String]) -> Result<()> {
    if !require_initialized(path)? {
        return Ok(());
    }
    let config = Config::discover(path)?;
    let store = DocumentStore::open(store_path(path))?;
    let (graph, viewport) = load_graph(&store)?;

    let session = SessionHandle::spawn(graph, FileLoader::new(path), SessionConfig::from(&config));
    let mut rx = session.subscribe();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Loading {} files...", files.len()));

    for file_id in files {
        session
            .apply(Gesture::LoadFile {
                file_id: file_id.clone(),
                target: LoadTarget::NewNode { position: None },
            })
            .await?;
    }

    let mut loaded = Vec::new();
    let mut failed = Vec::new();
    while loaded.len() + failed.len() < files.len() {
        match rx.recv().await {
            Ok(SessionMessage::FileLoaded(payload)) => loaded.push(payload),
            Ok(SessionMessage::LoadFailed(payload)) => failed.push(payload),
            Ok(SessionMessage::GraphUpdate(_)) => {}
            Err(RecvError::Lagged(n)) => tracing::warn!("missed {} session messages", n),
            Err(RecvError::Closed) => break,
        }
    }
    spinner.finish_and_clear();

    let document = session.document(viewport).await?;
    store.save_document(&document)?;

    for payload in &loaded {
        println!(
            "{} Loaded {} as node {}",
            "✓".green(),
            payload.file_id.cyan(),
            payload.node_id
        );
    }
    for payload in &failed {
        println!("  {} - {}", payload.file_id.red(), payload.error);
    }

    Ok(())
}

/// Extract a handle into a new node, or move it into an existing one.
pub fn extract(
    path: &Path,
    node: &str,
    handle: &str,
    into: Option<&str>,
    line: u32,
) -> Result<()> {
    if !require_initialized(path)? {
        return Ok(());
    }
    let config = Config::discover(path)?;
    let store = DocumentStore::open(store_path(path))?;
    let (mut graph, viewport) = load_graph(&store)?;

    match into {
        Some(target) => {
            graph.move_chunk_to_node(node, handle, target, line)?;
            println!(
                "{} Moved {} into node {} at line {}",
                "✓".green(),
                handle.cyan(),
                target,
                line
            );
        }
        None => {
            let new_id = graph.next_node_id();
            // Beside the source node.
            let at = graph
                .absolute_position(node)
                .map(|origin| origin + Position::new(400.0, 0.0))
                .unwrap_or(config.load_position);
            graph.extract_to_new_node(node, handle, &new_id, at, None)?;
            println!(
                "{} Extracted {} into node {}",
                "✓".green(),
                handle.cyan(),
                new_id
            );
        }
    }

    store.save_document(&graph.to_document(viewport))?;
    Ok(())
}

/// Export the stored graph to JSON.
pub fn export(path: &Path, output: &Path) -> Result<()> {
    if !require_initialized(path)? {
        return Ok(());
    }
    let store = DocumentStore::open(store_path(path))?;
    let (graph, viewport) = load_graph(&store)?;

    fs::write(output, graph.to_document(viewport).to_json()?)?;
    println!("{} Exported to {}", "✓".green(), output.display());

    Ok(())
}

/// Show stored graph status.
pub fn status(path: &Path) -> Result<()> {
    if !require_initialized(path)? {
        return Ok(());
    }
    let store = DocumentStore::open(store_path(path))?;
    let (graph, _) = load_graph(&store)?;
    let stats = graph.stats();

    println!("{}", "Codeflow Status".cyan().bold());
    println!();
    println!("  {} {}", "Nodes:".dimmed(), stats.node_count);
    println!("  {} {}", "Groups:".dimmed(), stats.group_count);
    println!("  {} {}", "Handles:".dimmed(), stats.handle_count);
    println!("  {} {}", "Edges:".dimmed(), stats.edge_count);
    if stats.stale_nodes > 0 {
        println!("  {} {}", "Stale:".yellow(), stats.stale_nodes);
    }

    println!();
    for node in graph.nodes() {
        let label = node.file_name().unwrap_or_default();
        println!(
            "  {} {} {}",
            node.id.cyan(),
            node.kind().to_string().yellow(),
            label
        );
    }

    Ok(())
}
