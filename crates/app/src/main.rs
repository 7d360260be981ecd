use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docsearch_core::{
    discover_files, read_files, Catalog, ChunkingConfig, EmbeddingBackend, Pipeline,
    PipelineConfig, QueryOutcome, SearchResult, Selection, Session, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_STORE_DIR, DEFAULT_TOP_K, MAX_TOP_K,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding one sub-directory per (index kind, model) pair.
    #[arg(long, env = "DOCSEARCH_STORE_DIR", default_value = DEFAULT_STORE_DIR, global = true)]
    store_dir: PathBuf,

    /// Maximum characters per chunk.
    #[arg(long, env = "DOCSEARCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    chunk_size: usize,

    /// Characters repeated between neighbouring chunks.
    #[arg(long, env = "DOCSEARCH_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP, global = true)]
    chunk_overlap: usize,

    /// Run catalogued models through ONNX instead of the built-in hashed embedder.
    #[cfg(feature = "onnx")]
    #[arg(long, default_value_t = false, global = true)]
    onnx: bool,
}

#[derive(Args, Clone)]
struct SelectionArgs {
    /// Embedding model, by display name or model id (see `docsearch models`).
    #[arg(long, env = "DOCSEARCH_MODEL", default_value = "All-MiniLM-L6-v2 (Fast & Light)")]
    model: String,

    /// Vector index kind (see `docsearch models`).
    #[arg(long, env = "DOCSEARCH_INDEX", default_value = "Snapshot")]
    index: String,
}

impl SelectionArgs {
    fn selection(&self) -> Selection {
        Selection::new(&self.model, &self.index)
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the selectable embedding models and index kinds.
    Models,
    /// Extract, chunk and embed documents, replacing the index for the selection.
    Ingest {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Folder searched recursively for .pdf and .txt files.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Individual files to ingest.
        files: Vec<PathBuf>,
    },
    /// Query the persisted index for the selection.
    Search {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of results to return (1-10).
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Optionally ingest, then answer queries read line by line from stdin.
    Interactive {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Number of results per query (1-10).
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Files to ingest before the first query.
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        store_dir = %cli.store_dir.display(),
        "docsearch boot"
    );

    let config = PipelineConfig {
        store_root: cli.store_dir.clone(),
        catalog: Catalog::default(),
        chunking: ChunkingConfig {
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
        },
        backend: backend(&cli),
    };

    match cli.command {
        Command::Models => print_catalog(&config.catalog, config.backend),
        Command::Ingest {
            selection,
            folder,
            files,
        } => {
            let mut session = open_session(config, &selection)?;
            let mut paths = files;
            if let Some(folder) = folder {
                paths.extend(discover_files(&folder));
            }
            if paths.is_empty() {
                anyhow::bail!("nothing to ingest: pass files or --folder");
            }
            ingest(&mut session, &paths).await?;
        }
        Command::Search {
            selection,
            query,
            top_k,
        } => {
            let mut session = open_session(config, &selection)?;
            session.open_existing().await?;
            print_outcome(&query, session.query(&query, top_k)?);
        }
        Command::Interactive {
            selection,
            top_k,
            files,
        } => {
            let mut session = open_session(config, &selection)?;
            if files.is_empty() {
                session.open_existing().await?;
            } else {
                ingest(&mut session, &files).await?;
            }
            run_interactive(&session, top_k).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "onnx")]
fn backend(cli: &Cli) -> EmbeddingBackend {
    if cli.onnx {
        EmbeddingBackend::Onnx
    } else {
        EmbeddingBackend::Hashed
    }
}

#[cfg(not(feature = "onnx"))]
fn backend(_cli: &Cli) -> EmbeddingBackend {
    EmbeddingBackend::Hashed
}

fn open_session(config: PipelineConfig, selection: &SelectionArgs) -> anyhow::Result<Session> {
    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    Session::new(pipeline, &selection.selection()).context("invalid model or index selection")
}

async fn ingest(session: &mut Session, paths: &[PathBuf]) -> anyhow::Result<()> {
    let (files, unreadable) = read_files(paths).await;
    let summary = session.ingest(&files).await?;

    let skipped = unreadable.len() + summary.skipped_files.len();
    if skipped > 0 {
        warn!(skipped, total = paths.len(), "some files were not indexed");
        for file in unreadable.iter().chain(&summary.skipped_files) {
            println!("skipped {}: {}", file.name, file.reason);
        }
    }

    println!(
        "loaded {} document(s), split into {} chunk(s)",
        summary.document_count, summary.chunk_count
    );
    println!("index saved to: {}", summary.location.display());
    Ok(())
}

async fn run_interactive(session: &Session, top_k: usize) -> anyhow::Result<()> {
    let selection = session.selection();
    println!(
        "model: {} | index: {} | top_k: {top_k} (max {MAX_TOP_K})",
        selection.model.name, selection.kind
    );
    println!("enter a question, or an empty line to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        match session.query(query, top_k) {
            Ok(outcome) => print_outcome(query, outcome),
            Err(error) => println!("error: {error}"),
        }
    }

    Ok(())
}

fn print_outcome(query: &str, outcome: QueryOutcome) {
    match outcome {
        QueryOutcome::NoActiveIndex => {
            println!("no index found for this selection: ingest documents first");
        }
        QueryOutcome::Results(results) => print_results(query, &results),
    }
}

fn print_results(query: &str, results: &[SearchResult]) {
    println!("results for: {query}");
    if results.is_empty() {
        println!("  (no matches)");
    }

    for (position, result) in results.iter().enumerate() {
        println!("[{}] score={:.4} source={}", position + 1, result.score, result.source);
        println!("{}", result.chunk_content);
    }
}

fn print_catalog(catalog: &Catalog, backend: EmbeddingBackend) {
    println!("embedding models ({} backend):", backend.name());
    for model in catalog.models() {
        let note = if backend.supports(model) {
            ""
        } else {
            " [unavailable here, run without --onnx to use the hashed backend]"
        };
        println!(
            "  {} -> {} ({} dims){note}",
            model.name, model.model_id, model.dimensions
        );
    }

    println!("index kinds:");
    for kind in catalog.index_kinds() {
        println!("  {} -> {}", kind.display_name(), kind.key());
    }
}
