use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docrag_core::config::{Config, Settings};
use docrag_core::store::MemoryStore;
use docrag_core::traits::MetadataStore;
use docrag_core::types::DocumentKind;
use docrag_embed::embedder_from_settings;
use docrag_engine::{Assistant, IngestionPipeline, OllamaGenerator, RetrievalEngine};
use docrag_vector::SharedIndex;

#[derive(Parser, Debug)]
#[command(name = "docrag", about = "Ask questions about your own documents, answered from local files")]
struct Cli {
    /// Owner whose documents are read and written
    #[arg(long, global = true, env = "DOCRAG_OWNER", default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a file, or every supported file under a directory
    Ingest { path: PathBuf },
    /// Drop a document's chunks and ingest its source file again
    Reprocess { document_id: String },
    /// Answer a question from the owner's documents
    Ask { question: String },
    /// Show the owner's most recent questions
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the owner's documents and their ingestion state
    Status,
}

struct App {
    settings: Settings,
    store: Arc<MemoryStore>,
    index: Arc<SharedIndex>,
}

impl App {
    async fn open() -> Result<Self> {
        let config = Config::load().context("loading configuration")?;
        let settings = config.settings()?;
        let store = Arc::new(MemoryStore::open(settings.paths.store_path())?);
        let index = Arc::new(SharedIndex::open(settings.paths.index_path()).await?);
        Ok(Self { settings, store, index })
    }

    fn pipeline(&self) -> Result<IngestionPipeline> {
        let embedder = embedder_from_settings(&self.settings.embedding)?;
        Ok(IngestionPipeline::new(self.store.clone(), Arc::clone(&self.index), embedder, &self.settings)?)
    }

    fn assistant(&self) -> Result<Assistant> {
        let embedder = embedder_from_settings(&self.settings.embedding)?;
        let retrieval =
            RetrievalEngine::new(embedder, Arc::clone(&self.index), self.store.clone(), &self.settings.retrieval);
        let generator = Arc::new(OllamaGenerator::from_settings(&self.settings.generation)?);
        Ok(Assistant::new(retrieval, generator, self.store.clone(), &self.settings))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::open().await?;
    match cli.command {
        Command::Ingest { path } => ingest(&app, &path, &cli.owner).await,
        Command::Reprocess { document_id } => {
            let result = app.pipeline()?.reprocess(&document_id, &cli.owner).await?;
            report(&result.document_id, result.success, result.chunk_count, result.error.as_deref());
            Ok(())
        }
        Command::Ask { question } => {
            let answer = app.assistant()?.answer(&question, &cli.owner).await?;
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    println!("  - {source}");
                }
            }
            println!("\n({:.2}s{})", answer.response_time, if answer.cached { ", cached" } else { "" });
            Ok(())
        }
        Command::History { limit } => {
            for entry in app.assistant()?.history(&cli.owner, limit)? {
                println!("[{}] {}", entry.created_at.format("%Y-%m-%d %H:%M:%S"), entry.question);
                println!("    {}", entry.answer);
            }
            Ok(())
        }
        Command::Status => {
            let documents = app.store.documents_for_owner(&cli.owner)?;
            println!("{} documents, {} index entries", documents.len(), app.index.snapshot().len());
            for doc in documents {
                println!("  {}  {:<10} {:>5} chunks  {}", doc.id, doc.status.label(), doc.total_chunks, doc.title);
            }
            Ok(())
        }
    }
}

async fn ingest(app: &App, path: &Path, owner: &str) -> Result<()> {
    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && DocumentKind::from_path(e.path()).is_some())
            .map(|e| e.into_path())
            .collect()
    } else {
        vec![path.to_path_buf()]
    };
    if files.is_empty() {
        println!("No supported files under {}", path.display());
        return Ok(());
    }

    let pipeline = app.pipeline()?;
    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (mut processed, mut failed) = (0usize, 0usize);
    for file in &files {
        bar.set_message(file.display().to_string());
        match pipeline.ingest_file(file, owner).await {
            Ok(result) if result.success => processed += 1,
            Ok(result) => {
                failed += 1;
                bar.println(format!("failed {}: {}", file.display(), result.error.unwrap_or_default()));
            }
            Err(e) => {
                failed += 1;
                warn!(path = %file.display(), error = %e, "upload rejected");
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    println!("Ingested {processed} of {} files ({failed} failed)", files.len());
    Ok(())
}

fn report(document_id: &str, success: bool, chunks: usize, error: Option<&str>) {
    if success {
        println!("{document_id}: processed, {chunks} chunks");
    } else {
        println!("{document_id}: failed, {}", error.unwrap_or("unknown error"));
    }
}
