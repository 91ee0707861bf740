//! `ragdb`: ingest documents into per-project collections and query them.
//!
//! Settings come from `config.toml`, `config.<RUST_ENV>.toml` and `APP_*`
//! environment variables (see `ragdb_core::config`).
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragdb_core::config::{Config, Settings};
use ragdb_core::data_processor::{ChunkingConfig, DataProcessor};
use ragdb_core::traits::LlmProvider;
use ragdb_core::types::{collection_name, MergePolicy, SearchMode, SearchParams};
use ragdb_embed::shared_provider;
use ragdb_hybrid::{Collection, Pipeline, Store};

#[derive(Parser)]
#[command(name = "ragdb", version, about = "Hybrid vector + full-text retrieval over local documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store a file or every supported file under a directory.
    Ingest {
        project: String,
        path: PathBuf,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        overlap: Option<usize>,
        /// Destroy the project's collection before ingesting.
        #[arg(long)]
        reset: bool,
    },
    /// Search a project's collection.
    Search {
        project: String,
        query: String,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Answer a question from retrieved context using the completion model.
    Ask {
        project: String,
        question: String,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Delete every chunk ingested from one file.
    Delete {
        project: String,
        #[arg(long)]
        file: String,
    },
    /// Destroy a project's collection.
    Reset { project: String },
    /// Page through stored chunks.
    Browse {
        project: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List collections in the store.
    Collections,
}

#[derive(Args)]
struct SearchArgs {
    /// vector, text or hybrid
    #[arg(long)]
    mode: Option<SearchMode>,
    #[arg(long)]
    top_k: Option<usize>,
    /// Share of hybrid results taken from the vector side, in [0, 1].
    #[arg(long)]
    scale: Option<f32>,
    /// Only search chunks from this file.
    #[arg(long)]
    file: Option<String>,
    #[arg(long)]
    sort_by_score: bool,
}

impl SearchArgs {
    fn params(self, settings: &Settings) -> SearchParams {
        let mut params = settings.search.params(self.file);
        if let Some(mode) = self.mode { params.mode = mode; }
        if let Some(top_k) = self.top_k { params.top_k = top_k; }
        if let Some(scale) = self.scale { params.hybrid_scale = scale; }
        if self.sort_by_score { params.merge_policy = MergePolicy::SortByScore; }
        params
    }
}

struct App {
    settings: Settings,
    store: Store,
}

impl App {
    async fn load() -> anyhow::Result<Self> {
        let config = Config::load().context("loading configuration")?;
        let settings = config.settings()?;
        let base = std::env::current_dir()?;
        let store = Store::from_settings(&settings.store, &base).await?;
        Ok(Self { settings, store })
    }

    fn collection_name(&self, project: &str) -> anyhow::Result<String> {
        Ok(collection_name(project, &self.settings.store.docs_table_name)?)
    }

    fn provider(&self) -> anyhow::Result<Arc<dyn LlmProvider>> {
        Ok(shared_provider(&self.settings.embedding)?)
    }

    async fn open(&self, project: &str) -> anyhow::Result<Arc<Collection>> {
        let name = self.collection_name(project)?;
        Ok(self.store.open_or_create(&name, self.settings.embedding.embedding_size).await?)
    }

    /// Like `open`, but refuses to create a collection that does not exist yet.
    async fn open_existing(&self, project: &str) -> anyhow::Result<Arc<Collection>> {
        let name = self.collection_name(project)?;
        if !self.store.exists(&name).await? {
            bail!("project '{project}' has no collection '{name}'");
        }
        self.open(project).await
    }

    async fn pipeline(&self, collection: Arc<Collection>) -> anyhow::Result<Pipeline> {
        Ok(Pipeline::new(collection, self.provider()?, self.settings.embedding.batch_size)?)
    }
}

async fn ingest(app: &App, project: &str, path: &Path, chunking: ChunkingConfig, reset: bool) -> anyhow::Result<()> {
    let name = app.collection_name(project)?;
    if reset && app.store.exists(&name).await? {
        app.store.destroy(&name).await?;
        info!(collection = %name, "reset collection");
    }
    let processor = DataProcessor::new(chunking)?;
    let files = if path.is_dir() { processor.list_files(path) } else { vec![path.to_path_buf()] };
    let mut chunks = Vec::new();
    for file in &files {
        chunks.extend(processor.process_file(file).with_context(|| format!("processing {}", file.display()))?);
    }
    println!("{} files -> {} chunks", files.len(), chunks.len());

    let pipeline = app.pipeline(app.open(project).await?).await?;
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    let inserted = pipeline.ingest_chunks(&chunks, |n| pb.inc(n as u64)).await;
    pb.finish_and_clear();
    println!("Inserted {} chunks into '{name}'", inserted?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::load().await?;

    match cli.command {
        Commands::Ingest { project, path, chunk_size, overlap, reset } => {
            let mut chunking = ChunkingConfig::from(&app.settings.chunking);
            if let Some(size) = chunk_size { chunking.chunk_size = size; }
            if let Some(overlap) = overlap { chunking.chunk_overlap = overlap; }
            ingest(&app, &project, &path, chunking, reset).await?;
        }
        Commands::Search { project, query, search } => {
            let params = search.params(&app.settings);
            let pipeline = app.pipeline(app.open_existing(&project).await?).await?;
            let results = pipeline.query(&query, params).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Ask { project, question, search } => {
            let params = search.params(&app.settings);
            let pipeline = app.pipeline(app.open_existing(&project).await?).await?;
            let answer = pipeline.answer(&question, params).await?;
            println!("{}\n", answer.answer);
            for (i, s) in answer.sources.iter().enumerate() {
                println!("[{}] {} ({:?}, {:.3})", i + 1, s.id, s.source, s.score);
            }
        }
        Commands::Delete { project, file } => {
            let collection = app.open_existing(&project).await?;
            let removed = collection.delete_by_partition(Some(&file)).await?;
            println!("Deleted {removed} chunks of '{file}'");
        }
        Commands::Reset { project } => {
            let name = app.collection_name(&project)?;
            app.store.destroy(&name).await?;
            println!("Destroyed '{name}'");
        }
        Commands::Browse { project, file, page, limit } => {
            let collection = app.open_existing(&project).await?;
            let page = collection.browse(file.as_deref(), page, limit).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Collections => {
            for name in app.store.list().await? {
                println!("{name}");
            }
        }
    }
    Ok(())
}
