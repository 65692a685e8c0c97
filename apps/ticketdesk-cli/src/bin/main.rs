use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ticketdesk_core::config::{Config, SemanticBackend, Settings};
use ticketdesk_core::corpus::CorpusLoader;
use ticketdesk_core::traits::{Embedder, VectorIndexer};
use ticketdesk_core::types::{Chunk, Ticket};
use ticketdesk_embed::default_embedder;
use ticketdesk_hybrid::HybridSearchEngine;
use ticketdesk_resolve::{ChatCompletionsClient, ResolverOptions, TicketResolver};
use ticketdesk_text::LexicalIndex;
use ticketdesk_vector::writer::DEFAULT_BATCH_SIZE;
use ticketdesk_vector::{index_chunks, ingest_chunk, MemoryVectorIndex, QdrantIndex, VectorWriter};

#[derive(Parser, Debug)]
#[command(name = "ticketdesk")]
#[command(version)]
#[command(about = "Hybrid knowledge-base search and governed ticket resolution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load *.jsonl chunks, embed them and populate the indexes
    Ingest {
        /// Corpus directory (defaults to `corpus.dir`)
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Add one chunk (a JSON object) to the live indices and the corpus
    Add {
        #[arg(value_name = "CHUNK_JSON")]
        chunk: String,
    },
    /// Print fused search hits as JSON
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        alpha: Option<f32>,
        #[arg(long)]
        product: Option<String>,
        #[arg(long)]
        lang: Option<String>,
    },
    /// Resolve a ticket and print the resolution as JSON
    Resolve {
        #[arg(value_name = "TICKET")]
        ticket: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
}

/// Chunks added through `add` are appended here, inside the corpus directory.
const INGESTED_FILE: &str = "ingested.jsonl";

/// A semantic backend that can be both searched and written.
trait VectorStore: VectorIndexer + VectorWriter {
    fn writer(&self) -> &dyn VectorWriter;
}

impl<T: VectorIndexer + VectorWriter> VectorStore for T {
    fn writer(&self) -> &dyn VectorWriter {
        self
    }
}

type SharedVector = Arc<dyn VectorStore>;

/// Indexes ready to serve queries for one process.
struct Stores {
    text: LexicalIndex,
    vector: SharedVector,
    embedder: Box<dyn Embedder>,
}

fn corpus_dir(config: &Config, settings: &Settings, dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| config.resolve_path(&settings.corpus.dir))
}

fn load_corpus(dir: &Path) -> Result<Vec<Chunk>> {
    CorpusLoader::new().load_dir(dir).with_context(|| format!("loading corpus from {}", dir.display()))
}

fn build_lexical(chunks: &[Chunk]) -> Result<LexicalIndex> {
    let text = LexicalIndex::new()?;
    text.build(chunks.iter().map(|c| (c.id.as_str(), c.text.as_str())))?;
    Ok(text)
}

/// Open the configured semantic backend. The in-memory backend is filled
/// from `chunks` on every start; Qdrant is expected to be populated by
/// `ingest` already unless `populate` is set.
async fn open_vector(settings: &Settings, embedder: &dyn Embedder, chunks: &[Chunk], populate: bool) -> Result<SharedVector> {
    match settings.semantic.backend {
        SemanticBackend::Memory => {
            let index = Arc::new(MemoryVectorIndex::new());
            index_chunks(index.as_ref(), embedder, chunks, DEFAULT_BATCH_SIZE, populate).await?;
            let shared: SharedVector = index;
            Ok(shared)
        }
        SemanticBackend::Qdrant => {
            let index = Arc::new(QdrantIndex::from_config(&settings.semantic)?);
            if !index.is_healthy().await {
                warn!(url = %settings.semantic.url, "qdrant is not reachable");
            }
            if populate {
                index.ensure_collection(embedder.dim()).await?;
                let writer: &dyn VectorWriter = index.as_ref();
                index_chunks(writer, embedder, chunks, DEFAULT_BATCH_SIZE, true).await?;
            }
            let shared: SharedVector = index;
            Ok(shared)
        }
    }
}

async fn warm_up(settings: &Settings, chunks: &[Chunk]) -> Result<Stores> {
    let embedder = default_embedder(&settings.embedding)?;
    let vector = open_vector(settings, embedder.as_ref(), chunks, false).await?;
    let text = build_lexical(chunks)?;
    info!(chunks = chunks.len(), "stores ready");
    Ok(Stores { text, vector, embedder })
}

fn append_to_corpus(dir: &Path, chunk: &Chunk) -> Result<PathBuf> {
    let path = dir.join(INGESTED_FILE);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(chunk)?).with_context(|| format!("appending to {}", path.display()))?;
    Ok(path)
}

fn engine(stores: Stores, settings: &Settings) -> HybridSearchEngine<LexicalIndex, SharedVector> {
    HybridSearchEngine::new(stores.text, stores.vector, stores.embedder)
        .with_candidate_multiplier(settings.retrieval.candidate_multiplier)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    info!(env = config.env_name(), "configuration loaded");

    match cli.command {
        Command::Ingest { dir } => {
            let dir = corpus_dir(&config, &settings, dir);
            let chunks = load_corpus(&dir)?;
            let embedder = default_embedder(&settings.embedding)?;
            open_vector(&settings, embedder.as_ref(), &chunks, true).await?;
            let text = build_lexical(&chunks)?;
            info!(chunks = chunks.len(), lexical_docs = text.len()?, "ingest complete");
        }
        Command::Add { chunk } => {
            let chunk: Chunk = serde_json::from_str(&chunk).context("parsing chunk JSON")?;
            let dir = corpus_dir(&config, &settings, None);
            let chunks = load_corpus(&dir)?;
            if chunks.iter().any(|c| c.id == chunk.id) {
                bail!("chunk {} is already in the corpus; edit its source file and re-run ingest", chunk.id);
            }
            let stores = warm_up(&settings, &chunks).await?;
            ingest_chunk(&stores.text, stores.vector.writer(), stores.embedder.as_ref(), &chunk).await?;
            let path = append_to_corpus(&dir, &chunk)?;
            info!(id = %chunk.id, file = %path.display(), "chunk added");
            let summary = serde_json::json!({ "id": chunk.id, "lexical_docs": stores.text.len()? });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Search { query, top_k, alpha, product, lang } => {
            let chunks = load_corpus(&corpus_dir(&config, &settings, None))?;
            let stores = warm_up(&settings, &chunks).await?;
            let mut filters = settings.retrieval.filters.clone();
            if let Some(p) = product {
                filters.insert("product".into(), p);
            }
            if let Some(l) = lang {
                filters.insert("lang".into(), l);
            }
            let engine = engine(stores, &settings);
            let hits = engine
                .search_merged(
                    &query,
                    top_k.unwrap_or(settings.retrieval.top_k),
                    &filters,
                    alpha.unwrap_or(settings.retrieval.alpha),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Resolve { ticket, top_k } => {
            let chunks = load_corpus(&corpus_dir(&config, &settings, None))?;
            let stores = warm_up(&settings, &chunks).await?;
            let generator = ChatCompletionsClient::from_config(&settings.generation)?;
            let resolver = TicketResolver::new(engine(stores, &settings), generator)
                .with_options(ResolverOptions::from_settings(&settings));
            let ticket = Ticket::new(ticket).with_top_k(top_k.unwrap_or(settings.retrieval.top_k));
            let resolution = resolver.resolve(&ticket).await?;
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
    }
    Ok(())
}
