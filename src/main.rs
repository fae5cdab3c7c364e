mod config;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use kenning_index::{Advisor, CodeIndex, IndexWatcher, ReindexController};
use kenning_llm::any::AnyProvider;
use kenning_llm::hashing::HashingProvider;
use kenning_llm::ollama::OllamaProvider;
use kenning_llm::tiers::{Tier, TierChain};
use kenning_memory::{Embedder, InMemoryVectorStore};
use serde::Serialize;

use crate::config::{Config, EmbeddingProvider};

#[derive(Parser)]
#[command(
    name = "kenning",
    version = env!("CARGO_PKG_VERSION"),
    about = "Incremental semantic code index with intent-aware retrieval"
)]
struct Cli {
    /// Path to a kenning.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root to index
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the project and print index statistics
    Status,
    /// Index a directory below the root and print the report
    Index { path: Option<PathBuf> },
    /// Ranked semantic search over code entities
    Query {
        text: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Answer a question using retrieved code as context
    Ask { question: String },
    /// Diagnose build output read from a file or stdin
    Doctor { file: Option<PathBuf> },
    /// Vet a shell command before it runs
    Gatekeep { command: String },
    /// Show an entity and its neighbours in the dependency graph
    Graph { name: String },
    /// Drop every indexed entity whose path contains the pattern
    Purge { pattern: String },
    /// Index the project and keep it current until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    let root = std::fs::canonicalize(&cli.root)
        .with_context(|| format!("cannot open project root {}", cli.root.display()))?;

    let index = Arc::new(CodeIndex::new(
        root.clone(),
        config.index.to_index_config(),
        Arc::new(InMemoryVectorStore::new()),
        create_embedder(&config),
    ));
    index
        .spawn_initialize()
        .await
        .context("index initialization task panicked")?;
    if !index.is_ready() {
        bail!("index failed to initialize");
    }

    if let Command::Index { path } = &cli.command {
        let target = path.as_deref().unwrap_or(Path::new("."));
        let report = index.index_directory(target).await?;
        return print_json(&report);
    }

    let report = index.index_directory(&root).await?;
    tracing::info!(
        files = report.files_indexed,
        entities = report.entities_indexed,
        errors = report.errors.len(),
        duration_ms = report.duration_ms,
        "project indexed"
    );

    let tiers = Arc::new(create_tiers(&config));
    let advisor = Advisor::new(Arc::clone(&index), Arc::clone(&tiers), config.privacy.enabled);

    match cli.command {
        Command::Index { .. } => {}
        Command::Status => print_json(&index.stats().await)?,
        Command::Query { text, limit } => print_json(&index.query(&text, limit).await?)?,
        Command::Ask { question } => {
            health_check(&tiers).await;
            println!("{}", advisor.ask(&question).await?);
        }
        Command::Doctor { file } => {
            let output = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("failed to read build output from stdin")?;
                    buf
                }
            };
            health_check(&tiers).await;
            println!("{}", advisor.diagnose_build(&output).await?);
        }
        Command::Gatekeep { command } => print_json(&advisor.gatekeep(&command).await)?,
        Command::Graph { name } => match index.graph_lookup(&name)? {
            Some(view) => print_json(&view)?,
            None => println!("no entity named '{name}'"),
        },
        Command::Purge { pattern } => match index.purge(&pattern).await? {
            0 => println!("nothing matched '{pattern}'"),
            n => println!("purged {n} entities matching '{pattern}'"),
        },
        Command::Watch => {
            if !config.index.watch {
                tracing::warn!("watching is disabled in config (index.watch = false)");
                return Ok(());
            }
            let controller = ReindexController::new(Arc::clone(&index));
            let _watcher = IndexWatcher::start(&root, controller)?;
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn create_embedder(config: &Config) -> Embedder {
    let dimension = config.embedding.dimension;
    let provider = match config.embedding.provider {
        EmbeddingProvider::Hashing => AnyProvider::Hashing(HashingProvider::new(dimension)),
        EmbeddingProvider::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.base_url,
            config.llm.model.clone(),
            config.embedding.model.clone(),
        )),
    };
    Embedder::new(provider, dimension)
}

fn create_tiers(config: &Config) -> TierChain {
    let tiers = config
        .llm
        .tiers
        .iter()
        .map(|tier| {
            let model = tier.model.clone().unwrap_or_else(|| config.llm.model.clone());
            let provider =
                OllamaProvider::new(&config.llm.base_url, model, config.embedding.model.clone());
            Tier::new(tier.name.clone(), AnyProvider::Ollama(provider), tier.trusted)
        })
        .collect();
    TierChain::new(tiers)
}

async fn health_check(tiers: &TierChain) {
    let Some(tier) = tiers.first() else {
        tracing::warn!("no LLM tiers configured");
        return;
    };
    if let AnyProvider::Ollama(ollama) = &tier.provider {
        match ollama.health_check().await {
            Ok(()) => tracing::debug!(tier = %tier.name, "ollama health check passed"),
            Err(e) => tracing::warn!(tier = %tier.name, "ollama health check failed: {e:#}"),
        }
    }
}

fn resolve_config_path(arg: Option<&Path>) -> PathBuf {
    if let Some(path) = arg {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("KENNING_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("kenning.toml")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries command output
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
