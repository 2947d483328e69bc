use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hangar_ai::embeddings::ollama_embed::OllamaEmbedder;
use hangar_ai::index::IndexManager;
use hangar_ai::llm::ollama_llm::OllamaLlm;
use hangar_ai::llm::DeadlineLlm;
use hangar_ai::ollama::OllamaClient;
use hangar_ai::pipeline::{PipelineSettings, RagPipeline};
use hangar_core::config::HangarConfig;
use hangar_core::images::ImageCatalog;
use hangar_core::ingest::{process_manuals, read_chunks, PageSource, TextDirSource};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hangar", about = "Offline question answering over aircraft maintenance manuals", version)]
struct Cli {
    /// Config file (default: ./hangar.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and tag page dumps into the processed directory
    Process {
        /// Directory of <manual>.txt page dumps (default: raw_dir from config)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Embed processed chunks and persist the index
    BuildIndex,

    /// Answer a question and print the result as JSON
    Ask {
        question: String,
        /// Override the configured number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Skip image lookup and diagram analysis
        #[arg(long)]
        no_images: bool,
    },

    /// Report Ollama reachability and persisted index status
    Health,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HangarConfig> {
    let cfg = match path {
        Some(p) => HangarConfig::load_from(p)?,
        None => HangarConfig::load()?,
    };
    Ok(cfg)
}

fn index_manager(cfg: &HangarConfig, client: &OllamaClient) -> IndexManager {
    let embedder = OllamaEmbedder::new(client.clone())
        .with_timeout(Duration::from_secs(cfg.embed_timeout_secs));
    IndexManager::new(cfg.index_dir.clone(), cfg.embedding_model.clone(), Arc::new(embedder))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Process { input } => {
            let dir = input.unwrap_or_else(|| cfg.raw_dir.clone());
            let manuals = TextDirSource::new(dir).manuals()?;
            let output = process_manuals(&manuals, &cfg.chunker());
            output.write(&cfg.processed_dir)?;
            println!("{}", serde_json::to_string_pretty(&output.stats)?);
        }
        Command::BuildIndex => {
            let client = OllamaClient::new(&cfg.ollama_url)?;
            let chunks = read_chunks(&cfg.chunks_path())?;
            let index = index_manager(&cfg, &client);
            index.build(&chunks)?;
            let status = index.persist()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Ask {
            question,
            top_k,
            no_images,
        } => {
            let client = OllamaClient::new(&cfg.ollama_url)?;
            let index = index_manager(&cfg, &client);
            let catalog = ImageCatalog::load(&cfg.images_catalog_path())?;
            let llm = DeadlineLlm::new(
                Arc::new(OllamaLlm::new(client.clone())),
                Duration::from_secs(cfg.generate_timeout_secs),
            );
            let vision = OllamaLlm::new(client).with_timeout(Duration::from_secs(cfg.generate_timeout_secs));

            let mut settings = PipelineSettings::from(&cfg);
            if let Some(k) = top_k {
                settings.retriever.top_k = k;
            }
            settings.include_images = !no_images;

            let result = RagPipeline::new(&index, &llm, &catalog, settings)
                .with_vision(&vision)
                .query(&question);
            info!(confidence = ?result.confidence, sources = result.sources.len(), "answered");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Health => {
            let client = OllamaClient::new(&cfg.ollama_url)?;
            let ollama = match client.health_check() {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            };
            let index = index_manager(&cfg, &client)
                .status()
                .context("reading index status")?;
            let report = serde_json::json!({
                "ollama_url": client.base_url(),
                "ollama": ollama,
                "index": index,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
