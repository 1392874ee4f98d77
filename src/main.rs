//! Talent Search CLI
//!
//! Command-line interface for running and querying a talent search node.

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use talent_search_node::config::VectorBackend;
use talent_search_node::{
    build_provider, build_vector_store, ApiServer, AppConfig, AppState, DocumentIndexer,
    EmbeddingQueue, Error, MetadataFilter, MetricsService, MutationHooks, Profile, Project,
    ResponseGenerator, Result, ResultCache, SearchOptions, SemanticSearch, VectorStore,
};

#[derive(Parser)]
#[command(name = "talent-search")]
#[command(author, version, about = "Semantic search over developer profiles and projects", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },

    /// Start the HTTP API and the embedding queue
    Start {
        /// HTTP API listen address (overrides the config file)
        #[arg(long)]
        api_addr: Option<String>,
    },

    /// Run a semantic search
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Only documents owned by this profile
        #[arg(long)]
        owner: Option<String>,
    },

    /// Ask a question answered from indexed profiles and projects
    Chat {
        query: String,

        #[arg(long)]
        max_results: Option<usize>,
    },

    /// Embed and index profiles/projects from JSON array files
    Index {
        #[arg(long)]
        profiles: Option<PathBuf>,

        #[arg(long)]
        projects: Option<PathBuf>,
    },

    /// Show index statistics
    Stats,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        info!("Loading configuration from: {}", path);
        AppConfig::load(path)
    } else {
        info!("Using default configuration");
        let config = AppConfig::default();
        config.validate()?;
        Ok(config)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Everything a running node needs, wired from configuration.
struct Services {
    store: Arc<dyn VectorStore>,
    search: Arc<SemanticSearch>,
    generator: Arc<ResponseGenerator>,
    hooks: MutationHooks,
}

async fn build_services(config: &AppConfig) -> Result<Services> {
    let provider = build_provider(&config.provider)?;
    let store = build_vector_store(&config.vector_store).await?;
    info!(
        provider = provider.name(),
        store = store.name(),
        dimension = store.dimension(),
        "Services initialized"
    );
    if config.vector_store.backend == VectorBackend::Memory {
        warn!("Using the in-memory vector store; the index is lost on exit");
    }

    let search = Arc::new(SemanticSearch::new(
        provider.clone(),
        store.clone(),
        ResultCache::new(&config.cache),
        config.search.clone(),
    ));
    let generator = Arc::new(ResponseGenerator::new(
        provider.clone(),
        config.response.clone(),
    ));
    let indexer = Arc::new(DocumentIndexer::new(provider, store.clone()));
    let queue = Arc::new(EmbeddingQueue::new(indexer.clone(), config.queue.clone()));

    Ok(Services {
        store,
        search,
        generator,
        hooks: MutationHooks::new(queue, indexer),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { output } => {
            info!("Initializing new configuration at: {}", output);
            let config = AppConfig::default();
            config.save(&output)?;
            info!("Configuration saved successfully");
        }

        Commands::Start { api_addr } => {
            info!("Starting talent search node...");
            let mut config = load_config(&cli.config)?;
            if let Some(addr) = api_addr {
                config.api.listen_address = addr;
            }

            let services = build_services(&config).await?;
            let metrics = Arc::new(MetricsService::new(config.metrics.clone()));
            services.hooks.queue().start();

            let state = AppState {
                search: services.search.clone(),
                generator: services.generator.clone(),
                hooks: services.hooks.clone(),
                store: services.store.clone(),
                metrics,
                start_time: Instant::now(),
            };
            let api_server = ApiServer::with_state(config.api.clone(), state);

            info!("Press Ctrl+C to stop");
            api_server
                .run(async {
                    if let Err(e) = signal::ctrl_c().await {
                        warn!("Failed to listen for shutdown signal: {}", e);
                    }
                    info!("Received shutdown signal");
                })
                .await?;

            services.hooks.queue().stop().await;
            let stats = services.hooks.queue().stats().await;
            if stats.queue_length > 0 {
                warn!(pending = stats.queue_length, "Stopped with pending embedding updates");
            }
            info!("Node stopped");
        }

        Commands::Search {
            query,
            limit,
            threshold,
            owner,
        } => {
            let config = load_config(&cli.config)?;
            let services = build_services(&config).await?;
            let options = SearchOptions {
                threshold,
                filter: owner.map(MetadataFilter::owner),
            };
            let limit = limit.unwrap_or(config.search.default_limit);
            let results = services.search.search(&query, limit, &options).await?;
            print_json(&results)?;
        }

        Commands::Chat { query, max_results } => {
            let config = load_config(&cli.config)?;
            let services = build_services(&config).await?;
            let max_results = max_results.unwrap_or(config.search.default_limit);
            let response = talent_search_node::search::answer(
                &services.search,
                &services.generator,
                &query,
                max_results,
            )
            .await?;
            print_json(&response)?;
        }

        Commands::Index { profiles, projects } => {
            if profiles.is_none() && projects.is_none() {
                return Err(Error::Config(
                    "pass --profiles and/or --projects".to_string(),
                ));
            }
            let config = load_config(&cli.config)?;
            let services = build_services(&config).await?;
            let hooks = &services.hooks;

            if let Some(path) = profiles {
                let items: Vec<Profile> = read_json(&path)?;
                hooks.bulk_update_profiles(items).await;
            }
            if let Some(path) = projects {
                let items: Vec<Project> = read_json(&path)?;
                hooks.bulk_update_projects(items).await;
            }

            hooks.queue().start();
            hooks.queue().wait_until_idle().await;
            hooks.queue().stop().await;

            let stats = hooks.queue().stats().await;
            info!(
                processed = stats.processed,
                dropped = stats.dropped,
                "Indexing finished"
            );
            print_json(&stats)?;
        }

        Commands::Stats => {
            let config = load_config(&cli.config)?;
            let store = build_vector_store(&config.vector_store).await?;
            print_json(&store.describe_stats().await?)?;
        }
    }

    Ok(())
}
