//! Inbox Engine
//!
//! Durable inbox for chat messages:
//! - HTTP receiver that validates and enqueues messages
//! - Queue processor that claims items and runs the enrichment pipeline
//! - Notes written to an Obsidian vault, replies sent to the sender
//! - Staleness recovery and manual retry

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use api::{router, AppState, ReceiverConfig};
use connectors::{
    build_analyzer, build_notifier, AiConfig, ArticleConfig, ArticleFetcher, FetchConfig,
    HttpArticleFetcher, HttpContentFetcher, NotifyConfig, OcrConfig, OcrEngine, TesseractOcr,
    VaultConfig, VaultNoteStore,
};
use inbox_core::ItemId;
use queue_store::{QueueStore, SqliteQueueStore, StoreConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{Collaborators, PipelineSettings, Processor, ProcessorConfig, Recovery, WorkerScheduler};

/// Command line interface.
#[derive(Debug, Parser)]
#[command(name = "inbox-engine", version, about)]
struct Cli {
    /// Extra configuration file layered over config/default.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the receiver and the scheduled processor (default)
    Serve,
    /// Drain the queue once and exit
    Process,
    /// Release stale Processing items
    Recover {
        /// Overrides processor.stale_after_secs
        #[arg(long)]
        stale_after_secs: Option<u64>,
    },
    /// Move a Completed or Failed item back to Pending
    Retry { id: i64 },
    /// Print item counts per status
    Status,
}

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct AppConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    receiver: ReceiverConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    processor: ProcessorConfig,
    #[serde(default)]
    fetch: FetchConfig,
    #[serde(default)]
    ocr: OcrConfig,
    #[serde(default)]
    article: ArticleConfig,
    #[serde(default)]
    ai: AiConfig,
    #[serde(default)]
    vault: VaultConfig,
    #[serde(default)]
    notify: NotifyConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            receiver: ReceiverConfig::default(),
            store: StoreConfig::default(),
            processor: ProcessorConfig::default(),
            fetch: FetchConfig::default(),
            ocr: OcrConfig::default(),
            article: ArticleConfig::default(),
            ai: AiConfig::default(),
            vault: VaultConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl AppConfig {
    fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            source: self.vault.source.clone(),
            ocr_language: self.ocr.language.clone(),
            max_tags: self.ai.max_tags,
            max_analysis_chars: self.processor.max_analysis_chars,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let store: Arc<dyn QueueStore> = Arc::new(
        SqliteQueueStore::open(config.store.clone()).context("Failed to open queue store")?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::Process => process(config, store).await,
        Command::Recover { stale_after_secs } => {
            let threshold = stale_after_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.processor.stale_after());
            let recovery = Recovery::new(store, config.processor.max_attempts);
            let report = recovery
                .recover_stale(threshold)
                .await
                .context("Staleness recovery failed")?;
            print_json(&report)
        }
        Command::Retry { id } => {
            let recovery = Recovery::new(store, config.processor.max_attempts);
            let item = recovery
                .retry(ItemId(id))
                .await
                .with_context(|| format!("Failed to retry item {}", id))?;
            print_json(&item)
        }
        Command::Status => {
            let counts = store.counts().await.context("Failed to read queue counts")?;
            print_json(&counts)
        }
    }
}

/// Receiver plus background processor until a shutdown signal.
async fn serve(config: AppConfig, store: Arc<dyn QueueStore>) -> Result<()> {
    info!("Starting Inbox Engine v{}", env!("CARGO_PKG_VERSION"));

    let collaborators = build_collaborators(&config)?;
    check_health(store.as_ref(), &collaborators).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = Arc::new(Processor::new(
        store.clone(),
        &collaborators,
        &config.pipeline_settings(),
        config.processor.clone(),
        config.notify.send_preview,
    ));
    info!(worker_id = %processor.worker_id(), "Processor ready");

    let scheduler = Arc::new(
        WorkerScheduler::new(processor, shutdown_rx)
            .with_probes(collaborators.analyzer.clone(), collaborators.notes.clone()),
    );
    let worker_handles = scheduler.start();

    let state = AppState::new(
        store,
        config.processor.max_attempts,
        config.receiver.clone(),
        config.processor.stale_after(),
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("Server error")?;

    info!("Shutting down, waiting for in-flight items...");
    for handle in worker_handles {
        if tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .is_err()
        {
            warn!("Worker did not stop in time");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Drain the queue once.
async fn process(config: AppConfig, store: Arc<dyn QueueStore>) -> Result<()> {
    let collaborators = build_collaborators(&config)?;
    let processor = Processor::new(
        store,
        &collaborators,
        &config.pipeline_settings(),
        config.processor.clone(),
        config.notify.send_preview,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let summary = processor
        .drain(&shutdown_rx)
        .await
        .context("Processor run failed")?;
    print_json(&summary)
}

fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    let analyzer = build_analyzer(&config.ai).context("Failed to configure AI provider")?;
    if analyzer.is_none() {
        info!("AI analysis disabled, notes get fallback analysis");
    }

    let ocr = config
        .ocr
        .enabled
        .then(|| Arc::new(TesseractOcr::new(&config.ocr)) as Arc<dyn OcrEngine>);
    let articles = config
        .article
        .enabled
        .then(|| Arc::new(HttpArticleFetcher::new(&config.article)) as Arc<dyn ArticleFetcher>);

    Ok(Collaborators {
        content: Arc::new(HttpContentFetcher::new(&config.fetch)),
        ocr,
        articles,
        analyzer,
        notes: Arc::new(VaultNoteStore::new(config.vault.clone())),
        notifier: build_notifier(&config.notify),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Load configuration from files and environment.
fn load_config(extra: Option<&std::path::Path>) -> Result<AppConfig> {
    let mut builder = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&AppConfig::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        );

    if let Some(path) = extra {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INBOX")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("receiver.allowed_users"),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Secrets and paths set the flat way
    if let Ok(api_key) = std::env::var("INBOX_AI_API_KEY") {
        config.ai.api_key = Some(api_key);
    }
    if let Ok(path) = std::env::var("INBOX_VAULT_PATH") {
        config.vault.path = PathBuf::from(path);
    }
    if let Ok(path) = std::env::var("INBOX_DB_PATH") {
        config.store.path = PathBuf::from(path);
    }
    if let Ok(users) = std::env::var("INBOX_ALLOWED_USERS") {
        config.receiver.allowed_users = users
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<i64>())
            .collect::<std::result::Result<_, _>>()
            .context("INBOX_ALLOWED_USERS must be comma-separated user ids")?;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(store: &dyn QueueStore, collaborators: &Collaborators) {
    // Check queue store
    if queue_store::health::check_connection(store).await {
        health().store.set_healthy();
        info!("Queue store: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("Queue store: unhealthy");
    }

    // Check AI provider
    if let Some(analyzer) = &collaborators.analyzer {
        match analyzer.ping().await {
            Ok(()) => {
                health().ai.set_healthy();
                info!(provider = analyzer.name(), "AI provider: healthy");
            }
            Err(e) => {
                health().ai.set_unhealthy(e.to_string());
                warn!(provider = analyzer.name(), error = %e, "AI provider: unavailable, using fallback analysis");
            }
        }
    }

    // Check vault
    match collaborators.notes.ping().await {
        Ok(()) => {
            health().vault.set_healthy();
            info!("Vault: healthy");
        }
        Err(e) => {
            health().vault.set_unhealthy(e.to_string());
            error!(error = %e, "Vault: unavailable");
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
