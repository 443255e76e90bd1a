//! Tandem CLI and Server Binary
//!
//! Entry point for the matchmaking service. Provides commands for
//! initializing, validating and starting it.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{generate_default_config, load_config, save_config, validate_config, TandemConfig};
use matchmaker::api::{create_router, MatchmakerApiState};
use matchmaker::embedding::create_provider;
use matchmaker::{
    create_store, Janitor, MatchSettings, Matchmaker, MatchmakingMetrics, PersistenceWriter,
    RetryPolicy,
};
use observability::{init_logging, init_metrics, LogFormat};
use server::{run_until_shutdown, HttpServer, Server, ServerConfig, ShutdownController};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start { config, host, port } => start_service(config, host, port).await,
        Commands::Validate { config } => {
            init_logging("tandem", LogFormat::Pretty, "info")?;
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging("tandem", LogFormat::Pretty, "info")?;
            init_command(output)
        }
    }
}

async fn start_service(
    config_path: PathBuf,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = load_config(&config_path)?;
    if let Some(host) = host_override {
        config.server.host = host;
    }
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let format = LogFormat::parse(&config.logging.format).unwrap_or_default();
    init_logging(&config.service.name, format, &config.logging.level)?;
    info!(path = ?config_path, "Tandem starting...");

    check_config(&config)?;

    if config.metrics.enabled {
        init_metrics(config.metrics.port)?;
    } else {
        debug!("Prometheus exporter disabled");
    }

    let shutdown = ShutdownController::with_signals();

    let provider =
        create_provider(&config.embedding).context("Failed to create embedding provider")?;
    let store = match run_until_shutdown(shutdown.token(), create_store(&config.store)).await {
        Some(store) => store.context("Failed to connect to store")?,
        None => {
            info!("Shutdown requested before the store was ready");
            return Ok(());
        }
    };

    let metrics = Arc::new(MatchmakingMetrics::new());
    let (writer, writer_handle) = PersistenceWriter::spawn(
        Arc::clone(&store),
        RetryPolicy::from(&config.persistence),
        Arc::clone(&metrics),
        shutdown.child_token(),
    );

    let matchmaker = Arc::new(Matchmaker::new(
        provider,
        store,
        writer,
        MatchSettings::from_config(&config),
        metrics,
    ));

    let janitor_handle = if config.janitor.enabled {
        let janitor = Janitor::new(
            Arc::clone(&matchmaker),
            Duration::from_secs(config.janitor.interval_seconds),
        );
        let token = shutdown.child_token();
        Some(tokio::spawn(async move { janitor.run(token).await }))
    } else {
        warn!("Janitor disabled, stale participants will not be evicted");
        None
    };

    let app = create_router(MatchmakerApiState::new(Arc::clone(&matchmaker)));
    let server = HttpServer::new(ServerConfig::from(&config.server), app);

    info!(
        service = %config.service.name,
        host = %config.server.host,
        port = config.server.port,
        provider = matchmaker.provider_name(),
        store = matchmaker.store().name(),
        "Starting service"
    );
    let result = server.run(shutdown.child_token()).await;

    // the server may have stopped on its own; make sure the workers follow
    if !shutdown.is_cancelled() {
        shutdown.shutdown();
    }
    if let Some(handle) = janitor_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Janitor task failed");
        }
    }
    if let Err(e) = writer_handle.await {
        warn!(error = %e, "Persistence worker failed");
    }

    result?;
    info!("Tandem stopped");
    Ok(())
}

fn check_config(config: &TandemConfig) -> Result<()> {
    let report = validate_config(config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start due to configuration errors");
    }

    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!("Listen: {}:{}", config.server.host, config.server.port);
    println!(
        "Matching: threshold {} (semantic {})",
        config.matching.similarity_threshold, config.matching.semantic_threshold
    );
    println!("Embedding: {:?}", config.embedding.provider);
    println!("Store: {}", config.store.store_type);

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Pick an embedding provider (hashing, http or local)");
    println!("  2. Switch store.type to redis for durable records");
    println!(
        "  3. Run 'tandem validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'tandem start --config {:?}' to start matching",
        output_path
    );

    Ok(())
}
