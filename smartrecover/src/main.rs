//! SmartRecover main binary.
//!
//! Wires the stores, connectors, LLM manager, and orchestrator together
//! and serves the HTTP API:
//! - Connectors: incident source (mock CSV / ServiceNow / Jira) and
//!   knowledge base (mock / Confluence)
//! - Engine: sequential agent graph + TTL cache + LLM synthesis
//! - API: REST + SSE chat streaming under /api/v1

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use smartrecover_agents::Orchestrator;
use smartrecover_api::{build_router, AppState};
use smartrecover_connectors::{build_incident_connector, build_knowledge_base_connector};
use smartrecover_core::cache::AgentCache;
use smartrecover_core::config::AppConfig;
use smartrecover_core::exclusion::ExclusionStore;
use smartrecover_core::logging::init_logging;
use smartrecover_core::prompt_log::PromptLog;
use smartrecover_core::prompts::PromptStore;
use smartrecover_llm::LlmManager;

/// SmartRecover CLI arguments
#[derive(Debug, Parser)]
#[clap(name = "smartrecover", version, about = "Incident triage and resolution engine")]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/smartrecover.yaml")]
    config: PathBuf,

    /// Log level (debug, info, warning, error, critical)
    #[clap(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[clap(long)]
    log_json: bool,

    /// Validate configuration and exit without starting services
    #[clap(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    let logging_handle = init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting SmartRecover v{}", env!("CARGO_PKG_VERSION"));
    info!(config = %cli.config.display(), "Configuration loaded");

    if cli.dry_run {
        info!("Dry run mode - configuration validated, exiting");
        return Ok(());
    }

    // Stores
    let prompts = Arc::new(PromptStore::load(&config.prompts_path));
    let prompt_log = Arc::new(PromptLog::new(config.prompt_logs.max_entries));
    let cache = Arc::new(AgentCache::new(Duration::from_secs(config.cache.ttl_secs)));
    let exclusions = Arc::new(ExclusionStore::new());

    // Connectors
    info!(
        connector = ?config.incident_connector.connector_type,
        "Initializing incident connector"
    );
    let incident_connector = build_incident_connector(&config.incident_connector)
        .context("Failed to initialize incident connector")?;

    info!(source = ?config.knowledge_base.source, "Initializing knowledge base");
    let kb_connector = build_knowledge_base_connector(&config.knowledge_base)
        .context("Failed to initialize knowledge base connector")?;

    // LLM
    let llm = Arc::new(
        LlmManager::new(config.llm.clone(), prompt_log.clone())
            .context("Failed to initialize LLM provider")?,
    );

    // Engine
    let orchestrator = Arc::new(Orchestrator::new(
        incident_connector.clone(),
        kb_connector,
        llm.clone(),
        cache.clone(),
        exclusions.clone(),
        prompts.clone(),
        &config.agents,
    ));

    let state = Arc::new(AppState::new(
        orchestrator,
        incident_connector,
        cache,
        exclusions,
        prompts,
        prompt_log,
        llm,
        Some(logging_handle),
        config.logging.clone(),
    ));

    let router = build_router(
        state,
        &config.server.cors_origins,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Cannot bind {bind_addr}"))?;
    info!(addr = %bind_addr, "SmartRecover listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!("server error: {e}")
        })?;

    info!("SmartRecover stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or CTRL+C)
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
