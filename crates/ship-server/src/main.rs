//! ship-server - AI website generation service

mod config;
mod gateway;
mod model;
mod quota;
mod routes;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use ship_agent::{
    tools::DisabledSearch, AccessGate, Driver, EventBus, KeyValidator, Onboarding, QuotaStore,
    Toolbox,
};
use ship_storage::{LocalStorage, Storage};

use crate::config::Config;
use crate::gateway::{ActiveRuns, AppState};
use crate::model::{AnthropicFactory, AnthropicKeyValidator};
use crate::quota::{HttpQuotaStore, UnlimitedQuota};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// ship-server - AI website generation service
#[derive(Parser, Debug)]
#[command(name = "ship-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to bind (default: 127.0.0.1)
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on (default: 3001)
    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory for deployed sites (default: ./storage)
    #[arg(long)]
    storage_root: Option<String>,

    /// Model to use for generation
    #[arg(short, long)]
    model: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let path = Config::init().context("writing config file")?;
        println!("Config file at {}", path.display());
        println!("\n{}", config::example_config());
        return Ok(());
    }

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load();
    let model = args
        .model
        .or(config.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let bind = args
        .bind
        .or(config.bind.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.port.or(config.port).unwrap_or(3001);
    let storage_root = args
        .storage_root
        .or(config.storage_root.clone())
        .unwrap_or_else(|| "./storage".to_string());

    let service_key = config
        .anthropic_api_key()
        .context("no Anthropic API key found (set ANTHROPIC_API_KEY or api_keys.anthropic)")?;

    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&storage_root));
    let bus = Arc::new(EventBus::new());
    let toolbox = Arc::new(Toolbox::new(storage.clone(), Arc::new(DisabledSearch)));

    let factory = Arc::new(AnthropicFactory::new(service_key, &model));
    let validator: Arc<dyn KeyValidator> = Arc::new(AnthropicKeyValidator::new(&model));

    let quota: Arc<dyn QuotaStore> = match config.quota_api_url {
        Some(ref url) => {
            tracing::info!(%url, "quota enforcement via user API");
            Arc::new(HttpQuotaStore::new(url))
        }
        None => {
            tracing::info!("no quota API configured, all requests proceed");
            Arc::new(UnlimitedQuota)
        }
    };

    let gate = AccessGate::new(quota, validator.clone());
    let driver = Driver::new(factory, toolbox, bus.clone());
    let onboarding = Arc::new(Onboarding::new(gate, driver, bus.clone()));

    let state = AppState {
        onboarding,
        bus,
        storage,
        validator,
        active: Arc::new(ActiveRuns::new()),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/ws", get(gateway::ws_handler))
        .route("/site/{slug}", get(routes::serve_site_index))
        .route("/site/{slug}/download", get(routes::download_site))
        .route("/site/{slug}/{*path}", get(routes::serve_site_file))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(%addr, %model, %storage_root, "ship-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    tracing::info!("ship-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "running" }))
}
