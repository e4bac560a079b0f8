use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use warp_api_rust::config::AppConfig;
use warp_api_rust::query::PgQueryFacade;
use warp_api_rust::registry::ModelManifest;
use warp_api_rust::storage::LocalStorage;
use warp_api_rust::WarpServer;

#[derive(Parser)]
#[command(name = "warp-api")]
#[command(about = "Warp API server - generic REST backend with sessions and rate limiting")]
#[command(version)]
struct Args {
    #[arg(long, help = "Port to listen on (overrides PORT / WARP_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Model manifest in YAML or JSON (overrides WARP_MODELS)")]
    models: Option<PathBuf>,

    #[arg(long, help = "Verify configuration and database connectivity, then exit")]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, WARP_API_KEY, etc.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(models) = args.models {
        config.models = Some(models);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_filter)),
        )
        .init();
    tracing::info!("Starting Warp API in {:?} mode", config.environment);

    let query = PgQueryFacade::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.connection_timeout,
    )
    .await
    .context("configuring database pool")?;

    let mut storage = LocalStorage::new(config.storage.path.clone());
    if let Some(base_url) = &config.storage.base_url {
        storage = storage
            .with_base_url(base_url)
            .with_context(|| format!("invalid WARP_STORAGE_URL {}", base_url))?;
    }

    let manifest = match &config.models {
        Some(path) => ModelManifest::load(path).await?,
        None => ModelManifest::auth_only(),
    };

    let port = config.server.port;
    let mut server = WarpServer::new(config, Arc::new(query), Arc::new(storage));
    server.register_manifest(manifest);

    server
        .verify_connection()
        .await
        .context("database liveness probe failed")?;
    if args.check {
        tracing::info!("Configuration OK");
        return Ok(());
    }

    let app = server.into_router();
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Warp API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server")?;
    Ok(())
}
