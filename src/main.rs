use anyhow::{Context, Result};
use geo_gateway::{
    config::GatewayConfig,
    routes,
    services::{
        audit_store::{SqliteAuditRecorder, apply_schema, ensure_schema},
        blob_store::FsBlobStore,
        notifier::RedisStreamPublisher,
        pipeline::RequestPipeline,
        policy::Denylist,
        zone::resolve_zone,
    },
    state::GatewayState,
    telemetry::init_tracing,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, net::SocketAddr, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = GatewayConfig::from_env_and_args()?;

    // --- Logging setup ---
    init_tracing(&cfg.log_level)?;
    tracing::info!("Starting geo-gateway with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Audit database ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    let options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database URL `{}`", cfg.database_url))?
        .create_if_missing(true);

    // Lazy: an unreachable database degrades audit writes, not startup.
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_lazy_with(options);

    // --- Handle migration mode ---
    if migrate {
        let applied = apply_schema(&db).await.context("applying audit schema")?;
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(()); // exit after migration
    }
    ensure_schema(&db).await;

    // --- Collaborators, created once and shared ---
    let publisher = RedisStreamPublisher::open(&cfg.redis_url)
        .with_context(|| format!("parsing Redis URL `{}`", cfg.redis_url))?;
    let pipeline = RequestPipeline::new(
        Denylist::new(cfg.denied_countries.clone()),
        Arc::new(FsBlobStore::new(&cfg.storage_dir)),
        Arc::new(SqliteAuditRecorder::new(db)),
        Arc::new(publisher),
        cfg.rejection_stream.clone(),
        cfg.publish_timeout,
    );
    let zone = resolve_zone(&cfg.zone_metadata_url).await;
    let state = GatewayState::new(pipeline, zone);

    // --- Build router ---
    let app = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("all connections drained, exiting");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("received shutdown signal, draining connections");
}
