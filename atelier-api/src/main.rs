//! # Atelier API Server
//!
//! Loads configuration from the environment, prepares the database and the
//! two file stores, then serves the HTTP API until Ctrl-C.
//!
//! ```bash
//! cargo run -p atelier-api
//! ```

use anyhow::Context;
use atelier_api::{
    app::{build_router, AppState},
    config::Config,
    telemetry,
};
use atelier_shared::{
    db::{migrations, pool},
    mail::{LogMailer, Mailer, SmtpMailer},
    storage::FileStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// How often idle rate-limit buckets are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    telemetry::init_tracing(config.log_format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        production = config.api.production,
        "atelier API starting"
    );

    migrations::ensure_database_exists(&config.database.url)
        .await
        .context("database is not reachable")?;

    let mut db_config = pool::DatabaseConfig::from_url(config.database.url.clone());
    db_config.max_connections = config.database.max_connections;
    let db = pool::create_pool(db_config)
        .await
        .context("failed to create database pool")?;

    migrations::run_migrations(&db)
        .await
        .context("failed to run migrations")?;

    let status = migrations::get_migration_status(&db).await?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        "database schema ready"
    );

    let documents = FileStore::open(&config.storage.documents_dir)
        .await
        .context("cannot open document store")?;
    let images = FileStore::open(&config.storage.project_images_dir)
        .await
        .context("cannot open project image store")?;

    let mailer: Arc<dyn Mailer> = match &config.mail.smtp {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp, &config.mail.from).context("invalid SMTP settings")?;
            tracing::info!(host = %smtp.host, port = smtp.port, "mail delivered through SMTP");
            Arc::new(mailer)
        }
        None => {
            tracing::warn!("SMTP_HOST is not set; mail is logged, not delivered");
            Arc::new(LogMailer::new(config.mail.from.clone()))
        }
    };
    let address = config.bind_address();

    let state = AppState::new(db.clone(), config, mailer, documents, images);

    let limiter = state.password_change_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot bind {}", address))?;
    tracing::info!(%address, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    pool::close_pool(db).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
