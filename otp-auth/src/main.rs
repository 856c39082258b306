// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use clap::Parser;
use otp_auth::app::{create_router, VERSION};
use otp_auth::routes::UserHandlers;
use otp_auth::services::auth::{AuthConfig, AuthService};
use otp_auth::services::auth_db::{PgUserStore, UserStore};
use otp_auth::services::email::Mailer;
use otp_auth::services::logging::init_tracing;
use otp_auth::services::memory_store::MemoryUserStore;
use std::net::SocketAddr;

/// User authentication service with emailed one-time passcodes.
#[derive(Debug, Parser)]
#[command(name = "otp-auth", version = VERSION)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// PostgreSQL connection string. Without it, data is kept in memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum connections in the database pool
    #[arg(long, env = "MAX_DB_CONNECTIONS", default_value_t = 10)]
    max_db_connections: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let auth_config = AuthConfig::from_env();
    let mailer = Mailer::from_env().context("Failed to configure email")?;
    if matches!(mailer, Mailer::Log(_)) {
        tracing::warn!("SMTP_HOST not set, passcodes will be written to the log");
    }

    // Bind to 0.0.0.0 to accept connections from any network interface (required for Docker)
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));

    match &cli.database_url {
        Some(database_url) => {
            let store = PgUserStore::connect(database_url, cli.max_db_connections).await?;
            store.migrate().await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            serve(addr, store, mailer, auth_config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            serve(addr, MemoryUserStore::new(), mailer, auth_config).await
        }
    }
}

async fn serve<S: UserStore>(
    addr: SocketAddr,
    store: S,
    mailer: Mailer,
    auth_config: AuthConfig,
) -> Result<()> {
    let service = AuthService::new(store, mailer, auth_config);
    let app = create_router(UserHandlers::new(service));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("otp-auth v{} listening on {}", VERSION, addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
