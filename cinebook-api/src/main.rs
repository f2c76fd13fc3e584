use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cinebook_api::{app, AppState};
use cinebook_booking::SessionConfig;
use cinebook_core::token::JwtMaker;
use cinebook_store::{app_config::Config, DbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cinebook_api=debug,cinebook_booking=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinebook API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let tokens = JwtMaker::new(&config.auth.token_symmetric_key)
        .context("Invalid auth.token_symmetric_key")?;

    let state = AppState::postgres(
        &db,
        Arc::new(tokens),
        SessionConfig {
            access_token_duration: config.auth.access_token_duration(),
            refresh_token_duration: config.auth.refresh_token_duration(),
        },
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
