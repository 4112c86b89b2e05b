//! Marketplace ordering service

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace::bus::EventBus;
use marketplace::http::auth::JwtKeys;
use marketplace::payments::{StripeGateway, WebhookVerifier};
use marketplace::persistence::PgStore;
use marketplace::{router, AppState, Config};

mod shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let db = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to postgres")?;
    sqlx::migrate!("./migrations").run(&db).await.context("running migrations")?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, order events will be dropped");
                None
            }
        },
        None => None,
    };

    let state = AppState::new(
        PgStore::new(db),
        Arc::new(StripeGateway::new(&config.stripe_secret_key, &config.stripe_api_base)),
        EventBus::new(nats),
        JwtKeys::new(&config.jwt_secret),
        WebhookVerifier::new(&config.stripe_webhook_secret, config.environment),
        config.environment,
        &config.payment_currency,
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, environment = ?config.environment, "marketplace listening");
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown::signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}
