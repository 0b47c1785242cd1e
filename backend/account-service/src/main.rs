/// Account Service - HTTP entry point
use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account_service::{
    config::Settings,
    db::{PgCredentialStore, PgDriveStore, PgOtpStore, PgProductStore},
    handlers,
    security::TokenConfig,
    services::{EmailDispatcher, SmtpEmailSender},
    AppState, Stores,
};
use crypto_core::KeyPair;
use redis_utils::{RedisPool, RedisSessionCache};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_service=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_target(false))
        .init();

    let settings = Settings::load().context("failed to load configuration")?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "starting account-service"
    );

    let connect_options = PgConnectOptions::from_str(&settings.database.url)
        .context("invalid DATABASE_URL")?
        .options([("statement_timeout", settings.database.statement_timeout())]);
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect_with(connect_options)
        .await
        .context("failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;
    tracing::info!("database migrations applied");

    let redis = RedisPool::connect(&settings.redis.url).await?;
    let cache = Arc::new(RedisSessionCache::new(
        redis.manager(),
        settings.redis.response_timeout(),
    ));

    let access_keys = KeyPair::from_encoded(
        &settings.tokens.access_private_key,
        &settings.tokens.access_public_key,
    )
    .context("invalid access token key pair")?;
    let refresh_keys = KeyPair::from_encoded(
        &settings.tokens.refresh_private_key,
        &settings.tokens.refresh_public_key,
    )
    .context("invalid refresh token key pair")?;

    let sender = SmtpEmailSender::new(&settings.email)
        .map_err(|e| anyhow::anyhow!("failed to configure email sender: {e}"))?;
    tracing::info!(smtp_enabled = sender.is_enabled(), "email sender configured");
    let mailer = EmailDispatcher::new(
        Arc::new(sender),
        settings.email.send_timeout(),
        &settings.email.client_origin,
    );

    let stores = Stores {
        users: Arc::new(PgCredentialStore::new(pool.clone())),
        otps: Arc::new(PgOtpStore::new(pool.clone())),
        products: Arc::new(PgProductStore::new(pool.clone())),
        drive: Arc::new(PgDriveStore::new(pool.clone())),
    };

    let state = web::Data::new(AppState::new(
        stores,
        cache,
        TokenConfig::new(access_keys, settings.tokens.access_ttl()),
        TokenConfig::new(refresh_keys, settings.tokens.refresh_ttl()),
        mailer,
        settings.otp.clone(),
        settings.account.clone(),
    ));

    let client_origin = settings.email.client_origin.clone();
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&client_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("failed to bind {bind_address}"))?
    .shutdown_timeout(30)
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    let finished = tokio::select! {
        finished = &mut server_task => finished,
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
            server_handle.stop(true).await;
            server_task.await
        }
    };

    match finished {
        Ok(result) => result.context("HTTP server failed")?,
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    pool.close().await;
    tracing::info!("account-service stopped");
    Ok(())
}
