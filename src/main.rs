//! Demo Call Gateway
//!
//! Entry point for the demo call gateway. A salesperson on a cold call posts the
//! prospect's number here; the gateway checks the shared secret, rate limits the
//! caller and asks the voice provider to dial the prospect with an AI agent.
//!
//! # Architecture
//! The service is built using:
//! - axum for the HTTP endpoint
//! - an in-memory sliding-window rate limiter
//! - reqwest for the voice provider API
//!
//! # Flow
//! 1. Browser posts phone number, business name and credential
//! 2. Gateway rate limits by caller IP
//! 3. Gateway validates the credential and the inputs
//! 4. Voice provider places the call
//! 5. Gateway returns the conversation id
//!
//! @copyright 2025

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use rust_call_gateway::config::Config;
use rust_call_gateway::credential::CredentialChecker;
use rust_call_gateway::gateway::{router, AppState};
use rust_call_gateway::rate_limit::{spawn_sweeper, RateLimitConfig, RateLimiter};
use rust_call_gateway::voice::VoiceClient;

/// Initializes the logging system.
///
/// Structured logging with file, line and level. The filter comes from
/// `RUST_LOG` and defaults to `info`.
fn setup_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stdout)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Builds the gateway state and serves it until Ctrl-C.
async fn setup_services(config: Config) -> Result<()> {
    let credentials = CredentialChecker::new(config.auth.password_hash.clone());
    if !credentials.is_configured() {
        warn!("auth.password_hash is not set; every trigger request will fail with a configuration error");
    }
    if config.voice.api_key.is_none() || config.voice.agent_id.is_none() {
        warn!("Voice provider API key or agent id is not set; calls cannot be placed");
    }

    info!(
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Initializing rate limiter"
    );
    let rate_limiter = RateLimiter::in_memory(RateLimitConfig::from(&config.rate_limit));
    spawn_sweeper(
        rate_limiter.store(),
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
        Duration::from_secs(config.rate_limit.idle_retention_secs),
    );

    let voice_client = VoiceClient::new(config.voice.clone()).context("Failed to create voice client")?;

    let state = AppState {
        limiter: rate_limiter,
        credentials,
        placer: Arc::new(voice_client),
        trust_forwarded_headers: config.server.trust_forwarded_headers,
    };

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        trust_forwarded_headers = config.server.trust_forwarded_headers,
        "Starting server on {}", addr
    );

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    info!("Demo call gateway starting up...");

    info!("Loading configuration...");
    let config = Config::new().context("Failed to load configuration")?;
    info!(?config, "Configuration loaded successfully");

    setup_services(config).await
}
