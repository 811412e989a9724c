// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Accepts `POST /api/contact` multipart submissions from the portfolio
//! front-end and forwards them to a Discord user by direct message.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env`):
//!
//! - `DISCORD_BOT_TOKEN`: Bot token (required)
//! - `DISCORD_USER_ID`: Recipient user id (required)
//! - `PORT`: Listen port (default: 3000)
//! - `RATE_LIMIT_WINDOW_SECS`: Spacing between accepted submissions per
//!   client (default: 600, 0 disables)
//! - `RELAY_TIMEOUT_MS`: Bound on a single delivery (default: 10000)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{config::Config, handlers::router, relay::DiscordRelay, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr(),
        window_secs = config.rate_limit.window_secs,
        relay_timeout_ms = config.relay.timeout_ms,
        "Starting contact relay"
    );
    if config.rate_limit.window_secs == 0 {
        warn!("Rate limiting disabled");
    }

    // Connect to the provider in the background; submissions fail fast
    // until the bot is ready.
    let relay = Arc::new(DiscordRelay::new(&config.relay)?);
    let connecting = relay.clone();
    let retry_interval = config.relay.connect_retry_interval();
    tokio::spawn(async move {
        let _ = connecting.connect_with_retry(retry_interval).await;
    });

    let state = Arc::new(AppState::new(config.clone(), relay)?);

    // Spawn sweep task
    if let Some(interval) = config.rate_limit.sweep_interval() {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sweep_state.limiter.sweep(Instant::now()).await;
                sweep_state
                    .metrics
                    .set_tracked_clients(sweep_state.limiter.len().await);
            }
        });
    }

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
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
}
