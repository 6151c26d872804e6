// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride-Lifecycle API Server
//!
//! Matches riders with drivers, tracks each ride from request to rating,
//! and pushes ride events to connected clients.

use chrono::Utc;
use ride_lifecycle::{config::Config, db::Db, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Ride-Lifecycle API");

    // Open the database and apply the schema
    let db = Db::open(&config.database_url).await?;
    tracing::info!(url = %config.database_url, "Database ready");

    let admin = db.ensure_admin(&config.admin_email, Utc::now()).await?;
    tracing::info!(admin_id = admin.id, email = %admin.email, "Admin account available");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db));
    tracing::info!(
        capacity = config.notify_channel_capacity,
        "Notifier initialized"
    );

    // Build router
    let app = ride_lifecycle::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ride_lifecycle=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
