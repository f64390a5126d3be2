// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! NutriGame API Server
//!
//! Serves missions, squads and weekly rankings, and runs the scheduled
//! rollover, reset and reminder jobs.

use nutrigame::{
    config::Config,
    db::FirestoreStore,
    services::{
        scheduler::run_scheduler, HttpPushDispatcher, LogDispatcher, PushDispatcher,
        RandomCodeGenerator,
    },
    time_utils::SystemClock,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        project = %config.gcp_project_id,
        "Starting NutriGame API"
    );

    let store = Arc::new(FirestoreStore::new(&config.gcp_project_id).await?);
    let clock = Arc::new(SystemClock);

    let dispatcher: Arc<dyn PushDispatcher> = match &config.push_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Push delivery enabled");
            Arc::new(HttpPushDispatcher::new(
                endpoint.clone(),
                config.push_api_key.clone(),
            ))
        }
        None => {
            tracing::info!("No PUSH_ENDPOINT configured, pushes will only be logged");
            Arc::new(LogDispatcher)
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        clock.clone(),
        dispatcher,
        Arc::new(RandomCodeGenerator::new()),
    ));

    if config.internal_scheduler {
        tokio::spawn(run_scheduler(state.jobs.clone(), clock));
    } else {
        tracing::info!("Internal scheduler disabled, expecting /tasks/* triggers");
    }

    // Build router
    let app = nutrigame::routes::create_router(state);

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
                .add_directive("nutrigame=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
