use feedback_relay_scheduler::{SchedulerHandle, spawn_fixed_rate};
use feedback_relay_server::{
    config::ServerConfig,
    jobs::{SessionSweepJob, TriageJob},
    routes,
    state::AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let app_state =
        Arc::new(AppState::from_config(&config).expect("failed to build application state"));

    let mut schedules: Vec<SchedulerHandle> = Vec::new();
    if config.pipeline.enabled {
        let job = Arc::new(TriageJob::new(app_state.pipeline.clone()));
        let period = Duration::from_secs(config.pipeline.interval_seconds);
        schedules.push(spawn_fixed_rate(job, period).expect("failed to schedule triage"));
    } else {
        tracing::info!("Scheduled triage disabled; runs only on demand");
    }

    let sweep = Arc::new(SessionSweepJob::new(app_state.conversations.store().clone()));
    let sweep_period = Duration::from_secs(config.sessions.sweep_interval_seconds);
    schedules
        .push(spawn_fixed_rate(sweep, sweep_period).expect("failed to schedule session sweep"));

    let app = routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    for schedule in &mut schedules {
        schedule.shutdown().await;
    }
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
