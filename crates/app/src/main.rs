mod coordinator;
mod events;
mod problem;
mod router;
mod scheduler;
mod session;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use chrono::Utc;
use tracing::{info, warn};

use talent_sync_client::RecruitingClient;
use talent_sync_util::{load_env_file, AppConfig};

use crate::coordinator::MutationCoordinator;
use crate::scheduler::SyncScheduler;
use crate::session::SyncSession;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.sync.request_timeout)
        .build()?;
    let client = RecruitingClient::new(config.api_base_url.clone(), http);

    let session = SyncSession::new(Arc::new(Utc::now));
    let (scheduler, worker) =
        SyncScheduler::new(session.clone(), client.clone(), config.sync.refresh_interval);
    let coordinator = MutationCoordinator::new(
        session.clone(),
        client,
        scheduler.clone(),
        config.sync.shortlist_basis,
    );
    let worker_handle = worker.spawn();

    let state = router::AppState::new(metrics, session.clone(), scheduler, coordinator);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        api = %config.api_base_url,
        refresh_secs = config.sync.refresh_interval.as_secs(),
        basis = config.sync.shortlist_basis.as_str(),
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_session = session.clone();
    axum::serve(listener, router::app_router(state))
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(stage = "app", error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!(stage = "app", "shutdown signal received");
            shutdown_session.teardown().await;
        })
        .await?;

    // Covers the server exiting without a signal.
    session.teardown().await;
    if let Err(err) = worker_handle.await {
        warn!(stage = "app", error = %err, "sync worker ended abnormally");
    }
    info!(stage = "app", "shutdown complete");
    Ok(())
}
