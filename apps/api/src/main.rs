//! RoleReaper API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod review_worker;
mod state;

use std::future::IntoFuture;
use std::sync::Arc;

use rolereaper_application::{ReviewCoordinator, ReviewService};
use rolereaper_core::AppError;
use rolereaper_infrastructure::{
    DirectorySnapshot, InMemoryDirectoryService, InMemoryPermissionCatalog,
    InMemoryReviewJobRepository,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api_config::ApiConfig;
use crate::api_router::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let snapshot = DirectorySnapshot::from_json_file(&config.directory_snapshot_path)?;
    info!(
        path = %config.directory_snapshot_path.display(),
        tenant_count = snapshot.tenants.len(),
        "directory snapshot loaded"
    );

    let review_service = ReviewService::new(
        Arc::new(InMemoryPermissionCatalog::from_snapshot(&snapshot)),
        Arc::new(InMemoryDirectoryService::from_snapshot(&snapshot)),
        config.concurrency,
    );
    let review_coordinator =
        ReviewCoordinator::new(Arc::new(InMemoryReviewJobRepository::new()), review_service);

    let app_state = AppState {
        review_coordinator: review_coordinator.clone(),
    };
    let app = build_router(app_state);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "rolereaper-api listening");

    // The worker loop never returns; only a serving error ends the process.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.map_err(|error| AppError::Internal(format!("api server error: {error}")))
        }
        () = review_worker::run(review_coordinator, config.worker_settings()) => Ok(()),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
