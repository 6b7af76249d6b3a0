//! HTTP surface of the marketplace.
//!
//! Routes are relative; the server nests them under `/market`. Every
//! request passes through [`middleware::actor_middleware`], so handlers
//! receive the resolved [`Actor`](crate::model::Actor) as an extension.

pub mod accounts;
pub mod bookmarks;
pub mod dashboard;
pub mod middleware;
pub mod opportunities;
pub mod registrations;
pub mod session;

use std::sync::Arc;

use axum::Router;
use vhub_core::ServiceError;

use crate::service::{MarketError, MarketService};

pub type AppState = Arc<MarketService>;

/// Run a service call on the blocking pool.
///
/// Service calls hit SQLite and redb and may sleep between retries, so
/// they never run on an async worker thread.
pub async fn run_blocking<T, F>(svc: &AppState, f: F) -> Result<T, ServiceError>
where
    F: FnOnce(&MarketService) -> Result<T, MarketError> + Send + 'static,
    T: Send + 'static,
{
    let svc = Arc::clone(svc);
    tokio::task::spawn_blocking(move || f(&svc))
        .await
        .map_err(|e| ServiceError::Internal(format!("service task failed: {e}")))?
        .map_err(ServiceError::from)
}

/// Build the full marketplace router with state applied.
pub fn build_router(svc: Arc<MarketService>) -> Router {
    Router::new()
        .merge(session::routes())
        .merge(accounts::routes())
        .merge(opportunities::routes())
        .merge(registrations::routes())
        .merge(bookmarks::routes())
        .merge(dashboard::routes())
        .layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::actor_middleware,
        ))
        .with_state(svc)
}
