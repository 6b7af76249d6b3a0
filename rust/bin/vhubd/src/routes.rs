//! Route registration: module routes plus system and verifier endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::info;

use market::api::run_blocking;
use market::model::{AccountView, SetVerified};
use market::service::MarketService;
use vhub_core::ServiceError;

use crate::bootstrap::verify_verifier_key;
use crate::config::ServerConfig;

/// Header carrying the verifier key on admin calls.
pub const VERIFIER_KEY_HEADER: &str = "x-verifier-key";

/// Application shared state.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<MarketService>,
    pub server_config: Arc<ServerConfig>,
}

/// Build the complete router with all routes.
pub fn build_router(state: AppState, module_routes: Vec<(&str, Router)>) -> Router {
    let mut app: Router<()> = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/admin/accounts/{id}/verified", put(set_verified))
        .with_state(state);

    // Mount each module's routes under /{module_name}.
    for (name, router) in module_routes {
        app = app.nest(&format!("/{}", name), router);
    }
    app
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "vhubd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handle PUT /admin/accounts/{id}/verified.
///
/// The only way to change an organization's verified flag.
async fn set_verified(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SetVerified>,
) -> Result<Json<AccountView>, ServiceError> {
    let key = headers
        .get(VERIFIER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("verifier key required".into()))?;
    if !verify_verifier_key(key, &state.server_config.verifier.key_hash) {
        return Err(ServiceError::Unauthorized("invalid verifier key".into()));
    }

    let verified = body.verified;
    let account = run_blocking(&state.market, {
        let id = id.clone();
        move |s| s.set_verified(&id, verified)
    })
    .await?;
    info!(account_id = %id, verified, "verifier updated account");
    Ok(Json(account))
}
