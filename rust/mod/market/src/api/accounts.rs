use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};

use vhub_core::ServiceError;

use crate::api::{run_blocking, AppState};
use crate::model::{AccountView, Actor};

pub fn routes() -> Router<AppState> {
    Router::new().route("/accounts/{id}", get(get_account).patch(update_account))
}

async fn get_account(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<AccountView>, ServiceError> {
    let account = run_blocking(&svc, move |s| s.get_account(&actor, &id)).await?;
    Ok(Json(account))
}

async fn update_account(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<AccountView>, ServiceError> {
    let account = run_blocking(&svc, move |s| s.update_profile(&actor, &id, patch)).await?;
    Ok(Json(account))
}
