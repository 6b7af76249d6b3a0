use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};

use vhub_core::ServiceError;

use crate::api::{run_blocking, AppState};
use crate::model::Actor;
use crate::service::dashboard::Dashboard;

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

async fn dashboard(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Dashboard>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.dashboard(&actor)).await?))
}
