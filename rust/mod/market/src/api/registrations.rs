use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};

use vhub_core::ServiceError;

use crate::api::{run_blocking, AppState};
use crate::model::{Actor, LogHours, Registration};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/registrations", get(list_registrations))
        .route("/registrations/{id}/hours", put(log_hours))
        .route("/registrations/{id}/cancel", post(cancel))
}

async fn list_registrations(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Registration>>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.list_my_registrations(&actor)).await?))
}

async fn log_hours(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(body): Json<LogHours>,
) -> Result<Json<Registration>, ServiceError> {
    let hours = body.hours_completed;
    let reg = run_blocking(&svc, move |s| s.log_hours(&actor, &id, hours)).await?;
    Ok(Json(reg))
}

async fn cancel(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Registration>, ServiceError> {
    let reg = run_blocking(&svc, move |s| s.cancel_registration(&actor, &id)).await?;
    Ok(Json(reg))
}
