use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};

use vhub_core::ServiceError;

use crate::api::{run_blocking, AppState};
use crate::model::{Actor, SavedBookmark};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookmarks", get(list_bookmarks))
        .route(
            "/bookmarks/{opportunity_id}",
            put(save_bookmark).delete(remove_bookmark),
        )
}

async fn list_bookmarks(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<SavedBookmark>>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.list_bookmarks(&actor)).await?))
}

async fn save_bookmark(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(opportunity_id): Path<String>,
) -> Result<Json<SavedBookmark>, ServiceError> {
    let saved = run_blocking(&svc, move |s| s.save_bookmark(&actor, &opportunity_id)).await?;
    Ok(Json(saved))
}

async fn remove_bookmark(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(opportunity_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    run_blocking(&svc, move |s| s.remove_bookmark(&actor, &opportunity_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
