use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use vhub_core::{ListResult, ServiceError};

use crate::api::{run_blocking, AppState};
use crate::model::{
    Actor, CreateOpportunity, Opportunity, OpportunityQuery, Registration, Volunteer,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/opportunities", get(list_opportunities).post(create_opportunity))
        .route(
            "/opportunities/{id}",
            get(get_opportunity)
                .patch(update_opportunity)
                .delete(delete_opportunity),
        )
        .route("/opportunities/{id}/volunteers", get(list_volunteers))
        .route("/opportunities/{id}/register", post(register))
}

async fn list_opportunities(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<OpportunityQuery>,
) -> Result<Json<ListResult<Opportunity>>, ServiceError> {
    let page = run_blocking(&svc, move |s| s.list_opportunities(&actor, &query)).await?;
    Ok(Json(page))
}

async fn create_opportunity(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<CreateOpportunity>,
) -> Result<(StatusCode, Json<Opportunity>), ServiceError> {
    let opp = run_blocking(&svc, move |s| s.create_opportunity(&actor, input)).await?;
    Ok((StatusCode::CREATED, Json(opp)))
}

async fn get_opportunity(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Opportunity>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.get_opportunity(&actor, &id)).await?))
}

async fn update_opportunity(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<Opportunity>, ServiceError> {
    let opp = run_blocking(&svc, move |s| s.update_opportunity(&actor, &id, patch)).await?;
    Ok(Json(opp))
}

async fn delete_opportunity(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    run_blocking(&svc, move |s| s.delete_opportunity(&actor, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_volunteers(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Volunteer>>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.list_volunteers(&actor, &id)).await?))
}

/// POST /opportunities/{id}/register: sign the caller up.
async fn register(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Registration>), ServiceError> {
    let reg = run_blocking(&svc, move |s| s.register(&actor, &id)).await?;
    Ok((StatusCode::CREATED, Json(reg)))
}
