use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use vhub_core::ServiceError;

use crate::api::middleware::extract_bearer;
use crate::api::{run_blocking, AppState};
use crate::model::{AccountView, Actor, SignIn, SignUp, TokenResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session/sign-up", post(sign_up))
        .route("/session/sign-in", post(sign_in))
        .route("/session/sign-out", post(sign_out))
        .route("/me", get(me))
}

async fn sign_up(
    State(svc): State<AppState>,
    Json(input): Json<SignUp>,
) -> Result<(StatusCode, Json<AccountView>), ServiceError> {
    let account = run_blocking(&svc, move |s| s.sign_up(input)).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn sign_in(
    State(svc): State<AppState>,
    Json(input): Json<SignIn>,
) -> Result<Json<TokenResponse>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.sign_in(input)).await?))
}

async fn sign_out(
    State(svc): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ServiceError> {
    let token = extract_bearer(&headers)
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?
        .to_string();
    run_blocking(&svc, move |s| s.sign_out(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /me: the caller's own account.
async fn me(
    State(svc): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<AccountView>, ServiceError> {
    Ok(Json(run_blocking(&svc, move |s| s.me(&actor)).await?))
}
