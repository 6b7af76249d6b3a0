use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::{run_blocking, AppState};

/// Actor resolution middleware.
///
/// Every request gets an `Extension<Actor>`: anonymous when there is no
/// Authorization header, the signed-in account otherwise. A token that
/// does not resolve is answered with 401 instead of being treated as
/// anonymous.
pub async fn actor_middleware(
    State(svc): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = extract_bearer(req.headers()).map(str::to_string);

    match run_blocking(&svc, move |s| s.resolve_actor(token.as_deref())).await {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extract the Bearer token from Authorization header.
pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
