use crate::{AppState, api::models::profiles::CurrentUser, auth::gate::LOGIN_PATH};
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, trace};

/// Paths reachable without a session. Everything else that isn't a service route is a page and
/// needs one.
pub fn is_public_route(path: &str) -> bool {
    const PUBLIC_SECTIONS: &[&str] = &["/auth", "/demo", "/accessibility", "/api", "/internal"];
    const PUBLIC_EXACT: &[&str] = &["/", "/healthz"];

    PUBLIC_EXACT.contains(&path)
        || PUBLIC_SECTIONS
            .iter()
            .any(|section| path.strip_prefix(section).is_some_and(|rest| rest.is_empty() || rest.starts_with('/')))
}

/// Redirect page requests without a valid session to the login page.
///
/// Role checks still happen in the page extractors; this only catches anonymous visitors early.
pub async fn session_gate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if is_public_route(&path) {
        trace!("Public route {}, skipping session gate", path);
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    if CurrentUser::from_request_parts(&mut parts, &state).await.is_err() {
        debug!("No session for {}, redirecting to login", path);
        return Redirect::to(LOGIN_PATH).into_response();
    }

    next.run(Request::from_parts(parts, body)).await
}
