use axum::{
    Router,
    routing::{get, post},
};

use super::with_slash;
use crate::{AppState, handlers::auth};

/// Public Router Module
///
/// Endpoints reachable without a session. Registration and login ignore any
/// cookie the client sends; `/auth/me` reads it through the `CurrentUser`
/// extractor and rejects anonymous callers itself.
pub fn public_routes() -> Router<AppState> {
    let router = Router::new()
        // GET /health
        // Liveness probe for load balancers; answers "ok" without touching the store.
        .route("/health", get(|| async { "ok" }));

    let router = with_slash(router, "/auth/register/user", post(auth::register_user));
    let router = with_slash(router, "/auth/register/admin", post(auth::register_admin));
    let router = with_slash(router, "/auth/login", post(auth::login));
    with_slash(router, "/auth/me", get(auth::me))
}
