//! Router Module Index
//!
//! Splits routing by how access is decided:
//! - `public`: health and the auth endpoints, which never consult the policy table.
//! - `resources`: the REST resources, each wrapped in the policy middleware.

use axum::{Router, routing::MethodRouter};

use crate::AppState;

pub mod public;
pub mod resources;

/// Registers `method_router` under `path` both with and without a trailing slash.
pub(crate) fn with_slash(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    let path = path.trim_end_matches('/');
    router
        .route(path, method_router.clone())
        .route(&format!("{path}/"), method_router)
}
