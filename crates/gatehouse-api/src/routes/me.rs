//! The authenticated principal, as the gate sees it.

use axum::{Json, Router, routing::get};
use std::sync::Arc;

use crate::{AppState, middleware::AuthContext};

/// Mounted under `/api/v1`; protected by the default route policy.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(whoami))
}

/// GET /api/v1/me
async fn whoami(auth: AuthContext) -> Json<AuthContext> {
    Json(auth)
}
