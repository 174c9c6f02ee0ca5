//! Service banner at the root path.

use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
struct IndexResponse {
    name: &'static str,
    version: &'static str,
    login: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// GET /
async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        login: "/login",
    })
}
