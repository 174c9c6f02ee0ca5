//! # gatehouse-api
//!
//! HTTP layer for Gatehouse: the authorization gate, the login completion
//! endpoint that turns a delegated login into a bearer token, and the protected
//! API behind them.

pub mod employees;
pub mod middleware;
pub mod routes;
pub mod session;

use axum::{Router, middleware::from_fn_with_state};
use gatehouse_common::{config::AppConfig, policy::RoutePolicy, token::TokenCodec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::employees::EmployeeStore;
use crate::session::SessionResolver;

/// Shared application state available to all route handlers.
pub struct AppState {
    /// Mints and verifies bearer tokens. Holds the shared secret.
    pub codec: TokenCodec,
    /// Which paths are reachable without credentials.
    pub policy: RoutePolicy,
    /// Reads the identity established by the delegated login, if any.
    pub sessions: Box<dyn SessionResolver>,
    pub employees: EmployeeStore,
    /// Start of the provider handshake; `GET /login` redirects here.
    pub login_url: String,
    /// Served under `/public`.
    pub public_dir: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        policy: RoutePolicy,
        sessions: Box<dyn SessionResolver>,
        login_url: impl Into<String>,
        public_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            codec,
            policy,
            sessions,
            employees: EmployeeStore::default(),
            login_url: login_url.into(),
            public_dir: public_dir.into(),
            started_at: Instant::now(),
        }
    }

    /// Assemble the state from a loaded configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let codec = TokenCodec::from_config(&config.auth)?;
        let policy = RoutePolicy::from_config(&config.routes)?;
        let sessions = session::from_config(&config.federation)?;

        Ok(Self::new(
            codec,
            policy,
            sessions,
            config.federation.login_url.clone(),
            config.server.public_dir.clone(),
        ))
    }
}

/// Build the complete router with all routes and middleware.
///
/// The gate wraps every route, the static file service, and the fallback, so
/// no path escapes the route policy.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .merge(routes::me::router())
        .merge(routes::employees::router());

    Router::new()
        .merge(routes::index::router())
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .nest("/api/v1", api_routes)
        .nest_service("/public", ServeDir::new(&state.public_dir))
        .fallback(routes::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::gate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use gatehouse_common::token::SharedSecret;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::session::{ForwardedIdentity, NoFederatedSessions};

    pub const SECRET: &[u8] = b"router-test-secret-padded-to-32-bytes!!";

    pub fn codec() -> TokenCodec {
        TokenCodec::new(&SharedSecret::new(SECRET).unwrap(), Duration::hours(1))
    }

    pub fn app() -> Router {
        build_router(state(Box::new(NoFederatedSessions)))
    }

    /// Router that trusts `x-forwarded-*` identity headers.
    pub fn federated_app() -> Router {
        let sessions = ForwardedIdentity::new(
            "x-forwarded-user",
            "x-forwarded-preferred-username",
            "x-forwarded-email",
        )
        .unwrap();
        build_router(state(Box::new(sessions)))
    }

    pub fn state(sessions: Box<dyn SessionResolver>) -> AppState {
        AppState::new(
            codec(),
            RoutePolicy::default(),
            sessions,
            "/oauth2/start?rd=/login/complete",
            "./does-not-exist",
        )
    }

    /// Send a request and decode the JSON body (Null when the body is not JSON).
    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }
}
