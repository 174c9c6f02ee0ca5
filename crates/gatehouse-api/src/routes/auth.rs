//! Authentication routes: start of the delegated login and its completion.
//!
//! The provider handshake runs elsewhere. `/login` only points the browser at
//! it, and the handshake's post-login redirect lands on `/login/complete`, where
//! the federated identity is exchanged for a bearer token.

use axum::{Json, Router, extract::State, response::Redirect, routing::get};
use gatehouse_common::{
    error::{GatehouseError, GatehouseResult},
    token::TokenError,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{AppState, middleware::FederatedSession};

/// Auth router. Every path here is public in the default route policy.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(start_login))
        .route("/login/complete", get(complete_login))
        .route("/api/v1/auth/session", get(complete_login))
}

#[derive(Serialize)]
struct LoginResponse {
    message: &'static str,
    token: String,
    token_type: &'static str,
    /// Seconds until the token expires.
    expires_in: i64,
    /// The attributes the identity provider supplied, as received.
    user: BTreeMap<String, Value>,
}

/// GET /login
async fn start_login(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.login_url)
}

/// GET /login/complete
///
/// Mint a token for the identity the delegated login established. Only `name`
/// and `email` become claims; the provider's `sub` becomes the token subject.
async fn complete_login(
    State(state): State<Arc<AppState>>,
    FederatedSession(identity): FederatedSession,
) -> GatehouseResult<Json<LoginResponse>> {
    let subject = identity.subject().ok_or(GatehouseError::MissingSubject)?;

    let issued = state
        .codec
        .mint(&identity.claims(), subject)
        .map_err(|e| match e {
            TokenError::MissingSubject => GatehouseError::MissingSubject,
            other => GatehouseError::Internal(other.into()),
        })?;

    tracing::info!(subject, expires_at = %issued.expires_at, "Issued session token");

    Ok(Json(LoginResponse {
        message: "Login successful",
        expires_in: issued.expires_in(),
        token: issued.into_string(),
        token_type: "Bearer",
        user: identity.attributes,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};

    fn completion_request(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::get(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn login_redirects_to_the_provider_handshake() {
        let response = tower::ServiceExt::oneshot(app(), get("/login")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/oauth2/start?rd=/login/complete"
        );
    }

    #[tokio::test]
    async fn completion_mints_a_token_that_opens_protected_routes() {
        let request = completion_request(
            "/login/complete",
            &[
                ("x-forwarded-user", "1049"),
                ("x-forwarded-preferred-username", "Ann"),
                ("x-forwarded-email", "ann@example.com"),
            ],
        );

        let (status, body) = send(federated_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3600);
        assert_eq!(body["user"]["sub"], "1049");
        assert_eq!(body["user"]["email"], "ann@example.com");

        let token = body["token"].as_str().unwrap();
        let verified = codec().verify(token).unwrap();
        assert_eq!(verified.subject, "1049");
        assert_eq!(verified.claims.get_str("name"), Some("Ann"));
        assert_eq!(verified.claims.len(), 2);

        let (status, me) = send(federated_app(), get_with_bearer("/api/v1/me", token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["subject"], "1049");
    }

    #[tokio::test]
    async fn completion_is_also_served_under_the_auth_prefix() {
        let request = completion_request("/api/v1/auth/session", &[("x-forwarded-user", "1049")]);

        let (status, body) = send(federated_app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());
    }

    #[tokio::test]
    async fn completion_without_identity_is_missing_subject() {
        let (status, body) = send(app(), get("/login/complete")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MISSING_SUBJECT");
    }

    #[tokio::test]
    async fn completion_with_identity_but_no_subject_is_missing_subject() {
        let request = completion_request("/login/complete", &[("x-forwarded-email", "ann@example.com")]);

        let (status, body) = send(federated_app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MISSING_SUBJECT");
    }
}
