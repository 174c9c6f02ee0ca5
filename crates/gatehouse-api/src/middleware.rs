//! The authorization gate.
//!
//! Every request is evaluated on its own against the route policy:
//!
//! - **public** paths run unconditionally. A federated identity, if the
//!   session adapter finds one, is attached as [`FederatedSession`] so the
//!   login completion handler can read it.
//! - **authenticated** paths need either a bearer token that verifies, or,
//!   when no `Authorization` header is sent at all, a federated identity with a
//!   subject. The verified principal is attached as [`AuthContext`].
//!
//! Every failure produces the same `401` with a `WWW-Authenticate: Bearer`
//! challenge. The precise reason is only logged.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{DateTime, Utc};
use gatehouse_common::{
    error::GatehouseError,
    identity::FederatedIdentity,
    policy::Access,
    token::{ClaimSet, TokenCodec, TokenError, VerifiedToken},
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// How the caller proved who they are.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer { expires_at: DateTime<Utc> },
    FederatedSession,
}

/// The authenticated principal for a request on a protected route.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub subject: String,
    pub claims: ClaimSet,
    pub method: AuthMethod,
}

impl AuthContext {
    fn from_token(token: VerifiedToken) -> Self {
        Self {
            subject: token.subject,
            claims: token.claims,
            method: AuthMethod::Bearer {
                expires_at: token.expires_at,
            },
        }
    }

    fn from_federated(identity: &FederatedIdentity) -> Option<Self> {
        Some(Self {
            subject: identity.subject()?.to_owned(),
            claims: identity.claims(),
            method: AuthMethod::FederatedSession,
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = GatehouseError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(GatehouseError::Unauthenticated)
    }
}

/// Identity from the delegated login, available on public routes.
#[derive(Debug, Clone)]
pub struct FederatedSession(pub FederatedIdentity);

impl<S: Send + Sync> FromRequestParts<S> for FederatedSession {
    type Rejection = GatehouseError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<FederatedSession>()
            .cloned()
            .ok_or(GatehouseError::MissingSubject)
    }
}

/// Why a protected request was turned away. Logged, never sent.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("no credentials")]
    MissingCredentials,

    #[error("authorization header is not a bearer token")]
    MalformedHeader,

    #[error("bearer token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("federated identity has no subject")]
    FederatedWithoutSubject,
}

/// Route policy + credential check, applied to every route.
pub async fn gate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatehouseError> {
    // Nested routers see a stripped URI; the policy is written against the full path.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let federated = state.sessions.resolve(request.headers());

    if state.policy.evaluate(&path) == Access::Public {
        if let Some(identity) = federated {
            request.extensions_mut().insert(FederatedSession(identity));
        }
        return Ok(next.run(request).await);
    }

    let auth_ctx = authenticate(&state.codec, request.headers(), federated.as_ref())
        .map_err(|reason| {
            tracing::debug!(%path, %reason, "Rejected unauthenticated request");
            GatehouseError::Unauthenticated
        })?;

    tracing::trace!(%path, subject = %auth_ctx.subject, "Request authenticated");
    request.extensions_mut().insert(auth_ctx);

    Ok(next.run(request).await)
}

/// A sent `Authorization` header always decides; the federated identity is only
/// consulted when there is none.
fn authenticate(
    codec: &TokenCodec,
    headers: &HeaderMap,
    federated: Option<&FederatedIdentity>,
) -> Result<AuthContext, Rejection> {
    if headers.contains_key(header::AUTHORIZATION) {
        let bearer = headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or(Rejection::MalformedHeader)?;
        let verified = codec.verify(bearer.token())?;
        return Ok(AuthContext::from_token(verified));
    }

    let identity = federated.ok_or(Rejection::MissingCredentials)?;
    AuthContext::from_federated(identity).ok_or(Rejection::FederatedWithoutSubject)
}
