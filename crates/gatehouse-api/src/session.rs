//! Federated session adapters.
//!
//! The provider handshake itself happens outside Gatehouse. A [`SessionResolver`]
//! is the trust boundary: it turns whatever that handshake leaves on the request
//! into a typed [`FederatedIdentity`].

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderName, header::InvalidHeaderName};
use gatehouse_common::{
    config::{FederationConfig, FederationMode},
    identity::FederatedIdentity,
};
use serde_json::Value;

/// Looks up the identity established by the delegated login for one request.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<FederatedIdentity>;
}

/// Federation switched off: only bearer tokens authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFederatedSessions;

impl SessionResolver for NoFederatedSessions {
    fn resolve(&self, _headers: &HeaderMap) -> Option<FederatedIdentity> {
        None
    }
}

/// Identity forwarded by an authenticating reverse proxy (oauth2-proxy and the like)
/// after it completed the OAuth2 handshake.
///
/// Only sound when the proxy is the sole way in and overwrites these headers on
/// every request.
#[derive(Debug, Clone)]
pub struct ForwardedIdentity {
    subject: HeaderName,
    name: HeaderName,
    email: HeaderName,
}

impl ForwardedIdentity {
    pub fn new(subject: &str, name: &str, email: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            subject: HeaderName::try_from(subject)?,
            name: HeaderName::try_from(name)?,
            email: HeaderName::try_from(email)?,
        })
    }
}

impl SessionResolver for ForwardedIdentity {
    fn resolve(&self, headers: &HeaderMap) -> Option<FederatedIdentity> {
        let attributes: BTreeMap<String, Value> = [
            ("sub", &self.subject),
            ("name", &self.name),
            ("email", &self.email),
        ]
        .into_iter()
        .filter_map(|(attribute, header)| {
            let value = headers.get(header)?.to_str().ok()?.trim();
            (!value.is_empty()).then(|| (attribute.to_owned(), Value::from(value)))
        })
        .collect();

        if attributes.is_empty() {
            return None;
        }
        Some(FederatedIdentity::from_attributes(attributes))
    }
}

/// Pick the adapter named by `federation.mode`.
pub fn from_config(config: &FederationConfig) -> anyhow::Result<Box<dyn SessionResolver>> {
    Ok(match config.mode {
        FederationMode::Disabled => Box::new(NoFederatedSessions),
        FederationMode::ForwardedHeaders => {
            tracing::info!(
                subject_header = %config.subject_header,
                "Trusting forwarded identity headers"
            );
            Box::new(ForwardedIdentity::new(
                &config.subject_header,
                &config.name_header,
                &config.email_header,
            )?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn resolver() -> ForwardedIdentity {
        ForwardedIdentity::new("x-auth-user", "x-auth-name", "x-auth-email").unwrap()
    }

    #[test]
    fn reads_forwarded_identity() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-user", HeaderValue::from_static("1049"));
        headers.insert("x-auth-name", HeaderValue::from_static("Ann"));
        headers.insert("x-auth-email", HeaderValue::from_static("ann@example.com"));

        let identity = resolver().resolve(&headers).unwrap();

        assert_eq!(identity.subject(), Some("1049"));
        assert_eq!(identity.name.as_deref(), Some("Ann"));
        assert_eq!(identity.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn no_headers_means_no_session() {
        assert!(resolver().resolve(&HeaderMap::new()).is_none());

        let mut blank = HeaderMap::new();
        blank.insert("x-auth-user", HeaderValue::from_static("   "));
        assert!(resolver().resolve(&blank).is_none());
    }

    #[test]
    fn identity_without_subject_is_still_reported() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-email", HeaderValue::from_static("ann@example.com"));

        let identity = resolver().resolve(&headers).unwrap();
        assert_eq!(identity.subject(), None);
    }

    #[test]
    fn disabled_mode_never_resolves() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", HeaderValue::from_static("1049"));
        assert!(NoFederatedSessions.resolve(&headers).is_none());
    }

    #[test]
    fn invalid_header_names_are_refused() {
        assert!(ForwardedIdentity::new("bad header", "x", "y").is_err());
    }
}
