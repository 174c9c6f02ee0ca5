//! The identity handed over by the delegated login.
//!
//! Whatever sits at the trust boundary (an authenticating proxy, an OAuth2
//! client) produces a [`FederatedIdentity`]. Gatehouse never re-checks the
//! provider's assertion; it only decides which of the attributes become claims.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::token::ClaimSet;

/// Attributes of a user authenticated by the external identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FederatedIdentity {
    /// Stable provider user id (`sub`).
    pub subject: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Every attribute the provider supplied, echoed back to the client on login.
    pub attributes: BTreeMap<String, Value>,
}

impl FederatedIdentity {
    /// Build from a raw provider attribute bag, picking the well-known fields.
    pub fn from_attributes(attributes: BTreeMap<String, Value>) -> Self {
        let text = |key: &str| {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        Self {
            subject: text("sub"),
            name: text("name"),
            email: text("email"),
            attributes,
        }
    }

    /// The subject, if it is present and not blank.
    pub fn subject(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The claims carried into a token: `name` and `email`, when present, and nothing else.
    pub fn claims(&self) -> ClaimSet {
        let mut claims = ClaimSet::new();
        if let Some(name) = &self.name {
            claims.insert("name", name.as_str());
        }
        if let Some(email) = &self.email {
            claims.insert("email", email.as_str());
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn picks_well_known_attributes() {
        let identity = FederatedIdentity::from_attributes(attrs(json!({
            "sub": "1049",
            "name": "Ann Example",
            "email": "ann@example.com",
            "picture": "https://example.com/ann.png",
            "email_verified": true,
        })));

        assert_eq!(identity.subject(), Some("1049"));
        assert_eq!(identity.name.as_deref(), Some("Ann Example"));
        assert_eq!(identity.attributes.len(), 5);
    }

    #[test]
    fn claims_are_limited_to_name_and_email() {
        let identity = FederatedIdentity::from_attributes(attrs(json!({
            "sub": "1049",
            "name": "Ann",
            "email": "ann@example.com",
            "locale": "en",
        })));

        let claims = identity.claims();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims.get_str("name"), Some("Ann"));
        assert_eq!(claims.get_str("email"), Some("ann@example.com"));
    }

    #[test]
    fn blank_or_non_string_subject_is_absent() {
        let blank = FederatedIdentity::from_attributes(attrs(json!({ "sub": "  " })));
        assert_eq!(blank.subject(), None);

        let numeric = FederatedIdentity::from_attributes(attrs(json!({ "sub": 1049 })));
        assert_eq!(numeric.subject(), None);

        let built = FederatedIdentity {
            subject: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(built.subject(), None);
        assert!(built.claims().is_empty());
    }
}
