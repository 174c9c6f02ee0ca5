//! Signed session tokens.
//!
//! A token is a compact JWS string, `header.payload.signature`, each segment
//! base64url without padding, signed with HMAC-SHA256 under one shared secret.
//! The caller's claims are flattened beside the envelope fields:
//!
//! ```json
//! { "email": "ann@example.com", "name": "Ann", "sub": "1234", "iat": 1700000000, "exp": 1700003600 }
//! ```
//!
//! `jsonwebtoken` handles encoding and the constant-time signature comparison.
//! Its own `exp`/`nbf` checks are switched off and the validity window is checked
//! here against an explicit clock: `iat <= now < exp`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AuthConfig;

/// Minimum secret length in bytes (256 bits of HS256 key material).
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime: ten years.
pub const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Claim names owned by the token envelope.
pub const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Errors produced while minting or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature does not match")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token is not valid yet")]
    NotYetValid,

    #[error("Token subject is missing")]
    MissingSubject,

    #[error("Claim '{0}' is reserved for the token envelope")]
    ReservedClaim(String),

    #[error("Shared secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    WeakSecret(usize),

    #[error("Token lifetime must be between 1 and {MAX_TTL_SECS} seconds")]
    InvalidTtl,

    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    fn from_decode(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            _ => Self::Malformed,
        }
    }
}

/// The process-wide HMAC key. Fixed at startup and only ever read afterwards.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Named identity data carried in a token payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the claim if it is a JSON string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn reserved_name(&self) -> Option<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .find(|name| RESERVED_CLAIMS.contains(name))
    }
}

impl FromIterator<(String, Value)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Wire payload: claims flattened next to the registered envelope fields.
#[derive(Serialize, Deserialize)]
struct Payload {
    #[serde(flatten)]
    claims: ClaimSet,
    sub: String,
    iat: i64,
    exp: i64,
}

/// A freshly minted token together with its validity window.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_string(self) -> String {
        self.token
    }

    /// Lifetime in whole seconds.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// The result of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub subject: String,
    pub claims: ClaimSet,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mints and verifies tokens with a single shared secret and a fixed TTL.
///
/// Cheap to share behind an `Arc`; nothing in here is mutated after construction.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &SharedSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Build a codec from the `auth` configuration section.
    pub fn from_config(auth: &AuthConfig) -> Result<Self, TokenError> {
        let secret = SharedSecret::new(auth.token_secret.as_bytes())?;
        if auth.token_ttl_secs == 0 || auth.token_ttl_secs > MAX_TTL_SECS {
            return Err(TokenError::InvalidTtl);
        }
        let ttl = i64::try_from(auth.token_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(TokenError::InvalidTtl)?;
        Ok(Self::new(&secret, ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token for `subject` carrying `claims`, issued now.
    pub fn mint(&self, claims: &ClaimSet, subject: &str) -> Result<IssuedToken, TokenError> {
        self.mint_at(claims, subject, Utc::now())
    }

    /// Mint a token as if the current time were `now`.
    pub fn mint_at(
        &self,
        claims: &ClaimSet,
        subject: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if subject.trim().is_empty() {
            return Err(TokenError::MissingSubject);
        }
        if let Some(name) = claims.reserved_name() {
            return Err(TokenError::ReservedClaim(name.to_owned()));
        }

        let issued_at = timestamp(now.timestamp())?;
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::InvalidTtl)?;
        let (iat, exp) = (issued_at.timestamp(), expires_at.timestamp());
        let payload = Payload {
            claims: claims.clone(),
            sub: subject.to_owned(),
            iat,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &payload, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify a token against the shared secret and the current time.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// The signature is checked before the validity window, so a forged token
    /// is always reported as [`TokenError::BadSignature`] regardless of its
    /// timestamps.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, TokenError> {
        let data = jsonwebtoken::decode::<Payload>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::from_decode)?;
        let Payload {
            claims,
            sub,
            iat,
            exp,
        } = data.claims;

        if sub.trim().is_empty() {
            return Err(TokenError::Malformed);
        }

        let now = now.timestamp();
        if now < iat {
            return Err(TokenError::NotYetValid);
        }
        if now >= exp {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            subject: sub,
            claims,
            issued_at: timestamp(iat)?,
            expires_at: timestamp(exp)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenError::Malformed)
}
