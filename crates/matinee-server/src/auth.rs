//! Visitor credentials: HS256 token issuance, verification, and the
//! `AuthVisitor` request extractor.
//!
//! A token binds a visitor id (`sub`) to the screening it was issued for.
//! Verification alone does not admit a request: the visitor must still be
//! present in the registry, so tokens held past eviction stop working even
//! though their signature remains valid.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use matinee_core::{PresenceError, ScreeningId, Visitor, VisitorId};
use matinee_settings::AuthSettings;

use crate::AppState;
use crate::errors::ApiError;
use crate::metrics::{AUTH_FAILURES_TOTAL, AUTH_TOKENS_ISSUED_TOTAL};

/// Claims carried by a visitor token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Visitor id the token was issued to.
    pub sub: VisitorId,
    /// Display name at issuance time.
    pub name: String,
    /// Screening the token is scoped to (already resolved).
    pub screening_id: ScreeningId,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Failure to mint or verify a token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The signing step itself failed.
    #[error("could not sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    /// Signature, shape, or claim validation failed.
    #[error("invalid token")]
    Invalid,

    /// The token was valid once but its expiry has passed.
    #[error("token expired")]
    Expired,
}

/// Issues and verifies visitor tokens with a single shared secret.
pub struct CredentialService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    issued: AtomicU64,
}

impl CredentialService {
    /// Build a service from the configured secret and TTL.
    #[must_use]
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl_secs: settings.token_ttl_secs as i64,
            issued: AtomicU64::new(0),
        }
    }

    /// Mint a token for `visitor`, valid for the configured TTL.
    pub fn issue(&self, visitor: &Visitor) -> Result<String, CredentialError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: visitor.id.clone(),
            name: visitor.name.clone(),
            screening_id: visitor.screening_id.clone(),
            iat,
            exp: iat + self.ttl_secs,
        };
        let token =
            encode(&Header::default(), &claims, &self.encoding).map_err(CredentialError::Sign)?;
        let _ = self.issued.fetch_add(1, Ordering::Relaxed);
        counter!(AUTH_TOKENS_ISSUED_TOTAL).increment(1);
        Ok(token)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, CredentialError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Invalid,
            })
    }

    /// Tokens issued since startup, for the health report.
    #[must_use]
    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

/// The token value from an `Authorization` header, with or without the
/// conventional `Bearer ` prefix.
pub(crate) fn bearer_token(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header)
}

/// Extractor for REST endpoints that require a live, registered visitor.
///
/// Rejects with 401 when the header is missing, the token fails
/// verification, or the visitor is no longer registered.
pub struct AuthVisitor {
    /// The registered visitor id.
    pub visitor_id: VisitorId,
    /// Full claim set from the presented token.
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthVisitor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                counter!(AUTH_FAILURES_TOTAL, "reason" => "missing_header").increment(1);
                PresenceError::Unauthenticated
            })?;

        let claims = state
            .credentials
            .verify(bearer_token(header))
            .map_err(|err| {
                counter!(AUTH_FAILURES_TOTAL, "reason" => "invalid_token").increment(1);
                tracing::debug!(error = %err, "token rejected");
                PresenceError::Unauthenticated
            })?;

        if !state.registry.visitor_exists(&claims.sub) {
            counter!(AUTH_FAILURES_TOTAL, "reason" => "unknown_visitor").increment(1);
            return Err(PresenceError::UnknownVisitor {
                visitor_id: claims.sub.clone(),
            }
            .into());
        }

        Ok(Self {
            visitor_id: claims.sub.clone(),
            claims,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use matinee_core::ScreeningId;

    fn service() -> CredentialService {
        CredentialService::new(&AuthSettings {
            jwt_secret: "unit-test-secret".into(),
            token_ttl_secs: 3600,
        })
    }

    fn visitor() -> Visitor {
        Visitor::new("alice", ScreeningId::from("default"))
    }

    // --- Issue / verify ---

    #[test]
    fn issued_token_verifies() {
        let svc = service();
        let v = visitor();
        let token = svc.issue(&v).unwrap();

        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, v.id);
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.screening_id, v.screening_id);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn issue_increments_count() {
        let svc = service();
        assert_eq!(svc.issued_count(), 0);
        let _ = svc.issue(&visitor()).unwrap();
        let _ = svc.issue(&visitor()).unwrap();
        assert_eq!(svc.issued_count(), 2);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = service().issue(&visitor()).unwrap();

        let other = CredentialService::new(&AuthSettings {
            jwt_secret: "a-different-secret".into(),
            token_ttl_secs: 3600,
        });
        assert!(matches!(
            other.verify(&token),
            Err(CredentialError::Invalid)
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            service().verify("not.a.token"),
            Err(CredentialError::Invalid)
        ));
    }

    #[test]
    fn expired_token_rejected() {
        let svc = service();
        let v = visitor();

        // Force expiry well past the verifier's 60s leeway.
        let iat = Utc::now().timestamp() - 7200;
        let claims = Claims {
            sub: v.id.clone(),
            name: v.name.clone(),
            screening_id: v.screening_id.clone(),
            iat,
            exp: iat + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();

        assert!(matches!(svc.verify(&token), Err(CredentialError::Expired)));
    }

    #[test]
    fn claims_wire_fields() {
        let claims = Claims {
            sub: VisitorId::from("v-1"),
            name: "alice".into(),
            screening_id: ScreeningId::from("default"),
            iat: 100,
            exp: 200,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "v-1");
        assert_eq!(json["name"], "alice");
        assert_eq!(json["screening_id"], "default");
        assert_eq!(json["iat"], 100);
        assert_eq!(json["exp"], 200);
    }

    // --- Header parsing ---

    #[test]
    fn bearer_prefix_stripped() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), "abc.def.ghi");
    }

    #[test]
    fn raw_token_accepted() {
        assert_eq!(bearer_token("abc.def.ghi"), "abc.def.ghi");
    }
}
