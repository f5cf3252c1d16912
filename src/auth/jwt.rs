//! JWT session tokens
//!
//! HS256-signed, time-bounded tokens carrying the user id. Expiry is
//! reported distinctly from other validation failures so clients can
//! refresh instead of re-authenticating, but both map to 401.

use crate::error::{AuthFailure, Error, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session lifetime: 7 days
const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Generate a token for the given user
    pub fn generate_token(&self, user_id: i32) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id,
            exp: now + TOKEN_TTL_SECS,
            iat: now,
            nbf: now,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Connection(format!("token signing failed: {}", e)))
    }

    /// Validate a token and return the embedded user id
    pub fn validate_token(&self, token: &str) -> Result<i32> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims.user_id),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(Error::Unauthenticated(AuthFailure::ExpiredToken))
                }
                _ => Err(Error::Unauthenticated(AuthFailure::InvalidToken)),
            },
        }
    }
}

/// Pull the raw token out of an `Authorization: Bearer <token>` header
pub fn extract_bearer(header: &str) -> Result<&str> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or("");
    let token = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Error::Unauthenticated(AuthFailure::MalformedHeader));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(b"test-secret-key-for-unit-tests")
    }

    #[test]
    fn test_token_round_trip() {
        let svc = service();
        let token = svc.generate_token(42).unwrap();
        assert_eq!(svc.validate_token(&token).unwrap(), 42);
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let svc = service();
        let err = svc.validate_token("not.a.token").unwrap_err();
        assert!(matches!(
            err,
            Error::Unauthenticated(AuthFailure::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = service().generate_token(1).unwrap();
        let other = JwtService::new(b"a-different-secret-entirely");
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_reported_as_expired() {
        // Hand-roll a token whose exp is in the past
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id: 7,
            exp: now - 3600,
            iat: now - 7200,
            nbf: now - 7200,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-for-unit-tests"),
        )
        .unwrap();

        let err = service().validate_token(&token).unwrap_err();
        assert!(matches!(
            err,
            Error::Unauthenticated(AuthFailure::ExpiredToken)
        ));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123").unwrap(), "abc123");
        assert_eq!(extract_bearer("bearer abc123").unwrap(), "abc123");
        assert!(extract_bearer("Basic abc123").is_err());
        assert!(extract_bearer("Bearer").is_err());
        assert!(extract_bearer("").is_err());
    }
}
