//! Error taxonomy shared by every service and the HTTP layer
//!
//! Each variant maps to exactly one HTTP status and carries a short
//! machine-readable reason string. Store internals (SQL text, pool state)
//! never appear in a client-facing message.

/// Error type for all Cartesia operations
#[derive(Debug)]
pub enum Error {
    /// Bad input shape or a missing/invalid field (400)
    Validation(String),
    /// Missing, malformed, or invalid bearer credential (401)
    Unauthenticated(AuthFailure),
    /// Authenticated but not permitted to touch the target (403)
    Forbidden,
    /// Entity absent, or absent in the claimed scope (404)
    NotFound,
    /// Uniqueness violation - duplicate user, connection, review (409)
    Conflict(String),
    /// Unexpected persistence failure (500); detail is logged, not returned
    Store(diesel::result::Error),
    /// Pool or connection-level failure (500)
    Connection(String),
}

/// Why authentication failed. Expiry is distinguished internally (clients
/// may refresh) but both surface as 401 with the same HTTP contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    MalformedHeader,
    InvalidToken,
    ExpiredToken,
    /// Login failed. Unknown email and wrong password are deliberately
    /// indistinguishable in this variant.
    InvalidCredentials,
}

impl Error {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Unauthenticated(_) => 401,
            Error::Forbidden => 403,
            Error::NotFound => 404,
            Error::Conflict(_) => 409,
            Error::Store(_) | Error::Connection(_) => 500,
        }
    }

    /// Short machine-readable reason string for response bodies
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Unauthenticated(AuthFailure::MissingToken) => "auth_required",
            Error::Unauthenticated(AuthFailure::MalformedHeader) => "malformed_token",
            Error::Unauthenticated(AuthFailure::InvalidToken) => "invalid_token",
            Error::Unauthenticated(AuthFailure::ExpiredToken) => "token_expired",
            Error::Unauthenticated(AuthFailure::InvalidCredentials) => "invalid_credentials",
            Error::Forbidden => "forbidden",
            Error::NotFound => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Store(_) | Error::Connection(_) => "store_failure",
        }
    }

    /// Message safe to return to the client
    pub fn client_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Unauthenticated(AuthFailure::MissingToken) => {
                "Authentication required".to_string()
            }
            Error::Unauthenticated(AuthFailure::MalformedHeader) => {
                "Invalid token format".to_string()
            }
            Error::Unauthenticated(AuthFailure::InvalidToken) => "Invalid token".to_string(),
            Error::Unauthenticated(AuthFailure::ExpiredToken) => "Token expired".to_string(),
            Error::Unauthenticated(AuthFailure::InvalidCredentials) => {
                "Invalid credentials".to_string()
            }
            Error::Forbidden => "You do not have permission to modify this roadmap".to_string(),
            Error::NotFound => "Not found".to_string(),
            Error::Conflict(msg) => msg.clone(),
            Error::Store(_) | Error::Connection(_) => "Internal error".to_string(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "{}", msg),
            Error::Unauthenticated(failure) => write!(f, "unauthenticated: {:?}", failure),
            Error::Forbidden => write!(f, "forbidden"),
            Error::NotFound => write!(f, "not found"),
            Error::Conflict(msg) => write!(f, "conflict: {}", msg),
            Error::Store(e) => write!(f, "store error: {}", e),
            Error::Connection(msg) => write!(f, "connection error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};
        match e {
            DieselError::NotFound => Error::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                Error::Conflict("Record already exists".to_string())
            }
            other => Error::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_cover_taxonomy() {
        assert_eq!(Error::Validation("x".into()).status_code(), 400);
        assert_eq!(
            Error::Unauthenticated(AuthFailure::MissingToken).status_code(),
            401
        );
        assert_eq!(Error::Forbidden.status_code(), 403);
        assert_eq!(Error::NotFound.status_code(), 404);
        assert_eq!(Error::Conflict("x".into()).status_code(), 409);
        assert_eq!(
            Error::Connection("pool exhausted".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_expired_and_invalid_share_status_but_not_reason() {
        let expired = Error::Unauthenticated(AuthFailure::ExpiredToken);
        let invalid = Error::Unauthenticated(AuthFailure::InvalidToken);
        assert_eq!(expired.status_code(), invalid.status_code());
        assert_ne!(expired.reason(), invalid.reason());
    }

    #[test]
    fn test_store_error_never_leaks_detail() {
        let err = Error::Store(diesel::result::Error::BrokenTransactionManager);
        assert_eq!(err.client_message(), "Internal error");
    }

    #[test]
    fn test_diesel_not_found_maps_to_404() {
        let err: Error = diesel::result::Error::NotFound.into();
        assert_eq!(err.status_code(), 404);
    }
}
