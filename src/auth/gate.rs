//! Ownership gate for mutating roadmap operations
//!
//! Resolves the bearer credential to a user id, then checks that user
//! against the target roadmap's recorded author before any mutation runs.
//! Existence is checked before ownership, so an absent roadmap is a 404
//! even to a non-owner. Public reads bypass this gate entirely.

use crate::auth::jwt::{extract_bearer, JwtService};
use crate::db::Database;
use crate::error::{AuthFailure, Error, Result};
use crate::schema::roadmaps;
use diesel::prelude::*;

/// Resolved principal and target, attached to the request's processing
/// context after the gate passes. Downstream code never re-resolves.
#[derive(Debug, Clone, Copy)]
pub struct OwnerContext {
    pub user_id: i32,
    pub roadmap_id: i32,
}

/// Authorization gate. Constructor-injected store and token service.
#[derive(Clone)]
pub struct AuthGate {
    db: Database,
    jwt: JwtService,
}

impl AuthGate {
    pub fn new(db: Database, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    /// Resolve the authenticated user id from an optional Authorization
    /// header. Missing header, bad scheme, invalid and expired tokens all
    /// surface as Unauthenticated.
    pub fn require_auth(&self, auth_header: Option<&str>) -> Result<i32> {
        let header = auth_header.ok_or(Error::Unauthenticated(AuthFailure::MissingToken))?;
        let token = extract_bearer(header)?;
        self.jwt.validate_token(token)
    }

    /// Gate a mutation on roadmap ownership. Order matters: authenticate,
    /// then existence (404), then ownership (403).
    pub fn require_owner(&self, auth_header: Option<&str>, roadmap_id: i32) -> Result<OwnerContext> {
        let user_id = self.require_auth(auth_header)?;

        let mut conn = self.db.conn()?;
        let author_id: i32 = roadmaps::table
            .filter(roadmaps::id.eq(roadmap_id))
            .select(roadmaps::author_id)
            .first(&mut conn)?;

        if author_id != user_id {
            return Err(Error::Forbidden);
        }

        Ok(OwnerContext {
            user_id,
            roadmap_id,
        })
    }
}
