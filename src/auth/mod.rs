//! Session authentication and the roadmap ownership gate
//!
//! Provides:
//! - JWT session token issue/validation
//! - Password hashing with Argon2
//! - Bearer extraction and the owner gate in front of graph mutations
//! - Google OAuth exchange seam

pub mod gate;
pub mod google;
pub mod jwt;
pub mod password;

pub use gate::{AuthGate, OwnerContext};
pub use google::{GoogleAuthService, GoogleUserInfo};
pub use jwt::{Claims, JwtService};
pub use password::{hash_password, verify_password};
