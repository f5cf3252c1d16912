//! Environment-backed configuration
//!
//! Reads from process env vars, with `.env` loaded by the binary before
//! this runs. The JWT secret has no default: a server signing sessions
//! with a guessable key is worse than one that refuses to start.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path or URL
    pub database_url: String,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// Port the API listens on
    pub port: u16,
    /// Directory served under /static, when present
    pub static_dir: Option<PathBuf>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Database path from the environment, with the default applied.
    /// Split out so `init-db` can run without the full server config.
    pub fn database_url_from_env() -> String {
        env_opt("CARTESIA_DB_PATH")
            .or_else(|| env_opt("DATABASE_URL"))
            .unwrap_or_else(|| "cartesia.db".to_string())
    }

    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        let database_url = Self::database_url_from_env();

        let jwt_secret = env_opt("JWT_SECRET")
            .ok_or_else(|| Error::Validation("JWT_SECRET must be set".to_string()))?;

        let port = match env_opt("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Validation(format!("Invalid PORT: {}", raw)))?,
            None => 8080,
        };

        let static_dir = env_opt("STATIC_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from("static");
                default.is_dir().then_some(default)
            });

        Ok(Self {
            database_url,
            jwt_secret,
            port,
            static_dir,
            google_client_id: env_opt("GOOGLE_CLIENT_ID"),
            google_client_secret: env_opt("GOOGLE_CLIENT_SECRET"),
            google_redirect_url: env_opt("GOOGLE_REDIRECT_URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_opt_filters_empty() {
        std::env::set_var("CARTESIA_TEST_EMPTY", "");
        assert!(env_opt("CARTESIA_TEST_EMPTY").is_none());
        std::env::set_var("CARTESIA_TEST_SET", "value");
        assert_eq!(env_opt("CARTESIA_TEST_SET").as_deref(), Some("value"));
    }
}
