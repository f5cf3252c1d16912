//! Google OAuth exchange seam
//!
//! Builds the authorization redirect and performs the code-for-profile
//! exchange. The handler owns find-or-create; this module only talks to
//! the provider. Unconfigured deployments get a ValidationError instead
//! of a half-built redirect.

use crate::error::{Error, Result};
use serde::Deserialize;
use uuid::Uuid;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile fields we consume from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth client. All three fields come from the environment; when any is
/// missing the service reports itself unconfigured.
#[derive(Clone)]
pub struct GoogleAuthService {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: Option<String>,
}

impl GoogleAuthService {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_url: Option<String>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
        }
    }

    fn configured(&self) -> Result<(&str, &str, &str)> {
        match (&self.client_id, &self.client_secret, &self.redirect_url) {
            (Some(id), Some(secret), Some(redirect)) => Ok((id, secret, redirect)),
            _ => Err(Error::Validation(
                "Google sign-in is not configured".to_string(),
            )),
        }
    }

    /// Random state value bound to the login attempt via cookie
    pub fn generate_state() -> String {
        Uuid::new_v4().to_string()
    }

    /// Authorization URL the client is redirected to
    pub fn auth_url(&self, state: &str) -> Result<String> {
        let (client_id, _, redirect_url) = self.configured()?;
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
            AUTH_ENDPOINT, client_id, redirect_url, state
        ))
    }

    /// Exchange an authorization code for the user's profile
    pub fn exchange_code(&self, code: &str) -> Result<GoogleUserInfo> {
        let (client_id, client_secret, redirect_url) = self.configured()?;

        let client = reqwest::blocking::Client::new();
        let token: TokenResponse = client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| {
                tracing::warn!(error = %e, "google token exchange failed");
                Error::Validation("OAuth exchange failed".to_string())
            })?;

        client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| {
                tracing::warn!(error = %e, "google userinfo fetch failed");
                Error::Validation("OAuth exchange failed".to_string())
            })
    }

    /// Username for a fresh external-identity account: display name if the
    /// provider sent one, otherwise the mailbox part of the email.
    pub fn derive_username(info: &GoogleUserInfo) -> String {
        let joined = format!("{}{}", info.given_name, info.family_name);
        if !joined.is_empty() {
            return joined;
        }
        info.email
            .split('@')
            .next()
            .unwrap_or(&info.email)
            .to_string()
    }
}
