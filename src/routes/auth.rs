//! Account registration, login, and the OAuth exchange

use crate::auth::{hash_password, verify_password, GoogleAuthService};
use crate::error::{AuthFailure, Error, Result};
use crate::models::{validate_email, validate_password, validate_username};
use crate::server::{App, Reply, RequestCtx};
use serde::Deserialize;

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /auth/register
pub fn register(app: &App, ctx: &RequestCtx) -> Result<Reply> {
    let req: RegisterRequest = ctx.parse_body()?;

    validate_email(&req.email)?;
    validate_username(&req.username)?;
    // Policy check runs before any hashing is attempted
    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user = app
        .db
        .create_user(req.username.trim(), &req.email, &password_hash)?;
    let token = app.jwt.generate_token(user.id)?;

    Reply::json(201, serde_json::json!({ "token": token, "user": user }))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the identical outcome; a
/// password login against an external-identity account fails the same way.
pub fn login(app: &App, ctx: &RequestCtx) -> Result<Reply> {
    let req: LoginRequest = ctx.parse_body()?;

    let user = app.db.find_user_by_email(&req.email).map_err(|e| match e {
        Error::NotFound => Error::Unauthenticated(AuthFailure::InvalidCredentials),
        other => other,
    })?;

    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(Error::Unauthenticated(AuthFailure::InvalidCredentials));
    };
    if !verify_password(&req.password, stored_hash) {
        return Err(Error::Unauthenticated(AuthFailure::InvalidCredentials));
    }

    let token = app.jwt.generate_token(user.id)?;
    Reply::json(200, serde_json::json!({ "token": token, "user": user }))
}

/// GET /auth/me
pub fn me(app: &App, ctx: &RequestCtx) -> Result<Reply> {
    let user_id = app.gate.require_auth(ctx.auth_header)?;
    let user = app.db.get_user(user_id)?;
    Reply::json(200, serde_json::json!({ "user": user }))
}

/// GET /auth/google/login - redirect to the provider with a state cookie
pub fn google_login(app: &App) -> Result<Reply> {
    let state = GoogleAuthService::generate_state();
    let location = app.google.auth_url(&state)?;
    Ok(Reply::Redirect {
        location,
        set_cookie: Some(format!(
            "oauth_state={}; Path=/; Max-Age=3600; HttpOnly",
            state
        )),
    })
}

/// GET /auth/google/callback - verify state, exchange the code, then find
/// or create the account and hand back a session redirect
pub fn google_callback(app: &App, ctx: &RequestCtx) -> Result<Reply> {
    let cookie_state = ctx.cookies.get("oauth_state").map(String::as_str);
    let query_state = ctx.query.get("state").map(String::as_str);
    if cookie_state.is_none() || cookie_state != query_state {
        return Err(Error::Validation("Invalid OAuth state".to_string()));
    }

    let code = ctx
        .query
        .get("code")
        .ok_or_else(|| Error::Validation("Missing authorization code".to_string()))?;

    let info = app.google.exchange_code(code)?;
    let username = GoogleAuthService::derive_username(&info);
    let user = app.db.find_or_create_google_user(
        &info.id,
        &info.email,
        &username,
        info.picture.as_deref(),
    )?;

    let token = app.jwt.generate_token(user.id)?;
    Ok(Reply::Redirect {
        location: format!("/auth/callback?token={}", token),
        set_cookie: Some("oauth_state=; Path=/; Max-Age=0".to_string()),
    })
}
