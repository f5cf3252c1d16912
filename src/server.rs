//! HTTP server for the roadmap API
//!
//! `cartesia serve` → starts the server and dispatches JSON requests to
//! the service layer. One worker thread per inbound request; the shared
//! state is the cloned connection pool and the auth services, injected at
//! construction. Routing is a match over (method, path segments).

use crate::auth::{AuthGate, GoogleAuthService, JwtService};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::routes;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{error, info};

/// Uniform response envelope
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            reason: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(err: &Error) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(err.client_message()),
            reason: Some(err.reason()),
        }
    }
}

/// What a handler hands back to the dispatch loop
pub enum Reply {
    Json {
        status: u16,
        body: serde_json::Value,
    },
    Redirect {
        location: String,
        set_cookie: Option<String>,
    },
}

impl Reply {
    pub fn json<T: Serialize>(status: u16, data: T) -> Result<Reply> {
        let body = serde_json::to_value(ApiResponse::success(data))
            .map_err(|e| Error::Connection(format!("response encoding failed: {}", e)))?;
        Ok(Reply::Json { status, body })
    }
}

/// Everything a handler may need from the raw request
pub struct RequestCtx<'a> {
    pub auth_header: Option<&'a str>,
    pub cookies: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: &'a str,
}

impl RequestCtx<'_> {
    /// Parse the JSON body into a request DTO
    pub fn parse_body<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.body)
            .map_err(|_| Error::Validation("Invalid request body".to_string()))
    }
}

/// The application: injected store and services, no ambient state
pub struct App {
    pub db: Database,
    pub jwt: JwtService,
    pub gate: AuthGate,
    pub google: GoogleAuthService,
    pub static_dir: Option<PathBuf>,
}

impl App {
    pub fn new(
        db: Database,
        jwt: JwtService,
        google: GoogleAuthService,
        static_dir: Option<PathBuf>,
    ) -> Self {
        let gate = AuthGate::new(db.clone(), jwt.clone());
        Self {
            db,
            jwt,
            gate,
            google,
            static_dir,
        }
    }
}

/// Start the API server. Blocks until the process is terminated.
pub fn start(app: App, port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    eprintln!("\n\x1b[1;32mCartesia\x1b[0m");
    eprintln!("   API listening on http://localhost:{}", port);
    eprintln!("   Press Ctrl+C to stop\n");

    let app = Arc::new(app);
    for request in server.incoming_requests() {
        let app = Arc::clone(&app);
        std::thread::spawn(move || {
            if let Err(e) = handle_request(&app, request) {
                error!(error = %e, "request handler i/o failure");
            }
        });
    }

    Ok(())
}

fn handle_request(app: &App, mut request: Request) -> std::io::Result<()> {
    let url = request.url().to_string();
    let (path, query_str) = url.split_once('?').unwrap_or((url.as_str(), ""));
    let method = request.method().clone();

    let auth_header = header_value(&request, "Authorization");
    let cookie_header = header_value(&request, "Cookie");

    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        return respond_error(
            request,
            &Error::Validation("Failed to read request body".to_string()),
        );
    }

    // Static assets bypass the JSON dispatch entirely
    if method == Method::Get {
        if let Some(rest) = path.strip_prefix("/static/") {
            return serve_static(app, request, rest);
        }
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let ctx = RequestCtx {
        auth_header: auth_header.as_deref(),
        cookies: parse_cookies(cookie_header.as_deref()),
        query: parse_query(query_str),
        body: &body,
    };

    let result = dispatch(app, &method, &segments, &ctx);

    info!(
        method = %method,
        path = %path,
        outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.reason(),
        },
        "request"
    );

    match result {
        Ok(Reply::Json { status, body }) => respond_json(request, status, &body),
        Ok(Reply::Redirect {
            location,
            set_cookie,
        }) => {
            let mut response = Response::empty(307).with_header(
                Header::from_bytes(&b"Location"[..], location.as_bytes()).unwrap(),
            );
            if let Some(cookie) = set_cookie {
                response = response.with_header(
                    Header::from_bytes(&b"Set-Cookie"[..], cookie.as_bytes()).unwrap(),
                );
            }
            request.respond(response)
        }
        Err(err) => respond_error(request, &err),
    }
}

fn dispatch(app: &App, method: &Method, segments: &[&str], ctx: &RequestCtx) -> Result<Reply> {
    match (method, segments) {
        // Health probe
        (Method::Get, ["api", "health"]) => Reply::json(
            200,
            serde_json::json!({ "status": "ok", "service": "cartesia" }),
        ),

        // Auth
        (Method::Post, ["auth", "register"]) => routes::auth::register(app, ctx),
        (Method::Post, ["auth", "login"]) => routes::auth::login(app, ctx),
        (Method::Get, ["auth", "me"]) => routes::auth::me(app, ctx),
        (Method::Get, ["auth", "google", "login"]) => routes::auth::google_login(app),
        (Method::Get, ["auth", "google", "callback"]) => routes::auth::google_callback(app, ctx),

        // Public listing
        (Method::Get, []) | (Method::Get, ["roadmaps"]) | (Method::Get, ["roadmaps", "explore"]) => {
            routes::roadmaps::explore(app)
        }

        // Roadmap lifecycle
        (Method::Post, ["roadmaps", "create"]) => routes::roadmaps::create(app, ctx),
        (Method::Get, ["roadmaps", id]) => routes::roadmaps::detail(app, ctx, parse_id(id)?),
        (Method::Put, ["roadmaps", id]) => routes::roadmaps::update(app, ctx, parse_id(id)?),
        (Method::Delete, ["roadmaps", id]) => routes::roadmaps::delete(app, ctx, parse_id(id)?),
        (Method::Post, ["roadmaps", id, "fork"]) => routes::roadmaps::fork(app, ctx, parse_id(id)?),
        (Method::Get, ["roadmaps", id, "reviews"]) => {
            routes::roadmaps::list_reviews(app, parse_id(id)?)
        }
        (Method::Post, ["roadmaps", id, "reviews"]) => {
            routes::roadmaps::add_review(app, ctx, parse_id(id)?)
        }

        // Graph editor API (owner-gated inside the handlers)
        (Method::Post, ["api", "roadmaps", id, "nodes"]) => {
            routes::graph::create_node(app, ctx, parse_id(id)?)
        }
        (Method::Put, ["api", "roadmaps", id, "nodes", "positions"]) => {
            routes::graph::update_positions(app, ctx, parse_id(id)?)
        }
        (Method::Put, ["api", "roadmaps", id, "nodes", node_id]) => {
            routes::graph::update_node(app, ctx, parse_id(id)?, parse_id(node_id)?)
        }
        (Method::Delete, ["api", "roadmaps", id, "nodes", node_id]) => {
            routes::graph::delete_node(app, ctx, parse_id(id)?, parse_id(node_id)?)
        }
        (Method::Post, ["api", "roadmaps", id, "nodes", node_id, "progress"]) => {
            routes::graph::update_progress(app, ctx, parse_id(id)?, parse_id(node_id)?)
        }
        (Method::Post, ["api", "roadmaps", id, "nodes", node_id, "resources"]) => {
            routes::graph::add_resource(app, ctx, parse_id(id)?, parse_id(node_id)?)
        }
        (Method::Get, ["api", "roadmaps", id, "nodes", node_id, "resources"]) => {
            routes::graph::list_resources(app, parse_id(id)?, parse_id(node_id)?)
        }
        (Method::Post, ["api", "roadmaps", id, "connections"]) => {
            routes::graph::create_connection(app, ctx, parse_id(id)?)
        }
        (Method::Delete, ["api", "roadmaps", id, "connections", conn_id]) => {
            routes::graph::delete_connection(app, ctx, parse_id(id)?, parse_id(conn_id)?)
        }

        _ => Err(Error::NotFound),
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn json_header() -> Header {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()
}

fn respond_json(request: Request, status: u16, body: &serde_json::Value) -> std::io::Result<()> {
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(json_header());
    request.respond(response)
}

fn respond_error(request: Request, err: &Error) -> std::io::Result<()> {
    if err.status_code() >= 500 {
        // Full detail stays in the log; the client sees a generic message
        error!(error = %err, "internal error");
    }
    let body = serde_json::to_value(ApiResponse::failure(err)).unwrap_or_else(
        |_| serde_json::json!({ "ok": false, "error": "Internal error" }),
    );
    respond_json(request, err.status_code(), &body)
}

fn serve_static(app: &App, request: Request, rest: &str) -> std::io::Result<()> {
    let Some(dir) = &app.static_dir else {
        return respond_error(request, &Error::NotFound);
    };
    // Reject traversal before touching the filesystem
    if rest.split('/').any(|part| part == "..") {
        return respond_error(request, &Error::NotFound);
    }
    let path = dir.join(rest);
    match std::fs::File::open(&path) {
        Ok(file) => {
            let content_type = content_type_for(&path);
            let response = Response::from_file(file).with_header(
                Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap(),
            );
            request.respond(response)
        }
        Err(_) => respond_error(request, &Error::NotFound),
    }
}

// ============================================================================
// Request parsing helpers
// ============================================================================

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}

pub(crate) fn parse_id(raw: &str) -> Result<i32> {
    raw.parse::<i32>()
        .map_err(|_| Error::Validation(format!("Invalid id: {}", raw)))
}

pub(crate) fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

pub(crate) fn parse_cookies(header: Option<&str>) -> HashMap<String, String> {
    header
        .unwrap_or("")
        .split(';')
        .filter_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

fn content_type_for(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthFailure;

    // === ApiResponse Tests ===

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("hello".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("hello".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_serializes_to_json() {
        let response: ApiResponse<String> = ApiResponse::success("test".to_string());
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"ok\":true"));
        assert!(json.contains("\"data\":\"test\""));
        assert!(json.contains("\"error\":null"));
        // reason is omitted on success
        assert!(!json.contains("\"reason\""));
    }

    #[test]
    fn test_api_response_failure_carries_reason() {
        let err = Error::Unauthenticated(AuthFailure::ExpiredToken);
        let response = ApiResponse::failure(&err);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"ok\":false"));
        assert!(json.contains("\"reason\":\"token_expired\""));
    }

    // === Parsing helper tests ===

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("").is_err());
        assert!(parse_id("9999999999999").is_err());
    }

    #[test]
    fn test_parse_query() {
        let q = parse_query("code=abc&state=xyz");
        assert_eq!(q.get("code").map(String::as_str), Some("abc"));
        assert_eq!(q.get("state").map(String::as_str), Some("xyz"));
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies(Some("oauth_state=abc; session=xyz"));
        assert_eq!(cookies.get("oauth_state").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("session").map(String::as_str), Some("xyz"));
        assert!(parse_cookies(None).is_empty());
    }

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(
            content_type_for(std::path::Path::new("app.js")),
            "application/javascript"
        );
        assert_eq!(
            content_type_for(std::path::Path::new("logo.svg")),
            "image/svg+xml"
        );
        assert_eq!(
            content_type_for(std::path::Path::new("blob.bin")),
            "application/octet-stream"
        );
    }
}
