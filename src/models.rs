//! Entity models for the roadmap graph
//!
//! Queryable/Insertable pairs for every table plus the typed enumerations
//! and validation predicates the handlers rely on. A value that parses into
//! one of these types is safe to hand to the store.

use crate::error::{Error, Result};
use crate::schema::*;
use diesel::prelude::*;
use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// Typed Enumerations
// ============================================================================

/// Kind of node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Topic,
    Resource,
    Challenge,
    Milestone,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Topic => "topic",
            NodeType::Resource => "resource",
            NodeType::Challenge => "challenge",
            NodeType::Milestone => "milestone",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "topic" => Ok(NodeType::Topic),
            "resource" => Ok(NodeType::Resource),
            "challenge" => Ok(NodeType::Challenge),
            "milestone" => Ok(NodeType::Milestone),
            other => Err(Error::Validation(format!("Unknown node type: {}", other))),
        }
    }
}

/// Visual/semantic weight of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Default,
    Strong,
    Weak,
    Dashed,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Default => "default",
            ConnectionType::Strong => "strong",
            ConnectionType::Weak => "weak",
            ConnectionType::Dashed => "dashed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(ConnectionType::Default),
            "strong" => Ok(ConnectionType::Strong),
            "weak" => Ok(ConnectionType::Weak),
            "dashed" => Ok(ConnectionType::Dashed),
            other => Err(Error::Validation(format!(
                "Unknown connection type: {}",
                other
            ))),
        }
    }
}

/// Completion state of a node. Not a strict FSM: any of the three values
/// may be set by a progress update, forward or backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::NotStarted => "not_started",
            NodeStatus::InProgress => "in_progress",
            NodeStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(NodeStatus::NotStarted),
            "in_progress" => Ok(NodeStatus::InProgress),
            "completed" => Ok(NodeStatus::Completed),
            other => Err(Error::Validation(format!("Unknown status: {}", other))),
        }
    }
}

/// Canvas placement. Free-form coordinates, no uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// ============================================================================
// User
// ============================================================================

/// Queryable user. The password hash and external-identity id never
/// serialize into responses.
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Insertable user
#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub google_id: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

/// Validate an email against the standard address grammar
pub fn validate_email(email: &str) -> Result<()> {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
    });
    if re.is_match(email) {
        Ok(())
    } else {
        Err(Error::Validation("Invalid email address".to_string()))
    }
}

/// Validate a username: 3-30 chars, alphanumeric plus `_` and `-`
pub fn validate_username(username: &str) -> Result<()> {
    let username = username.trim();
    if username.len() < 3 || username.len() > 30 {
        return Err(Error::Validation(
            "Username must be 3-30 alphanumeric characters".to_string(),
        ));
    }
    let re = USERNAME_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());
    if re.is_match(username) {
        Ok(())
    } else {
        Err(Error::Validation(
            "Username must be 3-30 alphanumeric characters".to_string(),
        ))
    }
}

/// Minimum length gate, applied before any hashing is attempted
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(Error::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Roadmap
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = roadmaps)]
pub struct Roadmap {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author_id: i32,
    pub is_public: bool,
    pub forked_from: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = roadmaps)]
pub struct NewRoadmap<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub author_id: i32,
    pub is_public: bool,
    pub forked_from: Option<i32>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Node
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = nodes)]
pub struct Node {
    pub id: i32,
    pub roadmap_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub node_type: String,
    pub position_x: f64,
    pub position_y: f64,
    pub status: String,
    pub color: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Node {
    pub fn position(&self) -> Position {
        Position {
            x: self.position_x,
            y: self.position_y,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = nodes)]
pub struct NewNode<'a> {
    pub roadmap_id: i32,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub node_type: &'a str,
    pub position_x: f64,
    pub position_y: f64,
    pub status: &'a str,
    pub color: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Connection
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = connections)]
pub struct Connection {
    pub id: i32,
    pub roadmap_id: i32,
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub connection_type: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = connections)]
pub struct NewConnection<'a> {
    pub roadmap_id: i32,
    pub from_node_id: i32,
    pub to_node_id: i32,
    pub connection_type: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Resource
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = resources)]
pub struct NodeResource {
    pub id: i32,
    pub node_id: i32,
    pub resource_type: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = resources)]
pub struct NewNodeResource<'a> {
    pub node_id: i32,
    pub resource_type: &'a str,
    pub title: &'a str,
    pub url: &'a str,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = progress)]
pub struct ProgressRecord {
    pub id: i32,
    pub user_id: i32,
    pub node_id: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = progress)]
pub struct NewProgressRecord<'a> {
    pub user_id: i32,
    pub node_id: i32,
    pub status: &'a str,
    pub notes: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Review
// ============================================================================

#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = reviews)]
pub struct Review {
    pub id: i32,
    pub roadmap_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview<'a> {
    pub roadmap_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
