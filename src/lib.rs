//! Cartesia - roadmap authoring and browsing backend
//!
//! Roadmaps are directed graphs of learning nodes with typed connections,
//! owned by users and stored in SQLite. The crate exposes the entity
//! model, the ownership-gated mutation services, the read-side listing
//! services, and the JSON API server that fronts them.
//!
//! # Node Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `topic` | A subject to learn |
//! | `resource` | A node that is itself a reference |
//! | `challenge` | An exercise to complete |
//! | `milestone` | A checkpoint in the path |
//!
//! # Quick Start
//!
//! ```no_run
//! use cartesia::auth::hash_password;
//! use cartesia::db::Database;
//! use cartesia::models::{ConnectionType, NodeType, Position};
//!
//! let db = Database::open_at("cartesia.db").unwrap();
//!
//! let hash = hash_password("correct-horse-battery").unwrap();
//! let user = db.create_user("alice", "alice@example.com", &hash).unwrap();
//!
//! let roadmap = db
//!     .create_roadmap(user.id, "Go Basics", None, Some("programming"), true, &[])
//!     .unwrap();
//!
//! let intro = db
//!     .create_node(roadmap.id, "Intro", None, NodeType::Topic,
//!                  Position { x: 0.0, y: 0.0 }, None)
//!     .unwrap();
//! let loops = db
//!     .create_node(roadmap.id, "Loops", None, NodeType::Topic,
//!                  Position { x: 100.0, y: 0.0 }, None)
//!     .unwrap();
//!
//! db.create_connection(roadmap.id, intro.id, loops.id, ConnectionType::Default)
//!     .unwrap();
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod explore;
pub mod graph;
pub mod models;
pub mod roadmaps;
pub mod routes;
pub mod schema;
pub mod server;

pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use explore::{FacetCount, RoadmapDetail, RoadmapSummary};
pub use graph::NodePatch;
pub use models::{
    Connection, ConnectionType, Node, NodeResource, NodeStatus, NodeType, Position,
    ProgressRecord, Review, Roadmap, User,
};
pub use roadmaps::RoadmapPatch;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify core types are re-exported from crate root
        let _ = NodeType::Topic;
        let _ = ConnectionType::Default;
        let _ = NodeStatus::NotStarted;
    }
}
