//! Integration tests for the graph mutation and listing services
//!
//! These exercise the service layer end-to-end against a temporary
//! database - real SQL, real transactions, no mocking.

use cartesia::auth::hash_password;
use cartesia::db::Database;
use cartesia::error::Error;
use cartesia::models::{ConnectionType, NodeStatus, NodeType, Position, Roadmap, User};
use tempfile::TempDir;

fn open_db() -> (TempDir, Database) {
    let dir = TempDir::new().expect("tempdir");
    let db = Database::open_at(dir.path().join("test.db")).expect("open db");
    (dir, db)
}

fn make_user(db: &Database, name: &str) -> User {
    let hash = hash_password("a-long-password").unwrap();
    db.create_user(name, &format!("{}@example.com", name), &hash)
        .unwrap()
}

fn make_roadmap(db: &Database, owner: i32, title: &str) -> Roadmap {
    db.create_roadmap(owner, title, None, Some("programming"), true, &[])
        .unwrap()
}

const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

// =============================================================================
// Connections
// =============================================================================

#[test]
fn test_connection_end_to_end() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "Go Basics");

    let intro = db
        .create_node(roadmap.id, "Intro", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let loops = db
        .create_node(
            roadmap.id,
            "Loops",
            None,
            NodeType::Topic,
            Position { x: 100.0, y: 0.0 },
            None,
        )
        .unwrap();

    let conn = db
        .create_connection(roadmap.id, intro.id, loops.id, ConnectionType::Default)
        .unwrap();
    assert!(conn.id > 0);
    assert_eq!(conn.from_node_id, intro.id);
    assert_eq!(conn.to_node_id, loops.id);

    // The identical ordered pair again is a conflict, and exactly one
    // stored connection survives.
    let err = db
        .create_connection(roadmap.id, intro.id, loops.id, ConnectionType::Default)
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let detail = db.roadmap_detail(roadmap.id, None).unwrap();
    assert_eq!(detail.connections.len(), 1);

    // The reverse direction is a different edge and is allowed
    db.create_connection(roadmap.id, loops.id, intro.id, ConnectionType::Strong)
        .unwrap();
}

#[test]
fn test_connection_rejects_cross_roadmap_endpoints() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let map_a = make_roadmap(&db, owner.id, "A");
    let map_b = make_roadmap(&db, owner.id, "B");

    let in_a = db
        .create_node(map_a.id, "In A", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let in_b = db
        .create_node(map_b.id, "In B", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    // in_b exists, but not in roadmap A
    let err = db
        .create_connection(map_a.id, in_a.id, in_b.id, ConnectionType::Default)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_connection_rejects_self_loop() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "A");
    let node = db
        .create_node(roadmap.id, "Solo", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    let err = db
        .create_connection(roadmap.id, node.id, node.id, ConnectionType::Default)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_delete_connection_scoped_to_roadmap() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let map_a = make_roadmap(&db, owner.id, "A");
    let map_b = make_roadmap(&db, owner.id, "B");

    let n1 = db
        .create_node(map_a.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(map_a.id, "N2", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let conn = db
        .create_connection(map_a.id, n1.id, n2.id, ConnectionType::Default)
        .unwrap();

    // Valid id in the wrong roadmap is NotFound, and the row survives
    assert!(matches!(
        db.delete_connection(map_b.id, conn.id).unwrap_err(),
        Error::NotFound
    ));
    db.delete_connection(map_a.id, conn.id).unwrap();
    assert!(matches!(
        db.delete_connection(map_a.id, conn.id).unwrap_err(),
        Error::NotFound
    ));
}

// =============================================================================
// Nodes
// =============================================================================

#[test]
fn test_create_node_forces_not_started() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "A");

    let node = db
        .create_node(
            roadmap.id,
            "Intro",
            Some("basics"),
            NodeType::Milestone,
            ORIGIN,
            Some("#ff0000"),
        )
        .unwrap();
    assert_eq!(node.status, "not_started");
    assert_eq!(node.node_type, "milestone");
}

#[test]
fn test_create_node_requires_title() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "A");

    let err = db
        .create_node(roadmap.id, "   ", None, NodeType::Topic, ORIGIN, None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_update_node_partial_semantics() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "A");

    let node = db
        .create_node(
            roadmap.id,
            "Intro",
            Some("original description"),
            NodeType::Topic,
            Position { x: 10.0, y: 20.0 },
            Some("#00ff00"),
        )
        .unwrap();

    // Supplying only color leaves everything else unchanged
    let patch = cartesia::NodePatch {
        color: Some("#123456".to_string()),
        ..Default::default()
    };
    let updated = db.update_node(roadmap.id, node.id, patch).unwrap();

    assert_eq!(updated.color.as_deref(), Some("#123456"));
    assert_eq!(updated.title, "Intro");
    assert_eq!(updated.description.as_deref(), Some("original description"));
    assert_eq!(updated.node_type, "topic");
    assert_eq!(updated.position_x, 10.0);
    assert_eq!(updated.position_y, 20.0);
    assert_ne!(updated.updated_at, node.updated_at);
}

#[test]
fn test_update_node_is_tenant_scoped() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let map_a = make_roadmap(&db, owner.id, "A");
    let map_b = make_roadmap(&db, owner.id, "B");

    let node = db
        .create_node(map_a.id, "Intro", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    // A node id valid in another roadmap must not be editable
    let patch = cartesia::NodePatch {
        title: Some("Hijacked".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        db.update_node(map_b.id, node.id, patch).unwrap_err(),
        Error::NotFound
    ));
    assert_eq!(db.get_node(map_a.id, node.id).unwrap().title, "Intro");
}

#[test]
fn test_delete_node_cascades_to_dependents() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let learner = make_user(&db, "learner");
    let roadmap = make_roadmap(&db, owner.id, "A");

    let n1 = db
        .create_node(roadmap.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(roadmap.id, "N2", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    db.create_connection(roadmap.id, n1.id, n2.id, ConnectionType::Default)
        .unwrap();
    db.create_connection(roadmap.id, n2.id, n1.id, ConnectionType::Weak)
        .unwrap();
    db.add_node_resource(roadmap.id, n1.id, "link", "Docs", "https://example.com", None)
        .unwrap();
    db.update_progress(learner.id, roadmap.id, n1.id, NodeStatus::InProgress, None)
        .unwrap();

    db.delete_node(roadmap.id, n1.id).unwrap();

    assert!(matches!(
        db.get_node(roadmap.id, n1.id).unwrap_err(),
        Error::NotFound
    ));
    let detail = db.roadmap_detail(roadmap.id, None).unwrap();
    assert!(detail.connections.is_empty());
    assert!(detail.resources.is_empty());
    assert!(matches!(
        db.get_progress(learner.id, n1.id).unwrap_err(),
        Error::NotFound
    ));
    // The other endpoint survives
    db.get_node(roadmap.id, n2.id).unwrap();
}

#[test]
fn test_delete_node_is_all_or_nothing() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let learner = make_user(&db, "learner");
    let map_a = make_roadmap(&db, owner.id, "A");
    let map_b = make_roadmap(&db, owner.id, "B");

    let n1 = db
        .create_node(map_a.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(map_a.id, "N2", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    db.create_connection(map_a.id, n1.id, n2.id, ConnectionType::Default)
        .unwrap();
    db.add_node_resource(map_a.id, n1.id, "link", "Docs", "https://example.com", None)
        .unwrap();
    db.update_progress(learner.id, map_a.id, n1.id, NodeStatus::Completed, None)
        .unwrap();

    // Force the final node-row delete to match zero rows by scoping the
    // call to the wrong roadmap. The child deletes that already ran must
    // roll back with it.
    assert!(matches!(
        db.delete_node(map_b.id, n1.id).unwrap_err(),
        Error::NotFound
    ));

    let detail = db.roadmap_detail(map_a.id, None).unwrap();
    assert_eq!(detail.connections.len(), 1);
    assert_eq!(detail.resources.len(), 1);
    assert_eq!(
        db.get_progress(learner.id, n1.id).unwrap().status,
        "completed"
    );
}

#[test]
fn test_batch_positions_all_or_nothing() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = make_roadmap(&db, owner.id, "A");

    let n1 = db
        .create_node(roadmap.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(roadmap.id, "N2", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    db.update_node_positions(roadmap.id, &[(n1.id, 1.0, 2.0), (n2.id, 3.0, 4.0)])
        .unwrap();
    let moved = db.get_node(roadmap.id, n1.id).unwrap();
    assert_eq!((moved.position_x, moved.position_y), (1.0, 2.0));

    // One bad id aborts the whole batch
    assert!(matches!(
        db.update_node_positions(roadmap.id, &[(n1.id, 9.0, 9.0), (999_999, 0.0, 0.0)])
            .unwrap_err(),
        Error::NotFound
    ));
    let unchanged = db.get_node(roadmap.id, n1.id).unwrap();
    assert_eq!((unchanged.position_x, unchanged.position_y), (1.0, 2.0));
}

// =============================================================================
// Resources
// =============================================================================

#[test]
fn test_resource_requires_node_in_roadmap() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let map_a = make_roadmap(&db, owner.id, "A");
    let map_b = make_roadmap(&db, owner.id, "B");

    let node = db
        .create_node(map_a.id, "N", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    assert!(matches!(
        db.add_node_resource(map_b.id, node.id, "link", "Docs", "https://x.dev", None)
            .unwrap_err(),
        Error::NotFound
    ));

    let created = db
        .add_node_resource(
            map_a.id,
            node.id,
            "video",
            "Tour",
            "https://tour.example.com",
            Some("interactive"),
        )
        .unwrap();
    assert_eq!(created.resource_type, "video");

    let listed = db.list_node_resources(map_a.id, node.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Tour");
}

// =============================================================================
// Progress
// =============================================================================

#[test]
fn test_progress_upsert_reflects_onto_node() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let learner = make_user(&db, "learner");
    let roadmap = make_roadmap(&db, owner.id, "A");
    let node = db
        .create_node(roadmap.id, "N", None, NodeType::Topic, ORIGIN, None)
        .unwrap();

    let first = db
        .update_progress(
            learner.id,
            roadmap.id,
            node.id,
            NodeStatus::InProgress,
            Some("halfway"),
        )
        .unwrap();
    assert_eq!(first.status, "in_progress");
    assert_eq!(db.get_node(roadmap.id, node.id).unwrap().status, "in_progress");

    // Second update overwrites the same logical record; backward moves
    // are allowed.
    let second = db
        .update_progress(learner.id, roadmap.id, node.id, NodeStatus::NotStarted, None)
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, "not_started");
    assert_eq!(db.get_node(roadmap.id, node.id).unwrap().status, "not_started");
}

// =============================================================================
// Roadmap lifecycle
// =============================================================================

#[test]
fn test_roadmap_delete_leaves_no_orphans() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let reviewer = make_user(&db, "reviewer");
    let roadmap = make_roadmap(&db, owner.id, "Doomed");

    let n1 = db
        .create_node(roadmap.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(roadmap.id, "N2", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    db.create_connection(roadmap.id, n1.id, n2.id, ConnectionType::Default)
        .unwrap();
    db.add_node_resource(roadmap.id, n1.id, "link", "Docs", "https://x.dev", None)
        .unwrap();
    db.add_review(roadmap.id, reviewer.id, 5, Some("great")).unwrap();
    db.record_view(roadmap.id).unwrap();

    db.delete_roadmap(roadmap.id).unwrap();

    assert!(matches!(
        db.get_roadmap(roadmap.id).unwrap_err(),
        Error::NotFound
    ));
    assert!(matches!(
        db.get_node(roadmap.id, n1.id).unwrap_err(),
        Error::NotFound
    ));
    assert!(matches!(
        db.get_node(roadmap.id, n2.id).unwrap_err(),
        Error::NotFound
    ));
    assert!(db.list_reviews(roadmap.id).unwrap().is_empty());

    // Deleting again reports NotFound
    assert!(matches!(
        db.delete_roadmap(roadmap.id).unwrap_err(),
        Error::NotFound
    ));
}

#[test]
fn test_fork_remaps_connection_endpoints() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let forker = make_user(&db, "forker");
    let roadmap = make_roadmap(&db, owner.id, "Source");

    let n1 = db
        .create_node(roadmap.id, "N1", None, NodeType::Topic, ORIGIN, None)
        .unwrap();
    let n2 = db
        .create_node(roadmap.id, "N2", None, NodeType::Challenge, ORIGIN, None)
        .unwrap();
    db.create_connection(roadmap.id, n1.id, n2.id, ConnectionType::Strong)
        .unwrap();
    db.add_node_resource(roadmap.id, n1.id, "link", "Docs", "https://x.dev", None)
        .unwrap();

    let fork = db.fork_roadmap(roadmap.id, forker.id).unwrap();
    assert_eq!(fork.author_id, forker.id);
    assert_eq!(fork.forked_from, Some(roadmap.id));
    assert!(!fork.is_public);

    let detail = db.roadmap_detail(fork.id, Some(forker.id)).unwrap();
    assert_eq!(detail.nodes.len(), 2);
    assert_eq!(detail.connections.len(), 1);
    assert_eq!(detail.resources.len(), 1);

    // Endpoints point at the copied nodes, not the originals
    let edge = &detail.connections[0];
    let copied_ids: Vec<i32> = detail.nodes.iter().map(|n| n.id).collect();
    assert!(copied_ids.contains(&edge.from_node_id));
    assert!(copied_ids.contains(&edge.to_node_id));
    assert_ne!(edge.from_node_id, n1.id);
    assert_ne!(edge.to_node_id, n2.id);

    // The source graph is untouched
    let source = db.roadmap_detail(roadmap.id, None).unwrap();
    assert_eq!(source.nodes.len(), 2);
}

#[test]
fn test_fork_private_roadmap_requires_ownership() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let stranger = make_user(&db, "stranger");
    let private = db
        .create_roadmap(owner.id, "Private", None, None, false, &[])
        .unwrap();

    assert!(matches!(
        db.fork_roadmap(private.id, stranger.id).unwrap_err(),
        Error::Forbidden
    ));
    // The owner may fork their own private roadmap
    db.fork_roadmap(private.id, owner.id).unwrap();
}

// =============================================================================
// Reviews
// =============================================================================

#[test]
fn test_review_rules() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let reviewer = make_user(&db, "reviewer");
    let roadmap = make_roadmap(&db, owner.id, "Rated");

    assert!(matches!(
        db.add_review(roadmap.id, reviewer.id, 0, None).unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        db.add_review(roadmap.id, reviewer.id, 6, None).unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        db.add_review(roadmap.id, owner.id, 4, None).unwrap_err(),
        Error::Validation(_)
    ));

    db.add_review(roadmap.id, reviewer.id, 4, Some("solid")).unwrap();
    assert!(matches!(
        db.add_review(roadmap.id, reviewer.id, 5, None).unwrap_err(),
        Error::Conflict(_)
    ));

    let reviews = db.list_reviews(roadmap.id).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating, 4);
    assert_eq!(
        reviews[0].reviewer.as_ref().map(|r| r.username.as_str()),
        Some("reviewer")
    );
}

// =============================================================================
// Explore feed
// =============================================================================

#[test]
fn test_explore_lists_public_only_with_stats() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let reviewer = make_user(&db, "reviewer");

    let public = make_roadmap(&db, owner.id, "Public Map");
    db.create_roadmap(owner.id, "Private Map", None, None, false, &[])
        .unwrap();

    db.record_view(public.id).unwrap();
    db.record_view(public.id).unwrap();
    db.add_review(public.id, reviewer.id, 4, None).unwrap();

    let feed = db.explore_roadmaps().unwrap();
    assert_eq!(feed.len(), 1);
    let entry = &feed[0];
    assert_eq!(entry.title, "Public Map");
    assert_eq!(entry.author.username, "owner");
    assert_eq!(entry.stats.views, 2);
    assert_eq!(entry.stats.reviews, 1);
    assert!((entry.stats.avg_rating - 4.0).abs() < f64::EPSILON);
}

#[test]
fn test_facets_follow_public_filter() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");

    db.create_roadmap(
        owner.id,
        "Rust 101",
        None,
        Some("programming"),
        true,
        &["rust".to_string(), "beginner".to_string()],
    )
    .unwrap();
    db.create_roadmap(
        owner.id,
        "Secret",
        None,
        Some("programming"),
        false,
        &["rust".to_string()],
    )
    .unwrap();

    let categories = db.category_facets().unwrap();
    let programming = categories
        .iter()
        .find(|c| c.name == "programming")
        .expect("programming facet");
    // Only the public roadmap counts
    assert_eq!(programming.count, 1);

    let tags = db.tag_facets().unwrap();
    let rust = tags.iter().find(|t| t.name == "rust").expect("rust facet");
    assert_eq!(rust.count, 1);
}

#[test]
fn test_private_detail_hidden_from_non_owners() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let stranger = make_user(&db, "stranger");
    let private = db
        .create_roadmap(owner.id, "Private", None, None, false, &[])
        .unwrap();

    assert!(matches!(
        db.roadmap_detail(private.id, None).unwrap_err(),
        Error::NotFound
    ));
    assert!(matches!(
        db.roadmap_detail(private.id, Some(stranger.id)).unwrap_err(),
        Error::NotFound
    ));
    db.roadmap_detail(private.id, Some(owner.id)).unwrap();
}

#[test]
fn test_roadmap_patch_semantics() {
    let (_dir, db) = open_db();
    let owner = make_user(&db, "owner");
    let roadmap = db
        .create_roadmap(
            owner.id,
            "Original",
            Some("desc"),
            Some("programming"),
            true,
            &[],
        )
        .unwrap();

    let patch = cartesia::RoadmapPatch {
        is_public: Some(false),
        ..Default::default()
    };
    let updated = db.update_roadmap(roadmap.id, patch).unwrap();
    assert!(!updated.is_public);
    assert_eq!(updated.title, "Original");
    assert_eq!(updated.description.as_deref(), Some("desc"));
    assert_eq!(updated.category.as_deref(), Some("programming"));
}
