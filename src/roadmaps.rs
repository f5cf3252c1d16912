//! Roadmap lifecycle operations
//!
//! Create, update, delete, fork, review, and the visit counter. A roadmap
//! owns its nodes and connections; deleting one removes every dependent
//! row in the same transaction. Forking copies the graph under a new
//! owner with connection endpoints remapped through an old-to-new id map.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewConnection, NewNode, NewNodeResource, NewReview, NewRoadmap, Review, Roadmap};
use crate::schema::{
    categories, connections, nodes, progress, resources, reviews, roadmap_categories,
    roadmap_tags, roadmap_views, roadmaps, tags,
};
use diesel::prelude::*;
use std::collections::HashMap;

/// Fields a roadmap update may carry. Absent fields keep their prior value.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct RoadmapPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

fn last_insert_id(conn: &mut crate::db::DbConn) -> QueryResult<i32> {
    diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
        .first(conn)
}

/// Find-or-create a category row by name, returning its id
fn category_id(conn: &mut crate::db::DbConn, name: &str) -> QueryResult<i32> {
    diesel::insert_or_ignore_into(categories::table)
        .values(categories::name.eq(name))
        .execute(conn)?;
    categories::table
        .filter(categories::name.eq(name))
        .select(categories::id)
        .first(conn)
}

/// Find-or-create a tag row by name, returning its id
fn tag_id(conn: &mut crate::db::DbConn, name: &str) -> QueryResult<i32> {
    diesel::insert_or_ignore_into(tags::table)
        .values(tags::name.eq(name))
        .execute(conn)?;
    tags::table
        .filter(tags::name.eq(name))
        .select(tags::id)
        .first(conn)
}

impl Database {
    // ========================================================================
    // Roadmap CRUD
    // ========================================================================

    /// Create a roadmap. The category and tag names are linked into the
    /// facet tables through find-or-create, all in one transaction.
    pub fn create_roadmap(
        &self,
        author_id: i32,
        title: &str,
        description: Option<&str>,
        category: Option<&str>,
        is_public: bool,
        tag_names: &[String],
    ) -> Result<Roadmap> {
        if title.trim().is_empty() {
            return Err(Error::Validation("Roadmap title is required".to_string()));
        }

        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        let id = conn.transaction::<_, Error, _>(|conn| {
            let new_roadmap = NewRoadmap {
                title,
                description,
                category,
                author_id,
                is_public,
                forked_from: None,
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(roadmaps::table)
                .values(&new_roadmap)
                .execute(conn)?;
            let roadmap_id = last_insert_id(conn)?;

            if let Some(name) = category {
                let cid = category_id(conn, name)?;
                diesel::insert_or_ignore_into(roadmap_categories::table)
                    .values((
                        roadmap_categories::roadmap_id.eq(roadmap_id),
                        roadmap_categories::category_id.eq(cid),
                    ))
                    .execute(conn)?;
            }

            for name in tag_names {
                let tid = tag_id(conn, name)?;
                diesel::insert_or_ignore_into(roadmap_tags::table)
                    .values((
                        roadmap_tags::roadmap_id.eq(roadmap_id),
                        roadmap_tags::tag_id.eq(tid),
                    ))
                    .execute(conn)?;
            }

            Ok(roadmap_id)
        })?;

        self.get_roadmap(id)
    }

    /// Fetch a roadmap by id
    pub fn get_roadmap(&self, roadmap_id: i32) -> Result<Roadmap> {
        let mut conn = self.conn()?;
        let roadmap = roadmaps::table
            .filter(roadmaps::id.eq(roadmap_id))
            .first(&mut conn)?;
        Ok(roadmap)
    }

    /// Apply a partial update to a roadmap. A changed category is also
    /// re-linked in the facet table.
    pub fn update_roadmap(&self, roadmap_id: i32, patch: RoadmapPatch) -> Result<Roadmap> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("Roadmap title is required".to_string()));
            }
        }

        let mut conn = self.conn()?;
        let current: Roadmap = roadmaps::table
            .filter(roadmaps::id.eq(roadmap_id))
            .first(&mut conn)?;

        let now = chrono::Utc::now().to_rfc3339();
        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.or(current.description);
        let category_changed = patch.category.is_some();
        let category = patch.category.or(current.category);
        let is_public = patch.is_public.unwrap_or(current.is_public);

        conn.transaction::<_, Error, _>(|conn| {
            diesel::update(roadmaps::table.filter(roadmaps::id.eq(roadmap_id)))
                .set((
                    roadmaps::title.eq(title.as_str()),
                    roadmaps::description.eq(description.as_deref()),
                    roadmaps::category.eq(category.as_deref()),
                    roadmaps::is_public.eq(is_public),
                    roadmaps::updated_at.eq(&now),
                ))
                .execute(conn)?;

            if category_changed {
                diesel::delete(
                    roadmap_categories::table
                        .filter(roadmap_categories::roadmap_id.eq(roadmap_id)),
                )
                .execute(conn)?;
                if let Some(name) = &category {
                    let cid = category_id(conn, name)?;
                    diesel::insert_or_ignore_into(roadmap_categories::table)
                        .values((
                            roadmap_categories::roadmap_id.eq(roadmap_id),
                            roadmap_categories::category_id.eq(cid),
                        ))
                        .execute(conn)?;
                }
            }
            Ok(())
        })?;

        self.get_roadmap(roadmap_id)
    }

    /// Delete a roadmap and every dependent row in one transaction, in
    /// dependency order. Zero rows at the final step rolls everything
    /// back and reports NotFound.
    pub fn delete_roadmap(&self, roadmap_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            let node_ids: Vec<i32> = nodes::table
                .filter(nodes::roadmap_id.eq(roadmap_id))
                .select(nodes::id)
                .load(conn)?;

            diesel::delete(progress::table.filter(progress::node_id.eq_any(&node_ids)))
                .execute(conn)?;
            diesel::delete(resources::table.filter(resources::node_id.eq_any(&node_ids)))
                .execute(conn)?;
            diesel::delete(
                connections::table.filter(connections::roadmap_id.eq(roadmap_id)),
            )
            .execute(conn)?;
            diesel::delete(nodes::table.filter(nodes::roadmap_id.eq(roadmap_id)))
                .execute(conn)?;
            diesel::delete(reviews::table.filter(reviews::roadmap_id.eq(roadmap_id)))
                .execute(conn)?;
            diesel::delete(
                roadmap_views::table.filter(roadmap_views::roadmap_id.eq(roadmap_id)),
            )
            .execute(conn)?;
            diesel::delete(
                roadmap_categories::table
                    .filter(roadmap_categories::roadmap_id.eq(roadmap_id)),
            )
            .execute(conn)?;
            diesel::delete(roadmap_tags::table.filter(roadmap_tags::roadmap_id.eq(roadmap_id)))
                .execute(conn)?;

            let deleted =
                diesel::delete(roadmaps::table.filter(roadmaps::id.eq(roadmap_id)))
                    .execute(conn)?;
            if deleted == 0 {
                return Err(Error::NotFound);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Fork
    // ========================================================================

    /// Duplicate a roadmap under a new owner. Copies the roadmap row
    /// (forked_from set, private by default), all nodes, all connections
    /// remapped through the old-to-new node id map, and node resources.
    /// Per-user progress and reviews are not copied. The source must be
    /// public or owned by the caller.
    pub fn fork_roadmap(&self, source_id: i32, new_owner_id: i32) -> Result<Roadmap> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        let source: Roadmap = roadmaps::table
            .filter(roadmaps::id.eq(source_id))
            .first(&mut conn)?;
        if !source.is_public && source.author_id != new_owner_id {
            return Err(Error::Forbidden);
        }

        let fork_id = conn.transaction::<_, Error, _>(|conn| {
            let new_roadmap = NewRoadmap {
                title: &source.title,
                description: source.description.as_deref(),
                category: source.category.as_deref(),
                author_id: new_owner_id,
                is_public: false,
                forked_from: Some(source.id),
                created_at: &now,
                updated_at: &now,
            };
            diesel::insert_into(roadmaps::table)
                .values(&new_roadmap)
                .execute(conn)?;
            let fork_id = last_insert_id(conn)?;

            let source_nodes: Vec<crate::models::Node> = nodes::table
                .filter(nodes::roadmap_id.eq(source_id))
                .order(nodes::id.asc())
                .load(conn)?;

            let mut id_map: HashMap<i32, i32> = HashMap::new();
            for node in &source_nodes {
                let new_node = NewNode {
                    roadmap_id: fork_id,
                    title: &node.title,
                    description: node.description.as_deref(),
                    node_type: &node.node_type,
                    position_x: node.position_x,
                    position_y: node.position_y,
                    status: &node.status,
                    color: node.color.as_deref(),
                    created_at: &now,
                    updated_at: &now,
                };
                diesel::insert_into(nodes::table)
                    .values(&new_node)
                    .execute(conn)?;
                id_map.insert(node.id, last_insert_id(conn)?);
            }

            let source_connections: Vec<crate::models::Connection> = connections::table
                .filter(connections::roadmap_id.eq(source_id))
                .load(conn)?;
            for edge in &source_connections {
                // Both endpoints are in the map: connections cannot
                // reference nodes outside their roadmap.
                let (Some(&from), Some(&to)) = (
                    id_map.get(&edge.from_node_id),
                    id_map.get(&edge.to_node_id),
                ) else {
                    continue;
                };
                let new_edge = NewConnection {
                    roadmap_id: fork_id,
                    from_node_id: from,
                    to_node_id: to,
                    connection_type: &edge.connection_type,
                    created_at: &now,
                    updated_at: &now,
                };
                diesel::insert_into(connections::table)
                    .values(&new_edge)
                    .execute(conn)?;
            }

            let source_resources: Vec<crate::models::NodeResource> = resources::table
                .filter(resources::node_id.eq_any(id_map.keys().copied().collect::<Vec<_>>()))
                .load(conn)?;
            for res in &source_resources {
                let Some(&new_node_id) = id_map.get(&res.node_id) else {
                    continue;
                };
                let new_resource = NewNodeResource {
                    node_id: new_node_id,
                    resource_type: &res.resource_type,
                    title: &res.title,
                    url: &res.url,
                    description: res.description.as_deref(),
                    created_at: &now,
                    updated_at: &now,
                };
                diesel::insert_into(resources::table)
                    .values(&new_resource)
                    .execute(conn)?;
            }

            Ok(fork_id)
        })?;

        self.get_roadmap(fork_id)
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    /// Add a review. Rating must be 1-5; one review per (roadmap, user);
    /// reviewing your own roadmap is rejected.
    pub fn add_review(
        &self,
        roadmap_id: i32,
        user_id: i32,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Review> {
        if !(1..=5).contains(&rating) {
            return Err(Error::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let mut conn = self.conn()?;

        let author_id: i32 = roadmaps::table
            .filter(roadmaps::id.eq(roadmap_id))
            .select(roadmaps::author_id)
            .first(&mut conn)?;
        if author_id == user_id {
            return Err(Error::Validation(
                "You cannot review your own roadmap".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let new_review = NewReview {
            roadmap_id,
            user_id,
            rating,
            comment,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(reviews::table)
            .values(&new_review)
            .execute(&mut conn)
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => {
                    Error::Conflict("You have already reviewed this roadmap".to_string())
                }
                other => other,
            })?;
        let id = last_insert_id(&mut conn)?;

        let review = reviews::table
            .filter(reviews::id.eq(id))
            .first(&mut conn)?;
        Ok(review)
    }

    // ========================================================================
    // Visit Counter
    // ========================================================================

    /// Append a visit row for the explore-feed view count
    pub fn record_view(&self, roadmap_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();
        diesel::insert_into(roadmap_views::table)
            .values((
                roadmap_views::roadmap_id.eq(roadmap_id),
                roadmap_views::viewed_at.eq(&now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}
