//! Graph mutation operations
//!
//! Creates, edits, and deletes nodes, connections, and node resources, and
//! records per-user progress. Every operation is scoped to the roadmap id
//! the ownership gate already authorized - a node id that exists in a
//! different roadmap is indistinguishable from one that does not exist.
//! Multi-row mutations run in a single transaction: they either commit
//! completely or leave no trace.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    ConnectionType, NewConnection, NewNode, NewNodeResource, NewProgressRecord, Node, NodeStatus,
    NodeType, Position, Connection, NodeResource, ProgressRecord,
};
use crate::schema::{connections, nodes, progress, resources};
use diesel::prelude::*;
use diesel::Connection as _;

/// Fields a node update may carry. Absent fields keep their prior value.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct NodePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub node_type: Option<NodeType>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub color: Option<String>,
}

fn last_insert_id(conn: &mut crate::db::DbConn) -> QueryResult<i32> {
    diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
        .first(conn)
}

impl Database {
    // ========================================================================
    // Node Operations
    // ========================================================================

    /// Create a node. Status is forced to `not_started` regardless of
    /// caller input.
    pub fn create_node(
        &self,
        roadmap_id: i32,
        title: &str,
        description: Option<&str>,
        node_type: NodeType,
        position: Position,
        color: Option<&str>,
    ) -> Result<Node> {
        if title.trim().is_empty() {
            return Err(Error::Validation("Node title is required".to_string()));
        }

        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        let new_node = NewNode {
            roadmap_id,
            title,
            description,
            node_type: node_type.as_str(),
            position_x: position.x,
            position_y: position.y,
            status: NodeStatus::NotStarted.as_str(),
            color,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(nodes::table)
            .values(&new_node)
            .execute(&mut conn)?;
        let id = last_insert_id(&mut conn)?;

        let node = nodes::table.filter(nodes::id.eq(id)).first(&mut conn)?;
        Ok(node)
    }

    /// Fetch a node scoped to its roadmap
    pub fn get_node(&self, roadmap_id: i32, node_id: i32) -> Result<Node> {
        let mut conn = self.conn()?;
        let node = nodes::table
            .filter(nodes::id.eq(node_id))
            .filter(nodes::roadmap_id.eq(roadmap_id))
            .first(&mut conn)?;
        Ok(node)
    }

    /// Apply a partial update to a node. Only supplied fields change;
    /// `updated_at` always advances. NotFound when the (node, roadmap)
    /// pair does not exist.
    pub fn update_node(&self, roadmap_id: i32, node_id: i32, patch: NodePatch) -> Result<Node> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("Node title is required".to_string()));
            }
        }

        let mut conn = self.conn()?;
        let current: Node = nodes::table
            .filter(nodes::id.eq(node_id))
            .filter(nodes::roadmap_id.eq(roadmap_id))
            .first(&mut conn)?;

        let now = chrono::Utc::now().to_rfc3339();
        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.or(current.description);
        let node_type = patch
            .node_type
            .map(|t| t.as_str().to_string())
            .unwrap_or(current.node_type);
        let position_x = patch.position_x.unwrap_or(current.position_x);
        let position_y = patch.position_y.unwrap_or(current.position_y);
        let color = patch.color.or(current.color);

        diesel::update(
            nodes::table
                .filter(nodes::id.eq(node_id))
                .filter(nodes::roadmap_id.eq(roadmap_id)),
        )
        .set((
            nodes::title.eq(title.as_str()),
            nodes::description.eq(description.as_deref()),
            nodes::node_type.eq(node_type.as_str()),
            nodes::position_x.eq(position_x),
            nodes::position_y.eq(position_y),
            nodes::color.eq(color.as_deref()),
            nodes::updated_at.eq(&now),
        ))
        .execute(&mut conn)?;

        self.get_node(roadmap_id, node_id)
    }

    /// Delete a node and everything that references it, in one
    /// transaction: connections (either direction), resources, progress,
    /// then the node row. Zero rows at the final step rolls the whole
    /// thing back and reports NotFound - the child deletes never commit.
    pub fn delete_node(&self, roadmap_id: i32, node_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            diesel::delete(
                connections::table
                    .filter(connections::roadmap_id.eq(roadmap_id))
                    .filter(
                        connections::from_node_id
                            .eq(node_id)
                            .or(connections::to_node_id.eq(node_id)),
                    ),
            )
            .execute(conn)?;

            diesel::delete(resources::table.filter(resources::node_id.eq(node_id)))
                .execute(conn)?;

            diesel::delete(progress::table.filter(progress::node_id.eq(node_id)))
                .execute(conn)?;

            let deleted = diesel::delete(
                nodes::table
                    .filter(nodes::id.eq(node_id))
                    .filter(nodes::roadmap_id.eq(roadmap_id)),
            )
            .execute(conn)?;

            if deleted == 0 {
                return Err(Error::NotFound);
            }
            Ok(())
        })
    }

    /// Batch positional update. All pairs share one timestamp and one
    /// transaction; any pair that matches no row aborts the whole batch.
    pub fn update_node_positions(
        &self,
        roadmap_id: i32,
        positions: &[(i32, f64, f64)],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.transaction::<_, Error, _>(|conn| {
            for &(node_id, x, y) in positions {
                let updated = diesel::update(
                    nodes::table
                        .filter(nodes::id.eq(node_id))
                        .filter(nodes::roadmap_id.eq(roadmap_id)),
                )
                .set((
                    nodes::position_x.eq(x),
                    nodes::position_y.eq(y),
                    nodes::updated_at.eq(&now),
                ))
                .execute(conn)?;

                if updated == 0 {
                    return Err(Error::NotFound);
                }
            }
            Ok(())
        })
    }

    // ========================================================================
    // Connection Operations
    // ========================================================================

    /// Create a directed connection between two nodes of the roadmap.
    /// Both endpoints must exist in this roadmap (one COUNT over both ids
    /// must equal 2, which also rules out self-loops). A duplicate ordered
    /// pair is a Conflict.
    pub fn create_connection(
        &self,
        roadmap_id: i32,
        from_node_id: i32,
        to_node_id: i32,
        connection_type: ConnectionType,
    ) -> Result<Connection> {
        if from_node_id == to_node_id {
            return Err(Error::Validation(
                "A node cannot connect to itself".to_string(),
            ));
        }

        let mut conn = self.conn()?;
        let id = conn.transaction::<_, Error, _>(|conn| {
            let endpoint_count: i64 = nodes::table
                .filter(nodes::roadmap_id.eq(roadmap_id))
                .filter(nodes::id.eq_any([from_node_id, to_node_id]))
                .count()
                .get_result(conn)?;

            if endpoint_count != 2 {
                return Err(Error::Validation(
                    "One or both nodes do not exist in this roadmap".to_string(),
                ));
            }

            let existing: i64 = connections::table
                .filter(connections::roadmap_id.eq(roadmap_id))
                .filter(connections::from_node_id.eq(from_node_id))
                .filter(connections::to_node_id.eq(to_node_id))
                .count()
                .get_result(conn)?;

            if existing > 0 {
                return Err(Error::Conflict(
                    "A connection between these nodes already exists".to_string(),
                ));
            }

            let now = chrono::Utc::now().to_rfc3339();
            let new_connection = NewConnection {
                roadmap_id,
                from_node_id,
                to_node_id,
                connection_type: connection_type.as_str(),
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(connections::table)
                .values(&new_connection)
                .execute(conn)?;
            last_insert_id(conn).map_err(Error::from)
        })?;

        let created = connections::table
            .filter(connections::id.eq(id))
            .first(&mut conn)?;
        Ok(created)
    }

    /// Delete a connection scoped to the roadmap. NotFound covers both a
    /// wrong id and a right id in the wrong roadmap.
    pub fn delete_connection(&self, roadmap_id: i32, connection_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            connections::table
                .filter(connections::id.eq(connection_id))
                .filter(connections::roadmap_id.eq(roadmap_id)),
        )
        .execute(&mut conn)?;

        if deleted == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // ========================================================================
    // Resource Operations
    // ========================================================================

    /// Attach an external resource to a node, after verifying the node
    /// belongs to the gated roadmap.
    pub fn add_node_resource(
        &self,
        roadmap_id: i32,
        node_id: i32,
        resource_type: &str,
        title: &str,
        url: &str,
        description: Option<&str>,
    ) -> Result<NodeResource> {
        if resource_type.trim().is_empty() || title.trim().is_empty() || url.trim().is_empty() {
            return Err(Error::Validation(
                "Resource type, title, and url are required".to_string(),
            ));
        }

        let mut conn = self.conn()?;

        let belongs: i64 = nodes::table
            .filter(nodes::id.eq(node_id))
            .filter(nodes::roadmap_id.eq(roadmap_id))
            .count()
            .get_result(&mut conn)?;
        if belongs == 0 {
            return Err(Error::NotFound);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let new_resource = NewNodeResource {
            node_id,
            resource_type,
            title,
            url,
            description,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(resources::table)
            .values(&new_resource)
            .execute(&mut conn)?;
        let id = last_insert_id(&mut conn)?;

        let created = resources::table
            .filter(resources::id.eq(id))
            .first(&mut conn)?;
        Ok(created)
    }

    // ========================================================================
    // Progress Operations
    // ========================================================================

    /// Upsert the caller's progress on a node and reflect the status onto
    /// the node row, in one transaction. One logical record per
    /// (user, node); repeated updates overwrite status and notes.
    pub fn update_progress(
        &self,
        user_id: i32,
        roadmap_id: i32,
        node_id: i32,
        status: NodeStatus,
        notes: Option<&str>,
    ) -> Result<ProgressRecord> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.transaction::<_, Error, _>(|conn| {
            let belongs: i64 = nodes::table
                .filter(nodes::id.eq(node_id))
                .filter(nodes::roadmap_id.eq(roadmap_id))
                .count()
                .get_result(conn)?;
            if belongs == 0 {
                return Err(Error::NotFound);
            }

            let new_record = NewProgressRecord {
                user_id,
                node_id,
                status: status.as_str(),
                notes,
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(progress::table)
                .values(&new_record)
                .on_conflict((progress::user_id, progress::node_id))
                .do_update()
                .set((
                    progress::status.eq(status.as_str()),
                    progress::notes.eq(notes),
                    progress::updated_at.eq(&now),
                ))
                .execute(conn)?;

            diesel::update(nodes::table.filter(nodes::id.eq(node_id)))
                .set((
                    nodes::status.eq(status.as_str()),
                    nodes::updated_at.eq(&now),
                ))
                .execute(conn)?;
            Ok(())
        })?;

        let record = progress::table
            .filter(progress::user_id.eq(user_id))
            .filter(progress::node_id.eq(node_id))
            .first(&mut conn)?;
        Ok(record)
    }

    /// Fetch a user's progress record for a node
    pub fn get_progress(&self, user_id: i32, node_id: i32) -> Result<ProgressRecord> {
        let mut conn = self.conn()?;
        let record = progress::table
            .filter(progress::user_id.eq(user_id))
            .filter(progress::node_id.eq(node_id))
            .first(&mut conn)?;
        Ok(record)
    }
}
