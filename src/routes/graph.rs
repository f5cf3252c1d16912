//! Graph editor endpoints: nodes, connections, resources, progress
//!
//! Every mutating route runs the ownership gate first; the resolved
//! context carries the user and roadmap ids downstream. Progress updates
//! only need authentication - learners track progress on roadmaps they
//! do not own.

use crate::error::Result;
use crate::graph::NodePatch;
use crate::models::{ConnectionType, NodeStatus, NodeType, Position};
use crate::server::{App, Reply, RequestCtx};
use serde::Deserialize;

#[derive(Deserialize)]
struct CreateNodeRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    node_type: NodeType,
    #[serde(default)]
    position_x: f64,
    #[serde(default)]
    position_y: f64,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Deserialize)]
struct NodePositionUpdate {
    node_id: i32,
    position_x: f64,
    position_y: f64,
}

#[derive(Deserialize)]
struct CreateConnectionRequest {
    from_node_id: i32,
    to_node_id: i32,
    connection_type: ConnectionType,
}

#[derive(Deserialize)]
struct AddResourceRequest {
    resource_type: String,
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ProgressRequest {
    status: NodeStatus,
    #[serde(default)]
    notes: Option<String>,
}

/// POST /api/roadmaps/:id/nodes
pub fn create_node(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let req: CreateNodeRequest = ctx.parse_body()?;

    let node = app.db.create_node(
        owner.roadmap_id,
        &req.title,
        req.description.as_deref(),
        req.node_type,
        Position {
            x: req.position_x,
            y: req.position_y,
        },
        req.color.as_deref(),
    )?;
    Reply::json(201, node)
}

/// PUT /api/roadmaps/:id/nodes/:node_id
pub fn update_node(app: &App, ctx: &RequestCtx, roadmap_id: i32, node_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let patch: NodePatch = ctx.parse_body()?;

    let node = app.db.update_node(owner.roadmap_id, node_id, patch)?;
    Reply::json(200, node)
}

/// DELETE /api/roadmaps/:id/nodes/:node_id
pub fn delete_node(app: &App, ctx: &RequestCtx, roadmap_id: i32, node_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    app.db.delete_node(owner.roadmap_id, node_id)?;
    Reply::json(200, serde_json::json!({ "deleted": node_id }))
}

/// PUT /api/roadmaps/:id/nodes/positions
pub fn update_positions(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let updates: Vec<NodePositionUpdate> = ctx.parse_body()?;

    let positions: Vec<(i32, f64, f64)> = updates
        .iter()
        .map(|u| (u.node_id, u.position_x, u.position_y))
        .collect();
    app.db.update_node_positions(owner.roadmap_id, &positions)?;
    Reply::json(200, serde_json::json!({ "updated": positions.len() }))
}

/// POST /api/roadmaps/:id/connections
pub fn create_connection(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let req: CreateConnectionRequest = ctx.parse_body()?;

    let connection = app.db.create_connection(
        owner.roadmap_id,
        req.from_node_id,
        req.to_node_id,
        req.connection_type,
    )?;
    Reply::json(201, connection)
}

/// DELETE /api/roadmaps/:id/connections/:conn_id
pub fn delete_connection(
    app: &App,
    ctx: &RequestCtx,
    roadmap_id: i32,
    connection_id: i32,
) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    app.db.delete_connection(owner.roadmap_id, connection_id)?;
    Reply::json(200, serde_json::json!({ "deleted": connection_id }))
}

/// POST /api/roadmaps/:id/nodes/:node_id/resources
pub fn add_resource(app: &App, ctx: &RequestCtx, roadmap_id: i32, node_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let req: AddResourceRequest = ctx.parse_body()?;

    let resource = app.db.add_node_resource(
        owner.roadmap_id,
        node_id,
        &req.resource_type,
        &req.title,
        &req.url,
        req.description.as_deref(),
    )?;
    Reply::json(201, resource)
}

/// GET /api/roadmaps/:id/nodes/:node_id/resources
pub fn list_resources(app: &App, roadmap_id: i32, node_id: i32) -> Result<Reply> {
    let resources = app.db.list_node_resources(roadmap_id, node_id)?;
    Reply::json(200, resources)
}

/// POST /api/roadmaps/:id/nodes/:node_id/progress
pub fn update_progress(
    app: &App,
    ctx: &RequestCtx,
    roadmap_id: i32,
    node_id: i32,
) -> Result<Reply> {
    let user_id = app.gate.require_auth(ctx.auth_header)?;
    let req: ProgressRequest = ctx.parse_body()?;

    let record = app.db.update_progress(
        user_id,
        roadmap_id,
        node_id,
        req.status,
        req.notes.as_deref(),
    )?;
    Reply::json(200, record)
}
