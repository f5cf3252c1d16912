//! Roadmap lifecycle and public browsing endpoints

use crate::error::Result;
use crate::roadmaps::RoadmapPatch;
use crate::server::{App, Reply, RequestCtx};
use serde::Deserialize;

#[derive(Deserialize)]
struct CreateRoadmapRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ReviewRequest {
    rating: i32,
    #[serde(default)]
    comment: Option<String>,
}

/// GET / and /roadmaps and /roadmaps/explore - the public feed with facets
pub fn explore(app: &App) -> Result<Reply> {
    let roadmaps = app.db.explore_roadmaps()?;
    let categories = app.db.category_facets()?;
    let tags = app.db.tag_facets()?;
    Reply::json(
        200,
        serde_json::json!({
            "roadmaps": roadmaps,
            "filters": { "categories": categories, "tags": tags },
        }),
    )
}

/// POST /roadmaps/create
pub fn create(app: &App, ctx: &RequestCtx) -> Result<Reply> {
    let user_id = app.gate.require_auth(ctx.auth_header)?;
    let req: CreateRoadmapRequest = ctx.parse_body()?;

    let roadmap = app.db.create_roadmap(
        user_id,
        &req.title,
        req.description.as_deref(),
        req.category.as_deref(),
        req.is_public,
        &req.tags,
    )?;
    Reply::json(201, roadmap)
}

/// GET /roadmaps/:id - detail payload; each hit appends a view row
pub fn detail(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    // Best-effort viewer resolution: an invalid token just means an
    // anonymous read, not a 401.
    let viewer = app.gate.require_auth(ctx.auth_header).ok();
    let detail = app.db.roadmap_detail(roadmap_id, viewer)?;

    if let Err(e) = app.db.record_view(roadmap_id) {
        tracing::warn!(roadmap_id, error = %e, "view counter write failed");
    }

    Reply::json(200, detail)
}

/// PUT /roadmaps/:id
pub fn update(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    let patch: RoadmapPatch = ctx.parse_body()?;

    let roadmap = app.db.update_roadmap(owner.roadmap_id, patch)?;
    Reply::json(200, roadmap)
}

/// DELETE /roadmaps/:id - cascades to the whole graph
pub fn delete(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let owner = app.gate.require_owner(ctx.auth_header, roadmap_id)?;
    app.db.delete_roadmap(owner.roadmap_id)?;
    Reply::json(200, serde_json::json!({ "deleted": roadmap_id }))
}

/// POST /roadmaps/:id/fork
pub fn fork(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let user_id = app.gate.require_auth(ctx.auth_header)?;
    let forked = app.db.fork_roadmap(roadmap_id, user_id)?;
    Reply::json(201, forked)
}

/// GET /roadmaps/:id/reviews
pub fn list_reviews(app: &App, roadmap_id: i32) -> Result<Reply> {
    let reviews = app.db.list_reviews(roadmap_id)?;
    Reply::json(200, reviews)
}

/// POST /roadmaps/:id/reviews
pub fn add_review(app: &App, ctx: &RequestCtx, roadmap_id: i32) -> Result<Reply> {
    let user_id = app.gate.require_auth(ctx.auth_header)?;
    let req: ReviewRequest = ctx.parse_body()?;

    let review = app
        .db
        .add_review(roadmap_id, user_id, req.rating, req.comment.as_deref())?;
    Reply::json(201, review)
}
