//! Read-side aggregation
//!
//! The public explore feed (roadmaps joined with author identity and
//! computed stats), category/tag facets, roadmap detail, and resource
//! listings. Reads tolerate individual bad rows: a row that fails
//! conversion is logged and skipped rather than failing the whole
//! listing. That tolerance is a deliberate choice - a single corrupt
//! roadmap must not blank the front page.

use crate::db::Database;
use crate::error::Result;
use crate::models::{Connection, Node, NodeResource, Roadmap};
use crate::schema::{connections, nodes, resources, roadmaps};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable, Text};
use tracing::warn;

/// Fixed explore page size
const EXPLORE_PAGE_SIZE: i64 = 12;

// ============================================================================
// Row helpers for raw aggregate queries
// ============================================================================

#[derive(QueryableByName, Debug)]
struct ExploreRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Text)]
    title: String,
    #[diesel(sql_type = Nullable<Text>)]
    description: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    category: Option<String>,
    #[diesel(sql_type = Text)]
    created_at: String,
    #[diesel(sql_type = Nullable<Integer>)]
    author_id: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    author_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    author_avatar: Option<String>,
    #[diesel(sql_type = BigInt)]
    views_count: i64,
    #[diesel(sql_type = Double)]
    avg_rating: f64,
    #[diesel(sql_type = BigInt)]
    reviews_count: i64,
}

#[derive(QueryableByName, Debug)]
struct FacetRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName, Debug)]
struct ReviewRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Integer)]
    rating: i32,
    #[diesel(sql_type = Nullable<Text>)]
    comment: Option<String>,
    #[diesel(sql_type = Text)]
    created_at: String,
    #[diesel(sql_type = Nullable<Integer>)]
    reviewer_id: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    reviewer_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    reviewer_avatar: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthorInfo {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RoadmapStats {
    pub views: i64,
    pub avg_rating: f64,
    pub reviews: i64,
}

/// One entry of the explore feed
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoadmapSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: AuthorInfo,
    pub stats: RoadmapStats,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FacetCount {
    pub id: i32,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewWithAuthor {
    pub id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: String,
    pub reviewer: Option<AuthorInfo>,
}

/// Full roadmap page payload: graph plus attached resources and reviews
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoadmapDetail {
    pub roadmap: Roadmap,
    pub author: Option<AuthorInfo>,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub resources: Vec<NodeResource>,
    pub reviews: Vec<ReviewWithAuthor>,
}

impl ExploreRow {
    /// A feed row without a resolvable author is malformed; the caller
    /// skips it.
    fn into_summary(self) -> Option<RoadmapSummary> {
        let author = AuthorInfo {
            id: self.author_id?,
            username: self.author_name?,
            avatar_url: self.author_avatar,
        };
        Some(RoadmapSummary {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            author,
            stats: RoadmapStats {
                views: self.views_count,
                avg_rating: self.avg_rating,
                reviews: self.reviews_count,
            },
            created_at: self.created_at,
        })
    }
}

impl Database {
    // ========================================================================
    // Explore Feed
    // ========================================================================

    /// List public roadmaps with author identity and computed stats,
    /// newest first, capped at the fixed page size.
    pub fn explore_roadmaps(&self) -> Result<Vec<RoadmapSummary>> {
        let mut conn = self.conn()?;

        let rows: Vec<ExploreRow> = diesel::sql_query(format!(
            r#"
            SELECT r.id, r.title, r.description, r.category, r.created_at,
                   u.id AS author_id, u.username AS author_name, u.avatar_url AS author_avatar,
                   COALESCE(v.views_count, 0) AS views_count,
                   COALESCE(rv.avg_rating, 0.0) AS avg_rating,
                   COALESCE(rv.reviews_count, 0) AS reviews_count
            FROM roadmaps r
            LEFT JOIN users u ON r.author_id = u.id
            LEFT JOIN (
                SELECT roadmap_id, COUNT(*) AS views_count
                FROM roadmap_views
                GROUP BY roadmap_id
            ) v ON r.id = v.roadmap_id
            LEFT JOIN (
                SELECT roadmap_id,
                       AVG(rating) AS avg_rating,
                       COUNT(*) AS reviews_count
                FROM reviews
                GROUP BY roadmap_id
            ) rv ON r.id = rv.roadmap_id
            WHERE r.is_public = 1
            ORDER BY r.created_at DESC
            LIMIT {}
        "#,
            EXPLORE_PAGE_SIZE
        ))
        .load(&mut conn)?;

        let summaries = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                let summary = row.into_summary();
                if summary.is_none() {
                    warn!(roadmap_id = id, "skipping feed row with no author");
                }
                summary
            })
            .collect();
        Ok(summaries)
    }

    /// Category facet counts over the public-roadmap filter
    pub fn category_facets(&self) -> Result<Vec<FacetCount>> {
        let mut conn = self.conn()?;
        let rows: Vec<FacetRow> = diesel::sql_query(
            r#"
            SELECT c.id, c.name, COUNT(r.id) AS count
            FROM categories c
            LEFT JOIN roadmap_categories rc ON c.id = rc.category_id
            LEFT JOIN roadmaps r ON rc.roadmap_id = r.id AND r.is_public = 1
            GROUP BY c.id, c.name
            ORDER BY count DESC
        "#,
        )
        .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| FacetCount {
                id: r.id,
                name: r.name,
                count: r.count,
            })
            .collect())
    }

    /// Tag facet counts over the public-roadmap filter
    pub fn tag_facets(&self) -> Result<Vec<FacetCount>> {
        let mut conn = self.conn()?;
        let rows: Vec<FacetRow> = diesel::sql_query(
            r#"
            SELECT t.id, t.name, COUNT(r.id) AS count
            FROM tags t
            LEFT JOIN roadmap_tags rt ON t.id = rt.tag_id
            LEFT JOIN roadmaps r ON rt.roadmap_id = r.id AND r.is_public = 1
            GROUP BY t.id, t.name
            ORDER BY count DESC
        "#,
        )
        .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| FacetCount {
                id: r.id,
                name: r.name,
                count: r.count,
            })
            .collect())
    }

    // ========================================================================
    // Roadmap Detail
    // ========================================================================

    /// Load the full roadmap page payload. Private roadmaps are only
    /// visible to their owner; everyone else sees NotFound, not
    /// Forbidden - a private roadmap should not leak its existence.
    pub fn roadmap_detail(&self, roadmap_id: i32, viewer: Option<i32>) -> Result<RoadmapDetail> {
        let roadmap = self.get_roadmap(roadmap_id)?;
        if !roadmap.is_public && viewer != Some(roadmap.author_id) {
            return Err(crate::error::Error::NotFound);
        }

        let mut conn = self.conn()?;

        let author = self
            .get_user(roadmap.author_id)
            .ok()
            .map(|u| AuthorInfo {
                id: u.id,
                username: u.username,
                avatar_url: u.avatar_url,
            });

        let node_rows: Vec<Node> = nodes::table
            .filter(nodes::roadmap_id.eq(roadmap_id))
            .order(nodes::id.asc())
            .load(&mut conn)?;

        let connection_rows: Vec<Connection> = connections::table
            .filter(connections::roadmap_id.eq(roadmap_id))
            .order(connections::id.asc())
            .load(&mut conn)?;

        let node_ids: Vec<i32> = node_rows.iter().map(|n| n.id).collect();
        let resource_rows: Vec<NodeResource> = resources::table
            .filter(resources::node_id.eq_any(&node_ids))
            .order(resources::id.asc())
            .load(&mut conn)?;

        let reviews = self.list_reviews(roadmap_id)?;

        Ok(RoadmapDetail {
            roadmap,
            author,
            nodes: node_rows,
            connections: connection_rows,
            resources: resource_rows,
            reviews,
        })
    }

    /// Reviews of a roadmap with reviewer identity, newest first
    pub fn list_reviews(&self, roadmap_id: i32) -> Result<Vec<ReviewWithAuthor>> {
        let mut conn = self.conn()?;
        let rows: Vec<ReviewRow> = diesel::sql_query(
            r#"
            SELECT rv.id, rv.rating, rv.comment, rv.created_at,
                   u.id AS reviewer_id, u.username AS reviewer_name,
                   u.avatar_url AS reviewer_avatar
            FROM reviews rv
            LEFT JOIN users u ON rv.user_id = u.id
            WHERE rv.roadmap_id = ?
            ORDER BY rv.created_at DESC
        "#,
        )
        .bind::<Integer, _>(roadmap_id)
        .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|r| ReviewWithAuthor {
                id: r.id,
                rating: r.rating,
                comment: r.comment,
                created_at: r.created_at,
                reviewer: match (r.reviewer_id, r.reviewer_name) {
                    (Some(id), Some(username)) => Some(AuthorInfo {
                        id,
                        username,
                        avatar_url: r.reviewer_avatar,
                    }),
                    _ => None,
                },
            })
            .collect())
    }

    /// Resources attached to a node, scoped to the roadmap
    pub fn list_node_resources(&self, roadmap_id: i32, node_id: i32) -> Result<Vec<NodeResource>> {
        let mut conn = self.conn()?;

        let belongs: i64 = nodes::table
            .filter(nodes::id.eq(node_id))
            .filter(nodes::roadmap_id.eq(roadmap_id))
            .count()
            .get_result(&mut conn)?;
        if belongs == 0 {
            return Err(crate::error::Error::NotFound);
        }

        let rows = resources::table
            .filter(resources::node_id.eq(node_id))
            .order(resources::id.asc())
            .load(&mut conn)?;
        Ok(rows)
    }

    /// Roadmaps owned by a user, newest first (profile/dashboard listing)
    pub fn list_roadmaps_by_author(&self, author_id: i32) -> Result<Vec<Roadmap>> {
        let mut conn = self.conn()?;
        let rows = roadmaps::table
            .filter(roadmaps::author_id.eq(author_id))
            .order(roadmaps::created_at.desc())
            .load(&mut conn)?;
        Ok(rows)
    }
}
