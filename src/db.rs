//! SQLite database with Diesel ORM
//!
//! Stores users, roadmaps, and the node graph. The schema is created
//! idempotently at open time. `Database` wraps an r2d2 pool and is `Clone`;
//! services receive it at construction time - there is no global handle.

use crate::error::{Error, Result};
use crate::models::{NewUser, User};
use crate::schema::*;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::path::Path;

pub(crate) type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub(crate) type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if necessary) the database at the given path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        Self::open_url(&path.to_string_lossy())
    }

    /// Open from a database URL / path string
    pub fn open_url(url: &str) -> Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> Result<DbConn> {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.conn()?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                google_id TEXT UNIQUE,
                avatar_url TEXT,
                bio TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS roadmaps (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT,
                author_id INTEGER NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 0,
                forked_from INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                roadmap_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                node_type TEXT NOT NULL,
                position_x REAL NOT NULL DEFAULT 0,
                position_y REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'not_started',
                color TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                roadmap_id INTEGER NOT NULL,
                from_node_id INTEGER NOT NULL,
                to_node_id INTEGER NOT NULL,
                connection_type TEXT NOT NULL DEFAULT 'default',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id),
                FOREIGN KEY (from_node_id) REFERENCES nodes(id),
                FOREIGN KEY (to_node_id) REFERENCES nodes(id),
                UNIQUE(roadmap_id, from_node_id, to_node_id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                node_id INTEGER NOT NULL,
                resource_type TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (node_id) REFERENCES nodes(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                user_id INTEGER NOT NULL,
                node_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started',
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (node_id) REFERENCES nodes(id),
                UNIQUE(user_id, node_id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                roadmap_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                rating INTEGER NOT NULL,
                comment TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                UNIQUE(roadmap_id, user_id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS roadmap_categories (
                roadmap_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (roadmap_id, category_id),
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id),
                FOREIGN KEY (category_id) REFERENCES categories(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS roadmap_tags (
                roadmap_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (roadmap_id, tag_id),
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id),
                FOREIGN KEY (tag_id) REFERENCES tags(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS roadmap_views (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                roadmap_id INTEGER NOT NULL,
                viewed_at TEXT NOT NULL,
                FOREIGN KEY (roadmap_id) REFERENCES roadmaps(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        // Indexes for the hot lookups
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_roadmaps_author ON roadmaps(author_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_roadmaps_public ON roadmaps(is_public)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_nodes_roadmap ON nodes(roadmap_id)")
            .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_roadmap ON connections(roadmap_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_from ON connections(from_node_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_connections_to ON connections(to_node_id)",
        )
        .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_resources_node ON resources(node_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_progress_node ON progress(node_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_reviews_roadmap ON reviews(roadmap_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_views_roadmap ON roadmap_views(roadmap_id)")
            .execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a password-credentialed user. The caller validates the fields
    /// and hashes the password first.
    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        let new_user = NewUser {
            username,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            avatar_url: None,
            bio: None,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(&mut conn)
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => {
                    Error::Conflict("Username or email already exists".to_string())
                }
                other => other,
            })?;

        let id: i32 =
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
                .first(&mut conn)?;

        self.get_user(id)
    }

    /// Fetch a user by id
    pub fn get_user(&self, user_id: i32) -> Result<User> {
        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::id.eq(user_id))
            .first::<User>(&mut conn)?;
        Ok(user)
    }

    /// Fetch a user by email. Absence maps to NotFound; login callers
    /// collapse that into InvalidCredentials themselves.
    pub fn find_user_by_email(&self, email: &str) -> Result<User> {
        let mut conn = self.conn()?;
        let user = users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)?;
        Ok(user)
    }

    /// Find a user by external identity, or by email (linking the identity),
    /// or create a fresh account with no password credential.
    pub fn find_or_create_google_user(
        &self,
        google_id: &str,
        email: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        if let Some(user) = users::table
            .filter(users::google_id.eq(google_id))
            .first::<User>(&mut conn)
            .optional()?
        {
            return Ok(user);
        }

        // Existing password account with the same email gets the identity
        // linked rather than a duplicate account.
        if let Some(user) = users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()?
        {
            diesel::update(users::table.filter(users::id.eq(user.id)))
                .set((
                    users::google_id.eq(Some(google_id)),
                    users::updated_at.eq(&now),
                ))
                .execute(&mut conn)?;
            return self.get_user(user.id);
        }

        let new_user = NewUser {
            username,
            email,
            password_hash: None,
            google_id: Some(google_id),
            avatar_url,
            bio: None,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(&mut conn)?;

        let id: i32 =
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
                .first(&mut conn)?;

        self.get_user(id)
    }
}
