use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::engine;
use crate::models::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A confession as read from storage, tagged with whether any of its
/// sub-lists had a legacy shape and was discarded by the repair guard.
/// The emptied lists only reach disk through the next mutation's
/// write-back, mirroring the original lazy-migration behavior.
#[derive(Debug)]
pub struct LoadedConfession {
    pub confession: Confession,
    pub repaired: bool,
}

/// Thread-safe SQLite store. All access serializes on the connection
/// mutex, so each confession's read-modify-write cycle is atomic with
/// respect to other writers on the same row.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                google_id TEXT UNIQUE,
                custom_user_id TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                username TEXT NOT NULL,
                anonymous_name TEXT DEFAULT '',
                password_hash TEXT,
                picture TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS confessions (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                secret_code_hash TEXT NOT NULL,
                author_id TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT 'Anonymous',
                category TEXT NOT NULL DEFAULT 'General',
                reactions TEXT NOT NULL DEFAULT '[]',
                saved_by TEXT NOT NULL DEFAULT '[]',
                comments TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_confessions_created_at ON confessions(created_at);
            CREATE INDEX IF NOT EXISTS idx_confessions_author_id ON confessions(author_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Confession Operations ====================

    pub fn create_confession(&self, confession: &mut Confession) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        confession.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        confession.created_at = now;
        confession.updated_at = now;

        let reactions_json = serde_json::to_string(&confession.reactions)?;
        let saved_by_json = serde_json::to_string(&confession.saved_by)?;
        let comments_json = serde_json::to_string(&confession.comments)?;

        conn.execute(
            r#"INSERT INTO confessions (id, text, secret_code_hash, author_id, display_name,
                category, reactions, saved_by, comments, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                &confession.id,
                &confession.text,
                &confession.secret_code_hash,
                &confession.author_id,
                &confession.display_name,
                &confession.category,
                &reactions_json,
                &saved_by_json,
                &comments_json,
                confession.created_at.to_rfc3339(),
                confession.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Loads a confession, running the schema-repair guards over its list
    /// columns. The returned tag tells the caller whether any legacy shape
    /// was discarded during the load.
    pub fn load_confession(&self, id: &str) -> StoreResult<LoadedConfession> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM confessions WHERE id = ?1",
            params![id],
            |row| self.row_to_confession(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("Confession {}", id))
            }
            _ => StoreError::Database(e),
        })
    }

    /// Lists confessions newest first. Repair tags are dropped here: read
    /// paths serve the normalized view without writing anything back.
    pub fn list_confessions(&self, limit: i64, offset: i64) -> StoreResult<Vec<Confession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM confessions ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, offset], |row| self.row_to_confession(row))?;

        let mut confessions = Vec::new();
        for row in rows {
            confessions.push(row?.confession);
        }
        Ok(confessions)
    }

    /// Writes back a confession's text and all three list columns. This is
    /// the single write-back point for every mutation, so a repair
    /// performed during load persists with whatever operation follows it.
    pub fn update_confession(&self, confession: &mut Confession) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        confession.updated_at = Utc::now();

        let reactions_json = serde_json::to_string(&confession.reactions)?;
        let saved_by_json = serde_json::to_string(&confession.saved_by)?;
        let comments_json = serde_json::to_string(&confession.comments)?;

        let rows = conn.execute(
            r#"UPDATE confessions SET text = ?1, reactions = ?2, saved_by = ?3,
               comments = ?4, updated_at = ?5 WHERE id = ?6"#,
            params![
                &confession.text,
                &reactions_json,
                &saved_by_json,
                &comments_json,
                confession.updated_at.to_rfc3339(),
                &confession.id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(format!("Confession {}", confession.id)));
        }
        Ok(())
    }

    pub fn delete_confession(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM confessions WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("Confession {}", id)));
        }
        Ok(())
    }

    fn row_to_confession(&self, row: &rusqlite::Row) -> rusqlite::Result<LoadedConfession> {
        let reactions_raw: String = row.get("reactions")?;
        let saved_by_raw: String = row.get("saved_by")?;
        let comments_raw: String = row.get("comments")?;

        let reactions = engine::load_reactions(&reactions_raw);
        let reactions_repaired = reactions.was_repaired();
        let (saved_by, saved_by_repaired) = engine::load_saved_by(&saved_by_raw);
        let (comments, comments_repaired) = engine::load_comments(&comments_raw);

        Ok(LoadedConfession {
            confession: Confession {
                id: row.get("id")?,
                text: row.get("text")?,
                secret_code_hash: row.get("secret_code_hash")?,
                author_id: row.get("author_id")?,
                display_name: row.get("display_name")?,
                category: row.get("category")?,
                reactions: reactions.into_reactions(),
                saved_by,
                comments,
                created_at: parse_datetime(row.get::<_, String>("created_at")?),
                updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
            },
            repaired: reactions_repaired || saved_by_repaired || comments_repaired,
        })
    }

    // ==================== User Operations ====================

    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        user.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;

        conn.execute(
            r#"INSERT INTO users (id, google_id, custom_user_id, email, username,
                anonymous_name, password_hash, picture, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                &user.id,
                &user.google_id,
                &user.custom_user_id,
                &user.email,
                &user.username,
                &user.anonymous_name,
                &user.password_hash,
                &user.picture,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_user_by_google_id(&self, google_id: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE google_id = ?1",
            params![google_id],
            |row| self.row_to_user(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("User {}", google_id))
            }
            _ => StoreError::Database(e),
        })
    }

    /// Looks up a user by any external identity: google id, generated
    /// custom id, or row id.
    pub fn get_user_by_external_id(&self, external_id: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE google_id = ?1 OR custom_user_id = ?1 OR id = ?1",
            params![external_id],
            |row| self.row_to_user(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound(format!("User {}", external_id))
            }
            _ => StoreError::Database(e),
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            |row| self.row_to_user(row),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("User {}", email)),
            _ => StoreError::Database(e),
        })
    }

    /// First-sign-in upsert keyed on the google id, run as a single
    /// statement so two concurrent syncs for a new account cannot race
    /// past each other. When the google id already has a row, the
    /// candidate's generated identity is discarded and only the
    /// provider-owned fields (email, username) refresh.
    pub fn sync_google_user(&self, user: &mut User) -> StoreResult<User> {
        user.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        let google_id = user.google_id.clone().unwrap_or_default();

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                r#"INSERT INTO users (id, google_id, custom_user_id, email, username,
                    anonymous_name, password_hash, picture, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                   ON CONFLICT(google_id) DO UPDATE SET
                       email = excluded.email,
                       username = excluded.username,
                       updated_at = excluded.updated_at"#,
                params![
                    &user.id,
                    &user.google_id,
                    &user.custom_user_id,
                    &user.email,
                    &user.username,
                    &user.anonymous_name,
                    &user.password_hash,
                    &user.picture,
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )?;
        }
        self.get_user_by_google_id(&google_id)
    }

    pub fn update_anonymous_name(&self, external_id: &str, name: &str) -> StoreResult<User> {
        {
            let conn = self.conn.lock().unwrap();
            let rows = conn.execute(
                r#"UPDATE users SET anonymous_name = ?1, updated_at = ?2
                   WHERE google_id = ?3 OR custom_user_id = ?3 OR id = ?3"#,
                params![name, Utc::now().to_rfc3339(), external_id],
            )?;
            if rows == 0 {
                return Err(StoreError::NotFound(format!("User {}", external_id)));
            }
        }
        self.get_user_by_external_id(external_id)
    }

    fn row_to_user(&self, row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            google_id: row.get("google_id")?,
            custom_user_id: row.get("custom_user_id")?,
            email: row.get("email")?,
            username: row.get("username")?,
            anonymous_name: row.get("anonymous_name")?,
            password_hash: row.get("password_hash")?,
            picture: row.get("picture")?,
            created_at: parse_datetime(row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
        })
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
