//! SQLite profile store
//!
//! One pool per store. Skills are kept as a JSON array column; follow edges
//! live in their own table so both directions can be queried. Partial
//! updates are single UPDATE statements so concurrent writers never
//! overwrite each other.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{ProgressInput, Yapper};

const YAPPER_COLUMNS: &str = "id, name, email, password_hash, skills, active_level, \
     completed_levels, hearts, streak, avatar, created_at, updated_at";

pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    /// Open (or create) the database at `database_url` and ensure the schema
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if database_url.contains(":memory:") {
            // Every in-memory connection is its own database, keep exactly one alive
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.init_db().await?;

        info!("[Store] Profile store ready at {}", database_url);
        Ok(store)
    }

    /// Fresh in-memory store
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS yappers (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                skills TEXT NOT NULL DEFAULT '[]',
                active_level INTEGER NOT NULL DEFAULT 1,
                completed_levels INTEGER NOT NULL DEFAULT 0,
                hearts INTEGER NOT NULL DEFAULT 5,
                streak INTEGER NOT NULL DEFAULT 0,
                avatar TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id TEXT NOT NULL,
                followee_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id),
                FOREIGN KEY (follower_id) REFERENCES yappers(id) ON DELETE CASCADE,
                FOREIGN KEY (followee_id) REFERENCES yappers(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new profile. Name and email must be unique.
    pub async fn create(&self, yapper: Yapper) -> Result<Yapper> {
        let taken: Option<(String, String)> =
            sqlx::query_as("SELECT name, email FROM yappers WHERE name = ? OR email = ?")
                .bind(&yapper.name)
                .bind(&yapper.email)
                .fetch_optional(&self.pool)
                .await?;

        if let Some((name, _)) = taken {
            let field = if name == yapper.name { "name" } else { "email" };
            return Err(Error::Duplicate { field });
        }

        sqlx::query(
            "INSERT INTO yappers (id, name, email, password_hash, skills, active_level, \
             completed_levels, hearts, streak, avatar, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&yapper.id)
        .bind(&yapper.name)
        .bind(&yapper.email)
        .bind(&yapper.password_hash)
        .bind(serde_json::to_string(&yapper.skills)?)
        .bind(yapper.active_level)
        .bind(yapper.completed_levels)
        .bind(yapper.hearts)
        .bind(yapper.streak)
        .bind(&yapper.avatar)
        .bind(yapper.created_at.to_rfc3339())
        .bind(yapper.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(unique_violation)?;

        info!("[Store] Yapper registered: {}", yapper.name);
        Ok(yapper)
    }

    /// Get profile by id
    pub async fn get(&self, id: &str) -> Result<Yapper> {
        let sql = format!("SELECT {YAPPER_COLUMNS} FROM yappers WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?;

        self.hydrate_one(row).await
    }

    /// Look up by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Yapper>> {
        let sql = format!("SELECT {YAPPER_COLUMNS} FROM yappers WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_one(row).await?)),
            None => Ok(None),
        }
    }

    /// List all profiles, oldest first
    pub async fn list(&self) -> Result<Vec<Yapper>> {
        let sql = format!("SELECT {YAPPER_COLUMNS} FROM yappers ORDER BY created_at, name");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        self.hydrate(&rows).await
    }

    /// Fetch several profiles, skipping ids that no longer exist
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<Yapper>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {YAPPER_COLUMNS} FROM yappers WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        // Keep the caller's order
        let mut yappers = self.hydrate(&rows).await?;
        yappers.sort_by_key(|y| ids.iter().position(|id| *id == y.id));
        Ok(yappers)
    }

    /// Apply a partial progress update; unset fields keep their value
    pub async fn update_progress(&self, id: &str, progress: &ProgressInput) -> Result<Yapper> {
        let result = sqlx::query(
            "UPDATE yappers SET \
             active_level = COALESCE(?, active_level), \
             completed_levels = COALESCE(?, completed_levels), \
             hearts = COALESCE(?, hearts), \
             streak = COALESCE(?, streak), \
             updated_at = ? WHERE id = ?",
        )
        .bind(progress.active_level)
        .bind(progress.completed_levels)
        .bind(progress.hearts)
        .bind(progress.streak)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.get(id).await
    }

    pub async fn update_hearts_and_streak(&self, id: &str, hearts: i32, streak: i32) -> Result<Yapper> {
        let progress = ProgressInput {
            hearts: Some(hearts),
            streak: Some(streak),
            ..Default::default()
        };
        self.update_progress(id, &progress).await
    }

    pub async fn update_avatar(&self, id: &str, avatar: &str) -> Result<Yapper> {
        let result = sqlx::query("UPDATE yappers SET avatar = ?, updated_at = ? WHERE id = ?")
            .bind(avatar)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.get(id).await
    }

    /// Add a skill; adding one already present is a no-op
    pub async fn add_skill(&self, id: &str, skill: &str) -> Result<Yapper> {
        sqlx::query(
            "UPDATE yappers SET skills = json_insert(skills, '$[#]', ?), updated_at = ? \
             WHERE id = ? AND NOT EXISTS \
             (SELECT 1 FROM json_each(yappers.skills) WHERE value = ?)",
        )
        .bind(skill)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(skill)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn remove_skill(&self, id: &str, skill: &str) -> Result<Yapper> {
        sqlx::query(
            "UPDATE yappers SET skills = \
             (SELECT json_group_array(value) FROM json_each(yappers.skills) WHERE value != ?), \
             updated_at = ? \
             WHERE id = ? AND EXISTS \
             (SELECT 1 FROM json_each(yappers.skills) WHERE value = ?)",
        )
        .bind(skill)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(skill)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Delete a profile and its follow edges, returning the removed profile
    pub async fn remove(&self, id: &str) -> Result<Yapper> {
        let yapper = self.get(id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM follows WHERE follower_id = ? OR followee_id = ?")
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM yappers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("[Store] Yapper removed: {}", yapper.name);
        Ok(yapper)
    }

    /// Record that `follower_id` follows `followee_id`. Idempotent.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<Yapper> {
        if follower_id == followee_id {
            return Err(Error::Validation("You cannot follow yourself".into()));
        }
        // Both sides must exist
        self.get(followee_id).await?;
        self.get(follower_id).await?;

        sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("[Store] {} follows {}", follower_id, followee_id);
        self.get(follower_id).await
    }

    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<Yapper> {
        self.get(followee_id).await?;

        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await?;

        debug!("[Store] {} unfollowed {}", follower_id, followee_id);
        self.get(follower_id).await
    }

    async fn hydrate_one(&self, row: SqliteRow) -> Result<Yapper> {
        let id: String = row.get("id");
        self.hydrate(std::slice::from_ref(&row))
            .await?
            .pop()
            .ok_or_else(|| not_found(&id))
    }

    /// Map rows and attach their follow edges with one query
    async fn hydrate(&self, rows: &[SqliteRow]) -> Result<Vec<Yapper>> {
        let mut yappers = rows.iter().map(row_to_yapper).collect::<Result<Vec<_>>>()?;
        if yappers.is_empty() {
            return Ok(yappers);
        }

        let marks = placeholders(yappers.len());
        let sql = format!(
            "SELECT follower_id, followee_id FROM follows \
             WHERE follower_id IN ({marks}) OR followee_id IN ({marks}) ORDER BY created_at"
        );
        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for _ in 0..2 {
            for yapper in &yappers {
                query = query.bind(yapper.id.clone());
            }
        }
        let edges = query.fetch_all(&self.pool).await?;

        let index: HashMap<String, usize> = yappers
            .iter()
            .enumerate()
            .map(|(i, y)| (y.id.clone(), i))
            .collect();
        for (follower, followee) in edges {
            if let Some(&i) = index.get(&follower) {
                yappers[i].following_ids.push(followee.clone());
            }
            if let Some(&i) = index.get(&followee) {
                yappers[i].follower_ids.push(follower);
            }
        }
        Ok(yappers)
    }
}

fn row_to_yapper(row: &SqliteRow) -> Result<Yapper> {
    let skills: String = row.get("skills");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Yapper {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        skills: serde_json::from_str(&skills)?,
        active_level: row.get("active_level"),
        completed_levels: row.get("completed_levels"),
        hearts: row.get("hearts"),
        streak: row.get("streak"),
        avatar: row.get("avatar"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        follower_ids: Vec::new(),
        following_ids: Vec::new(),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .map_err(|e| Error::Internal(format!("bad timestamp {raw:?}: {e}")))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn not_found(id: &str) -> Error {
    Error::NotFound {
        entity: "Yapper",
        id: id.to_string(),
    }
}

/// Map a UNIQUE constraint failure to the duplicate-key error
fn unique_violation(err: sqlx::Error) -> Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let field = if db_err.message().contains("yappers.name") {
                "name"
            } else {
                "email"
            };
            return Error::Duplicate { field };
        }
    }
    err.into()
}
