use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use spdlog::{debug, info};

use crate::error::StoreError;
use crate::post::Post;
use crate::store::PostStore;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const POST_COLUMNS: &str = "hash, title, slug, created_at, updated_at, excerpt, body";

/// Post store backed by a SQLite database file.
pub struct SqliteStore {
    db_path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteStore {
    /// Bump when the schema changes
    const SCHEMA_VERSION: i32 = 1;

    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|source| StoreError::Open { path: dir.to_path_buf(), source })?;
            }
        }

        let conn = Connection::open(db_path)?;
        info!("Opened post store {}", db_path.display());
        Self::init(Some(db_path.to_path_buf()), conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(None, Connection::open_in_memory()?)
    }

    fn init(db_path: Option<PathBuf>, conn: Connection) -> Result<Self, StoreError> {
        let store = SqliteStore { db_path, conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        let version: i32 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => {
                debug!("Creating post store schema v{}", Self::SCHEMA_VERSION);
                self.conn.execute_batch(
                    "
                    CREATE TABLE IF NOT EXISTS raw (
                        hash TEXT PRIMARY KEY,
                        raw BLOB NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS posts (
                        hash TEXT PRIMARY KEY,
                        title TEXT NOT NULL,
                        slug TEXT NOT NULL UNIQUE,
                        created_at TEXT NOT NULL,
                        updated_at TEXT,
                        excerpt TEXT NOT NULL,
                        body TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
                    ",
                )?;
                self.conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
                Ok(())
            }
            v if v == Self::SCHEMA_VERSION => Ok(()),
            v => Err(StoreError::Corrupt(format!("unsupported schema version {}", v))),
        }
    }

    fn post_from_row(row: &Row) -> rusqlite::Result<(Post, String, Option<String>)> {
        let created: String = row.get(3)?;
        let updated: Option<String> = row.get(4)?;
        let post = Post {
            hash: row.get(0)?,
            title: row.get(1)?,
            slug: row.get(2)?,
            created_at: NaiveDateTime::default(),
            updated_at: None,
            excerpt: row.get(5)?,
            body: row.get(6)?,
            raw: vec![],
            source: None,
        };
        Ok((post, created, updated))
    }

    fn finish_post((mut post, created, updated): (Post, String, Option<String>)) -> Result<Post, StoreError> {
        post.created_at = parse_stored_date(&created)?;
        post.updated_at = match updated {
            Some(updated) => Some(parse_stored_date(&updated)?),
            None => None,
        };
        Ok(post)
    }

    fn query_posts(&self, sql: &str, limit: Option<i64>) -> Result<Vec<Post>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match limit {
            Some(limit) => stmt.query_map(params![limit], Self::post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], Self::post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        rows.into_iter().map(Self::finish_post).collect()
    }

    fn insert_in(tx: &Transaction, post: &Post) -> Result<(), StoreError> {
        let owner: Option<String> = tx
            .query_row("SELECT hash FROM posts WHERE slug = ?1", params![post.slug], |row| row.get(0))
            .optional()?;
        if owner.is_some() {
            return Err(StoreError::SlugTaken(post.slug.clone()));
        }

        tx.execute(
            "INSERT OR REPLACE INTO raw (hash, raw) VALUES (?1, ?2)",
            params![post.hash, post.raw],
        )?;
        tx.execute(
            &format!("INSERT INTO posts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", POST_COLUMNS),
            params![
                post.hash,
                post.title,
                post.slug,
                format_stored_date(&post.created_at),
                post.updated_at.as_ref().map(format_stored_date),
                post.excerpt,
                post.body,
            ],
        )?;
        Ok(())
    }

    fn remove_in(tx: &Transaction, hash: &str) -> Result<(), StoreError> {
        let deleted = tx.execute("DELETE FROM posts WHERE hash = ?1", params![hash])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(hash.to_string()));
        }
        tx.execute("DELETE FROM raw WHERE hash = ?1", params![hash])?;
        Ok(())
    }
}

fn format_stored_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored_date(text: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("bad date {}: {}", text, e)))
}

impl PostStore for SqliteStore {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, StoreError> {
        let row = self.conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE slug = ?1", POST_COLUMNS),
                params![slug],
                Self::post_from_row,
            )
            .optional()?;
        row.map(Self::finish_post).transpose()
    }

    fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        self.query_posts(&format!("SELECT {} FROM posts ORDER BY created_at DESC, slug", POST_COLUMNS), None)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_posts(
            &format!("SELECT {} FROM posts ORDER BY created_at DESC, slug LIMIT ?1", POST_COLUMNS),
            Some(limit),
        )
    }

    fn insert(&mut self, post: &Post) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        Self::insert_in(&tx, post)?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, hash: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        Self::remove_in(&tx, hash)?;
        tx.commit()?;
        Ok(())
    }

    fn replace(&mut self, old_hash: &str, post: &Post) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        Self::remove_in(&tx, old_hash)?;
        Self::insert_in(&tx, post)?;
        tx.commit()?;
        Ok(())
    }

    fn fetch_raw(&self, hash: &str) -> Result<Vec<u8>, StoreError> {
        self.conn
            .query_row("SELECT raw FROM raw WHERE hash = ?1", params![hash], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::MissingRaw(hash.to_string()))
    }
}
