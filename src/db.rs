use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// A cached JSON payload and the RFC 3339 time it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRow {
    pub payload: String,
    pub fetched_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS listings (
                key TEXT PRIMARY KEY,
                episode_ids TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn upsert_episode(&self, id: &str, payload: &str, fetched_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO episodes (id, payload, fetched_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at
            "#,
            params![id, payload, fetched_at],
        )?;
        Ok(())
    }

    pub fn cached_episode(&self, id: &str) -> Result<Option<CacheRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, fetched_at FROM episodes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(CacheRow {
                        payload: row.get(0)?,
                        fetched_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn upsert_listing(&self, key: &str, episode_ids: &str, fetched_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO listings (key, episode_ids, fetched_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                episode_ids = excluded.episode_ids,
                fetched_at = excluded.fetched_at
            "#,
            params![key, episode_ids, fetched_at],
        )?;
        Ok(())
    }

    pub fn cached_listing(&self, key: &str) -> Result<Option<CacheRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT episode_ids, fetched_at FROM listings WHERE key = ?1",
                params![key],
                |row| {
                    Ok(CacheRow {
                        payload: row.get(0)?,
                        fetched_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Drops every cached row, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let episodes = self.conn.execute("DELETE FROM episodes", [])?;
        let listings = self.conn.execute("DELETE FROM listings", [])?;
        Ok(episodes + listings)
    }
}
