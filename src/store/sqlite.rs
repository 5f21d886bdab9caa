use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{PagefeedError, Result};
use crate::domain::{CacheStatus, HtmlCache};
use crate::store::CacheStore;

const SELECT_COLUMNS: &str =
    "SELECT url, date, cache_control, last_modified, etag, expires, html FROM html_cache";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            PagefeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| PagefeedError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    /// RFC 3339 in UTC with whole seconds, so stored dates sort as text.
    fn timestamp(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn row_to_cache(row: &Row<'_>) -> rusqlite::Result<HtmlCache> {
        Ok(HtmlCache {
            status: CacheStatus::NotModified,
            url: row.get(0)?,
            date: row
                .get::<_, Option<String>>(1)?
                .and_then(|s| Self::parse_datetime(&s)),
            cache_control: row.get(2)?,
            last_modified: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| Self::parse_datetime(&s)),
            etag: row.get(4)?,
            expires: row
                .get::<_, Option<String>>(5)?
                .and_then(|s| Self::parse_datetime(&s)),
            html: row.get(6)?,
        })
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, url: &str) -> Result<HtmlCache> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE url = ?1"),
            params![url],
            Self::row_to_cache,
        )
        .optional()?
        .ok_or_else(|| PagefeedError::NoCacheRecord(url.to_string()))
    }

    fn put(&self, cache: &HtmlCache) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO html_cache (url, date, cache_control, last_modified, etag, expires, html)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(url) DO UPDATE SET
                date = ?2, cache_control = ?3, last_modified = ?4,
                etag = ?5, expires = ?6, html = ?7",
            params![
                cache.url,
                cache.date.as_ref().map(Self::timestamp),
                cache.cache_control,
                cache.last_modified.as_ref().map(Self::timestamp),
                cache.etag,
                cache.expires.as_ref().map(Self::timestamp),
                cache.html,
            ],
        )?;

        Ok(())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;

        let removed = conn.execute(
            "DELETE FROM html_cache WHERE date IS NULL OR date < ?1",
            params![Self::timestamp(&cutoff)],
        )?;

        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM html_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
