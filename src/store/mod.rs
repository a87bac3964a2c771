//! SQLite store - system of record for users, tasks and the completion log
//!
//! Uses WAL mode so the API's read paths (stats, task lists, the streak
//! grid) can run concurrently with a writer without blocking it. Writes for
//! a given user are serialized by taking an immediate transaction in the
//! Day Processor; the completion log's `UNIQUE(user_id, task_id, day)`
//! index backs the at-most-one-entry-per-day invariant at the storage
//! level as well.
//!
//! # Architecture
//!
//! ```text
//! HTTP API handlers
//!     │
//!     ├──→ Store reads (r2d2 pool, snapshot reads under WAL)
//!     │
//!     └──→ DayProcessor
//!             │
//!             └──→ BEGIN IMMEDIATE ──→ row helpers (this module) ──→ COMMIT
//! ```

use std::path::Path;

use chrono::{NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::EngineError;
use crate::models::{LogEntry, Task, TaskKind, User};

/// Fields accepted by a task update; `None` leaves the column untouched
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub kind: Option<TaskKind>,
    pub base_xp: Option<i64>,
    pub required_daily: Option<bool>,
}

/// Pooled SQLite store
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (or create) the database at `db_path` and run migrations.
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder().max_size(4).build(manager)?;

        let conn = pool.get()?;
        init_schema(&conn)?;

        tracing::info!("Store opened (SQLite: {})", db_path.display());
        Ok(Self { pool })
    }

    /// In-memory store for tests. Pool size 1: every connection in an
    /// r2d2 memory pool is a separate database, so there must be only one.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Self {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        init_schema(&pool.get().unwrap()).unwrap();
        Self { pool }
    }

    /// Check out a pooled connection
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, EngineError> {
        Ok(self.pool.get()?)
    }

    // ── Users ────────────────────────────────────────────────────────────

    /// Create a user with seeded leveling state, or return the existing row
    /// if the username is already registered.
    pub fn create_user(&self, username: &str) -> Result<User, EngineError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(EngineError::Validation("username must not be empty".into()));
        }

        let conn = self.conn()?;
        if let Some(existing) = get_user_by_username(&conn, username)? {
            return Ok(existing);
        }

        // Seed: level 1, zero XP into it, zero streak, never processed
        conn.execute(
            "INSERT INTO users (username, created_at, current_level, xp_into_level, streak_days, last_processed_day)
             VALUES (?1, ?2, 1, 0, 0, NULL)",
            params![username, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        get_user(&conn, id)?.ok_or_else(|| EngineError::Storage("user row vanished after insert".into()))
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>, EngineError> {
        let conn = self.conn()?;
        get_user(&conn, user_id)
    }

    // ── Task registry ────────────────────────────────────────────────────

    pub fn create_task(
        &self,
        user_id: i64,
        name: &str,
        kind: TaskKind,
        base_xp: i64,
        required_daily: bool,
    ) -> Result<Task, EngineError> {
        validate_task_fields(name, base_xp)?;

        let conn = self.conn()?;
        if get_user(&conn, user_id)?.is_none() {
            return Err(EngineError::NotFound(format!("user {}", user_id)));
        }

        let task = insert_task(&conn, user_id, name.trim(), kind, base_xp, required_daily)?;
        tracing::debug!("Created task {} ({:?}) for user {}", task.id, kind, user_id);
        Ok(task)
    }

    /// Tasks for a user in stable insertion order
    pub fn list_tasks(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Task>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, kind, base_xp, required_daily, created_at
             FROM tasks WHERE user_id = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        )?;
        let tasks = stmt
            .query_map(params![user_id, limit, offset], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Update display fields and XP value. Historical log rows keep their
    /// frozen snapshot, so XP edits never rewrite awarded totals.
    pub fn update_task(&self, task_id: i64, update: TaskUpdate) -> Result<Task, EngineError> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(EngineError::Validation("task name must not be empty".into()));
            }
        }
        if let Some(xp) = update.base_xp {
            if xp <= 0 {
                return Err(EngineError::Validation("base_xp must be > 0".into()));
            }
        }

        let conn = self.conn()?;
        let current = find_task(&conn, task_id)?
            .ok_or_else(|| EngineError::NotFound(format!("task {}", task_id)))?;

        let name = update.name.map(|n| n.trim().to_string()).unwrap_or(current.name);
        let kind = update.kind.unwrap_or(current.kind);
        let base_xp = update.base_xp.unwrap_or(current.base_xp);
        let required_daily = update.required_daily.unwrap_or(current.required_daily);

        conn.execute(
            "UPDATE tasks SET name = ?1, kind = ?2, base_xp = ?3, required_daily = ?4 WHERE id = ?5",
            params![name, kind.as_str(), base_xp, required_daily as i64, task_id],
        )?;

        find_task(&conn, task_id)?.ok_or_else(|| EngineError::NotFound(format!("task {}", task_id)))
    }

    /// Remove a task from future day-processing. Log history is untouched:
    /// entries carry their own snapshot, not a cascading foreign key.
    pub fn delete_task(&self, task_id: i64) -> Result<(), EngineError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        if deleted == 0 {
            return Err(EngineError::NotFound(format!("task {}", task_id)));
        }
        Ok(())
    }

    // ── Completion log ───────────────────────────────────────────────────

    /// Log entries most-recent-first, for the task-log view
    pub fn list_logs(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<LogEntry>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, task_id, task_name, day, xp_awarded, counted_streak, created_at
             FROM completion_log WHERE user_id = ?1
             ORDER BY day DESC, id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let logs = stmt
            .query_map(params![user_id, limit, offset], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    /// Every log entry for a user, oldest first. Input for rebuilding the
    /// activity map from the system of record.
    pub fn all_logs(&self, user_id: i64) -> Result<Vec<LogEntry>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, task_id, task_name, day, xp_awarded, counted_streak, created_at
             FROM completion_log WHERE user_id = ?1 ORDER BY day, id",
        )?;
        let logs = stmt
            .query_map(params![user_id], log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// Initialize pragmas, then apply versioned migrations.
///
/// Migrations are idempotent: if the process dies between a DDL statement
/// and the version bump, the next startup retries safely.
pub(crate) fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // Performance settings (always applied)
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA busy_timeout=5000;
        "#,
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(
                (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
                0
            )",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }

    Ok(())
}

/// Initial schema (v1)
fn apply_schema_v1(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        -- Metadata table (created first for version tracking)
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        -- User stats: leveling and streak state, mutated only by the
        -- Day Processor. The next-level threshold is derived, not stored.
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL,
            current_level INTEGER NOT NULL DEFAULT 1,
            xp_into_level INTEGER NOT NULL DEFAULT 0,
            streak_days INTEGER NOT NULL DEFAULT 0,
            last_processed_day TEXT  -- YYYY-MM-DD, NULL until first processing
        );

        -- Task registry
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,             -- 'small' | 'medium' | 'large'
            base_xp INTEGER NOT NULL,
            required_daily INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);

        -- Completion log: append-only, one row per (user, task, day).
        -- task_name and xp_awarded are frozen at award time; no foreign
        -- key on task_id so deletes never cascade into history.
        CREATE TABLE IF NOT EXISTS completion_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            task_id INTEGER NOT NULL,
            task_name TEXT NOT NULL,
            day TEXT NOT NULL,              -- YYYY-MM-DD
            xp_awarded INTEGER NOT NULL,
            counted_streak INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, task_id, day)
        );
        CREATE INDEX IF NOT EXISTS idx_log_user_day ON completion_log(user_id, day);

        -- Set initial version
        INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
        "#,
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
//
// Free functions over &Connection so the Day Processor can reuse them
// inside its immediate transaction.
// ─────────────────────────────────────────────────────────────────────────────

fn day_from_sql(idx: usize, s: String) -> rusqlite::Result<NaiveDate> {
    s.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn kind_from_sql(idx: usize, s: String) -> rusqlite::Result<TaskKind> {
    TaskKind::parse(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown task kind '{}'", s).into(),
        )
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let last: Option<String> = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
        current_level: row.get(3)?,
        xp_into_level: row.get(4)?,
        streak_days: row.get(5)?,
        last_processed_day: last.map(|s| day_from_sql(6, s)).transpose()?,
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let kind: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        kind: kind_from_sql(3, kind)?,
        base_xp: row.get(4)?,
        required_daily: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

fn log_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let day: String = row.get(4)?;
    Ok(LogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_id: row.get(2)?,
        task_name: row.get(3)?,
        day: day_from_sql(4, day)?,
        xp_awarded: row.get(5)?,
        counted_streak: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}

fn validate_task_fields(name: &str, base_xp: i64) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation("task name must not be empty".into()));
    }
    if base_xp <= 0 {
        return Err(EngineError::Validation("base_xp must be > 0".into()));
    }
    Ok(())
}

pub(crate) fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, EngineError> {
    let user = conn
        .query_row(
            "SELECT id, username, created_at, current_level, xp_into_level, streak_days, last_processed_day
             FROM users WHERE id = ?1",
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, EngineError> {
    let user = conn
        .query_row(
            "SELECT id, username, created_at, current_level, xp_into_level, streak_days, last_processed_day
             FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn find_task(conn: &Connection, task_id: i64) -> Result<Option<Task>, EngineError> {
    let task = conn
        .query_row(
            "SELECT id, user_id, name, kind, base_xp, required_daily, created_at
             FROM tasks WHERE id = ?1",
            params![task_id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

pub(crate) fn find_task_by_name(
    conn: &Connection,
    user_id: i64,
    name: &str,
) -> Result<Option<Task>, EngineError> {
    let task = conn
        .query_row(
            "SELECT id, user_id, name, kind, base_xp, required_daily, created_at
             FROM tasks WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

pub(crate) fn insert_task(
    conn: &Connection,
    user_id: i64,
    name: &str,
    kind: TaskKind,
    base_xp: i64,
    required_daily: bool,
) -> Result<Task, EngineError> {
    conn.execute(
        "INSERT INTO tasks (user_id, name, kind, base_xp, required_daily, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            name,
            kind.as_str(),
            base_xp,
            required_daily as i64,
            Utc::now().to_rfc3339()
        ],
    )?;
    let id = conn.last_insert_rowid();
    find_task(conn, id)?.ok_or_else(|| EngineError::Storage("task row vanished after insert".into()))
}

pub(crate) fn log_exists(
    conn: &Connection,
    user_id: i64,
    task_id: i64,
    day: NaiveDate,
) -> Result<bool, EngineError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM completion_log WHERE user_id = ?1 AND task_id = ?2 AND day = ?3",
        params![user_id, task_id, day.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn insert_log(
    conn: &Connection,
    user_id: i64,
    task_id: i64,
    task_name: &str,
    day: NaiveDate,
    xp_awarded: i64,
    counted_streak: bool,
) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO completion_log (user_id, task_id, task_name, day, xp_awarded, counted_streak, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            task_id,
            task_name,
            day.to_string(),
            xp_awarded,
            counted_streak as i64,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

pub(crate) fn update_user_stats(
    conn: &Connection,
    user_id: i64,
    current_level: i64,
    xp_into_level: i64,
    streak_days: i64,
    last_processed_day: NaiveDate,
) -> Result<(), EngineError> {
    conn.execute(
        "UPDATE users SET current_level = ?1, xp_into_level = ?2, streak_days = ?3, last_processed_day = ?4
         WHERE id = ?5",
        params![
            current_level,
            xp_into_level,
            streak_days,
            last_processed_day.to_string(),
            user_id
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_init_is_idempotent() {
        let store = Store::open_in_memory();
        let conn = store.conn().unwrap();
        // Re-running must not fail or re-apply v1
        init_schema(&conn).unwrap();
        let version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, "1");
    }

    #[test]
    fn test_create_user_seeds_level_one() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        assert_eq!(user.current_level, 1);
        assert_eq!(user.xp_into_level, 0);
        assert_eq!(user.streak_days, 0);
        assert!(user.last_processed_day.is_none());
    }

    #[test]
    fn test_create_user_is_idempotent_by_username() {
        let store = Store::open_in_memory();
        let a = store.create_user("lena").unwrap();
        let b = store.create_user("lena").unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_create_task_validates_fields() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();

        let err = store
            .create_task(user.id, "  ", TaskKind::Small, 10, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = store
            .create_task(user.id, "run", TaskKind::Small, 0, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_create_task_rejects_unknown_user() {
        let store = Store::open_in_memory();
        let err = store
            .create_task(999, "run", TaskKind::Small, 10, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_list_tasks_insertion_order() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        store.create_task(user.id, "b-task", TaskKind::Small, 10, false).unwrap();
        store.create_task(user.id, "a-task", TaskKind::Large, 30, true).unwrap();

        let tasks = store.list_tasks(user.id, 100, 0).unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b-task", "a-task"]);
    }

    #[test]
    fn test_update_task_unknown_id() {
        let store = Store::open_in_memory();
        let err = store.update_task(42, TaskUpdate::default()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_update_task_does_not_touch_log_history() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        let task = store.create_task(user.id, "run", TaskKind::Medium, 20, true).unwrap();

        let day: NaiveDate = "2025-03-01".parse().unwrap();
        let conn = store.conn().unwrap();
        insert_log(&conn, user.id, task.id, &task.name, day, 20, true).unwrap();
        drop(conn);

        store
            .update_task(
                task.id,
                TaskUpdate {
                    base_xp: Some(999),
                    ..Default::default()
                },
            )
            .unwrap();

        let logs = store.all_logs(user.id).unwrap();
        assert_eq!(logs[0].xp_awarded, 20, "awarded XP must stay frozen");
    }

    #[test]
    fn test_delete_task_keeps_log_snapshot() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        let task = store.create_task(user.id, "run", TaskKind::Medium, 20, true).unwrap();

        let day: NaiveDate = "2025-03-01".parse().unwrap();
        let conn = store.conn().unwrap();
        insert_log(&conn, user.id, task.id, &task.name, day, 20, true).unwrap();
        drop(conn);

        store.delete_task(task.id).unwrap();
        assert!(store.list_tasks(user.id, 100, 0).unwrap().is_empty());

        let logs = store.all_logs(user.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].task_name, "run");
    }

    #[test]
    fn test_log_unique_per_user_task_day() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        let task = store.create_task(user.id, "run", TaskKind::Small, 10, true).unwrap();

        let day: NaiveDate = "2025-03-01".parse().unwrap();
        let conn = store.conn().unwrap();
        insert_log(&conn, user.id, task.id, &task.name, day, 10, true).unwrap();
        assert!(log_exists(&conn, user.id, task.id, day).unwrap());
        // Second insert for the same (user, task, day) trips the UNIQUE index
        assert!(insert_log(&conn, user.id, task.id, &task.name, day, 10, true).is_err());
    }

    #[test]
    fn test_list_logs_most_recent_first() {
        let store = Store::open_in_memory();
        let user = store.create_user("lena").unwrap();
        let task = store.create_task(user.id, "run", TaskKind::Small, 10, true).unwrap();

        let conn = store.conn().unwrap();
        for d in ["2025-03-01", "2025-03-03", "2025-03-02"] {
            insert_log(&conn, user.id, task.id, &task.name, d.parse().unwrap(), 10, true).unwrap();
        }
        drop(conn);

        let logs = store.list_logs(user.id, 100, 0).unwrap();
        let days: Vec<String> = logs.iter().map(|l| l.day.to_string()).collect();
        assert_eq!(days, vec!["2025-03-03", "2025-03-02", "2025-03-01"]);
    }
}
