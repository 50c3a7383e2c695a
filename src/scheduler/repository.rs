//! Task repository port and its SQLite implementation.
//!
//! The scheduler core depends only on the [`TaskRepository`] trait; the
//! SQLite backend speaks the legacy `tasks` table layout so existing rows
//! keep working unchanged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rusqlite::{params, Connection};
use std::path::Path;
use tokio::sync::Mutex;

use crate::scheduler::task::Task;

/// Storage format of `last_start_time`.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All rows with `is_enable = 0`. Ordering is unspecified.
    async fn load_enabled_tasks(&self) -> Result<Vec<Task>>;

    /// Set `status = 1` and `last_start_time` for one row. A missing id is
    /// a no-op, not an error.
    async fn mark_running(&self, id: i64, started_at: DateTime<Local>) -> Result<()>;

    /// Set `status` for one row; the dispatcher only writes 0 or -1 here.
    async fn mark_status(&self, id: i64, status: i64) -> Result<()>;
}

/// Opens (creating if needed) the task database and ensures the schema
/// exists. Shared with the admin web store.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("opening task database {}", path.display()))?;
    // The scheduler and the admin UI may hold connections to the same file.
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .context("setting busy timeout")?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            task TEXT NOT NULL DEFAULT '',
            run_time TEXT NOT NULL DEFAULT '',
            run_time_regular TEXT NOT NULL DEFAULT '',
            data_count_limit INTEGER NOT NULL DEFAULT 0,
            run_sleep_micro_second INTEGER NOT NULL DEFAULT 0,
            try_times_limit INTEGER NOT NULL DEFAULT 0,
            runWay INTEGER NOT NULL DEFAULT 0,
            status INTEGER NOT NULL DEFAULT 0,
            is_enable INTEGER NOT NULL DEFAULT 0,
            description TEXT NOT NULL DEFAULT '',
            last_start_time TEXT
        );
        "#,
    )
    .context("creating tasks table")?;
    Ok(conn)
}

pub struct SqliteTaskRepository {
    conn: Mutex<Connection>,
}

impl SqliteTaskRepository {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn load_enabled_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, task, run_time_regular, is_enable, status, \
                 data_count_limit, run_sleep_micro_second, try_times_limit, runWay, \
                 last_start_time \
                 FROM tasks WHERE is_enable = 0",
            )
            .context("preparing task query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Task {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    command: row.get(2)?,
                    run_expr: row.get(3)?,
                    is_enable: row.get(4)?,
                    status: row.get(5)?,
                    data_count_limit: row.get(6)?,
                    run_sleep_micro: row.get(7)?,
                    try_times_limit: row.get(8)?,
                    run_way: row.get(9)?,
                    last_start_time: parse_time(row.get::<_, Option<String>>(10)?),
                })
            })
            .context("querying enabled tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("reading task row")?);
        }
        Ok(tasks)
    }

    async fn mark_running(&self, id: i64, started_at: DateTime<Local>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE tasks SET status = 1, last_start_time = ?1 WHERE id = ?2",
            params![started_at.format(TIME_FORMAT).to_string(), id],
        )
        .with_context(|| format!("marking task {id} running"))?;
        Ok(())
    }

    async fn mark_status(&self, id: i64, status: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status, id],
        )
        .with_context(|| format!("marking task {id} status {status}"))?;
        Ok(())
    }
}

/// Lenient timestamp parse: anything unreadable loads as None.
fn parse_time(value: Option<String>) -> Option<DateTime<Local>> {
    let text = value?;
    let naive = NaiveDateTime::parse_from_str(text.trim(), TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}
