//! Task table access for the admin UI.
//!
//! The admin surface reads and writes the same `tasks` table the scheduler
//! polls, but through its own connection and row shape (it also exposes
//! the `description` column the scheduler never looks at).

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

use crate::scheduler::cron::CronExpr;
use crate::scheduler::repository::open_database;

/// One task row as the admin API presents it. Field names match the
/// legacy JSON contract.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub id: i64,
    pub name: String,
    pub command: String,
    pub run_expr: String,
    pub status: i64,
    pub is_enable: i64,
    pub data_count_limit: i64,
    pub run_sleep_micro_second: i64,
    pub try_times_limit: i64,
    pub run_way: i64,
    pub description: String,
    /// `%Y-%m-%d %H:%M:%S`, or empty when the task never ran.
    pub last_start_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub run_expr: String,
    #[serde(default)]
    pub data_count_limit: i64,
    #[serde(default)]
    pub run_sleep_micro_second: i64,
    #[serde(default)]
    pub try_times_limit: i64,
    #[serde(default)]
    pub run_way: i64,
    #[serde(default)]
    pub description: String,
}

impl CreateTaskRequest {
    /// Rejects blank required fields and cron expressions that would be
    /// dropped by the scheduler's next refresh anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name must not be empty".into());
        }
        if self.command.trim().is_empty() {
            return Err("command must not be empty".into());
        }
        if self.run_expr.trim().is_empty() {
            return Err("cron expression must not be empty".into());
        }
        if let Err(err) = CronExpr::parse(self.run_expr.trim()) {
            return Err(format!("invalid cron expression: {err}"));
        }
        Ok(())
    }
}

pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    /// All rows, newest first.
    pub async fn list_tasks(&self) -> Result<Vec<TaskEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, task, run_time_regular, status, is_enable, \
                 data_count_limit, run_sleep_micro_second, try_times_limit, runWay, \
                 description, last_start_time \
                 FROM tasks ORDER BY id DESC",
            )
            .context("preparing task listing")?;
        let rows = stmt
            .query_map([], entry_from_row)
            .context("querying tasks")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("reading task row")?);
        }
        Ok(entries)
    }

    /// Insert a new row: idle, enabled, never started.
    pub async fn create_task(&self, req: &CreateTaskRequest) -> Result<TaskEntry> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO tasks \
             (name, task, run_time, run_time_regular, data_count_limit, \
              run_sleep_micro_second, try_times_limit, runWay, status, is_enable, description) \
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8)",
            params![
                req.name.trim(),
                req.command.trim(),
                req.run_expr.trim(),
                req.data_count_limit,
                req.run_sleep_micro_second,
                req.try_times_limit,
                req.run_way,
                req.description.trim(),
            ],
        )
        .context("inserting task")?;
        let id = conn.last_insert_rowid();
        Ok(TaskEntry {
            id,
            name: req.name.trim().to_string(),
            command: req.command.trim().to_string(),
            run_expr: req.run_expr.trim().to_string(),
            status: 0,
            is_enable: 0,
            data_count_limit: req.data_count_limit,
            run_sleep_micro_second: req.run_sleep_micro_second,
            try_times_limit: req.try_times_limit,
            run_way: req.run_way,
            description: req.description.trim().to_string(),
            last_start_time: String::new(),
        })
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TaskEntry> {
    Ok(TaskEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        command: row.get(2)?,
        run_expr: row.get(3)?,
        status: row.get(4)?,
        is_enable: row.get(5)?,
        data_count_limit: row.get(6)?,
        run_sleep_micro_second: row.get(7)?,
        try_times_limit: row.get(8)?,
        run_way: row.get(9)?,
        description: row.get(10)?,
        last_start_time: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
    })
}
