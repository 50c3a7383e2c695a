//! Task data types.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::scheduler::cron::CronExpr;

/// One row of the legacy `tasks` table, as the scheduler sees it.
///
/// `is_enable` keeps the source schema's inverted convention: 0 means
/// enabled, anything else disabled. `status` is -1 failed, 0 idle, 1
/// running. `try_times_limit` and `run_way` are carried for schema
/// compatibility but not consumed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    /// Opaque command string, forwarded verbatim to the remote task API.
    pub command: String,
    /// Cron expression (`run_time_regular` column).
    pub run_expr: String,
    pub is_enable: i64,
    pub status: i64,
    /// Page size for the remote drain; 0 falls back to the runner default.
    pub data_count_limit: i64,
    /// Pause between row updates, in microseconds.
    pub run_sleep_micro: i64,
    pub try_times_limit: i64,
    pub run_way: i64,
    pub last_start_time: Option<DateTime<Local>>,
}

/// A task snapshot paired with its compiled cron expression. Produced by
/// the cache on refresh and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CompiledTask {
    pub task: Task,
    pub expr: CronExpr,
}
