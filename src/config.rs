//! Environment-driven settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::runner::DEFAULT_HTTP_TIMEOUT;

const DEFAULT_CACHE_REFRESH: Duration = Duration::from_secs(10);
const DEFAULT_DB_PATH: &str = "tasks.db";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the remote task API (`TASK_API_BASE_URL`). Required for
    /// the scheduler command; the CLI can override it.
    pub base_url: Option<String>,
    /// Per-request HTTP timeout (`TASK_HTTP_TIMEOUT_SECOND`, default 30).
    pub http_timeout: Duration,
    /// Task cache refresh interval (`TASK_CACHE_REFRESH_SECOND`, default 10).
    pub cache_refresh: Duration,
    /// SQLite database path (`TASK_DB_PATH`, default `tasks.db`).
    pub db_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("TASK_API_BASE_URL"),
            http_timeout: env_seconds("TASK_HTTP_TIMEOUT_SECOND", DEFAULT_HTTP_TIMEOUT),
            cache_refresh: env_seconds("TASK_CACHE_REFRESH_SECOND", DEFAULT_CACHE_REFRESH),
            db_path: env_string("TASK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-positive and unparsable values coerce to the default.
fn env_seconds(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|&secs| secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or(default)
}
