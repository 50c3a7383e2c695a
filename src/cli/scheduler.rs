//! Scheduler command - run the cron dispatch daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::logging;
use crate::scheduler::{
    HttpTaskRunner, Scheduler, SqliteTaskRepository, TaskCache, TaskRepository, TaskRunner,
};

pub async fn cmd_scheduler(base: Option<String>, db: Option<PathBuf>) -> Result<()> {
    logging::init_logging();
    let settings = Settings::from_env();

    let base_url = base
        .filter(|s| !s.trim().is_empty())
        .or(settings.base_url)
        .context("TASK_API_BASE_URL must be set via env or --base")?;
    let db_path = db.unwrap_or(settings.db_path);

    let repo: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::open(&db_path)?);
    let cache = Arc::new(TaskCache::new(Arc::clone(&repo), settings.cache_refresh));
    let runner: Arc<dyn TaskRunner> =
        Arc::new(HttpTaskRunner::new(&base_url, settings.http_timeout)?);
    let scheduler = Arc::new(Scheduler::new(cache, repo, runner));

    let cancel = CancellationToken::new();
    scheduler.start(&cancel).await;
    info!(
        base_url = %base_url,
        db = %db_path.display(),
        "scheduler running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();
    Ok(())
}
