//! Compiled-task cache with interval refresh.
//!
//! The cache keeps the last successfully loaded task set, compiled. A load
//! failure keeps the previous snapshot in place (fail-static); a task whose
//! cron does not compile is dropped from that refresh only.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::scheduler::cron::CronExpr;
use crate::scheduler::repository::TaskRepository;
use crate::scheduler::task::CompiledTask;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

pub struct TaskCache {
    repo: Arc<dyn TaskRepository>,
    refresh_interval: Duration,
    tasks: RwLock<Arc<Vec<CompiledTask>>>,
}

impl TaskCache {
    /// A zero refresh interval falls back to the 10 s default.
    pub fn new(repo: Arc<dyn TaskRepository>, refresh_interval: Duration) -> Self {
        let refresh_interval = if refresh_interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            refresh_interval
        };
        Self {
            repo,
            refresh_interval,
            tasks: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Refresh once immediately (so the first dispatch tick sees real
    /// data), then keep refreshing in the background until cancelled.
    pub async fn start(self: &Arc<Self>, cancel: &CancellationToken) {
        self.refresh().await;

        let cache = Arc::clone(self);
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.refresh_interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("task cache refresher stopped");
                        return;
                    }
                    _ = ticker.tick() => cache.refresh().await,
                }
            }
        });
    }

    /// Reload enabled tasks and swap in the newly compiled list. Public so
    /// callers (and tests) can force a refresh outside the interval.
    pub async fn refresh(&self) {
        let tasks = match self.repo.load_enabled_tasks().await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(error = %err, "task load failed, keeping previous snapshot");
                return;
            }
        };

        let mut compiled = Vec::with_capacity(tasks.len());
        for task in tasks {
            match CronExpr::parse(&task.run_expr) {
                Ok(expr) => compiled.push(CompiledTask { task, expr }),
                Err(err) => warn!(
                    task_id = task.id,
                    name = %task.name,
                    expr = %task.run_expr,
                    error = %err,
                    "cron compile failed, task dropped from this refresh"
                ),
            }
        }

        *self.tasks.write().await = Arc::new(compiled);
    }

    /// An immutable snapshot of the current compiled list; safe to iterate
    /// while refreshes continue, and never torn by a concurrent swap.
    pub async fn snapshot(&self) -> Arc<Vec<CompiledTask>> {
        Arc::clone(&*self.tasks.read().await)
    }
}
