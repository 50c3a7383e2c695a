//! Minute-aligned dispatch loop.
//!
//! Every wall-clock minute the dispatcher snapshots the task cache, picks
//! the tasks whose cron matches the fired instant, and launches each one as
//! its own tokio task. Three guards keep a task from overlapping itself:
//! the persisted `status = 1` check, the in-process single-flight lock, and
//! the `mark_running` write that must succeed before anything is spawned.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::scheduler::cache::TaskCache;
use crate::scheduler::lock::TaskLock;
use crate::scheduler::repository::TaskRepository;
use crate::scheduler::runner::TaskRunner;
use crate::scheduler::task::Task;

pub struct Scheduler {
    cache: Arc<TaskCache>,
    repo: Arc<dyn TaskRepository>,
    runner: Arc<dyn TaskRunner>,
    lock: TaskLock,
}

impl Scheduler {
    pub fn new(
        cache: Arc<TaskCache>,
        repo: Arc<dyn TaskRepository>,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            cache,
            repo,
            runner,
            lock: TaskLock::new(),
        }
    }

    /// Start the cache (with its immediate first refresh) and the tick
    /// loop. Returns once both are running; they stop when `cancel` fires.
    pub async fn start(self: &Arc<Self>, cancel: &CancellationToken) {
        self.cache.start(cancel).await;

        let scheduler = Arc::clone(self);
        let token = cancel.clone();
        tokio::spawn(async move {
            scheduler.tick_loop(token).await;
        });
    }

    /// Waits for each minute boundary and dispatches at it. Re-aligning on
    /// every iteration keeps at most one probe per wall-clock minute even
    /// over long uptimes.
    async fn tick_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let wait = until_next_minute(&Local::now());
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dispatch loop stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }
            self.dispatch(Local::now(), &cancel).await;
        }
    }

    /// Evaluate one tick at `now`: filter the snapshot, claim matching
    /// tasks, and spawn their executions. Does not wait for them.
    pub async fn dispatch(self: &Arc<Self>, now: DateTime<Local>, cancel: &CancellationToken) {
        let tasks = self.cache.snapshot().await;
        for compiled in tasks.iter() {
            let task = &compiled.task;
            if task.is_enable != 0 {
                continue;
            }
            // Persisted running state suppresses overlap across restarts;
            // the lock table suppresses it within this process.
            if task.status == 1 {
                continue;
            }
            if !compiled.expr.matches(&now) {
                continue;
            }
            if !self.lock.try_lock(task.id) {
                debug!(task_id = task.id, "execution still in flight, skipping tick");
                continue;
            }
            if let Err(err) = self.repo.mark_running(task.id, now).await {
                error!(task_id = task.id, error = %err, "mark running failed, skipping tick");
                self.lock.unlock(task.id);
                continue;
            }

            info!(task_id = task.id, name = %task.name, "task dispatched");
            let scheduler = Arc::clone(self);
            let task = task.clone();
            let token = cancel.clone();
            tokio::spawn(async move {
                scheduler.execute(task, token).await;
            });
        }
    }

    async fn execute(&self, task: Task, cancel: CancellationToken) {
        match self.runner.run(&task, &cancel).await {
            Ok(()) => {
                if let Err(err) = self.repo.mark_status(task.id, 0).await {
                    error!(task_id = task.id, error = %err, "marking task idle failed");
                }
            }
            Err(err) => {
                error!(task_id = task.id, name = %task.name, error = %err, "task execution failed");
                if let Err(err) = self.repo.mark_status(task.id, -1).await {
                    error!(task_id = task.id, error = %err, "recording failure status failed");
                }
            }
        }
        self.lock.unlock(task.id);
    }
}

/// Time left until the next minute boundary. A call exactly on a boundary
/// waits out the full minute, matching one dispatch per minute.
fn until_next_minute<T: Timelike>(now: &T) -> Duration {
    let into_minute =
        u64::from(now.second()) * 1000 + u64::from(now.nanosecond() / 1_000_000 % 1000);
    Duration::from_millis(60_000 - into_minute.min(59_999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::scheduler::task::Task;

    struct FakeRepo {
        tasks: Mutex<Vec<Task>>,
        fail_mark_running: AtomicBool,
        mark_running_calls: AtomicUsize,
        status_tx: mpsc::UnboundedSender<(i64, i64)>,
    }

    impl FakeRepo {
        fn new(tasks: Vec<Task>) -> (Arc<Self>, mpsc::UnboundedReceiver<(i64, i64)>) {
            let (status_tx, status_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    tasks: Mutex::new(tasks),
                    fail_mark_running: AtomicBool::new(false),
                    mark_running_calls: AtomicUsize::new(0),
                    status_tx,
                }),
                status_rx,
            )
        }
    }

    #[async_trait]
    impl TaskRepository for FakeRepo {
        async fn load_enabled_tasks(&self) -> Result<Vec<Task>> {
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn mark_running(&self, _id: i64, _at: DateTime<Local>) -> Result<()> {
            self.mark_running_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_mark_running.load(Ordering::SeqCst) {
                bail!("backend unavailable");
            }
            Ok(())
        }

        async fn mark_status(&self, id: i64, status: i64) -> Result<()> {
            let _ = self.status_tx.send((id, status));
            Ok(())
        }
    }

    struct FakeRunner {
        fail: bool,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl TaskRunner for FakeRunner {
        async fn run(&self, _task: &Task, _cancel: &CancellationToken) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("remote said no");
            }
            Ok(())
        }
    }

    fn task(id: i64) -> Task {
        Task {
            id,
            name: format!("task-{id}"),
            command: format!("cmd-{id}"),
            run_expr: "* * * * * *".to_string(),
            is_enable: 0,
            status: 0,
            data_count_limit: 0,
            run_sleep_micro: 0,
            try_times_limit: 0,
            run_way: 0,
            last_start_time: None,
        }
    }

    async fn scheduler_with(
        tasks: Vec<Task>,
        fail_runner: bool,
    ) -> (
        Arc<Scheduler>,
        Arc<FakeRepo>,
        Arc<FakeRunner>,
        mpsc::UnboundedReceiver<(i64, i64)>,
    ) {
        let (repo, status_rx) = FakeRepo::new(tasks);
        let runner = Arc::new(FakeRunner {
            fail: fail_runner,
            runs: AtomicUsize::new(0),
        });
        let cache = Arc::new(TaskCache::new(
            Arc::clone(&repo) as Arc<dyn TaskRepository>,
            Duration::from_secs(60),
        ));
        cache.refresh().await;
        let scheduler = Arc::new(Scheduler::new(
            cache,
            Arc::clone(&repo) as Arc<dyn TaskRepository>,
            Arc::clone(&runner) as Arc<dyn TaskRunner>,
        ));
        (scheduler, repo, runner, status_rx)
    }

    async fn next_status(rx: &mut mpsc::UnboundedReceiver<(i64, i64)>) -> (i64, i64) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("status update within 1s")
            .expect("status channel open")
    }

    /// The unlock happens just after the status write; poll briefly.
    async fn assert_unlocked(scheduler: &Scheduler, id: i64) {
        for _ in 0..100 {
            if scheduler.lock.try_lock(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("lock for task {id} never released");
    }

    #[tokio::test]
    async fn matching_task_runs_and_marks_idle() {
        let (scheduler, repo, runner, mut status_rx) = scheduler_with(vec![task(1)], false).await;
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;

        assert_eq!(next_status(&mut status_rx).await, (1, 0));
        assert_eq!(repo.mark_running_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
        assert_unlocked(&scheduler, 1).await;
    }

    #[tokio::test]
    async fn failed_run_marks_status_failed() {
        let (scheduler, _repo, _runner, mut status_rx) = scheduler_with(vec![task(1)], true).await;
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;

        assert_eq!(next_status(&mut status_rx).await, (1, -1));
        assert_unlocked(&scheduler, 1).await;
    }

    #[tokio::test]
    async fn persisted_running_status_suppresses_overlap() {
        let mut running = task(1);
        running.status = 1;
        let (scheduler, repo, runner, _status_rx) = scheduler_with(vec![running], false).await;
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(repo.mark_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_task_never_dispatched() {
        let mut disabled = task(1);
        disabled.is_enable = 1;
        let (scheduler, repo, runner, _status_rx) = scheduler_with(vec![disabled], false).await;
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(repo.mark_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_matching_cron_skipped() {
        let mut off_schedule = task(1);
        // Fires only in one specific minute of 2000; never "now".
        off_schedule.run_expr = "2000 1 1 * 0 0".to_string();
        let (scheduler, repo, runner, _status_rx) =
            scheduler_with(vec![off_schedule], false).await;
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(repo.mark_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn held_lock_skips_the_tick() {
        let (scheduler, repo, runner, _status_rx) = scheduler_with(vec![task(1)], false).await;
        let cancel = CancellationToken::new();

        assert!(scheduler.lock.try_lock(1));
        scheduler.dispatch(Local::now(), &cancel).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(repo.mark_running_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mark_running_failure_releases_lock() {
        let (scheduler, repo, runner, _status_rx) = scheduler_with(vec![task(1)], false).await;
        repo.fail_mark_running.store(true, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        scheduler.dispatch(Local::now(), &cancel).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
        assert!(scheduler.lock.try_lock(1));
    }

    #[test]
    fn until_next_minute_reaches_the_boundary() {
        let t = Local.with_ymd_and_hms(2026, 8, 2, 10, 30, 12).unwrap();
        assert_eq!(until_next_minute(&t), Duration::from_millis(48_000));

        let boundary = Local.with_ymd_and_hms(2026, 8, 2, 10, 30, 0).unwrap();
        assert_eq!(until_next_minute(&boundary), Duration::from_millis(60_000));

        let last = Local.with_ymd_and_hms(2026, 8, 2, 10, 30, 59).unwrap();
        assert_eq!(until_next_minute(&last), Duration::from_millis(1_000));
    }
}
