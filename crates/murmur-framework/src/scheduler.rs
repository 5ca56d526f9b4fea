//! Periodic background tasks for plugins.
//!
//! Plugins that poll something (stream status, birthdays, feeds) register a
//! periodic task instead of spawning their own threads. Each tick runs on
//! tokio's blocking pool, so a task may block on I/O without stalling the
//! event loop. All tasks share one [`CancellationToken`];
//! [`Scheduler::shutdown`] cancels it and waits for every task to finish its
//! current tick.
//!
//! ```rust,ignore
//! let scheduler = Scheduler::new();
//! scheduler.spawn_periodic("poll", Duration::from_secs(60), move || {
//!     refresh_streams(&cache);
//! })?;
//! // …later…
//! scheduler.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};

struct Inner {
    token: CancellationToken,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

/// Shared handle to the periodic task set.
///
/// Cloning is cheap; all clones schedule onto and shut down the same set.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Runs `task` every `period`, first after one full period.
    ///
    /// Must be called from within a tokio runtime. Ticks run one at a time
    /// on the blocking pool. A tick that overruns delays the following ones
    /// instead of bursting to catch up, and a tick that panics is logged
    /// without stopping the task.
    pub fn spawn_periodic<F>(
        &self,
        name: impl Into<String>,
        period: Duration,
        task: F,
    ) -> SchedulerResult<()>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod { task: name });
        }
        if self.is_shut_down() {
            return Err(SchedulerError::ShutDown { task: name });
        }
        let handle =
            Handle::try_current().map_err(|_| SchedulerError::NoRuntime { task: name.clone() })?;

        let token = self.inner.token.child_token();
        let task_name = name.clone();
        let task = Arc::new(Mutex::new(task));
        let join = handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let task = Arc::clone(&task);
                let tick = tokio::task::spawn_blocking(move || {
                    let mut run = task.lock();
                    (&mut *run)()
                });
                if let Err(e) = tick.await {
                    warn!(task = %task_name, error = %e, "Periodic tick failed");
                }
            }
            debug!(task = %task_name, "Periodic task stopped");
        });

        debug!(task = %name, period_ms = period.as_millis() as u64, "Periodic task scheduled");
        self.inner.tasks.lock().push((name, join));
        Ok(())
    }

    /// Number of tasks scheduled and not yet joined.
    pub fn len(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`cancel`](Self::cancel) or [`shutdown`](Self::shutdown) ran.
    pub fn is_shut_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Signals every task to stop without waiting for them.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// Cancels every task and waits until all of them have returned.
    pub async fn shutdown(&self) {
        self.cancel();
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        if tasks.is_empty() {
            return;
        }

        let count = tasks.len();
        let results = future::join_all(
            tasks
                .into_iter()
                .map(|(name, join)| async move { (name, join.await) }),
        )
        .await;
        for (name, result) in results {
            if let Err(e) = result {
                warn!(task = %name, error = %e, "Periodic task ended abnormally");
            }
        }
        info!(tasks = count, "Scheduler shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let scheduler = Scheduler::new();
        let (count, task) = counter();
        scheduler
            .spawn_periodic("tick", Duration::from_secs(10), task)
            .unwrap();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_joins() {
        let scheduler = Scheduler::new();
        let (first, task_a) = counter();
        let (second, task_b) = counter();
        scheduler
            .spawn_periodic("a", Duration::from_secs(1), task_a)
            .unwrap();
        scheduler
            .spawn_periodic("b", Duration::from_secs(2), task_b)
            .unwrap();
        assert_eq!(scheduler.len(), 2);

        time::sleep(Duration::from_millis(4500)).await;
        scheduler.shutdown().await;
        assert!(scheduler.is_empty());
        assert!(scheduler.is_shut_down());

        let (a, b) = (first.load(Ordering::SeqCst), second.load(Ordering::SeqCst));
        assert_eq!((a, b), (4, 2));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(first.load(Ordering::SeqCst), a);
        assert_eq!(second.load(Ordering::SeqCst), b);
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown_and_zero_period() {
        let scheduler = Scheduler::new();
        assert_eq!(
            scheduler.spawn_periodic("zero", Duration::ZERO, || {}),
            Err(SchedulerError::ZeroPeriod {
                task: "zero".into()
            })
        );

        scheduler.shutdown().await;
        assert!(matches!(
            scheduler.spawn_periodic("late", Duration::from_secs(1), || {}),
            Err(SchedulerError::ShutDown { .. })
        ));
    }

    #[test]
    fn test_requires_runtime() {
        let scheduler = Scheduler::new();
        assert!(matches!(
            scheduler.spawn_periodic("orphan", Duration::from_secs(1), || {}),
            Err(SchedulerError::NoRuntime { .. })
        ));
    }

    #[tokio::test]
    async fn test_blocking_tick_leaves_event_loop_running() {
        let scheduler = Scheduler::new();
        let started = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&started);
        scheduler
            .spawn_periodic("slow", Duration::from_millis(10), move || {
                s.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(300));
            })
            .unwrap();

        while started.load(Ordering::SeqCst) == 0 {
            time::sleep(Duration::from_millis(1)).await;
        }
        let begin = std::time::Instant::now();
        time::sleep(Duration::from_millis(10)).await;
        assert!(begin.elapsed() < Duration::from_millis(200));

        scheduler.shutdown().await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_keeps_task_alive() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        scheduler
            .spawn_periodic("flaky", Duration::from_secs(1), move || {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first tick fails");
                }
            })
            .unwrap();

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_tasks() {
        let scheduler = Scheduler::new();
        let clone = scheduler.clone();
        let (count, task) = counter();
        clone
            .spawn_periodic("shared", Duration::from_secs(1), task)
            .unwrap();
        assert_eq!(scheduler.len(), 1);

        scheduler.shutdown().await;
        assert!(clone.is_shut_down());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
