//! Debounced, single-flight write queue.
//!
//! ```text
//! Idle --schedule--> Pending --timer fires--> Writing --drained--> Idle
//!                    ^     |                    |
//!                    +-----+ schedule resets     +-- newer job waits in the slot
//! ```
//!
//! - The debounce is trailing: the job is built when the timer fires, so it
//!   carries the state as of that moment.
//! - The slot holds one job. A newer job replaces a queued one and inherits
//!   its waiters.
//! - At most one job runs at a time. Queued jobs start as soon as the
//!   running one finishes, with no second debounce.
//! - A failed or panicking job is logged and counted; the queue moves on.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{KeepError, KeepResult};

/// One write against the backend.
pub type WriteJob = Pin<Box<dyn Future<Output = KeepResult<()>> + Send + 'static>>;

/// Counters describing what the queue has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Calls to [`PersistQueue::schedule`].
    pub scheduled: u64,
    /// Timers reset or queued jobs replaced before they ran.
    pub coalesced: u64,
    /// Jobs that completed successfully.
    pub written: u64,
    /// Jobs that returned an error.
    pub failed: u64,
}

struct Queued {
    job: WriteJob,
    waiters: Vec<oneshot::Sender<()>>,
}

#[derive(Default)]
struct QueueState {
    timer: Option<JoinHandle<()>>,
    generation: u64,
    slot: Option<Queued>,
    in_progress: bool,
    stats: QueueStats,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.timer.is_none() && self.slot.is_none() && !self.in_progress
    }
}

struct Shared {
    label: String,
    handle: Handle,
    debounce: Duration,
    state: Mutex<QueueState>,
    idle: Notify,
}

/// Resolves once the job it was submitted with, or a newer job that
/// replaced it, has finished.
#[must_use = "a Completion does nothing unless awaited"]
pub struct Completion {
    rx: oneshot::Receiver<()>,
}

impl Completion {
    pub async fn wait(self) {
        // A dropped sender means the queue went away; nothing left to wait for.
        let _ = self.rx.await;
    }
}

/// Write queue bound to the tokio runtime it was created on.
#[derive(Clone)]
pub struct PersistQueue {
    shared: Arc<Shared>,
}

impl PersistQueue {
    /// Create a queue on the current tokio runtime.
    ///
    /// `label` names the queue in log output.
    pub fn new(label: impl Into<String>, debounce: Duration) -> KeepResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| KeepError::Config(format!("persist queue needs a tokio runtime: {}", e)))?;
        Ok(Self {
            shared: Arc::new(Shared {
                label: label.into(),
                handle,
                debounce,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        })
    }

    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Restart the debounce timer. When it fires, `build` is called to
    /// produce the job, which then goes through the slot.
    pub fn schedule<F>(&self, build: F)
    where
        F: FnOnce() -> WriteJob + Send + 'static,
    {
        let mut state = self.shared.state.lock().expect("lock poisoned");
        state.stats.scheduled += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
            state.stats.coalesced += 1;
        }
        state.generation += 1;
        let generation = state.generation;

        let shared = Arc::clone(&self.shared);
        let debounce = self.shared.debounce;
        state.timer = Some(self.shared.handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            Shared::fire(&shared, generation, build);
        }));
    }

    /// Drop a pending timer without running it. Returns `true` if one was
    /// pending.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = {
            let mut state = self.shared.state.lock().expect("lock poisoned");
            match state.timer.take() {
                Some(timer) => {
                    timer.abort();
                    state.generation += 1;
                    true
                }
                None => false,
            }
        };
        if cancelled {
            debug!(queue = %self.shared.label, "pending write cancelled");
            self.shared.idle.notify_waiters();
        }
        cancelled
    }

    /// Queue a job immediately, bypassing the debounce.
    pub fn submit(&self, job: WriteJob) -> Completion {
        let (tx, rx) = oneshot::channel();
        Shared::enqueue(&self.shared, job, Some(tx));
        Completion { rx }
    }

    /// Wait until no timer is pending, the slot is empty, and no job runs.
    pub async fn flush(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.is_idle() {
                return;
            }
            idle.await;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.shared.state.lock().expect("lock poisoned").is_idle()
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().expect("lock poisoned").timer.is_some()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.lock().expect("lock poisoned").stats
    }
}

impl Shared {
    fn fire<F>(shared: &Arc<Self>, generation: u64, build: F)
    where
        F: FnOnce() -> WriteJob,
    {
        let job = build();
        let mut state = shared.state.lock().expect("lock poisoned");
        if state.generation != generation {
            return;
        }
        state.timer = None;
        debug!(queue = %shared.label, "debounce elapsed");
        Shared::enqueue_locked(shared, &mut state, job, None);
    }

    fn enqueue(shared: &Arc<Self>, job: WriteJob, waiter: Option<oneshot::Sender<()>>) {
        let mut state = shared.state.lock().expect("lock poisoned");
        Shared::enqueue_locked(shared, &mut state, job, waiter);
    }

    fn enqueue_locked(
        shared: &Arc<Self>,
        state: &mut QueueState,
        job: WriteJob,
        waiter: Option<oneshot::Sender<()>>,
    ) {
        let mut waiters: Vec<_> = waiter.into_iter().collect();
        if let Some(replaced) = state.slot.take() {
            waiters.extend(replaced.waiters);
            state.stats.coalesced += 1;
        }
        state.slot = Some(Queued { job, waiters });

        if !state.in_progress {
            state.in_progress = true;
            let shared = Arc::clone(shared);
            shared.handle.clone().spawn(async move { shared.drain().await });
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock().expect("lock poisoned");
                match state.slot.take() {
                    Some(next) => next,
                    None => {
                        state.in_progress = false;
                        break;
                    }
                }
            };

            // A job runs as its own task so a panic inside it cannot take
            // the drain loop down with `in_progress` still set.
            let outcome = self.handle.spawn(next.job).await;
            {
                let mut state = self.state.lock().expect("lock poisoned");
                match &outcome {
                    Ok(Ok(())) => state.stats.written += 1,
                    _ => state.stats.failed += 1,
                }
            }
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(queue = %self.label, error = %e, "write failed"),
                Err(e) => error!(queue = %self.label, error = %e, "write task panicked"),
            }
            for waiter in next.waiters {
                let _ = waiter.send(());
            }
        }
        self.idle.notify_waiters();
    }
}

impl fmt::Debug for PersistQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistQueue")
            .field("label", &self.shared.label)
            .field("debounce", &self.shared.debounce)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use tokio::time::Instant;

    type Log = Arc<Mutex<Vec<(Instant, i32)>>>;

    fn recording(log: &Log, value: i32) -> WriteJob {
        let log = Arc::clone(log);
        Box::pin(async move {
            log.lock().unwrap().push((Instant::now(), value));
            Ok(())
        })
    }

    fn latest(log: &Log, source: &Arc<AtomicI32>) -> impl FnOnce() -> WriteJob + Send + 'static {
        let log = Arc::clone(log);
        let source = Arc::clone(source);
        move || recording(&log, source.load(Ordering::SeqCst))
    }

    // -----------------------------------------------------------------------
    // Debounce
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_to_one_trailing_write() {
        let queue = PersistQueue::new("test", Duration::from_millis(500)).unwrap();
        let log: Log = Arc::default();
        let value = Arc::new(AtomicI32::new(0));
        let start = Instant::now();

        for (i, v) in [1, 2, 3].into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            value.store(v, Ordering::SeqCst);
            queue.schedule(latest(&log, &value));
        }
        queue.flush().await;

        let writes = log.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, 3);
        assert!(writes[0].0 - start >= Duration::from_millis(520));

        let stats = queue.stats();
        assert_eq!(stats.scheduled, 3);
        assert_eq!(stats.coalesced, 2);
        assert_eq!(stats.written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn job_built_at_fire_time() {
        let queue = PersistQueue::new("test", Duration::from_millis(100)).unwrap();
        let log: Log = Arc::default();
        let value = Arc::new(AtomicI32::new(1));

        queue.schedule(latest(&log, &value));
        value.store(7, Ordering::SeqCst);
        queue.flush().await;

        assert_eq!(log.lock().unwrap()[0].1, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_write_separately() {
        let queue = PersistQueue::new("test", Duration::from_millis(50)).unwrap();
        let log: Log = Arc::default();
        let value = Arc::new(AtomicI32::new(1));

        queue.schedule(latest(&log, &value));
        tokio::time::sleep(Duration::from_millis(200)).await;
        value.store(2, Ordering::SeqCst);
        queue.schedule(latest(&log, &value));
        queue.flush().await;

        let values: Vec<i32> = log.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_write() {
        let queue = PersistQueue::new("test", Duration::from_millis(100)).unwrap();
        let log: Log = Arc::default();
        let value = Arc::new(AtomicI32::new(1));

        queue.schedule(latest(&log, &value));
        assert!(queue.has_pending());
        assert!(queue.cancel_pending());
        assert!(!queue.cancel_pending());
        tokio::time::sleep(Duration::from_millis(500)).await;
        queue.flush().await;

        assert!(log.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Single flight
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn writes_never_overlap() {
        let queue = PersistQueue::new("test", Duration::from_millis(10)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let slow = || -> WriteJob {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            Box::pin(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        };

        let a = queue.submit(slow());
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = queue.submit(slow());
        a.wait().await;
        b.wait().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().written, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_job_is_replaced_and_waiters_carry_over() {
        let queue = PersistQueue::new("test", Duration::from_millis(10)).unwrap();
        let log: Log = Arc::default();

        let gate = Arc::new(Notify::new());
        let blocker: WriteJob = {
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                gate.notified().await;
                Ok(())
            })
        };

        let first = queue.submit(blocker);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = queue.submit(recording(&log, 2));
        let third = queue.submit(recording(&log, 3));
        gate.notify_one();

        second.wait().await;
        third.wait().await;
        first.wait().await;

        let values: Vec<i32> = log.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![3]);
        assert_eq!(queue.stats().coalesced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_has_no_extra_delay() {
        let queue = PersistQueue::new("test", Duration::from_millis(1000)).unwrap();
        let log: Log = Arc::default();
        let start = Instant::now();

        let slow: WriteJob = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });
        let _ = queue.submit(slow);
        queue.submit(recording(&log, 1)).wait().await;

        let at = log.lock().unwrap()[0].0;
        assert!(at - start < Duration::from_millis(1000));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn failure_is_counted_and_queue_continues() {
        let queue = PersistQueue::new("test", Duration::from_millis(10)).unwrap();
        let log: Log = Arc::default();

        let failing: WriteJob =
            Box::pin(async { Err(KeepError::Config("backend down".into())) });
        queue.submit(failing).wait().await;
        queue.submit(recording(&log, 1)).wait().await;

        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stall_queue() {
        let queue = PersistQueue::new("test", Duration::from_millis(10)).unwrap();
        let log: Log = Arc::default();

        async fn explode() -> KeepResult<()> {
            panic!("serializer blew up")
        }

        queue.submit(Box::pin(explode())).wait().await;
        queue.submit(recording(&log, 2)).wait().await;
        queue.flush().await;

        assert!(queue.is_idle());
        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn requires_runtime() {
        let err = PersistQueue::new("test", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, KeepError::Config(_)));
    }

    #[tokio::test]
    async fn flush_on_idle_queue_returns() {
        let queue = PersistQueue::new("test", Duration::from_millis(10)).unwrap();
        assert!(queue.is_idle());
        queue.flush().await;
    }
}
