//! Priority task scheduler with bounded concurrency
//!
//! Tasks are queued in a [`PriorityQueue`] and started whenever a slot frees
//! up. Besides the event-driven dispatch a periodic tick re-runs dispatch so a
//! missed wake-up can never leave queued work stranded. The tick is only alive
//! while there is work and the scheduler is not paused.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    config::SchedulerConfig, errors::SchedulerError, scheduler::cancellation::CancellationToken,
    utils::PriorityQueue,
};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Lifecycle notifications emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A task was queued
    NewJob { priority: i64 },
    /// A task left the queue and started running
    JobStart,
    /// A task settled, successfully or not
    FinishedJob,
    /// The scheduler is about to look for the next task
    Next,
    /// Nothing is left in the queue
    QueueEmpty,
    /// Nothing is queued and nothing is running
    Idle,
}

/// Options for [`TaskScheduler::add`]
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Higher runs first
    pub priority: i64,
    /// Abort signal; the caller's future settles with [`SchedulerError::Aborted`]
    pub signal: Option<CancellationToken>,
}

impl AddOptions {
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

struct SchedulerState {
    queue: PriorityQueue<Job>,
    running: usize,
    concurrent: usize,
    paused: bool,
    ticker: Option<JoinHandle<()>>,
}

struct Inner {
    state: Mutex<SchedulerState>,
    events: broadcast::Sender<SchedulerEvent>,
    job_interval: Duration,
}

/// Asynchronous task scheduler
///
/// Cloning yields another handle to the same scheduler. All methods that start
/// work must be called from within a tokio runtime.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("TaskScheduler")
            .field("queued", &state.queue.len())
            .field("running", &state.running)
            .field("concurrent", &state.concurrent)
            .field("paused", &state.paused)
            .finish()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::from_validated(SchedulerConfig::default())
    }
}

impl TaskScheduler {
    /// Create a scheduler, failing with [`SchedulerError::InvalidConcurrency`]
    /// when `concurrent` is zero
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState {
                    queue: PriorityQueue::new(),
                    running: 0,
                    concurrent: config.concurrent,
                    paused: false,
                    ticker: None,
                }),
                events,
                job_interval: config.job_interval,
            }),
        }
    }

    /// Queue a task and return a future that settles with its outcome
    ///
    /// The task is queued immediately, before the returned future is polled.
    /// If `options.signal` fires first, the future settles with
    /// [`SchedulerError::Aborted`]. A task that already started keeps running
    /// unless it observes the signal itself.
    pub fn add<F, Fut, T>(
        &self,
        task: F,
        options: AddOptions,
    ) -> impl Future<Output = Result<T, SchedulerError>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let job_signal = options.signal.clone();
        let job: Job = Box::pin(async move {
            if job_signal.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return;
            }
            let output = task().await;
            let _ = sender.send(output);
        });
        self.inner.enqueue(job, options.priority);

        let signal = options.signal;
        async move {
            match signal {
                Some(signal) => tokio::select! {
                    biased;
                    reason = signal.cancelled() => Err(SchedulerError::Aborted(reason)),
                    result = receiver => result.map_err(|_| SchedulerError::TaskDropped),
                },
                None => receiver.await.map_err(|_| SchedulerError::TaskDropped),
            }
        }
    }

    /// Change the concurrency bound; extra slots are filled immediately
    pub fn set_concurrent(&self, concurrent: usize) -> Result<(), SchedulerError> {
        if concurrent == 0 {
            return Err(SchedulerError::InvalidConcurrency(concurrent));
        }
        self.inner.lock().concurrent = concurrent;
        self.inner.dispatch();
        Ok(())
    }

    pub fn concurrent(&self) -> usize {
        self.inner.lock().concurrent
    }

    /// Stop starting new tasks; running tasks are not interrupted
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.paused = true;
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        debug!("Task scheduler paused with {} queued tasks", state.queue.len());
    }

    /// Resume dispatching after [`TaskScheduler::stop`]
    pub fn resume(&self) {
        {
            let mut state = self.inner.lock();
            state.paused = false;
            if !state.queue.is_empty() {
                self.inner.ensure_ticker(&mut state);
            }
        }
        self.inner.dispatch();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Number of queued tasks that have not started yet
    pub fn size(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock();
        state.queue.is_empty() && state.running == 0
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    #[cfg(test)]
    fn has_ticker(&self) -> bool {
        self.inner.lock().ticker.is_some()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn enqueue(self: &Arc<Self>, job: Job, priority: i64) {
        {
            let mut state = self.lock();
            state.queue.add(job, priority);
            self.emit(SchedulerEvent::NewJob { priority });
            if !state.paused {
                self.ensure_ticker(&mut state);
            }
        }
        self.dispatch();
    }

    fn dispatch(self: &Arc<Self>) {
        let mut state = self.lock();
        while !state.paused && state.running < state.concurrent {
            let Some(job) = state.queue.pop() else {
                break;
            };
            state.running += 1;
            self.emit(SchedulerEvent::JobStart);
            let guard = RunningGuard(Arc::clone(self));
            tokio::spawn(async move {
                let _guard = guard;
                job.await;
            });
        }
    }

    fn job_finished(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
            self.emit(SchedulerEvent::FinishedJob);
            self.emit(SchedulerEvent::Next);
            if state.queue.is_empty() {
                self.emit(SchedulerEvent::QueueEmpty);
                if state.running == 0 {
                    if let Some(ticker) = state.ticker.take() {
                        ticker.abort();
                    }
                    self.emit(SchedulerEvent::Idle);
                }
            }
        }
        self.dispatch();
    }

    fn ensure_ticker(self: &Arc<Self>, state: &mut SchedulerState) {
        if state.ticker.as_ref().is_some_and(|ticker| !ticker.is_finished()) {
            return;
        }
        let period = self.job_interval.max(Duration::from_millis(1));
        let weak: Weak<Inner> = Arc::downgrade(self);
        state.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.dispatch();
            }
        }));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
    }
}

/// Releases a concurrency slot when the task settles, panics included
struct RunningGuard(Arc<Inner>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.job_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_runs_in_priority_order() {
        let scheduler = TaskScheduler::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));

        let blocker = {
            let gate = gate.clone();
            let order = order.clone();
            scheduler.add(
                move || async move {
                    let _permit = gate.acquire().await;
                    order.lock().unwrap().push("blocker");
                },
                AddOptions::default(),
            )
        };
        settle().await;

        let mut pending = Vec::new();
        for (name, priority) in [("low", 1), ("high", 10), ("mid", 5)] {
            let order = order.clone();
            pending.push(scheduler.add(
                move || async move {
                    order.lock().unwrap().push(name);
                },
                AddOptions::default().with_priority(priority),
            ));
        }
        assert_eq!(scheduler.size(), 3);

        gate.add_permits(1);
        blocker.await.unwrap();
        for task in pending {
            task.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["blocker", "high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let scheduler = TaskScheduler::new(SchedulerConfig::default().with_concurrent(2)).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let active = active.clone();
                let max_active = max_active.clone();
                let gate = gate.clone();
                scheduler.add(
                    move || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        gate.acquire().await.unwrap().forget();
                        active.fetch_sub(1, Ordering::SeqCst);
                        i
                    },
                    AddOptions::default(),
                )
            })
            .collect();

        settle().await;
        assert_eq!(scheduler.running(), 2);
        assert_eq!(scheduler.size(), 3);

        gate.add_permits(5);
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert_eq!(max_active.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abort_while_running() {
        let scheduler = TaskScheduler::default();
        let signal = CancellationToken::new();
        let gate = Arc::new(Semaphore::new(0));

        let task = {
            let gate = gate.clone();
            scheduler.add(
                move || async move {
                    let _permit = gate.acquire().await;
                    42
                },
                AddOptions::default().with_signal(signal.clone()),
            )
        };
        settle().await;
        assert_eq!(scheduler.running(), 1);

        signal.cancel("user aborted");
        assert_eq!(task.await, Err(SchedulerError::Aborted("user aborted".to_string())));

        gate.add_permits(1);
        settle().await;
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn test_abort_before_start_skips_task() {
        let scheduler = TaskScheduler::default();
        scheduler.stop();
        let ran = Arc::new(AtomicUsize::new(0));
        let signal = CancellationToken::new();

        let task = {
            let ran = ran.clone();
            scheduler.add(
                move || async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                },
                AddOptions::default().with_signal(signal.clone()),
            )
        };
        signal.cancel("gone");
        scheduler.resume();

        assert_eq!(task.await, Err(SchedulerError::Aborted("gone".to_string())));
        settle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_and_resume() {
        let scheduler = TaskScheduler::default();
        scheduler.stop();
        assert!(scheduler.is_paused());

        let task = scheduler.add(|| async { "done" }, AddOptions::default());
        settle().await;
        assert_eq!(scheduler.size(), 1);
        assert_eq!(scheduler.running(), 0);
        assert!(!scheduler.has_ticker());

        scheduler.resume();
        assert_eq!(task.await, Ok("done"));
    }

    #[tokio::test]
    async fn test_invalid_concurrency_rejected() {
        let scheduler = TaskScheduler::default();
        assert_eq!(
            scheduler.set_concurrent(0),
            Err(SchedulerError::InvalidConcurrency(0))
        );
        assert!(scheduler.set_concurrent(3).is_ok());
        assert_eq!(scheduler.concurrent(), 3);

        let err = TaskScheduler::new(SchedulerConfig::default().with_concurrent(0)).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidConcurrency(0));
    }

    #[tokio::test]
    async fn test_lifecycle_events_and_ticker_teardown() {
        let scheduler = TaskScheduler::default();
        let mut events = scheduler.subscribe();

        let task = scheduler.add(|| async {}, AddOptions::default().with_priority(3));
        task.await.unwrap();
        settle().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                SchedulerEvent::NewJob { priority: 3 },
                SchedulerEvent::JobStart,
                SchedulerEvent::FinishedJob,
                SchedulerEvent::Next,
                SchedulerEvent::QueueEmpty,
                SchedulerEvent::Idle,
            ]
        );
        assert!(scheduler.is_idle());
        assert!(!scheduler.has_ticker());
    }

    #[tokio::test]
    async fn test_panicking_task_frees_its_slot() {
        let scheduler = TaskScheduler::default();
        let failed = scheduler.add(|| async { panic!("task failure") }, AddOptions::default());
        let next = scheduler.add(|| async { 7 }, AddOptions::default());

        assert_eq!(failed.await, Err::<(), _>(SchedulerError::TaskDropped));
        assert_eq!(next.await, Ok(7));
    }
}
