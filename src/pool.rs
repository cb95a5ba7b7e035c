//! Implementation of the worker pool itself.

use std::{
    collections::VecDeque,
    fmt,
    panic::Location,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::{Duration, Instant},
};

use crate::{error::SpawnError, task::PendingTask, worker};

#[cfg(target_has_atomic = "64")]
type AtomicCounter = std::sync::atomic::AtomicU64;

#[cfg(not(target_has_atomic = "64"))]
type AtomicCounter = std::sync::atomic::AtomicU32;

/// A builder for constructing a customized [`WorkerPool`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// let custom_pool = driftpool::WorkerPool::builder()
///     .name("my-pool")
///     .idle_timeout(Duration::from_secs(5))
///     .build();
/// ```
#[derive(Debug)]
pub struct Builder {
    name: Option<String>,
    idle_timeout: Duration,
    stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            name: None,
            idle_timeout: Duration::from_secs(60),
            stack_size: None,
        }
    }
}

impl Builder {
    /// Set the name prefix for threads spawned by this pool.
    ///
    /// Each worker thread is named `<prefix>/<n>`, where `n` counts the workers
    /// spawned by the pool so far. The name is only used for diagnostics.
    ///
    /// # Panics
    ///
    /// Panics if the name contains null bytes (`\0`).
    ///
    /// # Examples
    ///
    /// ```
    /// let pool = driftpool::WorkerPool::builder().name("my-pool").build();
    /// assert_eq!(pool.name_prefix(), "my-pool");
    /// ```
    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        let name = name.into();

        if name.as_bytes().contains(&0) {
            panic!("worker pool name must not contain null bytes");
        }

        self.name = Some(name);
        self
    }

    /// Set how long an idle worker waits for a new task before it exits.
    ///
    /// A zero duration makes workers exit as soon as they find the queue empty.
    /// If not set, idle workers are kept for 60 seconds.
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = duration;
        self
    }

    /// Set the size of the stack (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// enforces a larger minimum stack size. If not set, the default size for
    /// new Rust threads is used.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Create a worker pool according to the configuration set with this
    /// builder.
    ///
    /// No threads are spawned until the first task is posted.
    pub fn build(self) -> WorkerPool {
        let shared = Shared {
            name_prefix: self.name.unwrap_or_else(|| String::from("driftpool")),
            idle_timeout: self.idle_timeout,
            stack_size: self.stack_size,
            state: Mutex::new(State {
                pending_tasks: VecDeque::new(),
                idle_workers: 0,
                terminated: false,
            }),
            tasks_available: Condvar::new(),
            thread_count: AtomicUsize::new(0),
            spawned_count: AtomicUsize::new(0),
            completed_tasks_count: Default::default(),
            panicked_tasks_count: Default::default(),
        };

        log::debug!(
            "created worker pool `{}` with idle timeout {:?}",
            shared.name_prefix,
            shared.idle_timeout
        );

        WorkerPool {
            shared: Arc::new(shared),
        }
    }
}

/// A pool of worker threads that grows on demand and shrinks when idle.
///
/// Posting a task either wakes a worker that is waiting for work or spawns a
/// new worker thread to run it. There is no upper bound on the number of
/// threads: a burst of posts while every worker is busy spawns one thread per
/// post. Workers that find no work for the configured idle timeout exit on
/// their own.
///
/// `WorkerPool` is a cheap handle around shared state. Clones refer to the same
/// pool, and every live worker thread keeps the state alive too. Dropping the
/// last handle does not stop the pool: workers keep running queued tasks and
/// exit once they go idle. Use [`terminate`](WorkerPool::terminate) to stop
/// handing out work.
///
/// Worker threads are never joined. Tasks that are still running when the
/// process exits are simply cut off.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Create a new pool whose workers are named after `name_prefix` and exit
    /// after being idle for `idle_timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the name contains null bytes (`\0`).
    pub fn new<T: Into<String>>(name_prefix: T, idle_timeout: Duration) -> Self {
        Self::builder()
            .name(name_prefix)
            .idle_timeout(idle_timeout)
            .build()
    }

    /// Create a new pool with an idle timeout given in whole seconds.
    pub fn with_idle_seconds<T: Into<String>>(name_prefix: T, idle_seconds: u64) -> Self {
        Self::new(name_prefix, Duration::from_secs(idle_seconds))
    }

    /// Get a builder for creating a customized pool.
    #[inline]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Get the name prefix given to worker threads.
    pub fn name_prefix(&self) -> &str {
        &self.shared.name_prefix
    }

    /// Get the duration idle workers wait for work before exiting.
    pub fn idle_timeout(&self) -> Duration {
        self.shared.idle_timeout
    }

    /// Get the number of worker threads currently alive.
    ///
    /// Note that the number returned may become immediately outdated after
    /// invocation.
    #[inline]
    pub fn threads(&self) -> usize {
        self.shared.thread_count.load(Ordering::SeqCst)
    }

    /// Get the number of workers currently waiting for a task.
    ///
    /// Note that the number returned may become immediately outdated after
    /// invocation.
    pub fn idle_workers(&self) -> usize {
        self.shared.lock().idle_workers
    }

    /// Get the number of tasks queued, but not yet taken by a worker.
    ///
    /// After [`terminate`](WorkerPool::terminate) this counts the tasks that
    /// were abandoned.
    pub fn queued_tasks(&self) -> usize {
        self.shared.lock().pending_tasks.len()
    }

    /// Get the number of tasks that finished running (successfully or
    /// otherwise) since the pool was created.
    #[inline]
    #[allow(clippy::useless_conversion)]
    pub fn completed_tasks(&self) -> u64 {
        self.shared.completed_tasks_count.load(Ordering::SeqCst).into()
    }

    /// Get the number of tasks that panicked since the pool was created.
    ///
    /// A panicking task takes its worker thread down with it; other workers
    /// and queued tasks are unaffected.
    #[inline]
    #[allow(clippy::useless_conversion)]
    pub fn panicked_tasks(&self) -> u64 {
        self.shared.panicked_tasks_count.load(Ordering::SeqCst).into()
    }

    /// Check whether [`terminate`](WorkerPool::terminate) has been called.
    pub fn is_terminated(&self) -> bool {
        self.shared.lock().terminated
    }

    /// Submit a closure to be run by a worker thread.
    ///
    /// If a worker is waiting for work, it is woken to take the task.
    /// Otherwise a new worker thread is spawned. Tasks are handed out in the
    /// order they were posted.
    ///
    /// If the pool has been terminated, the task is silently dropped and `Ok`
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if a new worker was needed but the thread could
    /// not be created. The task stays queued in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{sync::mpsc, time::Duration};
    ///
    /// let pool = driftpool::WorkerPool::new("example", Duration::from_secs(1));
    /// let (tx, rx) = mpsc::channel();
    ///
    /// pool.post_task(move || {
    ///     tx.send(2 + 2).unwrap();
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(rx.recv().unwrap(), 4);
    /// ```
    #[track_caller]
    pub fn post_task<F>(&self, work: F) -> Result<(), SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_task(PendingTask::new(Location::caller(), Box::new(work)))
    }

    pub(crate) fn add_task(&self, task: PendingTask) -> Result<(), SpawnError> {
        let mut state = self.shared.lock();

        if state.terminated {
            // Captures of the closure are dropped outside the lock.
            drop(state);
            log::warn!(
                "worker pool `{}` is terminated, dropping task posted from {}",
                self.shared.name_prefix,
                task.origin()
            );
            return Ok(());
        }

        state.pending_tasks.push_back(task);

        // Idle workers already signaled for earlier tasks are still counted
        // until they wake, so only hand off if one is left over.
        if state.idle_workers >= state.pending_tasks.len() {
            self.shared.tasks_available.notify_one();
            return Ok(());
        }

        // Spawn while holding the lock. The new worker blocks on it until we
        // return, then claims whatever is at the front of the queue.
        worker::spawn(self.shared.clone()).map_err(|e| {
            log::error!(
                "worker pool `{}` failed to spawn a worker thread: {}",
                self.shared.name_prefix,
                e
            );
            SpawnError(e)
        })
    }

    /// Stop handing out tasks and wake all idle workers so they exit.
    ///
    /// This returns immediately. Workers running a task finish it and then
    /// exit; nothing waits for them. Tasks still in the queue are never run,
    /// and tasks posted afterwards are dropped. Calling this more than once
    /// has no further effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// let pool = driftpool::WorkerPool::new("example", Duration::from_secs(1));
    /// pool.terminate();
    /// pool.terminate();
    ///
    /// assert!(pool.is_terminated());
    /// assert!(pool.post_task(|| unreachable!()).is_ok());
    /// assert_eq!(pool.threads(), 0);
    /// ```
    pub fn terminate(&self) {
        let mut state = self.shared.lock();

        if !state.terminated {
            log::debug!(
                "terminating worker pool `{}` with {} queued tasks",
                self.shared.name_prefix,
                state.pending_tasks.len()
            );
            state.terminated = true;
        }

        self.shared.tasks_available.notify_all();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name_prefix", &self.name_prefix())
            .field("threads", &self.threads())
            .field("idle_workers", &self.idle_workers())
            .field("queued_tasks", &self.queued_tasks())
            .field("completed_tasks", &self.completed_tasks())
            .finish()
    }
}

/// Pool state shared by the owner and the worker threads.
pub(crate) struct Shared {
    name_prefix: String,
    idle_timeout: Duration,
    stack_size: Option<usize>,
    state: Mutex<State>,
    tasks_available: Condvar,
    thread_count: AtomicUsize,
    spawned_count: AtomicUsize,
    completed_tasks_count: AtomicCounter,
    panicked_tasks_count: AtomicCounter,
}

/// Everything guarded by the pool lock.
struct State {
    pending_tasks: VecDeque<PendingTask>,
    idle_workers: usize,
    terminated: bool,
}

impl Shared {
    /// User code never runs under the lock, so the state behind a poisoned
    /// lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub(crate) fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    /// Reserve the sequence number of the next spawned worker.
    pub(crate) fn next_worker_id(&self) -> usize {
        self.spawned_count.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn on_worker_started(&self) {
        self.thread_count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_worker_stopped(&self, panicked: bool) {
        if panicked {
            self.completed_tasks_count.fetch_add(1, Ordering::SeqCst);
            self.panicked_tasks_count.fetch_add(1, Ordering::SeqCst);
        }

        self.thread_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_task_completed(&self) {
        self.completed_tasks_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Block the calling worker until a task is available, the pool is
    /// terminated, or the idle timeout passes.
    ///
    /// Returns `None` when the worker should exit. A woken worker re-checks
    /// the queue under the lock, so each task is claimed by exactly one worker
    /// and spurious wakeups are harmless.
    pub(crate) fn wait_for_task(&self) -> Option<PendingTask> {
        let mut state = self.lock();
        state.idle_workers += 1;

        // A timeout too large to represent as an instant means wait forever.
        let deadline = Instant::now().checked_add(self.idle_timeout);

        let task = loop {
            if state.terminated {
                break None;
            }

            if let Some(task) = state.pending_tasks.pop_front() {
                break Some(task);
            }

            state = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if remaining > Duration::ZERO => {
                        self.tasks_available
                            .wait_timeout(state, remaining)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0
                    }
                    _ => break None,
                },
                None => self
                    .tasks_available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        };

        state.idle_workers -= 1;
        task
    }
}
