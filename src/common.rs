use std::{panic::Location, time::Duration};

use once_cell::sync::OnceCell;

use crate::{
    task::PendingTask,
    Builder,
    CommonAlreadyInitializedError,
    SpawnError,
    WorkerPool,
};

static COMMON: OnceCell<WorkerPool> = OnceCell::new();

/// Get a shared reference to a common worker pool for the entire process.
///
/// Unless configured otherwise, its threads are named `WorkerPool/<n>` and
/// idle workers exit after ten minutes.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// driftpool::common()
///     .post_task(move || tx.send(2 + 2).unwrap())
///     .unwrap();
///
/// assert_eq!(rx.recv().unwrap(), 4);
/// ```
pub fn common() -> &'static WorkerPool {
    COMMON.get_or_init(|| common_builder().build())
}

/// Submit a closure to the [common](common) worker pool.
///
/// See [`WorkerPool::post_task`] for details.
#[track_caller]
pub fn post_task<F>(work: F) -> Result<(), SpawnError>
where
    F: FnOnce() + Send + 'static,
{
    common().add_task(PendingTask::new(Location::caller(), Box::new(work)))
}

/// Configure the common worker pool before its first use.
///
/// Returns an error if anything already touched the common pool, including an
/// earlier call to this function. Call it once near the start of `main`.
/// Libraries should leave the common pool to the application and build their
/// own [`WorkerPool`] when they need different settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// driftpool::configure_common(|builder| builder
///     .name("background")
///     .idle_timeout(Duration::from_secs(30)))
///     .unwrap();
///
/// assert_eq!(driftpool::common().name_prefix(), "background");
/// assert!(driftpool::configure_common(|builder| builder).is_err());
/// ```
pub fn configure_common<F>(f: F) -> Result<(), CommonAlreadyInitializedError>
where
    F: FnOnce(Builder) -> Builder,
{
    if COMMON.get().is_some() {
        return Err(CommonAlreadyInitializedError::new());
    }

    // Another thread may have initialized the pool since the check above.
    COMMON
        .set(f(common_builder()).build())
        .map_err(|_| CommonAlreadyInitializedError::new())
}

fn common_builder() -> Builder {
    Builder::default()
        .name("WorkerPool")
        .idle_timeout(Duration::from_secs(10 * 60))
}
