use std::{io, sync::Arc, thread};

use crate::pool::Shared;

/// A worker thread which belongs to a pool and executes tasks.
///
/// Workers are detached. Each one holds a reference to the pool state for as
/// long as it runs, and asks the pool for work until it gets none.
pub(crate) struct Worker {
    shared: Arc<Shared>,
}

impl Worker {
    fn new(shared: Arc<Shared>) -> Self {
        shared.on_worker_started();

        Self { shared }
    }

    fn run(self) {
        log::trace!("worker started");

        while let Some(task) = self.shared.wait_for_task() {
            log::trace!(
                "running task posted from {} after {:?} in queue",
                task.origin(),
                task.submitted_at().elapsed()
            );
            task.run();
            self.shared.on_task_completed();
        }

        log::trace!("worker has no more work, exiting");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Also reached when a task unwinds the worker thread.
        self.shared.on_worker_stopped(thread::panicking());
    }
}

/// Spawn a new detached worker thread for the given pool.
///
/// The worker counts as live as soon as this is called. If the thread cannot be
/// created, the worker is dropped again before returning the error.
pub(crate) fn spawn(shared: Arc<Shared>) -> io::Result<()> {
    let mut builder = thread::Builder::new().name(format!(
        "{}/{}",
        shared.name_prefix(),
        shared.next_worker_id()
    ));

    if let Some(size) = shared.stack_size() {
        builder = builder.stack_size(size);
    }

    let worker = Worker::new(shared);

    builder.spawn(move || worker.run()).map(drop)
}
