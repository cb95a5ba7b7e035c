use std::{fmt, panic::Location, time::Instant};

/// A boxed closure waiting in a pool queue.
pub(crate) type Work = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work submitted to a [`WorkerPool`](crate::WorkerPool) that has not
/// been dispatched to a worker yet.
///
/// Besides the closure itself, a pending task records when and where it was
/// posted. Both are purely diagnostic and have no effect on scheduling.
///
/// Running a task consumes it, so a task that has been taken off the queue can
/// never be executed a second time.
pub(crate) struct PendingTask {
    origin: &'static Location<'static>,
    submitted_at: Instant,
    work: Work,
}

impl PendingTask {
    pub(crate) fn new(origin: &'static Location<'static>, work: Work) -> Self {
        Self {
            origin,
            submitted_at: Instant::now(),
            work,
        }
    }

    /// Get the source location the task was posted from.
    pub(crate) fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// Get the instant the task was posted at.
    pub(crate) fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Run the task to completion on the current thread.
    ///
    /// A panic inside the closure is not caught here.
    pub(crate) fn run(self) {
        (self.work)()
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("origin", &self.origin)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}
