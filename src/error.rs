use std::{error::Error, fmt, io};

/// An error returned when a task was accepted but a new worker thread could
/// not be spawned to run it.
///
/// The task remains queued and will be picked up by the next worker that asks
/// the pool for work, if any.
pub struct SpawnError(pub(crate) io::Error);

impl SpawnError {
    /// Extracts the underlying I/O error reported by the operating system.
    pub fn into_inner(self) -> io::Error {
        self.0
    }
}

impl Error for SpawnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SpawnError").field(&self.0).finish()
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to spawn worker thread: {}", self.0)
    }
}

/// Returned by [`configure_common`](crate::configure_common) once the common
/// pool exists, either because it was configured before or because something
/// already used it.
pub struct CommonAlreadyInitializedError {
    _private: (),
}

impl CommonAlreadyInitializedError {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl Error for CommonAlreadyInitializedError {}

impl fmt::Debug for CommonAlreadyInitializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonAlreadyInitializedError").finish()
    }
}

impl fmt::Display for CommonAlreadyInitializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the common worker pool is already in use and can no longer be configured")
    }
}
