use tokio::task::JoinHandle;

/// Tracks the background tasks owned by a controller (read loops, refresh
/// timers, late REST completions) so teardown can cut them all at once.
pub struct TaskManager {
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawns onto the runtime and keeps the handle for teardown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(future));
    }

    /// Aborts every tracked task without waiting for completion.
    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
