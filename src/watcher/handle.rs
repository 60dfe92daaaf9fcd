use std::sync::Arc;

use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::watcher::Watcher;

/// Lifecycle of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Built but never started.
    Idle,
    /// Cycling every interval.
    Running,
    /// Stopped explicitly or after a single run.
    Stopped,
}

/// Controls a watcher started with [`Watcher::start`].
///
/// Dropping the handle leaves the loop running.
#[derive(Debug)]
pub struct WatcherHandle {
    pub(crate) token: CancellationToken,
    pub(crate) state: Arc<watch::Sender<WatcherState>>,
    pub(crate) task: JoinHandle<Watcher>,
}

impl WatcherHandle {
    /// Prevents any further cycle from being scheduled.
    ///
    /// A cycle already in flight runs to completion. Calling this more than once is harmless.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!("Stopping watcher");
        }
        self.token.cancel();
        self.state.send_replace(WatcherState::Stopped);
    }

    #[must_use]
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Waits for the loop to exit and hands the watcher back, so it can be started again.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the loop task panicked or was aborted.
    pub async fn join(self) -> Result<Watcher, JoinError> {
        self.task.await
    }
}
