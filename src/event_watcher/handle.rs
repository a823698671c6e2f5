use std::sync::Arc;

use tokio::sync::watch;

use crate::types::WatchState;

/// Shared state of one watch, written by both the handle and the polling task.
#[derive(Clone, Debug)]
pub(crate) struct Lifecycle {
    state: Arc<watch::Sender<WatchState>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self { state: Arc::new(watch::Sender::new(WatchState::Idle)) }
    }

    pub(crate) fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.state.borrow().is_stopped()
    }

    /// `Idle -> Polling`. No-op in any other state.
    pub(crate) fn begin_polling(&self) {
        self.state.send_if_modified(|state| {
            if *state == WatchState::Idle {
                *state = WatchState::Polling;
                return true;
            }
            false
        });
    }

    /// Moves to `Stopped`. Returns `false` if the watch was already stopped.
    pub(crate) fn stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_stopped() {
                return false;
            }
            *state = WatchState::Stopped;
            true
        })
    }

    /// Resolves once the watch is stopped.
    pub(crate) async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(WatchState::is_stopped).await;
    }
}

/// Controls a running watch.
///
/// Dropping the handle does **not** stop the watch; call [`WatchHandle::unwatch`] (or drop the
/// receiving side of a stream watch) to end it.
#[derive(Clone, Debug)]
pub struct WatchHandle {
    lifecycle: Lifecycle,
}

impl WatchHandle {
    pub(crate) fn new(lifecycle: Lifecycle) -> Self {
        Self { lifecycle }
    }

    /// Stops the watch.
    ///
    /// Takes effect immediately: once this returns, no further deliveries or error reports are
    /// started, and the result of a request still in flight is discarded. The server-side filter,
    /// if any, is uninstalled in the background. Calling this more than once is a no-op.
    pub fn unwatch(&self) {
        if self.lifecycle.stop() {
            debug!("Unwatch requested");
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatchState {
        self.lifecycle.state()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopped()
    }

    /// Waits until the watch is stopped, either through [`unwatch`](Self::unwatch) or because
    /// its consumer went away.
    pub async fn stopped(&self) {
        self.lifecycle.stopped().await;
    }
}
