use std::fmt::Debug;

use tokio::sync::mpsc;

use crate::WatchError;

/// Item yielded by stream-based watches: one delivery of decoded entries, or a reported fault.
pub type WatchResult<T> = Result<Vec<T>, WatchError>;

/// Whether the consumer side of a sink is still accepting deliveries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closed,
}

impl ChannelState {
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, ChannelState::Open)
    }

    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, ChannelState::Closed)
    }
}

/// Lifecycle of a single watch.
///
/// `Idle` until the first tick fires, `Polling` for as long as the watch runs, and `Stopped`
/// once it was unwatched or its sink was closed. `Stopped` is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Idle,
    Polling,
    Stopped,
}

impl WatchState {
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, WatchState::Stopped)
    }
}

pub(crate) trait TryStream<T> {
    async fn try_stream(&self, item: WatchResult<T>) -> ChannelState;
}

impl<T: Debug> TryStream<T> for mpsc::Sender<WatchResult<T>> {
    async fn try_stream(&self, item: WatchResult<T>) -> ChannelState {
        match &item {
            Ok(logs) => trace!(log_count = logs.len(), "Sending logs"),
            Err(err) => trace!(error = %err, "Sending error"),
        }
        if let Err(err) = self.send(item).await {
            warn!(error = %err, "Downstream channel closed, stopping watch");
            return ChannelState::Closed;
        }
        ChannelState::Open
    }
}
