use std::fmt::Debug;

use tokio::sync::mpsc;

use crate::{
    WatchError,
    types::{ChannelState, TryStream, WatchResult},
};

/// Consumer of a watch.
///
/// `on_logs` receives one delivery (a whole tick in batch mode, a single entry otherwise) and
/// `on_error` receives faults that did not stop the watch. Returning [`ChannelState::Closed`]
/// from either stops the watch.
pub trait LogSink<T>: Send + 'static {
    fn on_logs(&mut self, logs: Vec<T>) -> impl Future<Output = ChannelState> + Send;

    fn on_error(&mut self, error: WatchError) -> impl Future<Output = ChannelState> + Send;

    /// Resolves once the consumer is gone, so a watch can stop between deliveries. Never
    /// resolves by default.
    fn closed(&self) -> impl Future<Output = ()> + Send {
        std::future::pending()
    }
}

impl<T: Debug + Send + 'static> LogSink<T> for mpsc::Sender<WatchResult<T>> {
    async fn on_logs(&mut self, logs: Vec<T>) -> ChannelState {
        self.try_stream(Ok(logs)).await
    }

    async fn on_error(&mut self, error: WatchError) -> ChannelState {
        self.try_stream(Err(error)).await
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await;
    }
}

/// A pair of plain closures used as a [`LogSink`].
///
/// Without an error callback, faults are only logged.
///
/// ```rust
/// use alloy::rpc::types::Log;
/// use event_watcher::Callbacks;
///
/// let callbacks = Callbacks::new(|logs: Vec<Log>| println!("{} new logs", logs.len()))
///     .with_error_handler(|err| eprintln!("watch error: {err}"));
/// ```
pub struct Callbacks<F, G = fn(WatchError)> {
    on_logs: F,
    on_error: Option<G>,
}

impl<F> Callbacks<F> {
    pub fn new(on_logs: F) -> Self {
        Self { on_logs, on_error: None }
    }
}

impl<F, G> Callbacks<F, G> {
    /// Sets the callback invoked with faults that did not stop the watch.
    pub fn with_error_handler<H>(self, on_error: H) -> Callbacks<F, H>
    where
        H: FnMut(WatchError),
    {
        Callbacks { on_logs: self.on_logs, on_error: Some(on_error) }
    }
}

impl<F, G> Debug for Callbacks<F, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").field("on_error", &self.on_error.is_some()).finish_non_exhaustive()
    }
}

impl<T, F, G> LogSink<T> for Callbacks<F, G>
where
    T: Send + 'static,
    F: FnMut(Vec<T>) + Send + 'static,
    G: FnMut(WatchError) + Send + 'static,
{
    async fn on_logs(&mut self, logs: Vec<T>) -> ChannelState {
        (self.on_logs)(logs);
        ChannelState::Open
    }

    async fn on_error(&mut self, error: WatchError) -> ChannelState {
        match self.on_error.as_mut() {
            Some(on_error) => on_error(error),
            None => warn!(error = %error, "Watch error without an error callback"),
        }
        ChannelState::Open
    }
}
