use std::time::Duration;

use alloy::{network::Network, rpc::types::Log, sol_types::SolEvent};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    WatchCriteria, WatchError,
    event_watcher::{
        cursor::Cursor,
        decoder::{LogDecoder, RawLogs, SolEventDecoder},
        dispatcher::Dispatcher,
        filter_manager::FilterManager,
        handle::{Lifecycle, WatchHandle},
        poll_source::{DirectMode, FilterMode, Poll, PollSource, Polled},
        rpc::LogRpc,
        sink::LogSink,
    },
    robust_provider::{IntoRobustProvider, RobustProvider},
    types::{ChannelState, WatchResult},
};

/// Time between two polls of the same watch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Whether a tick's entries are delivered together by default.
pub const DEFAULT_BATCH: bool = true;

/// Deliveries buffered by [`EventWatcher::watch_stream`] before polling waits on the consumer.
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 1024;

/// Largest block span requested by a single `eth_getLogs` call.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;

/// Configuration for an [`EventWatcher`].
#[derive(Clone, Debug)]
pub struct EventWatcherBuilder {
    poll_interval: Duration,
    batch: bool,
    from_block: Option<u64>,
    buffer_capacity: usize,
    max_block_range: u64,
}

impl Default for EventWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventWatcherBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch: DEFAULT_BATCH,
            from_block: None,
            buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
        }
    }

    /// Sets the time between polls. Must be greater than zero.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// `true` delivers everything found in one tick at once; `false` delivers entries one by one.
    #[must_use]
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Starts watches at `block` instead of after the current head.
    ///
    /// Entries from `block` up to the head at start time are delivered on the first poll.
    #[must_use]
    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    /// Sets the stream buffer capacity used by [`EventWatcher::watch_stream`].
    ///
    /// # Arguments
    ///
    /// * `buffer_capacity` - Maximum number of deliveries to buffer (must be greater than 0)
    #[must_use]
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Caps the blocks covered by one range query. Longer ranges (direct mode, or blocks mined
    /// before a filter was installed) are read in consecutive pieces.
    ///
    /// # Arguments
    ///
    /// * `max_block_range` - Blocks per `eth_getLogs` call (must be greater than 0)
    #[must_use]
    pub fn max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;
        self
    }

    /// Connects to an existing provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the provider connection fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub async fn connect<N: Network>(
        self,
        provider: impl IntoRobustProvider<N>,
    ) -> Result<EventWatcher<RobustProvider<N>>, WatchError> {
        self.validate()?;
        let provider = provider.into_robust_provider().await?;
        Ok(EventWatcher { rpc: provider, config: self.into_config() })
    }

    /// Uses any [`LogRpc`] implementation as the request channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_rpc<R: LogRpc>(self, rpc: R) -> Result<EventWatcher<R>, WatchError> {
        self.validate()?;
        Ok(EventWatcher { rpc, config: self.into_config() })
    }

    fn validate(&self) -> Result<(), WatchError> {
        if self.poll_interval.is_zero() {
            return Err(WatchError::InvalidPollInterval);
        }
        if self.buffer_capacity == 0 {
            return Err(WatchError::InvalidBufferCapacity);
        }
        if self.max_block_range == 0 {
            return Err(WatchError::InvalidMaxBlockRange);
        }
        Ok(())
    }

    fn into_config(self) -> WatchConfig {
        WatchConfig {
            poll_interval: self.poll_interval,
            batch: self.batch,
            from_block: self.from_block,
            buffer_capacity: self.buffer_capacity,
            max_block_range: self.max_block_range,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct WatchConfig {
    poll_interval: Duration,
    batch: bool,
    from_block: Option<u64>,
    buffer_capacity: usize,
    max_block_range: u64,
}

/// Starts watches over one RPC connection.
///
/// Each call to a `watch*` method spawns an independent polling task with its own cursor and
/// server-side filter. Must be used from within a Tokio runtime.
#[derive(Clone, Debug)]
pub struct EventWatcher<R> {
    rpc: R,
    config: WatchConfig,
}

impl<R: LogRpc> EventWatcher<R> {
    #[must_use]
    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Watches raw logs matching `criteria`.
    pub fn watch<S: LogSink<Log>>(&self, criteria: WatchCriteria, sink: S) -> WatchHandle {
        self.watch_decoded(criteria, RawLogs, sink)
    }

    /// Watches logs matching `criteria`, delivering them as decoded by `decoder`.
    pub fn watch_decoded<D, S>(&self, criteria: WatchCriteria, decoder: D, sink: S) -> WatchHandle
    where
        D: LogDecoder,
        S: LogSink<D::Output>,
    {
        let lifecycle = Lifecycle::new();
        let task = WatchTask {
            rpc: self.rpc.clone(),
            config: self.config,
            criteria,
            dispatcher: Dispatcher::new(decoder, self.config.batch),
            sink,
            lifecycle: lifecycle.clone(),
            active: None,
        };
        tokio::spawn(task.run());
        WatchHandle::new(lifecycle)
    }

    /// Watches occurrences of the Solidity event `E`. Its signature is added to `criteria`.
    pub fn watch_event<E, S>(&self, criteria: WatchCriteria, sink: S) -> WatchHandle
    where
        E: SolEvent + std::fmt::Debug + Send + 'static,
        S: LogSink<Log<E>>,
    {
        self.watch_decoded(criteria.event_hash(E::SIGNATURE_HASH), SolEventDecoder::<E>::new(), sink)
    }

    /// Watches raw logs and returns them as a stream.
    ///
    /// Dropping the stream stops the watch and removes its filter from the node.
    #[must_use]
    pub fn watch_stream(
        &self,
        criteria: WatchCriteria,
    ) -> (WatchHandle, ReceiverStream<WatchResult<Log>>) {
        let (sender, receiver) = mpsc::channel(self.config.buffer_capacity);
        let handle = self.watch(criteria, sender);
        (handle, ReceiverStream::new(receiver))
    }
}

#[derive(Debug)]
struct ActiveSource {
    source: PollSource,
    cursor: Cursor,
}

struct WatchTask<R, D, S> {
    rpc: R,
    config: WatchConfig,
    criteria: WatchCriteria,
    dispatcher: Dispatcher<D>,
    sink: S,
    lifecycle: Lifecycle,
    active: Option<ActiveSource>,
}

impl<R, D, S> WatchTask<R, D, S>
where
    R: LogRpc,
    D: LogDecoder,
    S: LogSink<D::Output>,
{
    async fn run(mut self) {
        let lifecycle = self.lifecycle.clone();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(criteria = %self.criteria, "Watch task started");

        loop {
            tokio::select! {
                biased;
                () = lifecycle.stopped() => break,
                () = self.sink.closed() => {
                    debug!("Consumer went away, stopping watch");
                    lifecycle.stop();
                    break;
                }
                _ = ticker.tick() => {}
            }

            lifecycle.begin_polling();

            // a stop request drops the tick in flight, including its response; a filter
            // being installed at that moment is removed once the node answers
            let state = tokio::select! {
                biased;
                () = lifecycle.stopped() => break,
                state = self.tick() => state,
            };

            if state.is_closed() {
                lifecycle.stop();
                break;
            }
        }

        if let Some(active) = &self.active {
            active.source.release(&self.rpc).await;
        }
        debug!(criteria = %self.criteria, "Watch task stopped");
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    async fn tick(&mut self) -> ChannelState {
        let Some(active) = self.active.as_mut() else {
            return self.activate().await;
        };

        let polled = match active.source.poll(&self.rpc, &self.criteria, active.cursor).await {
            Err(WatchError::FilterNotFound(id)) => {
                if self.lifecycle.is_stopped() {
                    return ChannelState::Open;
                }
                warn!(filter_id = %id, "Log filter no longer exists on the node, reinstalling");
                active.source.poll(&self.rpc, &self.criteria, active.cursor).await
            }
            other => other,
        };

        match polled {
            Ok(Polled { logs, cursor, errors }) => {
                active.cursor = cursor;
                let mut state = self.dispatcher.dispatch(logs, &mut self.sink, &self.lifecycle).await;
                for err in errors {
                    if state.is_closed() {
                        break;
                    }
                    state = self.report(err).await;
                }
                state
            }
            Err(err) if err.is_silent() => {
                debug!(error = %err, "Recoverable watch error, retrying next tick");
                ChannelState::Open
            }
            Err(err) => self.report(err).await,
        }
    }

    /// Resolves the start position and picks the retrieval mode.
    async fn activate(&mut self) -> ChannelState {
        let head = match self.rpc.head().await {
            Ok(head) => head,
            Err(err) => return self.report(err).await,
        };
        let cursor = self.config.from_block.map_or(Cursor::after(head), Cursor::starting_at);

        let manager = FilterManager::new(&self.criteria);
        let (source, fallback) = match manager.acquire(&self.rpc, cursor).await {
            Ok(handle) => {
                let backfill_from = cursor.pending_range(head).map(|range| *range.start());
                let mode = FilterMode::new(manager, handle, backfill_from, self.config.max_block_range);
                (PollSource::Filter(mode), None)
            }
            Err(fallback) => {
                let mode = DirectMode::new(self.config.max_block_range);
                (PollSource::Direct(mode), fallback.into_reportable())
            }
        };

        info!(
            mode = source.mode_name(),
            next_block = cursor.next_block(),
            criteria = %self.criteria,
            "Watch started"
        );
        self.active = Some(ActiveSource { source, cursor });

        match fallback {
            Some(err) => self.report(err).await,
            None => ChannelState::Open,
        }
    }

    async fn report(&mut self, err: WatchError) -> ChannelState {
        if self.lifecycle.is_stopped() {
            return ChannelState::Open;
        }
        error!(error = %err, "Watch error");
        self.sink.on_error(err).await
    }
}
