//! Event-Watcher notifies an application about new EVM event logs using nothing but
//! request/response JSON-RPC.
//!
//! The main entry point is [`EventWatcher`], built via [`EventWatcherBuilder`]. Each call to
//! [`EventWatcher::watch`] (or one of its variants) starts an independent watch that polls the
//! node on a fixed interval and hands new logs to a [`LogSink`]: a pair of [`Callbacks`], or a
//! channel returned by [`EventWatcher::watch_stream`]. The returned [`WatchHandle`] stops it.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use alloy::{primitives::address, providers::ProviderBuilder, rpc::types::Log};
//! use event_watcher::{Callbacks, EventWatcherBuilder, WatchCriteria};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = ProviderBuilder::new().connect("http://localhost:8545").await?;
//! let watcher = EventWatcherBuilder::new()
//!     .poll_interval(Duration::from_secs(2))
//!     .connect(provider)
//!     .await?;
//!
//! let criteria = WatchCriteria::new()
//!     .contract_address(address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
//!     .event("Transfer(address,address,uint256)");
//!
//! let handle = watcher.watch(
//!     criteria,
//!     Callbacks::new(|logs: Vec<Log>| println!("{} transfers", logs.len()))
//!         .with_error_handler(|err| eprintln!("{err}")),
//! );
//!
//! // ...
//! handle.unwatch();
//! # Ok(()) }
//! ```
//!
//! # Retrieval modes
//!
//! A watch first tries to install a server-side filter (`eth_newFilter`) and drains it with
//! `eth_getFilterChanges` on every tick. If the node does not support filters, the watch falls
//! back to asking for the head (`eth_blockNumber`) and querying `eth_getLogs` over the blocks it
//! has not seen yet. Consumers receive the same entries either way.
//!
//! A filter the node forgot (expired, node restarted) is reinstalled transparently, and the
//! blocks mined in between are read with a range query. Around such a reinstall the same entry
//! may be delivered twice; entries are never skipped.
//!
//! # Ordering
//!
//! Entries are delivered in the order the node returned them, which is ascending chain order.
//! There is no ordering guarantee across different watches.
//!
//! # Errors
//!
//! Faults of a single tick (timeouts, rejected requests, undecodable logs) are handed to the
//! sink's error path after whatever the tick did retrieve has been delivered, and the watch keeps
//! polling. Filter loss and missing filter support are
//! handled internally and never reported.
//!
//! # Robust providers
//!
//! The [`robust_provider`] module provides [`robust_provider::RobustProvider`], a wrapper that
//! retries transport failures and fails over across multiple RPC endpoints.

#[macro_use]
mod logging;

pub mod robust_provider;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod error;
mod event_watcher;
mod types;

pub use error::WatchError;
pub use types::{ChannelState, WatchResult, WatchState};

pub use event_watcher::{
    Callbacks, DEFAULT_BATCH, DEFAULT_MAX_BLOCK_RANGE, DEFAULT_POLL_INTERVAL,
    DEFAULT_STREAM_BUFFER_CAPACITY, EventWatcher, EventWatcherBuilder, FilterId, LogDecoder, LogRpc, LogSink, RawLogs, SolEventDecoder,
    WatchCriteria, WatchHandle,
};
