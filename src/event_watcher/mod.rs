mod criteria;
mod cursor;
mod decoder;
mod dispatcher;
mod filter_manager;
mod handle;
mod poll_source;
mod rpc;
mod sink;
mod watcher;

pub use criteria::WatchCriteria;
pub use decoder::{LogDecoder, RawLogs, SolEventDecoder};
pub use handle::WatchHandle;
pub use rpc::{FilterId, LogRpc};
pub use sink::{Callbacks, LogSink};
pub use watcher::{
    DEFAULT_BATCH, DEFAULT_MAX_BLOCK_RANGE, DEFAULT_POLL_INTERVAL, DEFAULT_STREAM_BUFFER_CAPACITY,
    EventWatcher, EventWatcherBuilder,
};
