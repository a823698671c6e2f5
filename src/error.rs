use std::{mem::discriminant, sync::Arc};

use alloy::{
    primitives::U256,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

use crate::{robust_provider::provider::Error as RobustProviderError, types::WatchResult};

/// Errors produced while watching for logs.
///
/// Apart from the `Invalid*` configuration variants, which are returned when an
/// [`EventWatcherBuilder`](crate::EventWatcherBuilder) is turned into a watcher, every variant is a
/// per-tick fault: it is reported to the consumer (or handled internally) and the watch keeps
/// polling. A watch only stops when it is unwatched or its sink is closed.
#[derive(Error, Debug, Clone)]
pub enum WatchError {
    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// A timeout elapsed while waiting for an RPC response.
    #[error("Operation timed out")]
    Timeout,

    /// The node does not implement the named RPC method.
    ///
    /// Raised by filter creation; the watcher handles it by switching to range queries and never
    /// forwards it to the consumer.
    #[error("RPC method {0} is not supported by the node")]
    UnsupportedMethod(&'static str),

    /// The node no longer knows the filter with the given id.
    ///
    /// The watcher recreates the filter and keeps going; the consumer never sees this error.
    #[error("Filter {0:#x} not found")]
    FilterNotFound(U256),

    /// A log matched the watch criteria but could not be decoded.
    ///
    /// Only the affected log is dropped; the rest of the tick is still delivered.
    #[error("Failed to decode log at block {block_number:?}, index {log_index:?}: {source}")]
    Decode {
        block_number: Option<u64>,
        log_index: Option<u64>,
        #[source]
        source: Arc<alloy::sol_types::Error>,
    },

    /// The configured poll interval is invalid (must be greater than zero).
    #[error("Poll interval must be greater than 0")]
    InvalidPollInterval,

    /// The configured stream buffer capacity is invalid (must be greater than zero).
    #[error("Buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    /// The configured maximum block range is invalid (must be greater than zero).
    #[error("Max block range must be greater than 0")]
    InvalidMaxBlockRange,
}

impl WatchError {
    /// Returns `true` for errors the watcher recovers from without involving the consumer.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, WatchError::UnsupportedMethod(_) | WatchError::FilterNotFound(_))
    }
}

impl From<RobustProviderError> for WatchError {
    fn from(error: RobustProviderError) -> WatchError {
        match error {
            RobustProviderError::Timeout => WatchError::Timeout,
            RobustProviderError::RpcError(err) => WatchError::RpcError(err),
        }
    }
}

impl From<RpcError<TransportErrorKind>> for WatchError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        WatchError::RpcError(Arc::new(error))
    }
}

impl<T> PartialEq<WatchError> for WatchResult<T> {
    fn eq(&self, other: &WatchError) -> bool {
        match self {
            Ok(_) => false,
            Err(err) => discriminant(err) == discriminant(other),
        }
    }
}
