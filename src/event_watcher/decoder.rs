use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use alloy::{rpc::types::Log, sol_types::SolEvent};

use crate::WatchError;

/// Turns a raw log into the value handed to the consumer.
///
/// Decoding happens per log; a failure is reported for that log alone and the rest of the tick
/// is still delivered.
pub trait LogDecoder: Send + Sync + 'static {
    type Output: Debug + Send + 'static;

    /// # Errors
    ///
    /// Returns [`WatchError::Decode`] if the log does not match the expected layout.
    fn decode(&self, log: Log) -> Result<Self::Output, WatchError>;
}

/// Hands logs through unchanged.
#[derive(Copy, Clone, Debug, Default)]
pub struct RawLogs;

impl LogDecoder for RawLogs {
    type Output = Log;

    fn decode(&self, log: Log) -> Result<Log, WatchError> {
        Ok(log)
    }
}

/// Decodes logs as the Solidity event `E`, keeping their chain position.
///
/// ```rust
/// use alloy::sol;
/// use event_watcher::SolEventDecoder;
///
/// sol! {
///     event Transfer(address indexed from, address indexed to, uint256 value);
/// }
///
/// let decoder = SolEventDecoder::<Transfer>::new();
/// assert_eq!(SolEventDecoder::<Transfer>::event_name(), "Transfer");
/// ```
pub struct SolEventDecoder<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E: SolEvent> SolEventDecoder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self { _event: PhantomData }
    }

    /// The event name, i.e. the signature up to the argument list.
    #[must_use]
    pub fn event_name() -> &'static str {
        E::SIGNATURE.split_once('(').map_or(E::SIGNATURE, |(name, _)| name)
    }
}

impl<E: SolEvent> Default for SolEventDecoder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for SolEventDecoder<E> {
    fn clone(&self) -> Self {
        Self { _event: PhantomData }
    }
}

impl<E> Debug for SolEventDecoder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolEventDecoder").field("event", &std::any::type_name::<E>()).finish()
    }
}

impl<E> LogDecoder for SolEventDecoder<E>
where
    E: SolEvent + Debug + Send + 'static,
{
    type Output = Log<E>;

    fn decode(&self, log: Log) -> Result<Log<E>, WatchError> {
        log.log_decode::<E>().map_err(|source| {
            trace!(
                event = Self::event_name(),
                block_number = ?log.block_number,
                log_index = ?log.log_index,
                "Failed to decode log"
            );
            WatchError::Decode {
                block_number: log.block_number,
                log_index: log.log_index,
                source: Arc::new(source),
            }
        })
    }
}
