//! The RPC surface a watch needs, and its implementation on top of [`RobustProvider`].

use alloy::{
    network::Network,
    primitives::U256,
    rpc::{
        json_rpc::ErrorPayload,
        types::{Filter, Log},
    },
};

use crate::{WatchError, robust_provider::RobustProvider};

/// Server-issued filter identifier.
pub type FilterId = U256;

const METHOD_NOT_FOUND: i64 = -32601;

/// Request/response operations consumed by a watch.
///
/// Implementations classify node errors: filter creation reports a missing method as
/// [`WatchError::UnsupportedMethod`] and change retrieval reports an unknown id as
/// [`WatchError::FilterNotFound`]. Everything else is passed through as a transport error.
pub trait LogRpc: Clone + Send + Sync + 'static {
    /// `eth_newFilter`
    fn new_log_filter(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<FilterId, WatchError>> + Send;

    /// `eth_getFilterChanges` for a log filter.
    fn filter_changes(
        &self,
        id: FilterId,
    ) -> impl Future<Output = Result<Vec<Log>, WatchError>> + Send;

    /// `eth_getLogs` with an explicit block range set on `filter`.
    fn logs(&self, filter: &Filter) -> impl Future<Output = Result<Vec<Log>, WatchError>> + Send;

    /// `eth_blockNumber`
    fn head(&self) -> impl Future<Output = Result<u64, WatchError>> + Send;

    /// `eth_uninstallFilter`. Best effort; failures are only logged.
    fn remove_filter(&self, id: FilterId) -> impl Future<Output = ()> + Send;
}

impl<N: Network> LogRpc for RobustProvider<N> {
    async fn new_log_filter(&self, filter: &Filter) -> Result<FilterId, WatchError> {
        self.new_filter(filter).await.map_err(|err| match err.as_error_resp() {
            Some(payload) if is_unsupported_method(payload) => {
                WatchError::UnsupportedMethod("eth_newFilter")
            }
            _ => err.into(),
        })
    }

    async fn filter_changes(&self, id: FilterId) -> Result<Vec<Log>, WatchError> {
        self.get_filter_changes(id).await.map_err(|err| match err.as_error_resp() {
            Some(payload) if is_filter_not_found(payload) => WatchError::FilterNotFound(id),
            _ => err.into(),
        })
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, WatchError> {
        Ok(self.get_logs(filter).await?)
    }

    async fn head(&self) -> Result<u64, WatchError> {
        Ok(self.get_block_number().await?)
    }

    async fn remove_filter(&self, id: FilterId) {
        match self.uninstall_filter(id).await {
            Ok(true) => debug!(filter_id = %id, "Filter uninstalled"),
            Ok(false) => debug!(filter_id = %id, "Filter was already gone"),
            Err(e) => debug!(filter_id = %id, error = %e, "Failed to uninstall filter"),
        }
    }
}

/// Whether a node error means the method is not implemented (or disabled) on that node.
pub(crate) fn is_unsupported_method(payload: &ErrorPayload) -> bool {
    if payload.code == METHOD_NOT_FOUND {
        return true;
    }
    let message = payload.message.to_ascii_lowercase();
    ["method not found", "not supported", "unsupported", "does not exist", "not available"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Whether a node error means the filter id is unknown (expired, uninstalled, or the node
/// restarted).
pub(crate) fn is_filter_not_found(payload: &ErrorPayload) -> bool {
    let message = payload.message.to_ascii_lowercase();
    message.contains("filter")
        && ["not found", "does not exist", "unknown", "expired"]
            .iter()
            .any(|needle| message.contains(needle))
}
