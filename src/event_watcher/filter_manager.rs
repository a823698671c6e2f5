use alloy::{
    rpc::types::Filter,
    transports::{RpcError, TransportErrorKind},
};
use tokio::sync::oneshot;

use crate::{
    WatchCriteria, WatchError,
    event_watcher::{
        cursor::Cursor,
        rpc::{FilterId, LogRpc},
    },
};

/// How a server-side filter was scoped when it was installed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Any log from the watched addresses.
    Logs,
    /// Bound to one or more event signatures.
    Event,
}

/// A filter installed on the node for one watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterHandle {
    pub id: FilterId,
    pub kind: FilterKind,
    pub from_block: u64,
}

/// Filter creation failed; the watch has to query block ranges instead.
#[derive(Debug)]
pub(crate) struct Fallback {
    cause: WatchError,
}

impl Fallback {
    /// The cause, unless it is the expected "node has no filter support" case.
    pub(crate) fn into_reportable(self) -> Option<WatchError> {
        (!matches!(self.cause, WatchError::UnsupportedMethod(_))).then_some(self.cause)
    }
}

/// Installs and removes the server-side filter of one watch.
#[derive(Clone, Debug)]
pub(crate) struct FilterManager {
    base: Filter,
    kind: FilterKind,
}

impl FilterManager {
    pub(crate) fn new(criteria: &WatchCriteria) -> Self {
        let kind = if criteria.is_event_bound() { FilterKind::Event } else { FilterKind::Logs };
        Self { base: Filter::from(criteria), kind }
    }

    /// First installation at watch start. Any failure means falling back to range queries.
    pub(crate) async fn acquire<R: LogRpc>(
        &self,
        rpc: &R,
        cursor: Cursor,
    ) -> Result<FilterHandle, Fallback> {
        self.install(rpc, cursor).await.map_err(|cause| {
            match &cause {
                WatchError::UnsupportedMethod(_) => {
                    info!("Node does not support log filters, falling back to range queries");
                }
                _ => warn!(error = %cause, "Failed to install log filter, falling back to range queries"),
            }
            Fallback { cause }
        })
    }

    /// Reinstalls a filter the node forgot. Errors are returned as-is so the caller can retry on
    /// the next tick.
    pub(crate) async fn recreate<R: LogRpc>(
        &self,
        rpc: &R,
        cursor: Cursor,
    ) -> Result<FilterHandle, WatchError> {
        self.install(rpc, cursor).await
    }

    pub(crate) async fn release<R: LogRpc>(&self, rpc: &R, handle: &FilterHandle) {
        rpc.remove_filter(handle.id).await;
    }

    /// The request runs on its own task. If the watch stops while it is in flight, the id the
    /// node answers with has no receiver and the task uninstalls the filter itself.
    async fn install<R: LogRpc>(&self, rpc: &R, cursor: Cursor) -> Result<FilterHandle, WatchError> {
        let from_block = cursor.next_block();
        let filter = self.base.clone().from_block(from_block);

        let (reply, installed) = oneshot::channel();
        let node = rpc.clone();
        tokio::spawn(async move {
            if let Err(Ok(id)) = reply.send(node.new_log_filter(&filter).await) {
                debug!(filter_id = %id, "Watch stopped during filter installation, removing filter");
                node.remove_filter(id).await;
            }
        });

        let id = installed.await.map_err(|_| {
            WatchError::from(RpcError::<TransportErrorKind>::local_usage_str(
                "filter installation ended without a reply",
            ))
        })??;

        debug!(filter_id = %id, kind = ?self.kind, from_block = from_block, "Log filter installed");

        Ok(FilterHandle { id, kind: self.kind, from_block })
    }
}
