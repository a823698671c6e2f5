//! The two ways a watch can learn about new logs on each tick.
//!
//! [`FilterMode`] drains a server-side filter with `eth_getFilterChanges`. [`DirectMode`] asks
//! for the head and queries `eth_getLogs` over the blocks not covered yet. The mode is chosen
//! once at watch start; the only later switch is from filter mode to direct mode, when a node
//! stops accepting filters while one has to be reinstalled.
//!
//! Range queries are split into chunks of at most `max_block_range` blocks. A failing chunk
//! keeps the progress made before it.

use std::ops::RangeInclusive;

use alloy::rpc::types::{Filter, Log};

use crate::{
    WatchCriteria, WatchError,
    event_watcher::{
        cursor::{Cursor, chunked},
        filter_manager::{FilterHandle, FilterManager},
        rpc::LogRpc,
    },
};

/// Outcome of a tick that made progress: the entries to deliver, the cursor to keep, and
/// faults to report after delivery.
#[derive(Debug)]
pub(crate) struct Polled {
    pub logs: Vec<Log>,
    pub cursor: Cursor,
    pub errors: Vec<WatchError>,
}

impl Polled {
    fn nothing(cursor: Cursor) -> Self {
        Self { logs: Vec::new(), cursor, errors: Vec::new() }
    }
}

/// Retrieves the entries produced since the last tick.
///
/// An `Err` means the tick made no progress; the caller keeps its previous cursor, so the next
/// tick covers the same blocks again.
pub(crate) trait Poll {
    fn poll<R: LogRpc>(
        &mut self,
        rpc: &R,
        criteria: &WatchCriteria,
        cursor: Cursor,
    ) -> impl Future<Output = Result<Polled, WatchError>> + Send;
}

/// Keeps only live entries that satisfy the criteria and moves the cursor past them.
fn accept(criteria: &WatchCriteria, logs: Vec<Log>, mut cursor: Cursor) -> (Vec<Log>, Cursor) {
    let logs = logs
        .into_iter()
        .filter(|log| {
            if log.removed {
                trace!(block_number = ?log.block_number, "Skipping removed log");
                return false;
            }
            criteria.matches(log)
        })
        .inspect(|log| {
            if let Some(block) = log.block_number {
                cursor = cursor.advanced_past(block);
            }
        })
        .collect();
    (logs, cursor)
}

/// Result of a chunked range query.
struct RangeRead {
    logs: Vec<Log>,
    /// First block of the range that was not read.
    next: u64,
    error: Option<WatchError>,
}

async fn read_range<R: LogRpc>(
    rpc: &R,
    criteria: &WatchCriteria,
    range: RangeInclusive<u64>,
    max_block_range: u64,
) -> RangeRead {
    let mut read = RangeRead { logs: Vec::new(), next: *range.start(), error: None };

    for chunk in chunked(range, max_block_range) {
        debug!(from_block = *chunk.start(), to_block = *chunk.end(), "Querying block range");
        let filter = Filter::from(criteria).from_block(*chunk.start()).to_block(*chunk.end());
        match rpc.logs(&filter).await {
            Ok(logs) => {
                read.logs.extend(logs);
                read.next = chunk.end().saturating_add(1);
            }
            Err(err) => {
                read.error = Some(err);
                break;
            }
        }
    }
    read
}

/// Blocks a freshly installed filter cannot report, read with range queries.
///
/// The upper end is the head observed after installation and stays fixed until the backfill
/// is done, so every block up to it is read exactly once per installation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Backfill {
    next: u64,
    to: Option<u64>,
}

/// Polls a server-side filter.
#[derive(Debug)]
pub(crate) struct FilterMode {
    manager: FilterManager,
    handle: Option<FilterHandle>,
    backfill: Option<Backfill>,
    /// Filter changes at or below this block are left to the backfill.
    backfilled_to: Option<u64>,
    max_block_range: u64,
}

impl FilterMode {
    /// `backfill_from` requests range queries from that block up to the head before the filter
    /// is drained, for blocks that were mined before the filter existed.
    pub(crate) fn new(
        manager: FilterManager,
        handle: FilterHandle,
        backfill_from: Option<u64>,
        max_block_range: u64,
    ) -> Self {
        Self {
            manager,
            handle: Some(handle),
            backfill: backfill_from.map(|next| Backfill { next, to: None }),
            backfilled_to: None,
            max_block_range,
        }
    }

    pub(crate) fn handle(&self) -> Option<&FilterHandle> {
        self.handle.as_ref()
    }

    /// Where a watch has to continue from if this filter is abandoned.
    fn resume_point(&self, cursor: Cursor) -> Cursor {
        self.backfill.map_or(cursor, |backfill| cursor.min(Cursor::starting_at(backfill.next)))
    }

    /// Removes the installed filter from the node, if any.
    pub(crate) async fn release<R: LogRpc>(&self, rpc: &R) {
        if let Some(handle) = &self.handle {
            self.manager.release(rpc, handle).await;
        }
    }

    async fn reinstall<R: LogRpc>(&mut self, rpc: &R, cursor: Cursor) -> Result<(), WatchError> {
        let handle = self.manager.recreate(rpc, cursor).await?;
        info!(filter_id = %handle.id, from_block = handle.from_block, "Log filter reinstalled");
        self.handle = Some(handle);
        // an unfinished backfill of the previous filter is folded into the new one
        let next = self.resume_point(cursor).next_block();
        self.backfill = Some(Backfill { next, to: None });
        Ok(())
    }

    /// Advances the pending backfill as far as the node allows on this tick.
    async fn run_backfill<R: LogRpc>(
        &mut self,
        rpc: &R,
        criteria: &WatchCriteria,
        polled: &mut Polled,
    ) {
        let Some(mut backfill) = self.backfill else {
            return;
        };

        let to = match backfill.to {
            Some(to) => to,
            None => match rpc.head().await {
                Ok(head) => {
                    backfill.to = Some(head);
                    self.backfilled_to = Some(head);
                    head
                }
                Err(err) => {
                    polled.errors.push(err);
                    return;
                }
            },
        };

        if backfill.next <= to {
            let read = read_range(rpc, criteria, backfill.next..=to, self.max_block_range).await;
            let (logs, cursor) = accept(criteria, read.logs, polled.cursor);
            polled.logs.extend(logs);
            polled.cursor = cursor;
            backfill.next = read.next;
            if let Some(err) = read.error {
                warn!(error = %err, next_block = backfill.next, "Backfill incomplete, continuing next tick");
                polled.errors.push(err);
            }
        }

        if backfill.next > to {
            polled.cursor = polled.cursor.advanced_past(to);
            self.backfill = None;
        } else {
            self.backfill = Some(backfill);
        }
    }
}

impl Poll for FilterMode {
    async fn poll<R: LogRpc>(
        &mut self,
        rpc: &R,
        criteria: &WatchCriteria,
        cursor: Cursor,
    ) -> Result<Polled, WatchError> {
        if self.handle.is_none() {
            self.reinstall(rpc, cursor).await?;
        }

        let mut polled = Polled::nothing(cursor);
        self.run_backfill(rpc, criteria, &mut polled).await;

        let Some(handle) = &self.handle else {
            return Ok(polled);
        };

        match rpc.filter_changes(handle.id).await {
            Ok(mut changes) => {
                if let Some(covered) = self.backfilled_to {
                    changes.retain(|log| log.block_number.is_none_or(|block| block > covered));
                }
                let (logs, cursor) = accept(criteria, changes, polled.cursor);
                polled.logs.extend(logs);
                polled.cursor = cursor;
            }
            Err(WatchError::FilterNotFound(id)) => {
                self.handle = None;
                if polled.logs.is_empty() && polled.errors.is_empty() {
                    return Err(WatchError::FilterNotFound(id));
                }
                // the filter is reinstalled next tick
                debug!(filter_id = %id, "Log filter lost after backfill");
            }
            Err(err) => {
                if polled.logs.is_empty() && polled.errors.is_empty() && self.backfill.is_none() {
                    return Err(err);
                }
                polled.errors.push(err);
            }
        }
        Ok(polled)
    }
}

/// Queries block ranges directly.
#[derive(Copy, Clone, Debug)]
pub(crate) struct DirectMode {
    max_block_range: u64,
}

impl DirectMode {
    pub(crate) fn new(max_block_range: u64) -> Self {
        Self { max_block_range }
    }
}

impl Poll for DirectMode {
    async fn poll<R: LogRpc>(
        &mut self,
        rpc: &R,
        criteria: &WatchCriteria,
        cursor: Cursor,
    ) -> Result<Polled, WatchError> {
        let head = rpc.head().await?;
        let Some(range) = cursor.pending_range(head) else {
            trace!(head = head, next_block = cursor.next_block(), "No new blocks");
            return Ok(Polled::nothing(cursor));
        };

        let read = read_range(rpc, criteria, range, self.max_block_range).await;
        match read.error {
            Some(err) if read.next == cursor.next_block() => Err(err),
            error => {
                let (logs, accepted) = accept(criteria, read.logs, cursor);
                let cursor = accepted.advanced_past(read.next.saturating_sub(1));
                Ok(Polled { logs, cursor, errors: error.into_iter().collect() })
            }
        }
    }
}

/// The retrieval strategy of one watch.
#[derive(Debug)]
pub(crate) enum PollSource {
    Filter(FilterMode),
    Direct(DirectMode),
}

impl PollSource {
    pub(crate) fn mode_name(&self) -> &'static str {
        match self {
            PollSource::Filter(_) => "filter",
            PollSource::Direct(_) => "direct",
        }
    }

    /// Removes server-side state held by this source.
    pub(crate) async fn release<R: LogRpc>(&self, rpc: &R) {
        if let PollSource::Filter(mode) = self {
            mode.release(rpc).await;
        }
    }
}

impl Poll for PollSource {
    async fn poll<R: LogRpc>(
        &mut self,
        rpc: &R,
        criteria: &WatchCriteria,
        cursor: Cursor,
    ) -> Result<Polled, WatchError> {
        match self {
            PollSource::Filter(mode) => match mode.poll(rpc, criteria, cursor).await {
                Err(WatchError::UnsupportedMethod(method)) => {
                    info!(method = method, "Node stopped accepting filters, switching to range queries");
                    let resume = mode.resume_point(cursor);
                    let direct = DirectMode::new(mode.max_block_range);
                    *self = PollSource::Direct(direct);
                    Ok(Polled::nothing(resume))
                }
                other => other,
            },
            PollSource::Direct(mode) => mode.poll(rpc, criteria, cursor).await,
        }
    }
}
