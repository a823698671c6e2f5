use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use alloy::{
    primitives::{Address, B256, Bytes, LogData, U256, keccak256},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use tokio::sync::Notify;

use crate::{FilterId, LogRpc, WatchError};

/// The requests [`MockRpc`] answers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    NewFilter,
    FilterChanges,
    GetLogs,
    BlockNumber,
    UninstallFilter,
}

/// In-memory chain answering [`LogRpc`] requests.
///
/// Blocks are mined explicitly. Installed filters behave like a node's: they report logs from
/// blocks mined after installation, each at most once. Failures can be scripted per method and
/// requests can be held until released, to observe a watch while a call is in flight.
#[derive(Clone, Debug, Default)]
pub struct MockRpc {
    chain: Arc<Mutex<MockChain>>,
    resume: Arc<Notify>,
}

#[derive(Debug)]
struct MockChain {
    head: u64,
    logs: Vec<Log>,
    filters: HashMap<FilterId, InstalledFilter>,
    last_filter_id: u64,
    filters_supported: bool,
    failures: HashMap<RpcMethod, VecDeque<Option<WatchError>>>,
    calls: HashMap<RpcMethod, usize>,
    paused: HashSet<RpcMethod>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            head: 0,
            logs: Vec::new(),
            filters: HashMap::new(),
            last_filter_id: 0,
            filters_supported: true,
            failures: HashMap::new(),
            calls: HashMap::new(),
            paused: HashSet::new(),
        }
    }
}

#[derive(Debug)]
struct InstalledFilter {
    filter: Filter,
    next_block: u64,
}

impl MockRpc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mines one block containing `logs`, in order, and returns them with their chain position
    /// filled in.
    pub fn mine(&self, logs: impl IntoIterator<Item = Log>) -> Vec<Log> {
        let mut chain = self.chain();
        chain.head += 1;
        let block = chain.head;
        let block_hash = keccak256(block.to_be_bytes());

        let mined: Vec<Log> = (0u64..)
            .zip(logs)
            .map(|(index, mut log)| {
                log.block_number = Some(block);
                log.block_hash = Some(block_hash);
                log.log_index = Some(index);
                log.transaction_index = Some(index);
                log.transaction_hash = Some(keccak256([block.to_be_bytes(), index.to_be_bytes()].concat()));
                log
            })
            .collect();
        chain.logs.extend(mined.iter().cloned());
        mined
    }

    /// Mines `count` blocks without logs.
    pub fn mine_empty(&self, count: u64) {
        self.chain().head += count;
    }

    #[must_use]
    pub fn block_number(&self) -> u64 {
        self.chain().head
    }

    /// Makes `eth_newFilter` answer as if the method did not exist.
    pub fn set_filters_supported(&self, supported: bool) {
        self.chain().filters_supported = supported;
    }

    /// Forgets every installed filter, like a node restart would.
    pub fn expire_filters(&self) {
        self.chain().filters.clear();
    }

    #[must_use]
    pub fn installed_filters(&self) -> Vec<FilterId> {
        let mut ids: Vec<FilterId> = self.chain().filters.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Fails the next call of `method` with `error`. Queued failures are used in order.
    pub fn fail_next(&self, method: RpcMethod, error: WatchError) {
        self.chain().failures.entry(method).or_default().push_back(Some(error));
    }

    /// Fails the `n`th upcoming call of `method` (1-based), letting the ones before it through.
    pub fn fail_nth(&self, method: RpcMethod, n: usize, error: WatchError) {
        let mut chain = self.chain();
        let queue = chain.failures.entry(method).or_default();
        let position = n.max(1) - 1;
        if queue.len() <= position {
            queue.resize_with(position + 1, || None);
        }
        queue[position] = Some(error);
    }

    /// Number of calls of `method` so far, including failed and held ones.
    #[must_use]
    pub fn calls(&self, method: RpcMethod) -> usize {
        self.chain().calls.get(&method).copied().unwrap_or_default()
    }

    /// Holds calls of `method` until [`resume`](Self::resume) is called.
    pub fn pause(&self, method: RpcMethod) {
        self.chain().paused.insert(method);
    }

    pub fn resume(&self, method: RpcMethod) {
        self.chain().paused.remove(&method);
        self.resume.notify_waiters();
    }

    fn record(&self, method: RpcMethod) {
        *self.chain().calls.entry(method).or_default() += 1;
    }

    fn is_paused(&self, method: RpcMethod) -> bool {
        self.chain().paused.contains(&method)
    }

    fn take_failure(&self, method: RpcMethod) -> Option<WatchError> {
        self.chain().failures.get_mut(&method).and_then(VecDeque::pop_front).flatten()
    }

    async fn enter(&self, method: RpcMethod) -> Result<(), WatchError> {
        self.record(method);
        loop {
            let resumed = self.resume.notified();
            if !self.is_paused(method) {
                break;
            }
            resumed.await;
        }
        self.take_failure(method).map_or(Ok(()), Err)
    }

    fn install(&self, filter: &Filter) -> Result<FilterId, WatchError> {
        let mut chain = self.chain();
        if !chain.filters_supported {
            return Err(WatchError::UnsupportedMethod("eth_newFilter"));
        }
        chain.last_filter_id += 1;
        let id = U256::from(chain.last_filter_id);
        let next_block = chain.head + 1;
        chain.filters.insert(id, InstalledFilter { filter: filter.clone(), next_block });
        Ok(id)
    }

    fn drain(&self, id: FilterId) -> Result<Vec<Log>, WatchError> {
        let mut guard = self.chain();
        let chain = &mut *guard;
        let Some(installed) = chain.filters.get_mut(&id) else {
            return Err(WatchError::FilterNotFound(id));
        };

        let from = installed.next_block;
        let changes = chain
            .logs
            .iter()
            .filter(|log| log.block_number.is_some_and(|block| block >= from))
            .filter(|log| filter_matches(&installed.filter, log))
            .cloned()
            .collect();
        installed.next_block = chain.head + 1;
        Ok(changes)
    }

    fn query(&self, filter: &Filter) -> Vec<Log> {
        self.chain().logs.iter().filter(|log| filter_matches(filter, log)).cloned().collect()
    }
}

fn filter_matches(filter: &Filter, log: &Log) -> bool {
    let block = log.block_number.unwrap_or_default();
    if filter.get_from_block().is_some_and(|from| block < from)
        || filter.get_to_block().is_some_and(|to| block > to)
    {
        return false;
    }
    if !filter.address.matches(&log.address()) {
        return false;
    }
    let topics = log.topics();
    filter
        .topics
        .iter()
        .enumerate()
        .all(|(i, set)| set.is_empty() || topics.get(i).is_some_and(|topic| set.matches(topic)))
}

impl LogRpc for MockRpc {
    async fn new_log_filter(&self, filter: &Filter) -> Result<FilterId, WatchError> {
        self.enter(RpcMethod::NewFilter).await?;
        self.install(filter)
    }

    async fn filter_changes(&self, id: FilterId) -> Result<Vec<Log>, WatchError> {
        self.enter(RpcMethod::FilterChanges).await?;
        self.drain(id)
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, WatchError> {
        self.enter(RpcMethod::GetLogs).await?;
        Ok(self.query(filter))
    }

    async fn head(&self) -> Result<u64, WatchError> {
        self.enter(RpcMethod::BlockNumber).await?;
        Ok(self.block_number())
    }

    async fn remove_filter(&self, id: FilterId) {
        if self.enter(RpcMethod::UninstallFilter).await.is_ok() {
            self.chain().filters.remove(&id);
        }
    }
}

/// A log that has not been mined yet, with empty data.
#[must_use]
pub fn pending_log(address: Address, topics: Vec<B256>) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data: LogData::new_unchecked(topics, Bytes::new()) },
        ..Default::default()
    }
}

/// A not yet mined log carrying the ABI encoding of `event`.
#[must_use]
pub fn event_log<E: SolEvent>(address: Address, event: &E) -> Log {
    Log { inner: alloy::primitives::Log { address, data: event.encode_log_data() }, ..Default::default() }
}
