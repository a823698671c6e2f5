use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use alloy::{
    primitives::{Address, B256},
    rpc::types::Log,
    sol,
};
use event_watcher::{
    ChannelState, EventWatcher, EventWatcherBuilder, LogSink, WatchCriteria, WatchError,
    test_utils::{MockRpc, pending_log},
};

sol! {
    #[derive(Debug, PartialEq)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

pub const INTERVAL: Duration = Duration::from_millis(100);
pub const EMITTER: Address = Address::repeat_byte(0x11);
pub const STRANGER: Address = Address::repeat_byte(0x22);

pub fn watcher(rpc: &MockRpc) -> anyhow::Result<EventWatcher<MockRpc>> {
    Ok(EventWatcherBuilder::new().poll_interval(INTERVAL).with_rpc(rpc.clone())?)
}

pub fn emitter_criteria() -> WatchCriteria {
    WatchCriteria::new().contract_address(EMITTER)
}

pub fn emitted() -> Log {
    pending_log(EMITTER, vec![])
}

pub fn emitted_with_topic(topic0: B256) -> Log {
    pending_log(EMITTER, vec![topic0])
}

/// Moves to the middle of the current poll interval, away from tick instants.
pub async fn settle() {
    tokio::time::sleep(INTERVAL / 2).await;
}

/// Sleeps for one poll interval, so exactly one tick fires.
pub async fn next_tick() {
    tokio::time::sleep(INTERVAL).await;
}

/// Sink recording every delivery and error.
pub struct Recorder<T> {
    deliveries: Arc<Mutex<Vec<Vec<T>>>>,
    errors: Arc<Mutex<Vec<WatchError>>>,
}

impl<T> Recorder<T> {
    pub fn new() -> Self {
        Self { deliveries: Arc::default(), errors: Arc::default() }
    }

    pub fn deliveries(&self) -> MutexGuard<'_, Vec<Vec<T>>> {
        self.deliveries.lock().unwrap()
    }

    pub fn errors(&self) -> MutexGuard<'_, Vec<WatchError>> {
        self.errors.lock().unwrap()
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self { deliveries: Arc::clone(&self.deliveries), errors: Arc::clone(&self.errors) }
    }
}

impl<T: Send + 'static> LogSink<T> for Recorder<T> {
    async fn on_logs(&mut self, logs: Vec<T>) -> ChannelState {
        self.deliveries.lock().unwrap().push(logs);
        ChannelState::Open
    }

    async fn on_error(&mut self, error: WatchError) -> ChannelState {
        self.errors.lock().unwrap().push(error);
        ChannelState::Open
    }
}
