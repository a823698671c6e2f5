use alloy::{
    primitives::{Address, B256, keccak256},
    rpc::types::Log,
};
use event_watcher::{
    EventWatcherBuilder, WatchCriteria, assert_empty, assert_next,
    test_utils::{MockRpc, RpcMethod, pending_log},
};

use crate::common::{
    EMITTER, INTERVAL, Recorder, STRANGER, emitted, emitter_criteria, next_tick, settle, watcher,
};

const TRANSFER_SIG: &str = "Transfer(address,address,uint256)";
const APPROVAL_SIG: &str = "Approval(address,address,uint256)";

#[tokio::test(start_paused = true)]
async fn address_and_event_must_both_match() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let criteria = emitter_criteria().event(TRANSFER_SIG);
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(criteria);

    settle().await;
    let mined = rpc.mine([
        pending_log(EMITTER, vec![keccak256(APPROVAL_SIG)]),
        pending_log(STRANGER, vec![keccak256(TRANSFER_SIG)]),
        pending_log(EMITTER, vec![keccak256(TRANSFER_SIG)]),
    ]);

    assert_next!(stream, vec![mined[2].clone()]);
    next_tick().await;
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn listed_addresses_are_alternatives() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let criteria = WatchCriteria::new().contract_addresses([EMITTER, STRANGER]);
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(criteria);

    settle().await;
    let mined = rpc.mine([
        pending_log(STRANGER, vec![]),
        pending_log(Address::repeat_byte(0x33), vec![]),
        emitted(),
    ]);

    assert_next!(stream, vec![mined[0].clone(), mined[2].clone()]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn indexed_arguments_narrow_the_match() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let sender = Address::repeat_byte(0xaa).into_word();
    let criteria = WatchCriteria::new().event(TRANSFER_SIG).topic1(sender);
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(criteria);

    settle().await;
    let mined = rpc.mine([
        pending_log(EMITTER, vec![keccak256(TRANSFER_SIG), B256::repeat_byte(0xbb)]),
        pending_log(STRANGER, vec![keccak256(TRANSFER_SIG), sender]),
    ]);

    assert_next!(stream, vec![mined[1].clone()]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watches_are_isolated() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let watcher = watcher(&rpc)?;
    let (first, mut first_stream) = watcher.watch_stream(emitter_criteria());
    let (_second, mut second_stream) =
        watcher.watch_stream(WatchCriteria::new().contract_address(STRANGER));

    settle().await;
    assert_eq!(rpc.installed_filters().len(), 2);
    let mined = rpc.mine([emitted(), pending_log(STRANGER, vec![])]);

    assert_next!(first_stream, vec![mined[0].clone()]);
    assert_next!(second_stream, vec![mined[1].clone()]);

    first.unwatch();
    settle().await;
    let later = rpc.mine([emitted(), pending_log(STRANGER, vec![])]);

    assert_next!(second_stream, vec![later[1].clone()]);
    assert_eq!(rpc.installed_filters().len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn explicit_start_block_delivers_history_first() -> anyhow::Result<()> {
    for filters_supported in [true, false] {
        let rpc = MockRpc::new();
        rpc.set_filters_supported(filters_supported);
        rpc.mine([emitted()]);
        let second = rpc.mine([emitted()]);
        let third = rpc.mine([emitted()]);

        let watcher =
            EventWatcherBuilder::new().poll_interval(INTERVAL).from_block(2).with_rpc(rpc.clone())?;
        let (handle, mut stream) = watcher.watch_stream(emitter_criteria());

        assert_next!(stream, [second, third].concat());

        settle().await;
        let fourth = rpc.mine([emitted()]);
        assert_next!(stream, fourth);

        handle.unwatch();
    }

    Ok(())
}

/// Mines a fixed script against `rpc` and returns what the watch delivered.
async fn run_script(rpc: MockRpc) -> anyhow::Result<Vec<Vec<Log>>> {
    let recorder = Recorder::<Log>::new();
    let handle = watcher(&rpc)?.watch(emitter_criteria(), recorder.clone());

    settle().await;
    rpc.mine([emitted(), pending_log(STRANGER, vec![]), emitted()]);
    next_tick().await;
    rpc.mine([pending_log(STRANGER, vec![])]);
    next_tick().await;
    rpc.mine([emitted()]);
    rpc.mine_empty(3);
    rpc.mine([emitted()]);
    next_tick().await;
    next_tick().await;

    handle.unwatch();
    assert!(recorder.errors().is_empty());
    let deliveries = recorder.deliveries().clone();
    Ok(deliveries)
}

#[tokio::test(start_paused = true)]
async fn both_retrieval_modes_deliver_the_same_entries() -> anyhow::Result<()> {
    let with_filters = MockRpc::new();
    let without_filters = MockRpc::new();
    without_filters.set_filters_supported(false);

    let filtered = run_script(with_filters.clone()).await?;
    let queried = run_script(without_filters.clone()).await?;

    assert_eq!(filtered.len(), 2);
    assert_eq!(filtered, queried);
    assert_eq!(with_filters.calls(RpcMethod::GetLogs), 0);
    assert_eq!(without_filters.calls(RpcMethod::FilterChanges), 0);

    Ok(())
}
