use event_watcher::{
    WatchError, assert_empty, assert_next,
    test_utils::{MockRpc, RpcMethod},
};

use crate::common::{emitted, emitter_criteria, next_tick, settle, watcher};

fn node_without_filters() -> MockRpc {
    let rpc = MockRpc::new();
    rpc.set_filters_supported(false);
    rpc
}

#[tokio::test(start_paused = true)]
async fn falls_back_silently_when_filters_are_unsupported() -> anyhow::Result<()> {
    let rpc = node_without_filters();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let first = rpc.mine([emitted(), emitted()]);
    assert_next!(stream, first);

    settle().await;
    let second = rpc.mine([emitted()]);
    assert_next!(stream, second);

    next_tick().await;
    assert_empty!(stream);
    assert_eq!(rpc.calls(RpcMethod::NewFilter), 1);
    assert!(rpc.calls(RpcMethod::GetLogs) >= 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn idle_ticks_skip_the_range_query() -> anyhow::Result<()> {
    let rpc = node_without_filters();
    let (_handle, stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    for _ in 0..3 {
        next_tick().await;
    }

    assert_eq!(rpc.calls(RpcMethod::GetLogs), 0);
    assert!(rpc.calls(RpcMethod::BlockNumber) >= 4);
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn each_block_range_is_queried_once() -> anyhow::Result<()> {
    let rpc = node_without_filters();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let mined = rpc.mine([emitted()]);
    assert_next!(stream, mined);

    settle().await;
    rpc.mine_empty(2);
    next_tick().await;
    next_tick().await;

    // one query per block advance, none while the head stands still
    assert_eq!(rpc.calls(RpcMethod::GetLogs), 2);
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_range_query_is_repeated_next_tick() -> anyhow::Result<()> {
    let rpc = node_without_filters();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let mined = rpc.mine([emitted()]);
    rpc.fail_next(RpcMethod::GetLogs, WatchError::Timeout);

    assert_next!(stream, Err(WatchError::Timeout));
    assert_next!(stream, mined);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_head_read_is_reported() -> anyhow::Result<()> {
    let rpc = node_without_filters();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let mined = rpc.mine([emitted()]);
    rpc.fail_next(RpcMethod::BlockNumber, WatchError::Timeout);

    assert_next!(stream, Err(WatchError::Timeout));
    assert_next!(stream, mined);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn filter_creation_failure_is_reported_before_falling_back() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    rpc.fail_next(RpcMethod::NewFilter, WatchError::Timeout);
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    assert_next!(stream, Err(WatchError::Timeout));

    settle().await;
    let mined = rpc.mine([emitted()]);
    assert_next!(stream, mined);

    assert_eq!(rpc.calls(RpcMethod::NewFilter), 1);
    assert!(rpc.installed_filters().is_empty());

    Ok(())
}
