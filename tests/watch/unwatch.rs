use std::time::Duration;

use event_watcher::{
    WatchCriteria, WatchState, assert_closed, assert_next,
    test_utils::{MockRpc, RpcMethod},
};

use crate::common::{STRANGER, emitted, emitter_criteria, next_tick, settle, watcher};

#[tokio::test(start_paused = true)]
async fn unwatch_ends_deliveries_and_uninstalls_the_filter() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let mined = rpc.mine([emitted()]);
    assert_next!(stream, mined);

    handle.unwatch();
    assert_eq!(handle.state(), WatchState::Stopped);
    rpc.mine([emitted()]);

    assert_closed!(stream);
    assert_eq!(rpc.calls(RpcMethod::UninstallFilter), 1);
    assert!(rpc.installed_filters().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn result_in_flight_at_unwatch_is_discarded() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    rpc.pause(RpcMethod::FilterChanges);
    rpc.mine([emitted()]);

    // the tick at one interval is now waiting on eth_getFilterChanges
    next_tick().await;
    assert_eq!(rpc.calls(RpcMethod::FilterChanges), 1);

    handle.unwatch();
    rpc.resume(RpcMethod::FilterChanges);

    assert_closed!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unwatch_before_the_first_tick_makes_no_requests() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    handle.unwatch();

    assert_closed!(stream);
    assert_eq!(rpc.calls(RpcMethod::BlockNumber), 0);
    assert_eq!(rpc.calls(RpcMethod::NewFilter), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unwatch_twice_is_harmless() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    handle.unwatch();
    handle.clone().unwatch();

    assert_closed!(stream);
    assert_eq!(rpc.calls(RpcMethod::UninstallFilter), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_stops_the_watch() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    drop(stream);
    rpc.mine([emitted()]);

    tokio::time::timeout(Duration::from_secs(5), handle.stopped()).await?;
    assert_eq!(handle.state(), WatchState::Stopped);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_keeps_watching() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());
    drop(handle);

    settle().await;
    let mined = rpc.mine([emitted()]);
    assert_next!(stream, mined);

    next_tick().await;
    assert_eq!(rpc.calls(RpcMethod::UninstallFilter), 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_stream_stops_a_quiet_watch() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let quiet = WatchCriteria::new().contract_address(STRANGER);
    let (handle, stream) = watcher(&rpc)?.watch_stream(quiet);

    settle().await;
    assert_eq!(rpc.installed_filters().len(), 1);

    drop(stream);
    rpc.mine([emitted()]);

    tokio::time::timeout(Duration::from_secs(5), handle.stopped()).await?;
    assert_eq!(handle.state(), WatchState::Stopped);
    settle().await;
    assert!(rpc.installed_filters().is_empty());

    let polls = rpc.calls(RpcMethod::FilterChanges);
    next_tick().await;
    next_tick().await;
    assert_eq!(rpc.calls(RpcMethod::FilterChanges), polls);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn filter_installed_after_unwatch_is_removed() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    rpc.pause(RpcMethod::NewFilter);
    let (handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    // the first tick is now waiting on eth_newFilter
    settle().await;
    assert_eq!(rpc.calls(RpcMethod::NewFilter), 1);

    handle.unwatch();
    assert_closed!(stream);

    rpc.resume(RpcMethod::NewFilter);
    settle().await;

    assert!(rpc.installed_filters().is_empty());
    assert_eq!(rpc.calls(RpcMethod::UninstallFilter), 1);

    Ok(())
}
