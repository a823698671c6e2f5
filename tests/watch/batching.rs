use event_watcher::{EventWatcherBuilder, assert_empty, assert_next, test_utils::MockRpc};

use crate::common::{INTERVAL, emitted, emitter_criteria, next_tick, settle, watcher};

#[tokio::test(start_paused = true)]
async fn per_entry_mode_delivers_each_log_in_order() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let watcher =
        EventWatcherBuilder::new().poll_interval(INTERVAL).batch(false).with_rpc(rpc.clone())?;
    let (_handle, mut stream) = watcher.watch_stream(emitter_criteria());

    settle().await;
    let first = rpc.mine([emitted(), emitted()]);
    let second = rpc.mine([emitted()]);

    assert_next!(stream, vec![first[0].clone()]);
    assert_next!(stream, vec![first[1].clone()]);
    assert_next!(stream, vec![second[0].clone()]);
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn batch_mode_merges_blocks_of_one_tick() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    let first = rpc.mine([emitted(), emitted()]);
    let second = rpc.mine([emitted()]);

    assert_next!(stream, [first, second].concat());
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_ticks_deliver_nothing() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (_handle, stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    for _ in 0..5 {
        rpc.mine_empty(1);
        next_tick().await;
    }

    assert_empty!(stream);

    Ok(())
}
