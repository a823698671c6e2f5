use std::sync::{Arc, Mutex};

use alloy::{
    primitives::{Address, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use event_watcher::{
    Callbacks, WatchError, assert_event_sequence, assert_empty,
    test_utils::{MockRpc, RpcMethod, event_log, pending_log},
};

use crate::common::{
    EMITTER, Recorder, Transfer, emitted, emitter_criteria, next_tick, settle, watcher,
};

fn transfer(value: u64) -> Transfer {
    Transfer { from: Address::repeat_byte(1), to: Address::repeat_byte(2), value: U256::from(value) }
}

fn truncated_transfer() -> Log {
    pending_log(EMITTER, vec![
        Transfer::SIGNATURE_HASH,
        Address::repeat_byte(1).into_word(),
        Address::repeat_byte(2).into_word(),
    ])
}

#[tokio::test(start_paused = true)]
async fn raw_stream_carries_abi_encoded_events() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let (_handle, mut stream) = watcher(&rpc)?.watch_stream(emitter_criteria());

    settle().await;
    rpc.mine([event_log(EMITTER, &transfer(1)), event_log(EMITTER, &transfer(2))]);
    next_tick().await;
    rpc.mine([event_log(EMITTER, &transfer(3))]);

    assert_event_sequence!(stream, &[transfer(1), transfer(2), transfer(3)]);
    assert_empty!(stream);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn typed_watch_decodes_and_reports_bad_entries() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let recorder = Recorder::<Log<Transfer>>::new();
    let _handle = watcher(&rpc)?.watch_event::<Transfer, _>(emitter_criteria(), recorder.clone());

    settle().await;
    rpc.mine([
        event_log(EMITTER, &transfer(1)),
        truncated_transfer(),
        emitted(),
        event_log(EMITTER, &transfer(3)),
    ]);
    next_tick().await;

    // the untyped log does not carry the event signature, so it never matches
    let deliveries = recorder.deliveries();
    assert_eq!(deliveries.len(), 1);
    let values: Vec<U256> = deliveries[0].iter().map(|log| log.inner.data.value).collect();
    assert_eq!(values, vec![U256::from(1), U256::from(3)]);
    assert_eq!(deliveries[0][1].log_index, Some(3));

    let errors = recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        WatchError::Decode { block_number: Some(1), log_index: Some(1), .. }
    ));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn closures_receive_deliveries_and_errors() -> anyhow::Result<()> {
    let rpc = MockRpc::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let callbacks = Callbacks::new({
        let seen = Arc::clone(&seen);
        move |logs: Vec<Log>| seen.lock().unwrap().push(logs.len())
    })
    .with_error_handler({
        let errors = Arc::clone(&errors);
        move |err: WatchError| errors.lock().unwrap().push(err.to_string())
    });
    let handle = watcher(&rpc)?.watch(emitter_criteria(), callbacks);

    settle().await;
    rpc.mine([emitted(), emitted(), emitted()]);
    rpc.fail_next(RpcMethod::FilterChanges, WatchError::Timeout);
    next_tick().await;
    next_tick().await;

    assert_eq!(*errors.lock().unwrap(), vec!["Operation timed out".to_string()]);
    assert_eq!(*seen.lock().unwrap(), vec![3]);

    handle.unwatch();

    Ok(())
}
