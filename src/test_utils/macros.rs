use alloy::{primitives::LogData, rpc::types::Log};
use tokio_stream::Stream;

use crate::WatchResult;

/// Asserts the next item of a watch stream.
///
/// `assert_next!(stream, Err(WatchError::Timeout))` compares the error kind only;
/// `assert_next!(stream, logs)` expects `Ok(logs)`. Waits up to 5 seconds unless
/// `timeout = N` is given.
#[macro_export]
macro_rules! assert_next {
    ($stream: expr, Err($expected_err:expr)) => {
        $crate::assert_next!($stream, Err($expected_err), timeout = 5)
    };
    ($stream: expr, Err($expected_err:expr), timeout = $secs: expr) => {
        let item = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out waiting for the next item");
        match item {
            Some(item) => {
                let expected = &$expected_err;
                assert_eq!(&item, expected, "Expected error {:?}, got {:?}", expected, item);
            }
            None => panic!("Expected error {:?}, but the stream ended", $expected_err),
        }
    };
    ($stream: expr, $expected: expr) => {
        $crate::assert_next!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let item = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out waiting for the next item");
        let expected = $expected;
        match item {
            Some(Ok(logs)) => assert_eq!(logs, expected, "Expected {:?}, got {:?}", expected, logs),
            Some(Err(err)) => panic!("Expected Ok({:?}), got Err({:?})", expected, err),
            None => panic!("Expected Ok({:?}), but the stream ended", expected),
        }
    };
}

/// Asserts that a watch stream ends without yielding anything else.
#[macro_export]
macro_rules! assert_closed {
    ($stream: expr) => {
        $crate::assert_closed!($stream, timeout = 5)
    };
    ($stream: expr, timeout = $secs: expr) => {
        let item = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out waiting for the stream to end");
        assert!(item.is_none(), "Expected the stream to end, got {:?}", item);
    };
}

/// Asserts that nothing is buffered in a `ReceiverStream` and hands the stream back.
#[macro_export]
macro_rules! assert_empty {
    ($stream: expr) => {{
        let receiver = $stream.into_inner();
        assert!(receiver.is_empty(), "Stream should have no pending items");
        tokio_stream::wrappers::ReceiverStream::new(receiver)
    }};
}

/// Asserts that a watch stream yields the given Solidity events in order, however they are
/// split across deliveries.
///
/// Events are compared by their encoded log data.
///
/// ```no_run
/// # use alloy::{primitives::U256, sol};
/// # use event_watcher::assert_event_sequence;
/// sol! {
///     event Ping(uint256 seq);
/// }
///
/// # async fn example(mut stream: tokio_stream::wrappers::ReceiverStream<event_watcher::WatchResult<alloy::rpc::types::Log>>) {
/// assert_event_sequence!(stream, &[Ping { seq: U256::from(1) }, Ping { seq: U256::from(2) }]);
/// # }
/// ```
///
/// # Panics
///
/// On timeout, on an unexpected or extra event, on an error item, when the stream ends early,
/// and when called with no events (use [`assert_empty!`] for that).
#[macro_export]
macro_rules! assert_event_sequence {
    ($stream: expr, [$($event:expr),+ $(,)?]) => {
        $crate::assert_event_sequence!($stream, &[$($event),+], timeout = 5)
    };
    ($stream: expr, &[$($event:expr),+ $(,)?]) => {
        $crate::assert_event_sequence!($stream, &[$($event),+], timeout = 5)
    };
    ($stream: expr, &[$($event:expr),+ $(,)?], timeout = $secs: expr) => {
        let expected = [$(alloy::sol_types::SolEvent::encode_log_data(&$event)),+];
        $crate::test_utils::macros::assert_event_sequence(&mut $stream, &expected, $secs).await
    };
    ($stream: expr, $events: expr) => {
        $crate::assert_event_sequence!($stream, $events, timeout = 5)
    };
    ($stream: expr, $events: expr, timeout = $secs: expr) => {
        let expected =
            $events.iter().map(alloy::sol_types::SolEvent::encode_log_data).collect::<Vec<_>>();
        assert!(
            !expected.is_empty(),
            "assert_event_sequence! needs at least one event, use assert_empty! to check for none"
        );
        $crate::test_utils::macros::assert_event_sequence(&mut $stream, &expected, $secs).await
    };
}

#[allow(clippy::missing_panics_doc)]
pub async fn assert_event_sequence<S: Stream<Item = WatchResult<Log>> + Unpin>(
    stream: &mut S,
    expected: &[LogData],
    timeout_secs: u64,
) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(timeout_secs);
    let mut position = 0;

    while position < expected.len() {
        let item = tokio::time::timeout_at(deadline, tokio_stream::StreamExt::next(stream))
            .await
            .unwrap_or_else(|_| {
                panic!("timed out waiting for {:#?}", &expected[position..]);
            });

        let logs = match item {
            Some(Ok(logs)) => logs,
            Some(Err(err)) => panic!("Expected logs, got error: {err:#?}"),
            None => panic!("Stream ended while still expecting {:#?}", &expected[position..]),
        };
        assert!(!logs.is_empty(), "Deliveries are never empty");

        for log in logs {
            let Some(next) = expected.get(position) else {
                panic!("Received more events than expected, extra: {:#?}", log.data());
            };
            assert_eq!(next, log.data(), "Event #{position} differs");
            position += 1;
        }
    }
}
