use std::time::Duration;

use tokio_stream::{Stream, StreamExt, wrappers::errors::BroadcastStreamRecvError};

use crate::{DecodedEvent, Notification};

/// Asserts that the next notification equals the expected one.
///
/// Waits up to 5 seconds unless a `timeout = N` (seconds) is given.
#[macro_export]
macro_rules! assert_next {
    ($stream: expr, $expected: expr) => {
        $crate::assert_next!($stream, $expected, timeout = 5)
    };
    ($stream: expr, $expected: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match message {
            std::option::Option::Some(std::result::Result::Ok(msg)) => {
                assert_eq!(msg, expected, "Expected {:?}, got {:?}", expected, msg);
            }
            std::option::Option::Some(std::result::Result::Err(e)) => {
                panic!("Expected Ok({:?}), got Err({:?})", expected, e);
            }
            std::option::Option::None => {
                panic!("Expected Ok({:?}), but channel was closed", expected);
            }
        }
    };
}

/// Asserts that the next notification is the event `$name` and evaluates to it.
#[macro_export]
macro_rules! assert_next_event {
    ($stream: expr, $name: expr) => {
        $crate::assert_next_event!($stream, $name, timeout = 5)
    };
    ($stream: expr, $name: expr, timeout = $secs: expr) => {
        $crate::test_utils::macros::next_event(&mut $stream, $name, $secs).await
    };
}

/// Asserts that nothing is published within `ms` milliseconds (default 100).
#[macro_export]
macro_rules! assert_quiet {
    ($stream: expr) => {
        $crate::assert_quiet!($stream, ms = 100)
    };
    ($stream: expr, ms = $ms: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_millis($ms),
            tokio_stream::StreamExt::next(&mut $stream),
        )
        .await;
        assert!(message.is_err(), "Expected no notification, got {:?}", message);
    };
}

#[allow(clippy::missing_panics_doc)]
pub async fn next_event<S>(stream: &mut S, name: &str, timeout_secs: u64) -> DecodedEvent
where
    S: Stream<Item = Result<Notification, BroadcastStreamRecvError>> + Unpin,
{
    let message = tokio::time::timeout(Duration::from_secs(timeout_secs), stream.next())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for event {name}"));

    match message {
        Some(Ok(Notification::Event(event))) => {
            assert_eq!(event.event_name, name, "unexpected event {event:#?}");
            event
        }
        Some(Ok(other)) => panic!("Expected event {name}, got {other:?}"),
        Some(Err(e)) => panic!("Expected event {name}, got Err: {e:?}"),
        None => panic!("Stream closed while expecting event {name}"),
    }
}
