//! Command Dispatcher Tests
//!
//! Executor and multiplier are replaced by counting handlers returning a
//! canned outcome.

use async_trait::async_trait;
use df_common::{Command, Disposition};
use df_feeder::{CommandDispatcher, CommandHandler, DispatchError, DispatcherConfig, FeederError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy)]
enum Outcome {
    Success,
    Permanent,
    Transient,
}

struct CountingHandler {
    calls: AtomicUsize,
    outcome: Outcome,
}

impl CountingHandler {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for CountingHandler {
    async fn handle(&self, command: &Command) -> Result<(), DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Success => Ok(()),
            Outcome::Permanent => Err(DispatchError::Permanent(FeederError::InvalidTarget(
                command.target.clone(),
            ))),
            Outcome::Transient => Err(DispatchError::Transient(FeederError::Device5xx { status: 503 })),
        }
    }
}

struct Fixture {
    executor: Arc<CountingHandler>,
    multiplier: Arc<CountingHandler>,
    dispatcher: CommandDispatcher,
}

fn fixture(outcome: Outcome) -> Fixture {
    let executor = CountingHandler::new(outcome);
    let multiplier = CountingHandler::new(outcome);
    let dispatcher = CommandDispatcher::new(
        executor.clone(),
        multiplier.clone(),
        DispatcherConfig { max_retry_count: 3 },
    );
    Fixture {
        executor,
        multiplier,
        dispatcher,
    }
}

fn body(target: &str) -> Vec<u8> {
    serde_json::to_vec(&Command::new(target, "POST", "/devices/update", "test-body")).unwrap()
}

const CONCRETE: &str = "ukma.uk-sa2209-hnode-a1-00ff";

#[tokio::test]
async fn test_wildcard_routes_to_multiplier() {
    let f = fixture(Outcome::Success);

    let disposition = f.dispatcher.handle(&body("ukma.*"), 0).await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(f.multiplier.calls(), 1);
    assert_eq!(f.executor.calls(), 0);
}

#[tokio::test]
async fn test_concrete_target_routes_to_executor() {
    let f = fixture(Outcome::Success);

    let disposition = f.dispatcher.handle(&body(CONCRETE), 0).await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(f.executor.calls(), 1);
    assert_eq!(f.multiplier.calls(), 0);
}

#[tokio::test]
async fn test_target_without_separator_goes_to_executor() {
    let f = fixture(Outcome::Permanent);

    let disposition = f.dispatcher.handle(&body("ukma"), 0).await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(f.executor.calls(), 1);
}

#[tokio::test]
async fn test_permanent_failure_is_acked() {
    let f = fixture(Outcome::Permanent);
    assert_eq!(f.dispatcher.handle(&body(CONCRETE), 1).await, Disposition::Ack);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let f = fixture(Outcome::Transient);
    assert_eq!(f.dispatcher.handle(&body(CONCRETE), 0).await, Disposition::Retry);
    assert_eq!(f.dispatcher.handle(&body("ukma.*"), 3).await, Disposition::Retry);
}

#[tokio::test]
async fn test_exhausted_retries_are_discarded_unprocessed() {
    let f = fixture(Outcome::Success);

    assert_eq!(f.dispatcher.handle(&body(CONCRETE), 4).await, Disposition::Discard);
    assert_eq!(f.dispatcher.handle(&body("ukma.*"), 10).await, Disposition::Discard);
    assert_eq!(f.executor.calls(), 0);
    assert_eq!(f.multiplier.calls(), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_discarded() {
    let f = fixture(Outcome::Success);

    assert_eq!(f.dispatcher.handle(b"not json", 0).await, Disposition::Discard);
    assert_eq!(f.dispatcher.handle(br#"{"target":"ukma.*"}"#, 0).await, Disposition::Discard);
    assert_eq!(f.executor.calls(), 0);
    assert_eq!(f.multiplier.calls(), 0);
}
