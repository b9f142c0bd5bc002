//! Broker plumbing for the device feeder
//!
//! - `topology`: exchange/queue declarations forming the delayed retry loop
//! - `death`: transit count from the broker's `x-death` header
//! - `amqp`: lapin-based consumer loop and publisher

use async_trait::async_trait;
use df_common::Command;

pub mod amqp;
pub mod death;
pub mod error;
pub mod topology;

pub use death::death_count;
pub use error::QueueError;
pub use topology::TopologyConfig;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Header carrying the concrete target of a published command
pub const TARGET_HEADER: &str = "x-feeder-target";

/// A delivery as seen by the message handler
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: Vec<u8>,
    /// Times this message went through the dead-letter retry loop
    pub death_count: u32,
    pub message_id: Option<String>,
    pub delivery_tag: u64,
    pub redelivered: bool,
}

/// Trait for publishing commands back onto the dispatch queue
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Get the exchange/routing key this publisher targets
    fn identifier(&self) -> &str;

    /// Publish a single command with extra string headers.
    /// Returns the message id assigned to it.
    async fn publish(&self, command: &Command, headers: &[(&str, &str)]) -> Result<String>;
}
