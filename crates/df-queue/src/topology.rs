//! Delayed retry topology
//!
//! ```text
//!   exchange (topic) --routing_key--> queue
//!        ^                              | nack(requeue=false)
//!        |                              v
//!        |                      retry_exchange (fanout)
//!        |                              |
//!        +---- TTL expired ---- waiting_queue (x-message-ttl)
//! ```
//!
//! Every trip around the loop adds to the `x-death` count of the message.

use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    Channel, ExchangeKind,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::{QueueError, Result};

pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";
pub const MESSAGE_TTL_ARG: &str = "x-message-ttl";

/// Names and timing of the dispatch/retry topology
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
    pub retry_exchange: String,
    pub waiting_queue: String,
    /// Time a rejected message waits before it is routed back
    pub retry_period: Duration,
    pub durable: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            exchange: "amq.topic".to_string(),
            queue: "device-feeder".to_string(),
            routing_key: "request.cloud.device-feeder".to_string(),
            retry_exchange: "device-feeder.retry".to_string(),
            waiting_queue: "device-feeder.waiting".to_string(),
            retry_period: Duration::from_secs(30),
            durable: true,
        }
    }
}

impl TopologyConfig {
    pub fn message_ttl_ms(&self) -> i64 {
        i64::try_from(self.retry_period.as_millis()).unwrap_or(i64::MAX)
    }

    /// Arguments of the main queue: rejected messages go to the retry exchange
    pub fn main_queue_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            ShortString::from(DEAD_LETTER_EXCHANGE_ARG),
            AMQPValue::LongString(LongString::from(self.retry_exchange.as_str())),
        );
        args.insert(
            ShortString::from(DEAD_LETTER_ROUTING_KEY_ARG),
            AMQPValue::LongString(LongString::from(self.routing_key.as_str())),
        );
        args
    }

    /// Arguments of the waiting queue: expired messages go back to the main exchange
    pub fn waiting_queue_arguments(&self) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            ShortString::from(MESSAGE_TTL_ARG),
            AMQPValue::LongLongInt(self.message_ttl_ms()),
        );
        args.insert(
            ShortString::from(DEAD_LETTER_EXCHANGE_ARG),
            AMQPValue::LongString(LongString::from(self.exchange.as_str())),
        );
        args.insert(
            ShortString::from(DEAD_LETTER_ROUTING_KEY_ARG),
            AMQPValue::LongString(LongString::from(self.routing_key.as_str())),
        );
        args
    }
}

/// Broker-provided exchanges (`amq.*`) cannot be redeclared
fn is_builtin_exchange(name: &str) -> bool {
    name.is_empty() || name.starts_with("amq.")
}

async fn declare_exchange(channel: &Channel, name: &str, kind: ExchangeKind, durable: bool) -> Result<()> {
    if is_builtin_exchange(name) {
        debug!(exchange = %name, "Using broker built-in exchange");
        return Ok(());
    }

    channel
        .exchange_declare(
            name,
            kind,
            ExchangeDeclareOptions {
                durable,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| QueueError::Topology(format!("Failed to declare exchange {}: {}", name, e)))
}

async fn declare_queue(channel: &Channel, name: &str, durable: bool, args: FieldTable) -> Result<()> {
    channel
        .queue_declare(
            name,
            QueueDeclareOptions {
                durable,
                ..Default::default()
            },
            args,
        )
        .await
        .map_err(|e| QueueError::Topology(format!("Failed to declare queue {}: {}", name, e)))?;
    Ok(())
}

async fn bind_queue(channel: &Channel, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
    channel
        .queue_bind(
            queue,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            QueueError::Topology(format!("Failed to bind {} to {}: {}", queue, exchange, e))
        })
}

/// Declare exchanges, queues and bindings. Safe to call repeatedly.
pub async fn declare(channel: &Channel, topology: &TopologyConfig) -> Result<()> {
    declare_exchange(channel, &topology.exchange, ExchangeKind::Topic, topology.durable).await?;
    declare_exchange(channel, &topology.retry_exchange, ExchangeKind::Fanout, topology.durable).await?;

    declare_queue(channel, &topology.queue, topology.durable, topology.main_queue_arguments()).await?;
    bind_queue(channel, &topology.queue, &topology.exchange, &topology.routing_key).await?;

    declare_queue(
        channel,
        &topology.waiting_queue,
        topology.durable,
        topology.waiting_queue_arguments(),
    )
    .await?;
    bind_queue(channel, &topology.waiting_queue, &topology.retry_exchange, "").await?;

    info!(
        exchange = %topology.exchange,
        queue = %topology.queue,
        routing_key = %topology.routing_key,
        retry_exchange = %topology.retry_exchange,
        waiting_queue = %topology.waiting_queue,
        retry_period_secs = topology.retry_period.as_secs(),
        "Declared dispatch topology"
    );
    Ok(())
}
