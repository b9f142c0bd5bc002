//! Queue Listener - feeds broker deliveries through the dispatcher

use df_queue::amqp::AmqpBroker;
use df_queue::QueueError;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::dispatcher::CommandDispatcher;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Deliveries processed in parallel
    pub concurrency: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

pub struct FeederListener {
    broker: Arc<AmqpBroker>,
    dispatcher: Arc<CommandDispatcher>,
    config: ListenerConfig,
}

impl FeederListener {
    pub fn new(broker: Arc<AmqpBroker>, dispatcher: Arc<CommandDispatcher>, config: ListenerConfig) -> Self {
        Self {
            broker,
            dispatcher,
            config,
        }
    }

    /// True while deliveries are being consumed
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        self.broker.consuming_flag()
    }

    /// Consume until `shutdown` resolves, then let in-flight deliveries finish
    pub async fn run<S>(&self, shutdown: S) -> Result<(), QueueError>
    where
        S: Future<Output = ()>,
    {
        info!(
            queue = %self.broker.topology().queue,
            concurrency = self.config.concurrency,
            "Starting feeder listener"
        );

        let dispatcher = &self.dispatcher;
        self.broker
            .consume(self.config.concurrency, shutdown, |message| async move {
                let span = info_span!(
                    "delivery",
                    delivery_tag = message.delivery_tag,
                    message_id = message.message_id.as_deref().unwrap_or(""),
                    death_count = message.death_count,
                    redelivered = message.redelivered,
                );
                dispatcher
                    .handle(&message.body, message.death_count)
                    .instrument(span)
                    .await
            })
            .await
    }
}
