//! Command Dispatcher - per-delivery decision logic
//!
//! ```text
//! Received -> {Multiplier | Executor} -> {Ack | Retry | Discard}
//! ```
//!
//! Independent of the broker: it takes a raw body and the delivery's
//! dead-letter transit count and returns the `Disposition` to apply.

use async_trait::async_trait;
use df_common::{Command, Disposition};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::feeder_metrics;

/// Something that can process a parsed command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Deliveries that went through the retry loop more often than this are dropped
    pub max_retry_count: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_retry_count: 3 }
    }
}

pub struct CommandDispatcher {
    executor: Arc<dyn CommandHandler>,
    multiplier: Arc<dyn CommandHandler>,
    config: DispatcherConfig,
}

impl CommandDispatcher {
    pub fn new(
        executor: Arc<dyn CommandHandler>,
        multiplier: Arc<dyn CommandHandler>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            executor,
            multiplier,
            config,
        }
    }

    /// Decide what happens to one delivery
    pub async fn handle(&self, body: &[u8], death_count: u32) -> Disposition {
        if death_count > self.config.max_retry_count {
            warn!(
                death_count,
                max_retry_count = self.config.max_retry_count,
                "Retries exhausted, discarding command"
            );
            return settle(Disposition::Discard, "retries_exhausted");
        }

        let command = match Command::from_slice(body) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, body_len = body.len(), "Discarding malformed command");
                return settle(Disposition::Discard, "malformed");
            }
        };

        let result = if command.is_wildcard() {
            debug!(command_target = %command.target, "Routing to multiplier");
            self.multiplier.handle(&command).await
        } else {
            debug!(command_target = %command.target, "Routing to executor");
            self.executor.handle(&command).await
        };

        match result {
            Ok(()) => {
                debug!(command_target = %command.target, "Command processed");
                settle(Disposition::Ack, "success")
            }
            Err(e) if e.is_permanent() => {
                warn!(command_target = %command.target, error = %e, "Dropping command after permanent failure");
                settle(Disposition::Ack, e.reason())
            }
            Err(e) => {
                info!(
                    command_target = %command.target,
                    error = %e,
                    attempt = death_count + 1,
                    max_retry_count = self.config.max_retry_count,
                    "Scheduling command for retry"
                );
                settle(Disposition::Retry, e.reason())
            }
        }
    }
}

fn settle(disposition: Disposition, reason: &str) -> Disposition {
    feeder_metrics::record_message(disposition.as_str(), reason);
    disposition
}
