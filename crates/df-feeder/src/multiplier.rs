//! Request Multiplier - expands an `org.*` command into one command per node
//!
//! The fan-out is a best-effort snapshot of the directory: nodes joining the
//! org afterwards are not included and each child goes through the full retry
//! pipeline on its own. A retried wildcard re-emits the whole fan-out.

use async_trait::async_trait;
use df_common::{Command, WILDCARD};
use df_queue::{QueuePublisher, TARGET_HEADER};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clients::NodeDirectory;
use crate::dispatcher::CommandHandler;
use crate::error::{DispatchError, FeederError};
use crate::feeder_metrics;

pub struct RequestMultiplier {
    directory: Arc<dyn NodeDirectory>,
    publisher: Arc<dyn QueuePublisher>,
}

impl RequestMultiplier {
    pub fn new(directory: Arc<dyn NodeDirectory>, publisher: Arc<dyn QueuePublisher>) -> Self {
        Self {
            directory,
            publisher,
        }
    }

    /// Publish one child command per node currently registered to the org
    pub async fn process(&self, command: &Command) -> Result<(), DispatchError> {
        let org = match command.split_target() {
            Some((org, WILDCARD)) => org,
            _ => {
                return Err(DispatchError::Permanent(FeederError::InvalidTarget(
                    command.target.clone(),
                )))
            }
        };

        let nodes = self.directory.get_nodes_list(org).await.map_err(|e| {
            if e.is_not_found() {
                DispatchError::Permanent(FeederError::Directory(e))
            } else {
                DispatchError::Transient(FeederError::Directory(e))
            }
        })?;

        let mut published = 0;
        for node in &nodes {
            let child = command.for_node(org, node);
            let result = self
                .publisher
                .publish(&child, &[(TARGET_HEADER, child.target.as_str())])
                .await;

            if let Err(e) = result {
                feeder_metrics::record_fanout(org, published);
                return Err(DispatchError::Transient(FeederError::Publish(e)));
            }
            published += 1;
            debug!(org = %org, command_target = %child.target, "Published child command");
        }

        feeder_metrics::record_fanout(org, published);
        info!(
            org = %org,
            nodes = published,
            publisher = %self.publisher.identifier(),
            "Fanned out wildcard command"
        );
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for RequestMultiplier {
    async fn handle(&self, command: &Command) -> Result<(), DispatchError> {
        self.process(command).await
    }
}
