use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Consumer stream closed by broker")]
    ConsumerClosed,
}
