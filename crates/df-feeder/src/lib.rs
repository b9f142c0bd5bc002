//! Device feeder: delivers queued commands to edge nodes
//!
//! - `dispatcher`: per-delivery decision (ack / retry / discard)
//! - `executor`: resolves a node's address and performs the HTTP call
//! - `multiplier`: expands `org.*` commands into one command per node
//! - `listener`: drives the dispatcher from the AMQP consume loop
//! - `clients`: node directory and address resolver facades
//! - `api`: health and metrics endpoints

pub mod api;
pub mod clients;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod feeder_metrics;
pub mod listener;
pub mod multiplier;

pub use clients::{ClientConfig, ClientError, LookupClient, NodeDirectory, NodeResolver, RegistryClient};
pub use dispatcher::{CommandDispatcher, CommandHandler, DispatcherConfig};
pub use error::{DispatchError, FeederError};
pub use executor::{ExecutorConfig, RequestExecutor};
pub use listener::{FeederListener, ListenerConfig};
pub use multiplier::RequestMultiplier;
