//! In-process messaging: command routing and event fan-out.
//!
//! Both buses sit on a [`PartitionedExecutor`], which gives the
//! single-writer-per-identifier guarantee the aggregates and the saga rely on.

pub mod command_bus;
pub mod error;
pub mod event_bus;
pub mod partition;

pub use command_bus::{Command, CommandBus, CommandBusConfig, CommandGateway, CommandResponse};
pub use error::{BusError, Result, SubscriberError};
pub use event_bus::{EventBus, EventSubscriber};
pub use partition::{Job, PartitionedExecutor};
