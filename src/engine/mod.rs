//! Workflow Engine (§4.1): the driver that wires the [`WorkflowAggregate`]
//! to the twin channel, content handler registry, persistence store and
//! capabilities, and implements the engine's four exposed operations.

pub mod aggregate;
pub mod commands;
pub mod driver;
pub mod events;

pub use aggregate::{ActiveWorkflow, AggregateState, EngineClock, EngineServices, WorkflowAggregate};
pub use commands::WorkflowCommand;
pub use driver::WorkflowEngine;
pub use events::WorkflowEvent;
