//! Content Handler Registry (§4.4): maps an `update_type` string to a
//! handler factory, exact match only. Grounded in the teacher's
//! `AgentType::from_config` command-string dispatch.

use super::simulator::SimulatorHandler;
use super::ContentHandler;
use crate::error::WorkflowError;
use std::collections::HashMap;
use std::sync::Arc;

type HandlerFactory = Arc<dyn Fn() -> Arc<dyn ContentHandler> + Send + Sync>;

/// Looks up a handler factory by `update_type` and instantiates one
/// handler per workflow. Unknown update types are rejected at
/// `on_desired_property` time, before any workflow is adopted.
#[derive(Clone)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry used when no external handlers are configured: only
    /// the in-tree reference simulator, under `"sim/noop:1"`.
    pub fn with_reference_simulator() -> Self {
        let mut registry = Self::new();
        registry.register("sim/noop:1", || Arc::new(SimulatorHandler::default()));
        registry
    }

    pub fn register<F>(&mut self, update_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ContentHandler> + Send + Sync + 'static,
    {
        self.factories.insert(update_type.into(), Arc::new(factory));
    }

    pub fn lookup(&self, update_type: &str) -> Result<Arc<dyn ContentHandler>, WorkflowError> {
        self.factories
            .get(update_type)
            .map(|factory| factory())
            .ok_or_else(|| WorkflowError::MalformedDesiredDocument(format!("unknown update type '{update_type}'")))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_reference_simulator()
    }
}
