//! Types shared by the host and every module.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModuleError, ModuleResult};

/// Shared handle to a module's capability.
pub type CapabilityHandle = Arc<dyn Capability>;

/// The facade a module receives from the host.
pub type ModuleCoreRef = Arc<dyn ModuleCore>;

/// Hook started by the host once it considers itself ready.
pub type AfterReadyFn = Arc<dyn Fn() + Send + Sync>;

/// A notification flowing from a module to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create an event with a payload.
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Create an event without a payload.
    pub fn named(event: impl Into<String>) -> Self {
        Self::new(event, Value::Null)
    }
}

/// What a module hands back to the host from its initializer.
///
/// This is the only surface through which the host and other modules
/// reach the module's logic.
pub trait Capability: Send + Sync {
    /// Bring the module up. Called once, before the module is registered.
    fn initialize(&self) -> ModuleResult<()>;

    /// Tear the module down on unregistration.
    fn uninitialize(&self) -> ModuleResult<()> {
        Ok(())
    }

    /// Receive a host broadcast.
    fn on_event(&self, _event: &Event) {}

    /// Run a named command. Dependents call each other through this.
    fn execute(&self, command: &str, _args: &Value) -> ModuleResult<Value> {
        Err(ModuleError::Unsupported(command.to_string()))
    }
}

/// Host services available to a module.
pub trait ModuleCore: Send + Sync {
    /// Name this module was registered under.
    fn name(&self) -> &str;

    /// Bind the named modules as dependencies.
    ///
    /// Every name must already be registered; otherwise nothing is bound and
    /// [`ModuleError::UnresolvedDependency`] names the first missing entry.
    fn setup_dependencies(&self, names: &[&str]) -> ModuleResult<()>;

    /// Look up a dependency's capability handle.
    fn external_module(&self, name: &str) -> Option<CapabilityHandle>;

    /// Send an event to the host. Never blocks.
    fn emit(&self, event: Event);

    /// Register a hook to start once the host is ready.
    fn setup_func_after_ready(&self, hook: AfterReadyFn);
}
