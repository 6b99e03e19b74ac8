//! Module facade: the host-side view of one loaded module.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use cooker_module_sdk::{
    AfterReadyFn, CapabilityHandle, Event, ModuleCore, ModuleError, ModuleResult,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::manager::ManagerShared;

/// Receive side of a module's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Wraps one module's capability handle and gives the module access to
/// dependency lookup, its event channel and after-ready registration.
///
/// The module receives this facade (as [`ModuleCore`]) from its initializer
/// and nothing else from the host.
pub struct Module {
    name: String,
    manager: Weak<ManagerShared>,
    capability: RwLock<Option<CapabilityHandle>>,
    external_modules: OnceLock<HashMap<String, CapabilityHandle>>,
    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: Mutex<Option<EventReceiver>>,
}

impl Module {
    pub(crate) fn new(name: impl Into<String>, manager: Weak<ManagerShared>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            manager,
            capability: RwLock::new(None),
            external_modules: OnceLock::new(),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The capability handle returned by the module's initializer.
    pub fn capability(&self) -> Option<CapabilityHandle> {
        self.capability.read().clone()
    }

    /// Store the capability handle. Only the first call has any effect.
    pub(crate) fn set_capability(&self, capability: CapabilityHandle) -> bool {
        let mut slot = self.capability.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(capability);
        true
    }

    /// Drop the host's reference to the capability on teardown.
    pub(crate) fn release_capability(&self) -> Option<CapabilityHandle> {
        self.capability.write().take()
    }

    /// Dependencies bound by [`ModuleCore::setup_dependencies`].
    pub fn external_modules(&self) -> HashMap<String, CapabilityHandle> {
        self.external_modules.get().cloned().unwrap_or_default()
    }

    /// Take the receive side of the event channel.
    ///
    /// The channel has a single consumer; later calls return `None`.
    pub fn take_event_receiver(&self) -> Option<EventReceiver> {
        self.event_rx.lock().take()
    }

    fn manager(&self) -> ModuleResult<Arc<ManagerShared>> {
        self.manager
            .upgrade()
            .ok_or_else(|| ModuleError::Custom("module manager has been dropped".to_string()))
    }
}

impl ModuleCore for Module {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup_dependencies(&self, names: &[&str]) -> ModuleResult<()> {
        if self.external_modules.get().is_some() {
            return Err(ModuleError::Custom(format!(
                "dependencies of {} are already bound",
                self.name
            )));
        }

        let resolved = self.manager()?.resolve_dependencies(names).map_err(|e| {
            tracing::warn!("Module {} cannot resolve dependencies: {}", self.name, e);
            ModuleError::from(e)
        })?;

        self.external_modules.set(resolved).map_err(|_| {
            ModuleError::Custom(format!("dependencies of {} are already bound", self.name))
        })
    }

    fn external_module(&self, name: &str) -> Option<CapabilityHandle> {
        if let Some(handle) = self.external_modules.get().and_then(|deps| deps.get(name)) {
            return Some(handle.clone());
        }

        self.manager()
            .ok()?
            .get_module(name)
            .ok()
            .and_then(|module| module.capability())
    }

    fn emit(&self, event: Event) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Event receiver of {} is gone, dropping event", self.name);
        }
    }

    fn setup_func_after_ready(&self, hook: AfterReadyFn) {
        match self.manager() {
            Ok(manager) => manager.setup_func_after_ready(&self.name, hook),
            Err(e) => tracing::warn!("Cannot register after-ready hook for {}: {}", self.name, e),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("has_capability", &self.capability.read().is_some())
            .field(
                "external_modules",
                &self
                    .external_modules
                    .get()
                    .map(|deps| deps.keys().cloned().collect::<Vec<_>>()),
            )
            .finish()
    }
}
