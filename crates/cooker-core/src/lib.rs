//! Host side of the cooker module runtime.
//!
//! Modules are shared libraries that export a name record and an
//! initializer (see `cooker-module-sdk`). The [`ModuleManager`] finds them in
//! a list of search directories, runs their initializers, wires their
//! dependencies and admits them to a registry. [`App`] adds the bootstrap
//! around it: settings discovery, after-ready hooks and event forwarding.

pub mod app;
pub mod config;
pub mod error;
pub mod eventbus;
pub mod module;

pub use app::{App, StopHandle};
pub use config::{AppInfo, ManagerConfig, Settings};
pub use error::{Error, Result};
pub use eventbus::{EventBus, EventBusReceiver, ModuleEvent};
pub use module::{
    DiscoveredUnit, LoadReport, LoadedUnit, Module, ModuleLoader, ModuleManager, ModuleRecord,
    ModuleState, NativeUnitOpener, UnitOpener,
};

pub use cooker_module_sdk as sdk;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::app::App;
    pub use crate::config::{AppInfo, ManagerConfig, Settings, defaults, env_vars};
    pub use crate::error::{Error, Result};
    pub use crate::module::{LoadReport, Module, ModuleManager, ModuleState};
    pub use cooker_module_sdk::{Capability, CapabilityHandle, Event, ModuleCore, ModuleError};
}
