//! Dynamically loaded modules: discovery, facades and the manager.

pub mod facade;
pub mod loader;
pub mod manager;
pub mod record;

pub use facade::{EventReceiver, Module};
pub use loader::{
    DiscoveredUnit, LoadedUnit, ModuleLoader, NativeUnitOpener, UnitOpener, is_module_file,
};
pub use manager::{LoadReport, ModuleManager};
pub use record::{ModuleRecord, ModuleState};
