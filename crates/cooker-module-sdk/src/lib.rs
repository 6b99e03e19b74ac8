//! Cooker Module SDK
//!
//! Everything a dynamically loaded module and the host agree on: the
//! exported symbols, the [`Capability`] a module returns, and the
//! [`ModuleCore`] facade it receives.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cooker_module_sdk::prelude::*;
//!
//! struct Storage {
//!     core: ModuleCoreRef,
//! }
//!
//! impl Capability for Storage {
//!     fn initialize(&self) -> ModuleResult<()> {
//!         self.core.setup_dependencies(&["auth"])
//!     }
//! }
//!
//! fn init(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
//!     Ok(Arc::new(Storage { core }))
//! }
//!
//! declare_module!("storage", init);
//! ```

pub mod descriptor;
pub mod error;
#[macro_use]
pub mod macros;
pub mod types;

pub use descriptor::{
    ABI_VERSION, DeclError, INIT_MODULE_SYMBOL, InitModuleFn, MODULE_NAME_SYMBOL, ModuleNameDecl,
};
pub use error::{ModuleError, ModuleResult};
pub use types::{AfterReadyFn, Capability, CapabilityHandle, Event, ModuleCore, ModuleCoreRef};

/// Prelude module with common imports
pub mod prelude {
    pub use crate::error::{ModuleError, ModuleResult};
    pub use crate::types::{
        AfterReadyFn, Capability, CapabilityHandle, Event, ModuleCore, ModuleCoreRef,
    };
    pub use crate::declare_module;
    pub use serde_json::{Value, json};
}
