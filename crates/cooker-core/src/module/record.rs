//! Module records and lifecycle states.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::facade::Module;
use super::loader::LoadedUnit;

/// Where a module name stands in its lifecycle.
///
/// `Discovered → Loaded → Initialized → Registered`, with a terminal failure
/// state per step. `Unregistered` is reached only through explicit
/// unregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// A unit declaring the name was found and opened.
    Discovered,
    /// The unit's initializer was resolved.
    Loaded,
    /// The initializer returned a capability handle.
    Initialized,
    /// `initialize` succeeded and the module is visible to lookups.
    Registered,
    /// No unit found, or it exports no initializer.
    LoadFailed,
    /// The initializer returned an error.
    InitFailed,
    /// `initialize` returned an error.
    RegisterFailed,
    /// Torn down by explicit unregistration.
    Unregistered,
}

impl ModuleState {
    /// Whether this state ends processing for the current batch.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ModuleState::LoadFailed | ModuleState::InitFailed | ModuleState::RegisterFailed
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Discovered => "Discovered",
            ModuleState::Loaded => "Loaded",
            ModuleState::Initialized => "Initialized",
            ModuleState::Registered => "Registered",
            ModuleState::LoadFailed => "LoadFailed",
            ModuleState::InitFailed => "InitFailed",
            ModuleState::RegisterFailed => "RegisterFailed",
            ModuleState::Unregistered => "Unregistered",
        };
        write!(f, "{}", s)
    }
}

/// Identity and loading metadata for one module.
pub struct ModuleRecord {
    name: String,
    file_path: PathBuf,
    unit: Box<dyn LoadedUnit>,
    facade: Option<Arc<Module>>,
}

impl ModuleRecord {
    pub(crate) fn new(name: String, file_path: PathBuf, unit: Box<dyn LoadedUnit>) -> Self {
        Self {
            name,
            file_path,
            unit,
            facade: None,
        }
    }

    /// Module name; equals the unit's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the unit was opened from.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The opened unit.
    pub fn unit(&self) -> &dyn LoadedUnit {
        self.unit.as_ref()
    }

    /// The live facade, present once the module is initialized.
    pub fn facade(&self) -> Option<&Arc<Module>> {
        self.facade.as_ref()
    }

    pub(crate) fn set_facade(&mut self, facade: Arc<Module>) {
        self.facade = Some(facade);
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.name)
            .field("file_path", &self.file_path)
            .field("initialized", &self.facade.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ModuleState::Registered.to_string(), "Registered");
        assert_eq!(ModuleState::RegisterFailed.to_string(), "RegisterFailed");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ModuleState::LoadFailed).unwrap();
        assert_eq!(json, "\"load_failed\"");
        let parsed: ModuleState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ModuleState::LoadFailed);
    }

    #[test]
    fn test_failure_states() {
        assert!(ModuleState::InitFailed.is_failure());
        assert!(!ModuleState::Registered.is_failure());
        assert!(!ModuleState::Unregistered.is_failure());
    }
}
