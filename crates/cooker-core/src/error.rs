//! Unified error handling for the cooker host.
//!
//! Discovery and initialization failures are recovered per module by the
//! manager and only logged; they surface here so callers that drive a single
//! step (and the load report) can tell them apart.

use std::path::PathBuf;

use cooker_module_sdk::ModuleError;

/// Unified error type for cooker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A search path could not be listed.
    #[error("Cannot read module directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A candidate file could not be opened or carries no valid name record.
    #[error("Invalid module unit {}: {reason}", path.display())]
    InvalidUnit { path: PathBuf, reason: String },

    /// No search path holds a unit declaring this name.
    #[error("Cannot find module: {0}")]
    ModuleNotFound(String),

    /// The matched unit does not export an initializer.
    #[error("Module {name} has no initializer: {reason}")]
    MissingInitializer { name: String, reason: String },

    /// The module's initializer returned an error.
    #[error("Module {name} failed to initialize: {source}")]
    InitializationFailed {
        name: String,
        #[source]
        source: ModuleError,
    },

    /// The capability's `initialize` returned an error.
    #[error("Cannot register module {name}: {source}")]
    InitializeReturnedError {
        name: String,
        #[source]
        source: ModuleError,
    },

    /// A dependency is not registered.
    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// Lookup of a name that is not registered.
    #[error("No such module: {0}")]
    NoSuchModule(String),

    /// The module was unregistered; reloading is not supported.
    #[error("Module {0} was unregistered and cannot be loaded again")]
    Retired(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors outside module discovery.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_unit(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidUnit {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<Error> for ModuleError {
    fn from(e: Error) -> Self {
        match e {
            Error::NoSuchModule(name) | Error::UnresolvedDependency(name) => {
                ModuleError::UnresolvedDependency(name)
            }
            other => ModuleError::Custom(other.to_string()),
        }
    }
}
