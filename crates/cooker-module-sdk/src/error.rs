//! Module error types.

/// Errors crossing the host/module boundary.
///
/// Returned by a module's initializer and capability methods, and by the
/// host services a module reaches through its [`ModuleCore`](crate::ModuleCore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// The module could not build its capability handle
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// A requested dependency has not been registered yet
    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// No admitted module has this name
    #[error("No such module: {0}")]
    NoSuchModule(String),

    /// The capability does not implement the requested command
    #[error("Unsupported command: {0}")]
    Unsupported(String),

    /// Module-specific failure
    #[error("{0}")]
    Custom(String),
}

/// Module result type
pub type ModuleResult<T> = Result<T, ModuleError>;

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::Custom(format!("Serialization error: {}", err))
    }
}
