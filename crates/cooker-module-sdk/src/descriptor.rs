//! Exported-symbol contract between the host and a module binary.
//!
//! Every module binary exports exactly two symbols:
//!
//! - [`MODULE_NAME_SYMBOL`]: a `#[repr(C)]` [`ModuleNameDecl`] static holding
//!   the module's self-declared name.
//! - [`INIT_MODULE_SYMBOL`]: an [`InitModuleFn`] the host calls with the
//!   module's facade.
//!
//! Use [`declare_module!`](crate::declare_module) rather than writing these by hand.

use std::fmt;

use crate::error::ModuleError;
use crate::types::{CapabilityHandle, ModuleCoreRef};

/// Layout version of [`ModuleNameDecl`].
///
/// A record carrying any other value is treated as a foreign binary.
pub const ABI_VERSION: u32 = 1;

/// Symbol name of the exported [`ModuleNameDecl`] (NUL-terminated).
pub const MODULE_NAME_SYMBOL: &[u8] = b"cooker_module_name\0";

/// Symbol name of the exported [`InitModuleFn`] (NUL-terminated).
pub const INIT_MODULE_SYMBOL: &[u8] = b"cooker_init_module\0";

/// Initializer exported by a module binary.
///
/// Trait objects cross the boundary with the Rust ABI, so the host and its
/// modules must be built by the same toolchain.
pub type InitModuleFn = fn(ModuleCoreRef) -> Result<CapabilityHandle, ModuleError>;

/// C-compatible record holding a module's declared name.
#[repr(C)]
#[derive(Debug)]
pub struct ModuleNameDecl {
    /// Must equal [`ABI_VERSION`]
    pub abi_version: u32,
    /// UTF-8 name bytes (not NUL-terminated)
    pub name: *const u8,
    /// Length of `name` in bytes
    pub name_len: usize,
}

// The record only ever points at `'static` string data.
unsafe impl Sync for ModuleNameDecl {}

impl ModuleNameDecl {
    /// Build a record for a `'static` name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            abi_version: ABI_VERSION,
            name: name.as_ptr(),
            name_len: name.len(),
        }
    }

    /// Read the declared name.
    ///
    /// # Safety
    /// `name`/`name_len` must describe memory that stays valid for the
    /// lifetime of `self`. Records built by [`ModuleNameDecl::new`] satisfy this.
    pub unsafe fn declared_name(&self) -> Result<&str, DeclError> {
        if self.abi_version != ABI_VERSION {
            return Err(DeclError::AbiMismatch {
                expected: ABI_VERSION,
                found: self.abi_version,
            });
        }
        if self.name.is_null() || self.name_len == 0 {
            return Err(DeclError::EmptyName);
        }

        // SAFETY: pointer and length validated non-null above; caller guarantees lifetime.
        let bytes = unsafe { std::slice::from_raw_parts(self.name, self.name_len) };
        std::str::from_utf8(bytes).map_err(DeclError::InvalidUtf8)
    }
}

/// Reasons a [`ModuleNameDecl`] cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclError {
    #[error("ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch { expected: u32, found: u32 },

    #[error("Declared module name is empty")]
    EmptyName,

    #[error("Declared module name is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),
}

impl fmt::Display for ModuleNameDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: Display is only reachable on records the caller already holds by reference.
        match unsafe { self.declared_name() } {
            Ok(name) => write!(f, "{} (abi v{})", name, self.abi_version),
            Err(e) => write!(f, "<invalid module name: {}>", e),
        }
    }
}
