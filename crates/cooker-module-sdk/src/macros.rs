//! Export macro for module binaries.

/// Export the symbols the host looks for in a module binary.
///
/// # Example
///
/// ```rust,ignore
/// use cooker_module_sdk::prelude::*;
///
/// struct Hello;
///
/// impl Capability for Hello {
///     fn initialize(&self) -> ModuleResult<()> {
///         Ok(())
///     }
/// }
///
/// fn init(_core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
///     Ok(std::sync::Arc::new(Hello))
/// }
///
/// declare_module!("hello", init);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($name:expr, $init:path) => {
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static cooker_module_name: $crate::ModuleNameDecl = $crate::ModuleNameDecl::new($name);

        #[no_mangle]
        pub fn cooker_init_module(
            core: $crate::ModuleCoreRef,
        ) -> ::std::result::Result<$crate::CapabilityHandle, $crate::ModuleError> {
            // Type-check the initializer against the exported signature.
            let init: $crate::InitModuleFn = $init;
            init(core)
        }
    };
}
