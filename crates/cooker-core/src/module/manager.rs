//! Module manager: discovery, initialization, dependency wiring and
//! registration of dynamically loaded modules.
//!
//! Loading is sequential: one name at a time, in request order. A failure
//! affects only the module it belongs to; it is logged, recorded in the
//! [`LoadReport`] and the batch moves on.
//!
//! No registry lock is held while module code runs, so initializers may call
//! back into the manager through their facade.

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cooker_module_sdk::{AfterReadyFn, CapabilityHandle, Event, ModuleCoreRef, ModuleError};
use parking_lot::{Mutex, RwLock};

use super::facade::Module;
use super::loader::{DiscoveredUnit, ModuleLoader, UnitOpener};
use super::record::{ModuleRecord, ModuleState};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};

/// Outcome of one [`ModuleManager::load_modules`] call.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Newly registered modules, in load order.
    pub loaded: Vec<String>,
    /// Names that were already registered (or repeated in the batch).
    pub skipped: Vec<String>,
    /// Names that failed, with the reason.
    pub failed: Vec<(String, Error)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
struct Registry {
    records: HashMap<String, ModuleRecord>,
    /// Admission order, for broadcast and shutdown.
    order: Vec<String>,
}

/// State shared between the manager and the facades it hands out.
pub(crate) struct ManagerShared {
    loader: ModuleLoader,
    search_paths: RwLock<Vec<PathBuf>>,
    registry: RwLock<Registry>,
    after_ready: RwLock<HashMap<String, AfterReadyFn>>,
    states: RwLock<HashMap<String, ModuleState>>,
    /// Serialises `load_modules` calls.
    load_lock: Mutex<()>,
}

impl ManagerShared {
    fn exists(&self, name: &str) -> bool {
        self.registry.read().records.contains_key(name)
    }

    pub(crate) fn get_module(&self, name: &str) -> Result<Arc<Module>> {
        self.registry
            .read()
            .records
            .get(name)
            .and_then(|record| record.facade().cloned())
            .ok_or_else(|| Error::NoSuchModule(name.to_string()))
    }

    pub(crate) fn get_modules<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<HashMap<String, CapabilityHandle>> {
        let registry = self.registry.read();
        let mut modules = HashMap::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            let capability = registry
                .records
                .get(name)
                .and_then(|record| record.facade())
                .and_then(|facade| facade.capability())
                .ok_or_else(|| Error::NoSuchModule(name.to_string()))?;
            modules.insert(name.to_string(), capability);
        }

        Ok(modules)
    }

    /// Bind `names` for a dependent module. All or nothing, like `get_modules`.
    pub(crate) fn resolve_dependencies(
        &self,
        names: &[&str],
    ) -> Result<HashMap<String, CapabilityHandle>> {
        self.get_modules(names).map_err(|e| match e {
            Error::NoSuchModule(name) => Error::UnresolvedDependency(name),
            other => other,
        })
    }

    pub(crate) fn setup_func_after_ready(&self, name: &str, hook: AfterReadyFn) {
        tracing::debug!("Module {} registered an after-ready hook", name);
        self.after_ready.write().insert(name.to_string(), hook);
    }

    /// Forget whatever a module that was not admitted left behind.
    fn discard_rejected(&self, name: &str) {
        if self.after_ready.write().remove(name).is_some() {
            tracing::debug!("Dropped after-ready hook of rejected module {}", name);
        }
    }

    fn set_state(&self, name: &str, state: ModuleState) {
        tracing::trace!("Module {} -> {}", name, state);
        self.states.write().insert(name.to_string(), state);
    }
}

/// Owns the search paths, the registered modules and their after-ready hooks.
#[derive(Clone)]
pub struct ModuleManager {
    shared: Arc<ManagerShared>,
}

impl ModuleManager {
    /// Manager loading native shared libraries.
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_loader(config, ModuleLoader::native())
    }

    /// Manager using a custom unit opener.
    pub fn with_opener(config: ManagerConfig, opener: Arc<dyn UnitOpener>) -> Self {
        Self::with_loader(config, ModuleLoader::with_opener(opener))
    }

    fn with_loader(config: ManagerConfig, loader: ModuleLoader) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                loader,
                search_paths: RwLock::new(config.search_paths),
                registry: RwLock::new(Registry::default()),
                after_ready: RwLock::new(HashMap::new()),
                states: RwLock::new(HashMap::new()),
                load_lock: Mutex::new(()),
            }),
        }
    }

    /// Append a search path. Earlier paths are searched first.
    pub fn add_module_path(&self, path: impl Into<PathBuf>) {
        self.shared.search_paths.write().push(path.into());
    }

    /// Configured search paths, in search order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.shared.search_paths.read().clone()
    }

    /// Load, initialize and register each named module, in order.
    ///
    /// Already registered names are skipped. Failures are logged and
    /// recorded; they never stop the rest of the batch. Dependencies must
    /// appear before their dependents.
    pub fn load_modules<S: AsRef<str>>(&self, names: &[S]) -> LoadReport {
        let _guard = self.shared.load_lock.lock();
        let mut report = LoadReport::default();
        let mut attempted = HashSet::new();

        for name in names {
            let name = name.as_ref();

            if self.exists(name) || !attempted.insert(name.to_string()) {
                report.skipped.push(name.to_string());
                continue;
            }

            if self.state(name) == Some(ModuleState::Unregistered) {
                tracing::warn!("Module {} was unregistered; reloading is not supported", name);
                report
                    .failed
                    .push((name.to_string(), Error::Retired(name.to_string())));
                continue;
            }

            match self.load_module(name) {
                Ok(()) => report.loaded.push(name.to_string()),
                Err(e) => {
                    tracing::warn!("Failed to load module {}: {}", name, e);
                    report.failed.push((name.to_string(), e));
                }
            }
        }

        tracing::info!(
            "Loaded {} module(s), skipped {}, failed {}",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    fn load_module(&self, name: &str) -> Result<()> {
        let record = self.search_module(name)?;
        let record = self.init_module(record)?;
        self.register(name, record)
    }

    /// Whether a module is registered under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.shared.exists(name)
    }

    /// Search every configured path, in order, for a unit declaring `name`.
    ///
    /// The first match wins. Unreadable directories are logged and skipped.
    pub fn search_module(&self, name: &str) -> Result<ModuleRecord> {
        tracing::info!("Searching module: {}", name);

        for path in self.search_paths() {
            match self.shared.loader.find(name, &path) {
                Ok(record) => {
                    tracing::info!("Found module {} at {}", name, record.file_path().display());
                    self.shared.set_state(name, ModuleState::Discovered);
                    return Ok(record);
                }
                Err(Error::DirectoryUnreadable { path, source }) => {
                    if source.kind() == std::io::ErrorKind::NotFound {
                        tracing::debug!("Module path {} does not exist", path.display());
                    } else {
                        tracing::warn!("Cannot read module path {}: {}", path.display(), source);
                    }
                }
                Err(_) => {}
            }
        }

        self.shared.set_state(name, ModuleState::LoadFailed);
        Err(Error::ModuleNotFound(name.to_string()))
    }

    /// Run the unit's initializer and attach the resulting facade.
    pub fn init_module(&self, mut record: ModuleRecord) -> Result<ModuleRecord> {
        let name = record.name().to_string();

        let initializer = record.unit().initializer().map_err(|e| {
            self.shared.set_state(&name, ModuleState::LoadFailed);
            Error::MissingInitializer {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        self.shared.set_state(&name, ModuleState::Loaded);

        let facade = Arc::new(Module::new(name.clone(), Arc::downgrade(&self.shared)));
        let core: ModuleCoreRef = facade.clone();

        let capability = guarded(|| initializer(core)).map_err(|source| {
            self.shared.set_state(&name, ModuleState::InitFailed);
            self.shared.discard_rejected(&name);
            Error::InitializationFailed {
                name: name.clone(),
                source,
            }
        })?;

        facade.set_capability(capability);
        record.set_facade(facade);
        self.shared.set_state(&name, ModuleState::Initialized);

        Ok(record)
    }

    /// Call the module's `initialize` and, on success, make it visible to lookups.
    pub fn register(&self, name: &str, record: ModuleRecord) -> Result<()> {
        if self.exists(name) {
            tracing::debug!("Module {} is already registered", name);
            return Ok(());
        }

        let capability = record
            .facade()
            .and_then(|facade| facade.capability())
            .ok_or_else(|| Error::InitializeReturnedError {
                name: name.to_string(),
                source: ModuleError::InitializationFailed("module was never initialized".into()),
            })?;

        if let Err(source) = guarded(|| capability.initialize()) {
            tracing::warn!("Cannot register module {}: {}", name, source);
            self.shared.set_state(name, ModuleState::RegisterFailed);
            self.shared.discard_rejected(name);
            if let Some(facade) = record.facade() {
                facade.release_capability();
            }
            return Err(Error::InitializeReturnedError {
                name: name.to_string(),
                source,
            });
        }

        {
            let mut registry = self.shared.registry.write();
            registry.records.insert(name.to_string(), record);
            registry.order.push(name.to_string());
        }
        self.shared.set_state(name, ModuleState::Registered);
        tracing::info!("Registered module: {}", name);

        Ok(())
    }

    /// Tear a module down and remove it from the registry.
    ///
    /// Runs the module's `uninitialize` (an error is logged, not returned) and
    /// drops its after-ready hook. The unit itself stays mapped.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let facade = self.shared.get_module(name)?;

        if let Some(capability) = facade.capability() {
            if let Err(e) = guarded(|| capability.uninitialize()) {
                tracing::warn!("Module {} failed to uninitialize: {}", name, e);
            }
        }

        {
            let mut registry = self.shared.registry.write();
            registry.records.remove(name);
            registry.order.retain(|n| n != name);
        }
        self.shared.after_ready.write().remove(name);
        facade.release_capability();
        self.shared.set_state(name, ModuleState::Unregistered);
        tracing::info!("Unregistered module: {}", name);

        Ok(())
    }

    /// Unregister every module, most recently registered first.
    pub fn shutdown(&self) {
        let names: Vec<String> = self.shared.registry.read().order.iter().rev().cloned().collect();
        for name in names {
            if let Err(e) = self.unregister(&name) {
                tracing::warn!("Failed to unregister {}: {}", name, e);
            }
        }
    }

    /// The facade of a registered module.
    pub fn get_module(&self, name: &str) -> Result<Arc<Module>> {
        self.shared.get_module(name)
    }

    /// Capability handles of all named modules.
    ///
    /// All or nothing: if any name is not registered, no handles are returned.
    pub fn get_modules<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<HashMap<String, CapabilityHandle>> {
        self.shared.get_modules(names)
    }

    /// Registered module names, in admission order.
    pub fn module_names(&self) -> Vec<String> {
        self.shared.registry.read().order.clone()
    }

    /// Registered facades, in admission order.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        let registry = self.shared.registry.read();
        registry
            .order
            .iter()
            .filter_map(|name| registry.records.get(name))
            .filter_map(|record| record.facade().cloned())
            .collect()
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.shared.registry.read().records.len()
    }

    /// Last known lifecycle state of `name`.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.shared.states.read().get(name).copied()
    }

    /// Register an after-ready hook for `name`, replacing any earlier one.
    pub fn setup_func_after_ready(&self, name: &str, hook: AfterReadyFn) {
        self.shared.setup_func_after_ready(name, hook);
    }

    /// After-ready hooks, keyed by module name.
    pub fn funcs_after_ready(&self) -> HashMap<String, AfterReadyFn> {
        self.shared.after_ready.read().clone()
    }

    /// Deliver `event` to every registered module's `on_event`.
    ///
    /// Delivery is synchronous, in admission order, at most once per module.
    /// Returns the number of modules the event was delivered to; a module
    /// that panics is logged and not counted.
    pub fn broadcast(&self, event: &Event) -> usize {
        let targets: Vec<(String, CapabilityHandle)> = self
            .modules()
            .into_iter()
            .filter_map(|module| Some((module.name().to_string(), module.capability()?)))
            .collect();

        let mut delivered = 0;
        for (name, capability) in targets {
            tracing::debug!("Dispatching {} to module {}", event.event, name);
            match guarded(|| {
                capability.on_event(event);
                Ok(())
            }) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!("Module {} failed to handle {}: {}", name, event.event, e),
            }
        }
        delivered
    }

    /// List every unit in every search path with its declared name.
    pub fn scan(&self) -> Vec<(PathBuf, Result<Vec<DiscoveredUnit>>)> {
        self.search_paths()
            .into_iter()
            .map(|path| {
                let found = self.shared.loader.scan(&path);
                (path, found)
            })
            .collect()
    }

    /// Find the unit for `name` in one directory, without initializing it.
    pub fn find_module(&self, name: &str, search_path: &Path) -> Result<ModuleRecord> {
        self.shared.loader.find(name, search_path)
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

/// Run module code, turning a panic into a [`ModuleError`].
fn guarded<T>(f: impl FnOnce() -> std::result::Result<T, ModuleError>) -> std::result::Result<T, ModuleError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(ModuleError::Custom(format!("module panicked: {}", message)))
    })
}
