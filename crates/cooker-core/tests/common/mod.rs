//! Shared fixtures: an opener serving in-process units and a probe capability.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cooker_core::{Error, LoadedUnit, ManagerConfig, ModuleManager, Result, UnitOpener};
use cooker_module_sdk::{
    Capability, CapabilityHandle, Event, InitModuleFn, ModuleCoreRef, ModuleError, ModuleResult,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// File name a unit is installed under in a search directory.
pub fn unit_file(stem: &str) -> String {
    format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)
}

#[derive(Clone)]
struct FakeUnit {
    name: Option<String>,
    init: Option<InitModuleFn>,
}

impl LoadedUnit for FakeUnit {
    fn declared_name(&self) -> Result<String> {
        self.name
            .clone()
            .ok_or_else(|| Error::invalid_unit("<fake>", "no name record"))
    }

    fn initializer(&self) -> Result<InitModuleFn> {
        self.init
            .ok_or_else(|| Error::invalid_unit("<fake>", "no initializer"))
    }
}

/// Serves units from memory for files that exist on disk.
#[derive(Default)]
pub struct FakeOpener {
    units: Mutex<HashMap<PathBuf, FakeUnit>>,
    opened: AtomicUsize,
}

impl FakeOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create `<dir>/<stem>.<dll ext>` and serve a unit declaring `name` for it.
    pub fn install(&self, dir: &Path, stem: &str, name: &str, init: InitModuleFn) -> PathBuf {
        self.install_file(dir, &unit_file(stem), Some(name), Some(init))
    }

    /// Install a unit under an arbitrary file name, optionally without a
    /// name record or initializer.
    pub fn install_file(
        &self,
        dir: &Path,
        file_name: &str,
        name: Option<&str>,
        init: Option<InitModuleFn>,
    ) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, b"").unwrap();
        self.units.lock().insert(
            path.clone(),
            FakeUnit {
                name: name.map(str::to_string),
                init,
            },
        );
        path
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl UnitOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedUnit>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.units
            .lock()
            .get(path)
            .cloned()
            .map(|unit| Box::new(unit) as Box<dyn LoadedUnit>)
            .ok_or_else(|| Error::invalid_unit(path, "not a loadable unit"))
    }
}

/// Manager searching `paths`, in order, through `opener`.
pub fn manager(opener: &Arc<FakeOpener>, paths: &[&Path]) -> ModuleManager {
    let config = paths
        .iter()
        .fold(ManagerConfig::new(), |config, path| config.with_search_path(*path));
    ModuleManager::with_opener(config, opener.clone())
}

/// Uninitialize calls across all probes, in call order.
pub static UNINITIALIZED: Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

/// Capability that records what the host does to it.
///
/// Commands: `ping`, `whoami`, `events`, `initialized`,
/// `call {module, command}`, `emit {event}`.
pub struct Probe {
    core: ModuleCoreRef,
    refuse_initialize: bool,
    initialized: AtomicBool,
    events: Mutex<Vec<String>>,
}

impl Probe {
    fn handle(core: ModuleCoreRef, refuse_initialize: bool) -> CapabilityHandle {
        Arc::new(Self {
            core,
            refuse_initialize,
            initialized: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
        })
    }
}

impl Capability for Probe {
    fn initialize(&self) -> ModuleResult<()> {
        if self.refuse_initialize {
            return Err(ModuleError::InitializationFailed("refused".into()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn uninitialize(&self) -> ModuleResult<()> {
        UNINITIALIZED.lock().push(self.core.name().to_string());
        Ok(())
    }

    fn on_event(&self, event: &Event) {
        self.events.lock().push(event.event.clone());
    }

    fn execute(&self, command: &str, args: &Value) -> ModuleResult<Value> {
        match command {
            "ping" => Ok(json!("pong")),
            "whoami" => Ok(json!(self.core.name())),
            "events" => Ok(json!(self.events.lock().clone())),
            "initialized" => Ok(json!(self.initialized.load(Ordering::SeqCst))),
            "call" => {
                let module = args["module"].as_str().unwrap_or_default();
                let command = args["command"].as_str().unwrap_or_default();
                self.core
                    .external_module(module)
                    .ok_or_else(|| ModuleError::NoSuchModule(module.to_string()))?
                    .execute(command, &Value::Null)
            }
            "emit" => {
                let event = args["event"].as_str().unwrap_or("probe");
                self.core.emit(Event::new(event, args["payload"].clone()));
                Ok(Value::Null)
            }
            other => Err(ModuleError::Unsupported(other.to_string())),
        }
    }
}

pub fn init_probe(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    Ok(Probe::handle(core, false))
}

/// Initializer that refuses to produce a capability.
pub fn init_failing(_core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    Err(ModuleError::InitializationFailed("no oven found".into()))
}

/// Initializer whose capability rejects `initialize`.
pub fn init_refusing(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    Ok(Probe::handle(core, true))
}

pub fn init_panicking(_core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    panic!("initializer exploded")
}

/// Initializer binding `auth` as a dependency, as a storage module would.
pub fn init_needs_auth(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    core.setup_dependencies(&["auth"])?;
    Ok(Probe::handle(core, false))
}

/// Initializer that emits an event and registers an after-ready hook.
pub fn init_chatty(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    core.emit(Event::named("booting"));
    let hook_core = core.clone();
    core.setup_func_after_ready(Arc::new(move || {
        hook_core.emit(Event::named("ready"));
    }));
    Ok(Probe::handle(core, false))
}

/// Initializer binding a present and an absent dependency at once.
pub fn init_needs_auth_and_billing(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    core.setup_dependencies(&["auth", "billing"])?;
    Ok(Probe::handle(core, false))
}

/// Initializer that registers an after-ready hook, then fails.
pub fn init_hook_then_fail(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    core.setup_func_after_ready(Arc::new(|| {}));
    Err(ModuleError::InitializationFailed("changed my mind".into()))
}

/// Initializer that registers an after-ready hook; its capability then
/// rejects `initialize`.
pub fn init_hook_then_refuse(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    core.setup_func_after_ready(Arc::new(|| {}));
    Ok(Probe::handle(core, true))
}
