//! `storage` module: an in-memory key-value store.
//!
//! Every command carries a session token that is checked with the `auth`
//! module, so `auth` must be loaded before `storage`.

use std::collections::BTreeMap;
use std::sync::Arc;

use cooker_module_sdk::prelude::*;
use parking_lot::RwLock;

pub const MODULE_NAME: &str = "storage";
pub const AUTH_MODULE: &str = "auth";

pub struct Storage {
    core: ModuleCoreRef,
    items: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl Storage {
    pub fn new(core: ModuleCoreRef) -> Self {
        Self {
            core,
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Resolve the token to a user through `auth`.
    fn authorize(&self, args: &Value) -> ModuleResult<String> {
        let auth = self
            .core
            .external_module(AUTH_MODULE)
            .ok_or_else(|| ModuleError::UnresolvedDependency(AUTH_MODULE.to_string()))?;

        let verdict = auth.execute("verify", &json!({ "token": args["token"] }))?;
        match verdict["user"].as_str() {
            Some(user) if verdict["valid"] == json!(true) => Ok(user.to_string()),
            _ => Err(ModuleError::Custom("invalid session token".into())),
        }
    }

    fn key(args: &Value) -> ModuleResult<String> {
        args["key"]
            .as_str()
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ModuleError::Custom("missing key".into()))
    }
}

impl Capability for Storage {
    fn initialize(&self) -> ModuleResult<()> {
        self.core.setup_dependencies(&[AUTH_MODULE])?;

        let core = self.core.clone();
        let items = self.items.clone();
        self.core.setup_func_after_ready(Arc::new(move || {
            let count = items.read().len();
            core.emit(Event::new("storage.ready", json!({ "items": count })));
        }));
        Ok(())
    }

    fn uninitialize(&self) -> ModuleResult<()> {
        self.items.write().clear();
        Ok(())
    }

    fn execute(&self, command: &str, args: &Value) -> ModuleResult<Value> {
        match command {
            "put" => {
                let user = self.authorize(args)?;
                let key = Self::key(args)?;
                let previous = self.items.write().insert(key.clone(), args["value"].clone());
                self.core.emit(Event::new(
                    "storage.put",
                    json!({ "key": key, "user": user }),
                ));
                Ok(json!({ "replaced": previous.is_some() }))
            }
            "get" => {
                self.authorize(args)?;
                let key = Self::key(args)?;
                Ok(self.items.read().get(&key).cloned().unwrap_or(Value::Null))
            }
            "keys" => {
                self.authorize(args)?;
                Ok(json!(self.items.read().keys().collect::<Vec<_>>()))
            }
            other => Err(ModuleError::Unsupported(other.to_string())),
        }
    }
}

fn init_storage(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    Ok(Arc::new(Storage::new(core)))
}

declare_module!(MODULE_NAME, init_storage);
