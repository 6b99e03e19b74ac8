//! `auth` module: issues session tokens and verifies them for other modules.
//!
//! Commands:
//! - `login {user}` returns `{token}` and emits `auth.login`
//! - `verify {token}` returns `{valid, user}`
//! - `logout {token}` returns `{revoked}`

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cooker_module_sdk::prelude::*;
use parking_lot::RwLock;

pub const MODULE_NAME: &str = "auth";

pub struct Auth {
    core: ModuleCoreRef,
    sessions: RwLock<HashMap<String, String>>,
    next_id: AtomicU64,
}

impl Auth {
    pub fn new(core: ModuleCoreRef) -> Self {
        Self {
            core,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn login(&self, user: &str) -> ModuleResult<Value> {
        if user.is_empty() {
            return Err(ModuleError::Custom("user must not be empty".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = format!("{}-{:08x}", user, id);
        self.sessions.write().insert(token.clone(), user.to_string());

        self.core.emit(Event::new("auth.login", json!({ "user": user })));
        Ok(json!({ "token": token }))
    }

    fn verify(&self, token: &str) -> Value {
        match self.sessions.read().get(token) {
            Some(user) => json!({ "valid": true, "user": user }),
            None => json!({ "valid": false }),
        }
    }

    fn logout(&self, token: &str) -> Value {
        json!({ "revoked": self.sessions.write().remove(token).is_some() })
    }
}

impl Capability for Auth {
    fn initialize(&self) -> ModuleResult<()> {
        self.core.emit(Event::named("auth.started"));
        Ok(())
    }

    fn uninitialize(&self) -> ModuleResult<()> {
        self.sessions.write().clear();
        Ok(())
    }

    fn on_event(&self, event: &Event) {
        // Hosts broadcast this on a credential rotation.
        if event.event == "auth.revoke_all" {
            self.sessions.write().clear();
        }
    }

    fn execute(&self, command: &str, args: &Value) -> ModuleResult<Value> {
        let field = |name: &str| args[name].as_str().unwrap_or_default();
        match command {
            "login" => self.login(field("user")),
            "verify" => Ok(self.verify(field("token"))),
            "logout" => Ok(self.logout(field("token"))),
            other => Err(ModuleError::Unsupported(other.to_string())),
        }
    }
}

fn init_auth(core: ModuleCoreRef) -> ModuleResult<CapabilityHandle> {
    Ok(Arc::new(Auth::new(core)))
}

declare_module!(MODULE_NAME, init_auth);
