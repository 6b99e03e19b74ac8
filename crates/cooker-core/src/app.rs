//! Application host.
//!
//! Wraps a [`ModuleManager`] with the bootstrap a host program needs: find
//! the settings file, load the configured modules, start their after-ready
//! hooks, republish module events and wait for a stop request.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::Notify;

use crate::config::{AppInfo, ManagerConfig, Settings};
use crate::error::Result;
use crate::eventbus::{EventBus, EventBusReceiver};
use crate::module::{LoadReport, ModuleManager};

/// Requests that a running [`App`] shut down.
#[derive(Clone, Default)]
pub struct StopHandle {
    notify: Arc<Notify>,
}

impl StopHandle {
    /// Ask the app to stop. A request made before `run` is kept.
    pub fn stop(&self) {
        self.notify.notify_one();
    }

    async fn stopped(&self) {
        self.notify.notified().await;
    }
}

/// Host program around a [`ModuleManager`]: bootstrap, run loop and shutdown.
pub struct App {
    info: AppInfo,
    manager: ModuleManager,
    bus: EventBus,
    stop: StopHandle,
}

impl App {
    /// App searching the default module directories for `info`.
    pub fn new(info: AppInfo) -> Self {
        let manager = ModuleManager::new(ManagerConfig::with_defaults(&info));
        Self::with_manager(info, manager)
    }

    /// App driving an already configured manager.
    pub fn with_manager(info: AppInfo, manager: ModuleManager) -> Self {
        Self {
            info,
            manager,
            bus: EventBus::new(),
            stop: StopHandle::default(),
        }
    }

    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    /// Discover the settings file and load the modules it lists.
    ///
    /// A missing settings file is not an error: nothing is loaded.
    pub fn init(&self) -> Result<LoadReport> {
        match Settings::discover(&self.info)? {
            Some((path, settings)) => {
                tracing::info!("Using settings from {}", path.display());
                Ok(self.init_with(&settings))
            }
            None => {
                tracing::warn!(
                    "No {} found, no modules will be loaded",
                    self.info.config_file_name()
                );
                Ok(LoadReport::default())
            }
        }
    }

    /// Load the modules listed in `settings`, after appending its extra paths.
    pub fn init_with(&self, settings: &Settings) -> LoadReport {
        for path in &settings.modules.paths {
            self.manager.add_module_path(path.clone());
        }
        self.manager.load_modules(settings.general.modules.as_slice())
    }

    /// Subscribe to events emitted by loaded modules.
    pub fn subscribe_events(&self) -> EventBusReceiver {
        self.bus.subscribe()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Start every after-ready hook on its own thread.
    pub fn start_after_ready(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for (name, hook) in self.manager.funcs_after_ready() {
            let spawned = std::thread::Builder::new()
                .name(format!("after-ready-{}", name))
                .spawn(move || hook());

            match spawned {
                Ok(handle) => {
                    tracing::debug!("Started after-ready hook of {}", name);
                    handles.push(handle);
                }
                Err(e) => tracing::warn!("Failed to start after-ready hook of {}: {}", name, e),
            }
        }

        handles
    }

    /// Forward each module's outbound events onto the app's bus.
    ///
    /// Must be called inside a tokio runtime. Modules whose receiver was
    /// already taken are skipped.
    pub fn forward_events(&self) -> usize {
        let mut forwarded = 0;

        for module in self.manager.modules() {
            let Some(mut rx) = module.take_event_receiver() else {
                continue;
            };
            let source = module.name().to_string();
            let bus = self.bus.clone();

            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    tracing::debug!("Module {} emitted {}", source, event.event);
                    bus.publish(source.as_str(), event);
                }
                tracing::debug!("Event channel of {} closed", source);
            });
            forwarded += 1;
        }

        forwarded
    }

    /// Run until [`stop`](Self::stop) is called or Ctrl-C is received, then
    /// shut every module down.
    pub async fn run(&self) -> Result<()> {
        self.forward_events();
        let hooks = self.start_after_ready();
        tracing::info!(
            "{} ready: {} module(s), {} after-ready hook(s)",
            self.info.program_name,
            self.manager.count(),
            hooks.len()
        );

        tokio::select! {
            _ = self.stop.stopped() => {
                tracing::info!("Stop requested");
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
                    Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
        }

        self.manager.shutdown();
        Ok(())
    }
}
