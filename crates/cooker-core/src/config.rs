//! Host configuration.
//!
//! Identity of the host program, where modules are searched for, and the
//! settings file that lists which modules to load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Built-in locations.
pub mod defaults {
    /// Module directory next to the working directory.
    pub const LOCAL_MODULE_DIR: &str = "./modules";
    /// Module directory of a local build.
    pub const BUILD_MODULE_DIR: &str = "./out/modules";
    /// Root of the system-wide module directory.
    pub const SYSTEM_MODULE_ROOT: &str = "/opt";
    /// Root of the system-wide configuration directory.
    pub const SYSTEM_CONFIG_ROOT: &str = "/etc";
    /// Project-local configuration directory.
    pub const LOCAL_CONFIG_DIR: &str = "./configs";
    /// Settings file extension.
    pub const CONFIG_EXTENSION: &str = "toml";
}

/// Environment variable names.
pub mod env_vars {
    /// Explicit settings file, checked before the search paths.
    pub const CONFIG_FILE: &str = "COOKER_CONFIG";
    /// Emit JSON logs when set to `true`.
    pub const LOG_JSON: &str = "COOKER_LOG_JSON";
}

/// Identity of the host program.
///
/// Organization, product and project scope the system-wide module and
/// configuration directories; the program name picks the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub org_name: String,
    pub product_name: String,
    pub project_name: String,
    pub program_name: String,
}

impl AppInfo {
    pub fn new(
        org_name: impl Into<String>,
        product_name: impl Into<String>,
        project_name: impl Into<String>,
        program_name: impl Into<String>,
    ) -> Self {
        Self {
            org_name: org_name.into(),
            product_name: product_name.into(),
            project_name: project_name.into(),
            program_name: program_name.into(),
        }
    }

    /// `<org>/<product>/<project>`, relative.
    pub fn scope(&self) -> PathBuf {
        PathBuf::from(&self.org_name)
            .join(&self.product_name)
            .join(&self.project_name)
    }

    /// System-wide module directory, `/opt/<org>/<product>/<project>/modules`.
    pub fn system_module_dir(&self) -> PathBuf {
        Path::new(defaults::SYSTEM_MODULE_ROOT)
            .join(self.scope())
            .join("modules")
    }

    /// Settings file name, `<program>.toml`.
    pub fn config_file_name(&self) -> String {
        format!("{}.{}", self.program_name, defaults::CONFIG_EXTENSION)
    }

    /// Directories searched for the settings file, in priority order.
    pub fn config_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![Path::new(defaults::SYSTEM_CONFIG_ROOT).join(self.scope())];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join(self.scope()));
        }
        paths.push(PathBuf::from(defaults::LOCAL_CONFIG_DIR));
        paths.push(PathBuf::from("."));
        paths
    }
}

/// Module manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Directories scanned for modules; earlier entries win.
    pub search_paths: Vec<PathBuf>,
}

impl ManagerConfig {
    /// Configuration without any search path.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in search paths for `info`: `./modules`, `./out/modules`,
    /// then the system-wide module directory.
    pub fn with_defaults(info: &AppInfo) -> Self {
        Self {
            search_paths: vec![
                PathBuf::from(defaults::LOCAL_MODULE_DIR),
                PathBuf::from(defaults::BUILD_MODULE_DIR),
                info.system_module_dir(),
            ],
        }
    }

    /// Append a search path.
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub modules: ModuleSettings,
}

/// `[general]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Modules to load at startup, in load order.
    pub modules: Vec<String>,
}

/// `[modules]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    /// Extra search paths, appended after the built-in ones.
    pub paths: Vec<PathBuf>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::config(format!("Invalid settings in {}: {}", path.display(), e)))
    }

    /// Locate and read the settings file for `info`.
    ///
    /// `COOKER_CONFIG` wins when set. Otherwise the first
    /// [`config_search_paths`](AppInfo::config_search_paths) entry holding
    /// `<program>.toml` is used. Returns `Ok(None)` when no file exists.
    pub fn discover(info: &AppInfo) -> Result<Option<(PathBuf, Self)>> {
        if let Ok(explicit) = std::env::var(env_vars::CONFIG_FILE) {
            let path = PathBuf::from(explicit);
            let settings = Self::from_file(&path)?;
            return Ok(Some((path, settings)));
        }

        Self::discover_in(&info.config_search_paths(), &info.config_file_name())
    }

    /// Search `dirs` in order for `file_name`.
    pub fn discover_in(dirs: &[PathBuf], file_name: &str) -> Result<Option<(PathBuf, Self)>> {
        for dir in dirs {
            let candidate = dir.join(file_name);
            if candidate.is_file() {
                let settings = Self::from_file(&candidate)?;
                return Ok(Some((candidate, settings)));
            }
        }
        Ok(None)
    }
}
