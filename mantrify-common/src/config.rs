//! Configuration file loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder for all Mantrify data
pub const ROOT_FOLDER_ENV: &str = "MANTRIFY_ROOT_FOLDER";

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` from the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_root: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_root {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the configuration file for a module
///
/// Linux checks `~/.config/mantrify/<module>.toml` then `/etc/mantrify/<module>.toml`;
/// other platforms only check the user config directory. Returns `None` when no
/// file exists, which callers treat as "use defaults".
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("mantrify").join(&file_name));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mantrify").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and deserialize a TOML file
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Read config {} failed: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config {} failed: {}", path.display(), e)))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/mantrify (or /var/lib/mantrify for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("mantrify"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mantrify"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mantrify"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mantrify"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mantrify"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mantrify"))
    } else {
        PathBuf::from("./mantrify_data")
    }
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
