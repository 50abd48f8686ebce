//! XDG-compliant path resolution for netinv
//!
//! - Linux/macOS: ~/.config/netinv/ and ~/.local/share/netinv/
//! - Windows: %APPDATA%\netinv\ and %LOCALAPPDATA%\netinv\

use std::path::PathBuf;

const APP_DIR: &str = "netinv";

/// Get the configuration directory path
///
/// - Linux/macOS: `~/.config/netinv/` (XDG-style, not ~/Library)
/// - Windows: `%APPDATA%\netinv\`
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config").join(APP_DIR))
    }
    #[cfg(target_os = "windows")]
    {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .map(|d| d.join(APP_DIR))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Get the data directory path
///
/// - Linux/macOS: `~/.local/share/netinv/`
/// - Windows: `%LOCALAPPDATA%\netinv\`
pub fn get_data_dir() -> Option<PathBuf> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local").join("share").join(APP_DIR))
    }
    #[cfg(target_os = "windows")]
    {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .map(|d| d.join(APP_DIR))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Returns: `{config_dir}/config.json`
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("config.json"))
}

/// Directory holding stored batch results
///
/// Returns: `{data_dir}/results`
pub fn get_results_dir() -> Option<PathBuf> {
    get_data_dir().map(|d| d.join("results"))
}
