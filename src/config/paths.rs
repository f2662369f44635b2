//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\modshell\
//!   macOS:   ~/Library/Application Support/modshell/
//!   Linux:   ~/.config/modshell/
//!
//! Data dir (per-module user data, recordings, models):
//!   Windows: %LOCALAPPDATA%\modshell\
//!   macOS:   ~/Library/Application Support/modshell/
//!   Linux:   ~/.local/share/modshell/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding one persisted JSON document per owner namespace.
    pub user_data_dir: PathBuf,
    /// Directory for captured audio files.
    pub recordings_dir: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "modshell";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let user_data_dir = data_dir.join("user_data");
        let recordings_dir = data_dir.join("recordings");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            user_data_dir,
            recordings_dir,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
