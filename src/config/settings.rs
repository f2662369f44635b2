//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ShellConfig
// ---------------------------------------------------------------------------

/// Settings for the host shell itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Root directory scanned for module manifests — one subdirectory per
    /// module, each containing a `module.toml`.
    pub modules_root: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            modules_root: PathBuf::from("modules"),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Number of capture channels requested from the device (1 = mono).
    pub channels: u16,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of samples read from the device per loop iteration.
    pub frame_size: u32,
    /// Maximum recording length in seconds; the recording worker stops
    /// on its own once this is exceeded (checked once per loop iteration).
    pub max_duration_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 44_100,
            frame_size: 1024,
            max_duration_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-to-text engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the GGML model file.  `None` means no model configured yet;
    /// a per-module persisted `model_path` takes precedence when present.
    pub model: Option<PathBuf>,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for the
    /// engine's built-in language detection.
    pub language: String,
    /// Inference thread count — `None` picks a value from the CPU count.
    pub threads: Option<i32>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: None,
            language: "auto".into(),
            threads: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use modshell::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host shell settings.
    #[serde(default)]
    pub shell: ShellConfig,
    /// Audio capture settings.
    #[serde(default)]
    pub audio: AudioConfig,
    /// Speech-to-text engine settings.
    #[serde(default)]
    pub stt: SttConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make capture arithmetic meaningless
    /// downstream (elapsed-time and buffer-size computations divide by
    /// these).
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be non-zero");
        }
        if self.audio.channels == 0 {
            anyhow::bail!("audio.channels must be non-zero");
        }
        Ok(())
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
