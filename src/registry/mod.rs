//! Module discovery and registration.
//!
//! [`ModuleRegistry`] scans the direct subdirectories of a configured root;
//! any directory carrying a valid `module.toml` manifest becomes a
//! [`ModuleDescriptor`].  A malformed candidate is logged and skipped — one
//! bad module must never abort the scan — so the registry always comes up
//! with whatever subset of modules is loadable.
//!
//! After a scan the registry merges persisted favorite flags from the
//! shell's user-data namespace, so favorites survive across sessions
//! without the manifest authors having to care.
//!
//! Ordering of the resulting list is filesystem-enumeration order; callers
//! that want a stable presentation order sort it themselves.

pub mod descriptor;

pub use descriptor::{ModuleDescriptor, MANIFEST_FILE};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;

use crate::store::{StateStore, StoreError};

/// Owner namespace holding the shell's own bookkeeping.
pub const SHELL_OWNER: &str = "shell";

/// Key under [`SHELL_OWNER`] mapping module ids to their persisted state
/// (`{ "<id>": { "favorite": bool } }`).
pub const MODULE_STATE_KEY: &str = "module_state";

// ---------------------------------------------------------------------------
// DiscoveryError
// ---------------------------------------------------------------------------

/// Why a single candidate directory failed to yield a module.  Always
/// recovered locally: the candidate is skipped and the scan continues.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no {MANIFEST_FILE} in {0}")]
    MissingManifest(PathBuf),

    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid descriptor in {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// The authoritative, queryable list of installed modules.
///
/// ```rust,no_run
/// use modshell::registry::ModuleRegistry;
/// use modshell::store::{StateStore, KNOWN_OWNERS};
///
/// let store = StateStore::new("user_data", KNOWN_OWNERS).unwrap();
/// let mut registry = ModuleRegistry::new("modules");
/// registry.load_modules(&store);
/// for module in registry.get_all_modules() {
///     println!("{} {}", module.name, module.version);
/// }
/// ```
#[derive(Debug)]
pub struct ModuleRegistry {
    root: PathBuf,
    modules: Vec<ModuleDescriptor>,
}

impl ModuleRegistry {
    /// Create a registry scanning `root`.  No filesystem access happens
    /// until [`load_modules`](Self::load_modules) is called.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            modules: Vec::new(),
        }
    }

    /// Scan the module root and rebuild the in-memory list from scratch.
    ///
    /// Calling this again re-scans fully — idempotent in content, not in
    /// identity (no incremental diffing).  A missing root logs a warning and
    /// yields an empty list.
    pub fn load_modules(&mut self, store: &StateStore) {
        self.modules.clear();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "registry: module root {} is not readable: {e}",
                    self.root.display()
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            match Self::load_descriptor(&dir) {
                Ok(descriptor) => {
                    log::debug!(
                        "registry: loaded module '{}' v{} from {}",
                        descriptor.name,
                        descriptor.version,
                        dir.display()
                    );
                    self.modules.push(descriptor);
                }
                Err(e) => {
                    log::warn!("registry: skipping {}: {e}", dir.display());
                }
            }
        }

        self.merge_persisted_state(store);
        log::info!("registry: {} module(s) loaded", self.modules.len());
    }

    /// Current snapshot of loaded modules (empty before the first scan).
    pub fn get_all_modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Look a module up by its case-normalised identity key.
    pub fn find(&self, name: &str) -> Option<&ModuleDescriptor> {
        let id = name.trim().to_lowercase();
        self.modules.iter().find(|m| m.id() == id)
    }

    /// Persist the favorite flag for `name` under the shell namespace and
    /// update the in-memory descriptor when the module is loaded.
    pub fn set_module_favorite(
        &mut self,
        store: &StateStore,
        name: &str,
        favorite: bool,
    ) -> Result<(), StoreError> {
        let id = name.trim().to_lowercase();

        let mut state = match store.get(SHELL_OWNER, MODULE_STATE_KEY) {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let entry = state
            .entry(id.clone())
            .or_insert_with(|| json!({}));
        if let Value::Object(fields) = entry {
            fields.insert("favorite".into(), json!(favorite));
        }
        store.set(SHELL_OWNER, MODULE_STATE_KEY, Value::Object(state))?;

        if let Some(module) = self.modules.iter_mut().find(|m| m.id() == id) {
            module.favorite = favorite;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Parse and validate one candidate directory.
    fn load_descriptor(dir: &Path) -> Result<ModuleDescriptor, DiscoveryError> {
        let manifest = dir.join(MANIFEST_FILE);
        if !manifest.exists() {
            return Err(DiscoveryError::MissingManifest(dir.to_path_buf()));
        }

        let content = fs::read_to_string(&manifest).map_err(|source| DiscoveryError::Io {
            path: manifest.clone(),
            source,
        })?;

        let mut descriptor: ModuleDescriptor =
            toml::from_str(&content).map_err(|source| DiscoveryError::Parse {
                path: manifest.clone(),
                source,
            })?;

        descriptor
            .validate()
            .map_err(|reason| DiscoveryError::InvalidDescriptor {
                path: manifest,
                reason,
            })?;

        descriptor.path = dir.to_path_buf();
        Ok(descriptor)
    }

    /// Overwrite each descriptor's `favorite` flag with the persisted value,
    /// leaving the manifest default in place when nothing was persisted.
    fn merge_persisted_state(&mut self, store: &StateStore) {
        let Some(Value::Object(state)) = store.get(SHELL_OWNER, MODULE_STATE_KEY) else {
            return;
        };

        for module in &mut self.modules {
            if let Some(favorite) = state
                .get(&module.id())
                .and_then(|entry| entry.get("favorite"))
                .and_then(Value::as_bool)
            {
                module.favorite = favorite;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
