//! Namespaced, versioned JSON-backed user-data storage.
//!
//! Every logical owner (module name) gets one document file under the
//! storage root: `<root>/<owner>.json`, shaped as
//! `{ "version": 1, "data": { … } }` (see [`PersistedDocument`]).
//!
//! Design points:
//!
//! * **Crash-tolerant reads** — a missing, zero-length, or unparseable
//!   document is treated as if it did not exist: the read path returns the
//!   default empty document and logs, it never errors.
//! * **Atomic writes** — every write serialises to `<owner>.json.tmp` and
//!   then renames over the final path, so a crash mid-write can never leave
//!   a truncated document behind.
//! * **Read-modify-write** — [`StateStore::set`] rewrites the whole document
//!   on every call.  Write amplification is accepted in exchange for the
//!   simplicity of having no in-memory cache to invalidate.

pub mod document;

pub use document::{PersistedDocument, DOCUMENT_VERSION};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Owner namespaces the shell pre-creates on startup.  Modules discovered
/// at runtime may still call [`StateStore::set`] under their own name; the
/// document is then created on first write.
pub const KNOWN_OWNERS: &[&str] = &["shell", "dictation"];

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced by the write path of the store.  (The read path degrades
/// to the default document instead of erroring.)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise document: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Durable key/value storage scoped by owner name.
///
/// Used both for the shell's own bookkeeping (module favorites under the
/// `shell` namespace) and for each module's settings (model path, max
/// duration preference, …).
///
/// ```rust
/// use modshell::store::StateStore;
/// use serde_json::json;
///
/// # let dir = tempfile::tempdir().unwrap();
/// let store = StateStore::new(dir.path(), &["dictation"]).unwrap();
/// store.set("dictation", "max_duration", json!(30)).unwrap();
/// assert_eq!(store.get("dictation", "max_duration"), Some(json!(30)));
/// ```
#[derive(Debug)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Create a store rooted at `root`, creating the directory and seeding
    /// an empty `{ "version": 1, "data": {} }` document for every
    /// `known_owner` that does not have one yet.
    pub fn new(root: impl Into<PathBuf>, known_owners: &[&str]) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let store = Self { root };
        for owner in known_owners {
            if !store.owner_file(owner).exists() {
                store.write_document(owner, &PersistedDocument::default())?;
            }
        }
        Ok(store)
    }

    /// Path of the document file for `owner`.
    fn owner_file(&self, owner: &str) -> PathBuf {
        self.root.join(format!("{owner}.json"))
    }

    /// Fetch a single value from the owner's document.
    ///
    /// Returns `None` when the owner has no document, or the key is absent.
    pub fn get(&self, owner: &str, key: &str) -> Option<Value> {
        self.read_document(owner).data.get(key).cloned()
    }

    /// Store a single value, immediately rewriting the owner's document.
    pub fn set(&self, owner: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut doc = self.read_document(owner);
        doc.data.insert(key.to_string(), value);
        self.write_document(owner, &doc)
    }

    /// Load the owner's full `data` mapping, without the metadata envelope.
    pub fn load(&self, owner: &str) -> Map<String, Value> {
        self.read_document(owner).data
    }

    /// Replace the owner's full `data` mapping.
    pub fn save(&self, owner: &str, data: Map<String, Value>) -> Result<(), StoreError> {
        let doc = PersistedDocument {
            version: DOCUMENT_VERSION,
            data,
        };
        self.write_document(owner, &doc)
    }

    /// Format version recorded in the owner's document.
    pub fn get_version(&self, owner: &str) -> u32 {
        self.read_document(owner).version
    }

    // -----------------------------------------------------------------------
    // File I/O
    // -----------------------------------------------------------------------

    /// Read the owner's document, substituting the default on any failure.
    fn read_document(&self, owner: &str) -> PersistedDocument {
        let path = self.owner_file(owner);

        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => return PersistedDocument::default(),
        };
        if len == 0 {
            log::warn!("store: document is empty, using defaults: {}", path.display());
            return PersistedDocument::default();
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("store: cannot read {}: {e}", path.display());
                return PersistedDocument::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!(
                    "store: corrupt document {}, using defaults: {e}",
                    path.display()
                );
                PersistedDocument::default()
            }
        }
    }

    /// Write the document via a temp file and an atomic rename.
    fn write_document(&self, owner: &str, doc: &PersistedDocument) -> Result<(), StoreError> {
        let path = self.owner_file(owner);
        let tmp = self.root.join(format!("{owner}.json.tmp"));

        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
