//! On-disk schema of a per-owner user-data document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current version of the document format.  Stored in every file and read
/// back via [`crate::store::StateStore::get_version`] so future format
/// migrations can be gated on it.
pub const DOCUMENT_VERSION: u32 = 1;

/// One persisted JSON document, stored as `<owner>.json`:
///
/// ```json
/// { "version": 1, "data": { "some_key": "some value" } }
/// ```
///
/// `data` keys are namespace-local strings chosen by the owning module.
/// Indentation and key order in the file are cosmetic, not load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDocument {
    /// Format version — monotonic, currently always [`DOCUMENT_VERSION`].
    pub version: u32,
    /// The owner's key/value payload.
    pub data: Map<String, Value>,
}

impl Default for PersistedDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            data: Map::new(),
        }
    }
}
