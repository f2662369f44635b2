//! Module descriptor — the metadata record identifying a loadable feature
//! unit, parsed from a `module.toml` manifest.

use std::path::PathBuf;

use serde::Deserialize;

/// Manifest file expected at the root of every module directory.
pub const MANIFEST_FILE: &str = "module.toml";

fn default_version() -> String {
    "0.1.0".into()
}

/// Metadata describing one installed module.
///
/// All fields except `name` are optional in the manifest and fall back to
/// defaults.  `path` is always filled from the scanned directory — a value
/// in the manifest is ignored, so a module cannot claim to live somewhere
/// it does not.
///
/// ```toml
/// name = "Dictation"
/// version = "1.2.0"
/// description = "Voice capture and transcription"
/// icon_path = "assets/mic.png"
/// tags = ["audio", "productivity"]
/// mobile = false
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModuleDescriptor {
    /// Display name; the case-normalised form is the module's identity key.
    pub name: String,
    /// Module version string.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Icon path relative to the module directory.
    #[serde(default)]
    pub icon_path: String,
    /// Ordered list of free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Default favorite flag; overwritten post-load from persisted state.
    #[serde(default)]
    pub favorite: bool,
    /// Whether the module also ships a mobile surface.
    #[serde(default)]
    pub mobile: bool,
    /// Directory the module was discovered in.  Never read from the manifest.
    #[serde(skip)]
    pub path: PathBuf,
}

impl ModuleDescriptor {
    /// Identity key: the trimmed, lower-cased name.  Persisted favorite
    /// state is keyed on this so renames that only change case keep their
    /// flag.
    pub fn id(&self) -> String {
        self.name.trim().to_lowercase()
    }

    /// `Err(reason)` when the descriptor cannot identify a module.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("module name is empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let manifest = r#"
            name = "Dictation"
            version = "1.2.0"
            description = "Voice capture and transcription"
            icon_path = "assets/mic.png"
            tags = ["audio", "productivity"]
            favorite = true
            mobile = true
        "#;
        let desc: ModuleDescriptor = toml::from_str(manifest).unwrap();

        assert_eq!(desc.name, "Dictation");
        assert_eq!(desc.version, "1.2.0");
        assert_eq!(desc.tags, vec!["audio", "productivity"]);
        assert!(desc.favorite);
        assert!(desc.mobile);
        assert_eq!(desc.path, PathBuf::new());
    }

    #[test]
    fn minimal_manifest_uses_defaults() {
        let desc: ModuleDescriptor = toml::from_str(r#"name = "Tracker""#).unwrap();

        assert_eq!(desc.version, "0.1.0");
        assert!(desc.description.is_empty());
        assert!(desc.tags.is_empty());
        assert!(!desc.favorite);
        assert!(!desc.mobile);
    }

    #[test]
    fn id_is_case_normalised() {
        let desc: ModuleDescriptor = toml::from_str(r#"name = "  DicTation ""#).unwrap();
        assert_eq!(desc.id(), "dictation");
    }

    #[test]
    fn manifest_without_name_fails_to_parse() {
        assert!(toml::from_str::<ModuleDescriptor>(r#"version = "1.0""#).is_err());
    }

    #[test]
    fn blank_name_fails_validation() {
        let desc: ModuleDescriptor = toml::from_str(r#"name = "   ""#).unwrap();
        assert!(desc.validate().is_err());
    }
}
