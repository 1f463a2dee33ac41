//! User preferences.
//!
//! Preferences are stored as TOML, by default in `.chemconfig.toml`:
//!
//! ```toml
//! populate_defaults = true
//! recent_files = ["h2.txt", "lih.json"]
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default preferences file name.
pub const DEFAULT_PREFERENCES_FILE: &str = ".chemconfig.toml";

/// Maximum number of entries kept in [`Preferences::recent_files`].
pub const MAX_RECENT_FILES: usize = 10;

/// Preferences that shape how documents are created and loaded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct Preferences {
    /// Merge schema defaults, validate and commit whenever a document is
    /// created or loaded.
    pub populate_defaults: bool,
    /// Recently opened or saved input files, newest first.
    pub recent_files: Vec<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            populate_defaults: true,
            recent_files: Vec::new(),
        }
    }
}

impl Preferences {
    /// Read preferences; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no preferences at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::Preferences(format!("{}: {e}", path.display())))
    }

    /// Write preferences as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Preferences(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Move `path` to the front of the recent files list.
    pub fn add_recent_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    /// JSON schema of the preferences file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Preferences)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(dir.path().join("absent.toml")).unwrap();
        assert!(prefs.populate_defaults);
        assert!(prefs.recent_files.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_PREFERENCES_FILE);
        let mut prefs = Preferences {
            populate_defaults: false,
            ..Default::default()
        };
        prefs.add_recent_file("h2.txt");
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "recent_files = [\"a.txt\"]\n").unwrap();
        let prefs = Preferences::load(&path).unwrap();
        assert!(prefs.populate_defaults);
        assert_eq!(prefs.recent_files, vec![PathBuf::from("a.txt")]);
    }

    #[test]
    fn test_recent_files_are_capped_and_deduplicated() {
        let mut prefs = Preferences::default();
        for i in 0..15 {
            prefs.add_recent_file(format!("f{i}.txt"));
        }
        prefs.add_recent_file("f10.txt");
        assert_eq!(prefs.recent_files.len(), MAX_RECENT_FILES);
        assert_eq!(prefs.recent_files[0], PathBuf::from("f10.txt"));
        assert_eq!(
            prefs.recent_files.iter().filter(|p| **p == PathBuf::from("f10.txt")).count(),
            1
        );
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = Preferences::json_schema();
        assert!(schema["properties"].get("populate_defaults").is_some());
    }
}
