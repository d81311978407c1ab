//! Persisted extraction settings (`.dataverse-semantic.json`)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DataverseError, Result};

/// Default settings file name, relative to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = ".dataverse-semantic.json";

/// Choices remembered between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub environment_url: String,
    pub last_solution: String,
    /// Table logical names
    pub selected_tables: Vec<String>,
    pub fact_table: Option<String>,
    /// Table logical name to selected form id
    pub table_forms: BTreeMap<String, String>,
    /// Table logical name to selected view id
    pub table_views: BTreeMap<String, String>,
    /// Table logical name to selected attribute logical names
    pub table_attributes: BTreeMap<String, Vec<String>>,
    pub output_folder: Option<PathBuf>,
    pub project_name: Option<String>,
}

impl ExtractSettings {
    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not load settings, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| DataverseError::SettingsWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
        fs::write(path, json).map_err(write_err)
    }
}
