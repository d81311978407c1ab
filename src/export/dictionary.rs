//! Writing the metadata dictionary artifact

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::naming::sanitize_file_name;
use crate::error::{DataverseError, Result};
use crate::model::MetadataDictionary;

/// Companion file holding the bare environment URL
pub const ENVIRONMENT_FILE: &str = "DataverseURL.txt";

/// File name of a dictionary: named after its project, else its solution
pub fn dictionary_file_name(dictionary: &MetadataDictionary) -> String {
    let stem = dictionary
        .project_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&dictionary.solution);
    format!("{} Metadata Dictionary.json", sanitize_file_name(stem))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|e| DataverseError::DictionaryWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the dictionary as pretty JSON plus the environment URL file.
///
/// Returns the path of the dictionary file.
pub fn write_dictionary(dictionary: &MetadataDictionary, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| DataverseError::DictionaryWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = dir.join(dictionary_file_name(dictionary));
    let json = serde_json::to_string_pretty(dictionary).map_err(|e| {
        DataverseError::DictionaryWrite {
            path: path.clone(),
            source: e.into(),
        }
    })?;
    write_file(&path, json.as_bytes())?;
    write_file(
        &dir.join(ENVIRONMENT_FILE),
        dictionary.environment.as_bytes(),
    )?;

    info!(
        path = %path.display(),
        tables = dictionary.tables.len(),
        attributes = dictionary.total_attributes(),
        "Wrote metadata dictionary"
    );
    Ok(path)
}
