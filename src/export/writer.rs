//! Writing fragments to `.tmdl` files and reading them back

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use super::naming::sanitize_file_name;
use crate::error::{DataverseError, Result};
use crate::semantic::{ensure_unique_names, sort_fragments, ModelFragment};

/// Extension of exported fragment files
pub const FRAGMENT_EXTENSION: &str = "tmdl";

/// Below this many fragments the files are written sequentially.
const PARALLEL_THRESHOLD: usize = 8;

/// File name (no directory) a fragment is exported to
pub fn fragment_file_name(fragment: &ModelFragment) -> String {
    format!("{}.{}", sanitize_file_name(&fragment.name), FRAGMENT_EXTENSION)
}

fn write_fragment(fragment: &ModelFragment, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(fragment_file_name(fragment));
    // UTF-8 without a byte-order mark
    fs::write(&path, fragment.content.as_bytes()).map_err(|e| DataverseError::ExportWrite {
        path: path.clone(),
        source: e,
    })?;
    debug!(fragment = %fragment.name, path = %path.display(), "Exported fragment");
    Ok(path)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DataverseError::ExportWrite {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Export a single fragment into `dir`.
pub fn export_fragment(fragment: &ModelFragment, dir: &Path) -> Result<PathBuf> {
    ensure_dir(dir)?;
    write_fragment(fragment, dir)
}

/// Export every fragment into `dir`, one file each.
///
/// Returns the written paths in canonical fragment order. When several
/// fragments map to the same file name, ignoring case, only the first in
/// canonical order is written.
pub fn export_fragments(fragments: &[ModelFragment], dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_unique_names(fragments)?;
    ensure_dir(dir)?;

    let mut by_file: HashMap<String, &str> = HashMap::new();
    let sorted: Vec<&ModelFragment> = sort_fragments(fragments)
        .into_iter()
        .filter(|fragment| {
            match by_file.entry(fragment_file_name(fragment).to_lowercase()) {
                Entry::Occupied(first) => {
                    warn!(
                        first = *first.get(),
                        skipped = %fragment.name,
                        "Fragments map to the same file name; skipping the later one"
                    );
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(&fragment.name);
                    true
                }
            }
        })
        .collect();

    if sorted.len() >= PARALLEL_THRESHOLD {
        let results: Vec<Result<PathBuf>> = sorted
            .par_iter()
            .map(|fragment| write_fragment(fragment, dir))
            .collect();
        results.into_iter().collect()
    } else {
        sorted
            .iter()
            .map(|fragment| write_fragment(fragment, dir))
            .collect()
    }
}

/// Read every exported fragment file under `dir`, keyed by file stem.
///
/// Results are ordered by file name.
pub fn read_exported(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| DataverseError::ExportRead {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().map_or(true, |ext| ext != FRAGMENT_EXTENSION)
        {
            continue;
        }
        let content = fs::read_to_string(path).map_err(|e| DataverseError::ExportRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push((stem, content));
    }
    Ok(files)
}
