//! Local working-copy discovery.
//!
//! Walks the workspace root looking for directories that directly contain a
//! `.git` directory, to a maximum of two levels below the root (`folder` or
//! `group/folder`). Anything deeper is pruned so dependency and vendor trees
//! are never scanned.

use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::FleetResult;

/// Find working copies under `root`, returned as relative paths, sorted
/// ascending and deduplicated.
pub fn discover_repositories(root: &Path) -> FleetResult<Vec<String>> {
    let mut folders = Vec::new();

    // Repositories live at depth 1 or 2, so their `.git` directories sit at
    // depth 2 or 3.
    for entry in WalkDir::new(root).min_depth(2).max_depth(3) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() || entry.file_name() != ".git" {
            continue;
        }
        let repo = match entry.path().parent().and_then(|p| p.strip_prefix(root).ok()) {
            Some(relative) => relative.to_string_lossy().into_owned(),
            None => continue,
        };
        folders.push(repo);
    }

    folders.sort();
    folders.dedup();
    debug!(count = folders.len(), "discovered working copies");

    Ok(folders)
}
