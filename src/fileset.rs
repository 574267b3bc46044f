//! File discovery and classification by naming convention.
//!
//! Tile trees are organized as `<root>/<init>/<storm>/<tile files>`, with a
//! `filter_<init>.tcst` storm-track file per init directory. Absence of a
//! directory deliberately means "zero results", not an error; only I/O
//! failures other than not-found propagate.

use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SeriesError};

/// Init time directory names: YYYYMMDD_hh.
const INIT_TIME_PATTERN: &str = r"^\d{8}_\d{2}$";

pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| SeriesError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// All files under `root` whose name matches `pattern`, sorted ascending.
/// A missing root yields an empty list.
pub fn get_files(root: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut matched = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| SeriesError::io(root, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if pattern.is_match(&name) {
            matched.push(entry.into_path());
        }
    }
    matched.sort();
    Ok(matched)
}

/// Init times present as subdirectories of `tile_dir`, sorted ascending.
pub fn init_times(tile_dir: &Path) -> Result<Vec<String>> {
    if !tile_dir.exists() {
        return Ok(Vec::new());
    }
    let pattern = compile(INIT_TIME_PATTERN)?;

    let mut times = Vec::new();
    let entries = fs::read_dir(tile_dir).map_err(|e| SeriesError::io(tile_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SeriesError::io(tile_dir, e))?;
        let file_type = entry.file_type().map_err(|e| SeriesError::io(tile_dir, e))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if pattern.is_match(&name) {
            times.push(name);
        }
    }
    times.sort();
    Ok(times)
}

/// Unique storm ids named in a `.tcst` storm-track filter file, in sorted
/// order. The STORM_ID column is located from the whitespace-delimited
/// header row. A missing file yields an empty list.
pub fn storm_ids(filter_file: &Path) -> Result<Vec<String>> {
    if !filter_file.is_file() {
        return Ok(Vec::new());
    }

    let contents =
        fs::read_to_string(filter_file).map_err(|e| SeriesError::io(filter_file, e))?;
    let mut lines = contents.lines();

    let header = match lines.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    let column = match header.split_whitespace().position(|col| col == "STORM_ID") {
        Some(column) => column,
        None => {
            debug!(
                "No STORM_ID column in filter file {}",
                filter_file.display()
            );
            return Ok(Vec::new());
        }
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for line in lines {
        if let Some(id) = line.split_whitespace().nth(column) {
            if seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

/// Storm ids for one init time, read from `<base>/<init>/filter_<init>.tcst`.
/// A storm listed there may still lack tile files; callers must tolerate
/// missing data per storm.
pub fn storms_for_init(base: &Path, init: &str) -> Result<Vec<String>> {
    let filter_file = base.join(init).join(format!("filter_{init}.tcst"));
    storm_ids(&filter_file)
}

/// Errors when either tile family matches nothing under `tile_dir`. Callers
/// log and continue; a partial tree is still worth processing.
pub fn check_for_tiles(tile_dir: &Path, fcst_pattern: &Regex, anly_pattern: &Regex) -> Result<()> {
    let fcst = get_files(tile_dir, fcst_pattern)?;
    let anly = get_files(tile_dir, anly_pattern)?;
    if fcst.is_empty() || anly.is_empty() {
        return Err(SeriesError::MissingTiles(tile_dir.to_path_buf()));
    }
    Ok(())
}

/// Removes zero-byte files, then any directories left empty, bottom-up.
/// The root itself is removed when it ends up empty.
pub fn prune_empty(root: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| SeriesError::io(root, e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file() {
            let metadata = entry.metadata().map_err(|e| SeriesError::io(path, e.into()))?;
            if metadata.len() == 0 {
                debug!("Pruning empty file {}", path.display());
                fs::remove_file(path).map_err(|e| SeriesError::io(path, e))?;
            }
        } else if entry.file_type().is_dir() {
            let mut children = fs::read_dir(path).map_err(|e| SeriesError::io(path, e))?;
            if children.next().is_none() {
                debug!("Pruning empty directory {}", path.display());
                fs::remove_dir(path).map_err(|e| SeriesError::io(path, e))?;
            }
        }
    }
    Ok(())
}

/// True when the directory exists and has at least one entry.
pub fn dir_has_entries(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(dir).map_err(|e| SeriesError::io(dir, e))?;
    Ok(entries.next().is_some())
}
