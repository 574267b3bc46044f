//! ASCII manifests: one text file per (init time, storm, tile kind) listing
//! the tile paths handed to series_analysis via -fcst/-obs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::error::Result;
use crate::fileset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Fcst,
    Anly,
}

impl TileKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TileKind::Fcst => "FCST_ASCII_FILES_",
            TileKind::Anly => "ANLY_ASCII_FILES_",
        }
    }

    /// The series_analysis flag this manifest is bound to.
    pub fn flag(&self) -> &'static str {
        match self {
            TileKind::Fcst => "fcst",
            TileKind::Anly => "obs",
        }
    }
}

pub fn manifest_path(series_out_dir: &Path, init: &str, storm: &str, kind: TileKind) -> PathBuf {
    series_out_dir
        .join(init)
        .join(storm)
        .join(format!("{}{}", kind.prefix(), storm))
}

/// Appends the tile paths for one (init, storm) pair to its manifest, one
/// path per line, sorted ascending. Only paths naming the storm are taken,
/// and a path already scheduled in this invocation's buffer is not written
/// again. A zero-byte manifest is pruned afterwards, along with its then
/// empty directory. Write failures are logged and absorbed; downstream
/// stages treat the missing manifest as missing input.
pub fn write_manifest(
    series_out_dir: &Path,
    init: &str,
    storm: &str,
    kind: TileKind,
    tiles: &[PathBuf],
) -> Result<()> {
    let storm_dir = series_out_dir.join(init).join(storm);
    let path = manifest_path(series_out_dir, init, storm, kind);

    let mut sorted: Vec<String> = tiles
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    sorted.sort();

    let mut buffer = String::new();
    for tile in &sorted {
        if tile.contains(storm) && !buffer.contains(tile.as_str()) {
            buffer.push_str(tile);
            buffer.push('\n');
        }
    }

    let written = std::fs::create_dir_all(&storm_dir)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut file| file.write_all(buffer.as_bytes()))
        });
    if let Err(err) = written {
        error!("Could not create requested ASCII file {}: {err}", path.display());
        return Ok(());
    }
    debug!("Wrote manifest {}", path.display());

    // An empty manifest would make series_analysis fail later; drop it and
    // whatever empty directories it leaves behind.
    if path.metadata().map(|m| m.len() == 0).unwrap_or(false) {
        fileset::prune_empty(&storm_dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INIT: &str = "20200825_00";
    const STORM: &str = "AL012020";

    fn read_manifest(out: &Path, kind: TileKind) -> String {
        std::fs::read_to_string(manifest_path(out, INIT, STORM, kind)).unwrap()
    }

    #[test]
    fn writes_sorted_deduplicated_storm_paths() {
        let dir = TempDir::new().unwrap();
        let out = dir.path();
        let tiles = vec![
            PathBuf::from("/tiles/FCST_TILE_F024_AL012020.grb2"),
            PathBuf::from("/tiles/FCST_TILE_F000_AL012020.grb2"),
            PathBuf::from("/tiles/FCST_TILE_F024_AL012020.grb2"),
            PathBuf::from("/tiles/FCST_TILE_F000_AL092020.grb2"),
        ];

        write_manifest(out, INIT, STORM, TileKind::Fcst, &tiles).unwrap();

        let contents = read_manifest(out, TileKind::Fcst);
        assert_eq!(
            contents,
            "/tiles/FCST_TILE_F000_AL012020.grb2\n/tiles/FCST_TILE_F024_AL012020.grb2\n"
        );
    }

    #[test]
    fn appends_rather_than_overwrites() {
        let dir = TempDir::new().unwrap();
        let out = dir.path();
        let first = vec![PathBuf::from("/tiles/ANLY_TILE_F000_AL012020.grb2")];
        let second = vec![PathBuf::from("/tiles/ANLY_TILE_F024_AL012020.grb2")];

        write_manifest(out, INIT, STORM, TileKind::Anly, &first).unwrap();
        write_manifest(out, INIT, STORM, TileKind::Anly, &second).unwrap();

        let contents = read_manifest(out, TileKind::Anly);
        assert_eq!(
            contents,
            "/tiles/ANLY_TILE_F000_AL012020.grb2\n/tiles/ANLY_TILE_F024_AL012020.grb2\n"
        );
    }

    #[test]
    fn empty_manifest_and_its_directory_are_removed() {
        let dir = TempDir::new().unwrap();
        let out = dir.path();
        // tiles belonging to a different storm produce an empty manifest
        let tiles = vec![PathBuf::from("/tiles/FCST_TILE_F000_AL092020.grb2")];

        write_manifest(out, INIT, STORM, TileKind::Fcst, &tiles).unwrap();

        assert!(!manifest_path(out, INIT, STORM, TileKind::Fcst).exists());
        assert!(!out.join(INIT).join(STORM).exists());
    }

    #[test]
    fn manifest_path_follows_canonical_layout() {
        let path = manifest_path(Path::new("/out"), INIT, STORM, TileKind::Fcst);
        assert_eq!(
            path,
            Path::new("/out/20200825_00/AL012020/FCST_ASCII_FILES_AL012020")
        );
        let path = manifest_path(Path::new("/out"), INIT, STORM, TileKind::Anly);
        assert_eq!(
            path,
            Path::new("/out/20200825_00/AL012020/ANLY_ASCII_FILES_AL012020")
        );
    }
}
