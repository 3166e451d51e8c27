use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::Settings;

/// Stem of the metadata file that owns a folder's descriptor
const PRIMARY_METADATA_STEM: &str = "movie";

/// One movie folder: its metadata file and, when present, the descriptor next to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub dir: PathBuf,
    pub metadata_path: PathBuf,
    pub descriptor_path: Option<PathBuf>,
}

impl MovieRecord {
    /// Files this record may modify, metadata first
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.metadata_path.as_path()];
        if let Some(descriptor) = &self.descriptor_path {
            paths.push(descriptor.as_path());
        }
        paths
    }
}

/// Lazily walk `settings.root` at any depth and yield a record per metadata
/// file, in file-name order within each directory.
pub fn discover(settings: &Settings) -> impl Iterator<Item = MovieRecord> + '_ {
    WalkDir::new(&settings.root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_backup_dir(entry, settings))
        .filter_map(|entry_result| match entry_result {
            Ok(entry) => Some(entry),
            Err(err) => {
                if let Some(path) = err.path() {
                    tracing::warn!("Failed to access {}: {}", path.display(), err);
                } else {
                    tracing::warn!("Walk error: {}", err);
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !is_apple_double(entry.file_name()))
        .filter(move |entry| settings.is_metadata_file(entry.path()))
        .map(move |entry| pair_with_descriptor(entry.path(), settings))
}

fn pair_with_descriptor(metadata_path: &Path, settings: &Settings) -> MovieRecord {
    let dir = metadata_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.root.clone());
    let descriptor = dir.join(&settings.descriptor_name);
    let descriptor_path = if !descriptor.is_file() {
        None
    } else if primary_metadata(&dir, settings).map_or(true, |p| p == metadata_path) {
        Some(descriptor)
    } else {
        tracing::info!(
            "{} is paired with another metadata file in {}; updating {} only",
            settings.descriptor_name,
            dir.display(),
            metadata_path.display()
        );
        None
    };

    MovieRecord {
        dir,
        metadata_path: metadata_path.to_path_buf(),
        descriptor_path,
    }
}

fn is_backup_dir(entry: &DirEntry, settings: &Settings) -> bool {
    entry.file_type().is_dir() && entry.file_name() == OsStr::new(&settings.backup_dir_name)
}

/// A folder holding several metadata files shares one descriptor, so only
/// one of them may write it: `movie.<ext>` when present, else the first by
/// file name.
fn primary_metadata(dir: &Path, settings: &Settings) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!("Failed to list {}: {}", dir.display(), err);
            return None;
        }
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("Failed to access an entry of {}: {}", dir.display(), err);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && !is_apple_double(&entry.file_name()) && settings.is_metadata_file(&path) {
            candidates.push(path);
        }
    }
    candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let is_primary = |p: &PathBuf| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case(PRIMARY_METADATA_STEM))
            .unwrap_or(false)
    };
    match candidates.iter().position(is_primary) {
        Some(i) => Some(candidates.swap_remove(i)),
        None => candidates.into_iter().next(),
    }
}

/// Skip AppleDouble files (._*) left behind by macOS on network shares
fn is_apple_double(name: &OsStr) -> bool {
    name.to_str().map(|n| n.starts_with("._")).unwrap_or(false)
}
