use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Identifier of one run's backup set: its start time in UTC, sortable as text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunId(String);

impl RunId {
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    /// Local wall-clock time repeats when clocks go back, so every instant is
    /// converted to UTC first.
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        RunId(at.with_timezone(&Utc).format("%Y%m%d-%H%M%S%.3f").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Copies of the files one run modified, laid out like the library itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub id: String,
    pub path: PathBuf,
}

impl BackupSet {
    /// Backed-up files in path order, with an error for every entry that
    /// could not be read
    pub fn files(&self) -> Vec<Result<PathBuf>> {
        WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
                Ok(_) => None,
                Err(err) => {
                    let path = err.path().unwrap_or(self.path.as_path()).to_path_buf();
                    Some(Err(Error::io(path, err.into())))
                }
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RestoreReport {
    /// None when there was nothing to restore from
    pub set: Option<BackupSet>,
    pub restored: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Error)>,
}

/// Backups under `<root>/<dir_name>/<run id>/<path relative to root>`
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>, dir_name: &str) -> Self {
        let root = root.into();
        let dir = root.join(dir_name);
        BackupStore { root, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `original` is kept in the set for `run`
    pub fn slot(&self, original: &Path, run: &RunId) -> Result<PathBuf> {
        let relative = original
            .strip_prefix(&self.root)
            .map_err(|_| Error::OutsideRoot(original.to_path_buf()))?;
        Ok(self.dir.join(run.as_str()).join(relative))
    }

    /// Back up every existing path. One result per input path, in order; a
    /// failure never prevents the remaining copies.
    pub fn backup(&self, paths: &[&Path], run: &RunId) -> Vec<Result<Option<PathBuf>>> {
        paths.iter().map(|path| self.backup_file(path, run)).collect()
    }

    /// Copy `original` into the run's set. Returns `None` if the file does not
    /// exist. An existing backup is never overwritten.
    pub fn backup_file(&self, original: &Path, run: &RunId) -> Result<Option<PathBuf>> {
        if !original.exists() {
            return Ok(None);
        }

        let dest = self.slot(original, run)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut src = File::open(original).map_err(|e| Error::io(original, e))?;
        let mut out = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::BackupExists(dest));
            }
            Err(e) => return Err(Error::io(&dest, e)),
        };

        if let Err(e) = io::copy(&mut src, &mut out) {
            // don't leave a truncated copy that restore would trust
            drop(out);
            let _ = fs::remove_file(&dest);
            return Err(Error::io(original, e));
        }
        out.sync_all().map_err(|e| Error::io(&dest, e))?;

        Ok(Some(dest))
    }

    /// All backup sets, oldest first
    pub fn sets(&self) -> Result<Vec<BackupSet>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.dir, e)),
        };

        let mut sets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            if let Some(id) = entry.file_name().to_str() {
                sets.push(BackupSet {
                    id: id.to_string(),
                    path: entry.path(),
                });
            }
        }

        sets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sets)
    }

    pub fn latest_set(&self) -> Result<Option<BackupSet>> {
        Ok(self.sets()?.pop())
    }

    /// Copy every file of the latest set back over its original. Backups are
    /// left in place.
    pub fn restore(&self) -> Result<RestoreReport> {
        match self.latest_set()? {
            Some(set) => Ok(self.restore_set(set)),
            None => Ok(RestoreReport::default()),
        }
    }

    /// Copy every file of `set` back. Unreadable parts of the set are
    /// reported as failures against their backup path.
    pub fn restore_set(&self, set: BackupSet) -> RestoreReport {
        let mut report = RestoreReport::default();
        for backup in set.files() {
            let backup = match backup {
                Ok(backup) => backup,
                Err(e) => {
                    let path = match &e {
                        Error::Io { path, .. } => path.clone(),
                        _ => set.path.clone(),
                    };
                    report.failed.push((path, e));
                    continue;
                }
            };
            let Ok(relative) = backup.strip_prefix(&set.path) else {
                continue;
            };
            let target = self.root.join(relative);
            match restore_file(&backup, &target) {
                Ok(()) => report.restored.push(target),
                Err(e) => report.failed.push((target, e)),
            }
        }
        report.set = Some(set);
        report
    }
}

fn restore_file(backup: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(backup, target).map_err(|e| Error::io(target, e))?;
    Ok(())
}
