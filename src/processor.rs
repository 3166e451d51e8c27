use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::{BackupStore, RestoreReport, RunId};
use crate::config::Settings;
use crate::discovery::{discover, MovieRecord};
use crate::error::{Error, Result};
use crate::metadata::{extract_date, DateValue};
use crate::writer::{rewrite_descriptor, rewrite_metadata};

pub struct Processor {
    settings: Settings,
    store: BackupStore,
    run_id: RunId,
    dry_run: bool,
    stats: ProcessingStats,
}

#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub total_records: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl ProcessingStats {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        self.total_records += 1;
        match outcome {
            RecordOutcome::Updated { .. } => self.updated += 1,
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Skipped { .. } => self.skipped += 1,
            RecordOutcome::Failed { errors, .. } => {
                self.failed += 1;
                for (path, error) in errors {
                    self.failures.push((path.clone(), error.to_string()));
                }
            }
        }
    }
}

/// What happened to one movie during a run
#[derive(Debug)]
pub enum RecordOutcome {
    /// Files rewritten (or that would be, in a dry run)
    Updated { files: Vec<PathBuf>, value: DateValue },
    /// Both files already carry the derived timestamp
    Unchanged,
    /// No usable date; nothing was backed up or written
    Skipped { reason: Error },
    /// At least one file could not be read, backed up or written. `updated`
    /// lists the files that were still written.
    Failed {
        updated: Vec<PathBuf>,
        errors: Vec<(PathBuf, Error)>,
    },
}

/// A file whose new content differs from what is on disk
struct PendingWrite {
    path: PathBuf,
    content: String,
}

impl Processor {
    pub fn new(settings: Settings, dry_run: bool) -> Self {
        let store = BackupStore::new(&settings.root, &settings.backup_dir_name);
        Processor {
            settings,
            store,
            run_id: RunId::now(),
            dry_run,
            stats: ProcessingStats::default(),
        }
    }

    /// Discover every movie under the root and update it. Per-record failures
    /// are counted, never propagated.
    pub fn run(&mut self) -> &ProcessingStats {
        println!("Updating date added...");
        println!("Library: {}", self.settings.root.display());
        if self.dry_run {
            println!("Dry run: no backups are made and no files are written");
        }
        println!();

        tracing::info!(
            root = %self.settings.root.display(),
            run = %self.run_id,
            dry_run = self.dry_run,
            "run started"
        );

        let settings = self.settings.clone();
        for record in discover(&settings) {
            tracing::info!("Found {}", record.metadata_path.display());
            let outcome = self.process_record(&record);
            self.report(&record, &outcome);
            self.stats.record(&outcome);
        }

        tracing::info!(
            total = self.stats.total_records,
            updated = self.stats.updated,
            unchanged = self.stats.unchanged,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "run complete"
        );
        if !self.dry_run && self.stats.updated + self.stats.failed > 0 {
            tracing::info!(
                "Backups for this run are in {}; use 'restore' to roll back",
                self.store.dir().join(self.run_id.as_str()).display()
            );
        }

        self.print_summary();
        &self.stats
    }

    /// Extract, back up and rewrite one record
    pub fn process_record(&self, record: &MovieRecord) -> RecordOutcome {
        let metadata_path = &record.metadata_path;

        let content = match read_file(metadata_path) {
            Ok(c) => c,
            Err(e) => return failed(metadata_path, e),
        };

        let value = match extract_date(&content, self.settings.time_of_day) {
            Ok(v) => v,
            Err(e @ Error::MissingDate { .. }) => {
                tracing::warn!("Skipping {}: {}", metadata_path.display(), e);
                return RecordOutcome::Skipped { reason: e };
            }
            Err(e) => return failed(metadata_path, e),
        };
        tracing::info!(
            "Extracted {} from <{}> in {}",
            value.date,
            value.source.tag(),
            metadata_path.display()
        );

        let mut pending = Vec::new();
        let mut errors = Vec::new();

        match rewrite_metadata(&content, &value, &self.settings.rating_map) {
            Ok(new_content) => {
                if new_content != content {
                    pending.push(PendingWrite {
                        path: metadata_path.clone(),
                        content: new_content,
                    });
                }
            }
            Err(e) => return failed(metadata_path, e),
        }

        match &record.descriptor_path {
            Some(descriptor_path) => match self.plan_descriptor(descriptor_path, &value) {
                Ok(Some(write)) => pending.push(write),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("{}: {}", descriptor_path.display(), e);
                    errors.push((descriptor_path.clone(), e));
                }
            },
            None => tracing::info!(
                "No {} in {}, updating metadata only",
                self.settings.descriptor_name,
                record.dir.display()
            ),
        }

        if pending.is_empty() && errors.is_empty() {
            tracing::info!("Already up to date: {}", metadata_path.display());
            return RecordOutcome::Unchanged;
        }

        let mut updated = Vec::new();
        for write in pending {
            if self.dry_run {
                tracing::info!("Would set {} in {}", value, write.path.display());
                updated.push(write.path);
                continue;
            }
            match self.backup_and_write(&write, &value) {
                Ok(()) => updated.push(write.path),
                Err(e) => {
                    tracing::error!("{}: {}", write.path.display(), e);
                    errors.push((write.path, e));
                }
            }
        }

        if errors.is_empty() {
            RecordOutcome::Updated {
                files: updated,
                value,
            }
        } else {
            RecordOutcome::Failed { updated, errors }
        }
    }

    fn plan_descriptor(&self, path: &Path, value: &DateValue) -> Result<Option<PendingWrite>> {
        let content = read_file(path)?;
        let new_content = rewrite_descriptor(&content, value)?;
        if new_content == content {
            return Ok(None);
        }
        Ok(Some(PendingWrite {
            path: path.to_path_buf(),
            content: new_content,
        }))
    }

    /// The backup must land before the original is touched
    fn backup_and_write(&self, write: &PendingWrite, value: &DateValue) -> Result<()> {
        if let Some(backup) = self.store.backup_file(&write.path, &self.run_id)? {
            tracing::info!(
                "Backup created for {}: {}",
                write.path.display(),
                backup.display()
            );
        }
        fs::write(&write.path, &write.content).map_err(|e| Error::io(&write.path, e))?;
        tracing::info!("Set {} in {}", value, write.path.display());
        Ok(())
    }

    fn report(&self, record: &MovieRecord, outcome: &RecordOutcome) {
        let path = record.metadata_path.display();
        match outcome {
            RecordOutcome::Updated { files, value } => {
                let verb = if self.dry_run { "Would update" } else { "Updated" };
                println!("✓ {} ({} file(s), {}): {}", verb, files.len(), value, path);
            }
            RecordOutcome::Unchanged => println!("= Up to date: {}", path),
            RecordOutcome::Skipped { reason } => println!("- Skipped ({}): {}", reason, path),
            RecordOutcome::Failed { errors, .. } => {
                for (file, error) in errors {
                    eprintln!("✗ Failed {}: {}", file.display(), error);
                }
            }
        }
    }

    fn print_summary(&self) {
        let stats = &self.stats;

        println!();
        println!("=== PROCESSING COMPLETE ===");
        println!("Movies scanned: {}", stats.total_records);
        println!("Updated: {}", stats.updated);
        println!("Already up to date: {}", stats.unchanged);
        println!("Skipped (no release date): {}", stats.skipped);
        println!("Failed: {}", stats.failed);

        if !stats.failures.is_empty() {
            println!();
            println!("=== FAILURES ===");
            for (path, error) in &stats.failures {
                println!("{}: {}", path.display(), error);
            }
        }

        println!();
        println!("Log: {}", self.settings.log_path().display());
        if !self.dry_run && stats.updated + stats.failed > 0 {
            println!(
                "Backups: {} (run 'restore' to undo this run)",
                self.store.dir().join(self.run_id.as_str()).display()
            );
        }
    }

    /// Put back every file from the most recent backup set
    pub fn restore(&self) -> Result<RestoreReport> {
        let report = self.store.restore()?;

        let Some(set) = report.set.clone() else {
            tracing::warn!("No backups found in {}", self.store.dir().display());
            println!("No backups found in {}", self.store.dir().display());
            return Ok(report);
        };

        tracing::info!(set = %set.id, "restoring backup set");
        for path in &report.restored {
            tracing::info!("Restored from backup: {}", path.display());
            println!("✓ Restored: {}", path.display());
        }
        for (path, error) in &report.failed {
            tracing::error!("Failed to restore {}: {}", path.display(), error);
            eprintln!("✗ Failed to restore {}: {}", path.display(), error);
        }

        tracing::warn!("Files have been restored from backup set {}", set.id);
        tracing::warn!(
            "Review the restored files, then remove {} when satisfied",
            set.path.display()
        );

        println!();
        println!("=== RESTORE COMPLETE ===");
        println!("Backup set: {}", set.id);
        println!("Restored: {}", report.restored.len());
        println!("Failed: {}", report.failed.len());
        println!("Backups were kept in {}", set.path.display());

        Ok(report)
    }

    /// Print every backup set with its file count
    pub fn list_backups(&self) -> Result<()> {
        let sets = self.store.sets()?;
        if sets.is_empty() {
            println!("No backups found in {}", self.store.dir().display());
            return Ok(());
        }
        for set in sets {
            let (files, unreadable): (Vec<_>, Vec<_>) =
                set.files().into_iter().partition(|f| f.is_ok());
            if unreadable.is_empty() {
                println!("{}  {} file(s)", set.id, files.len());
            } else {
                println!(
                    "{}  {} file(s), {} unreadable",
                    set.id,
                    files.len(),
                    unreadable.len()
                );
            }
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn failed(path: &Path, error: Error) -> RecordOutcome {
    tracing::error!("{}: {}", path.display(), error);
    RecordOutcome::Failed {
        updated: Vec::new(),
        errors: vec![(path.to_path_buf(), error)],
    }
}
