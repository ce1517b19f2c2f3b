//! Filesystem side of export confirmation
//!
//! The target application gives no signal when it finishes writing an
//! export, so completion is inferred from the file itself: it has to exist,
//! stop changing, and (if something was already at that path) actually be
//! new content.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::error::{ExportError, ExportStage, Result};
use crate::models::{Document, ExportRecord};

/// Size and modification time of a file at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub size: u64,
    pub modified: SystemTime,
}

/// Filesystem queries used to confirm an export
pub trait FileWatcher {
    fn exists(&self, path: &Path) -> bool;
    /// Lowercase hex SHA-256 of the file contents
    fn hash(&self, path: &Path) -> io::Result<String>;
    /// Time since last modification
    fn modified_age(&self, path: &Path) -> io::Result<Duration>;
    fn snapshot(&self, path: &Path) -> io::Result<FileSnapshot>;
}

/// [`FileWatcher`] over the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWatcher;

impl FileWatcher for FsWatcher {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn hash(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn modified_age(&self, path: &Path) -> io::Result<Duration> {
        let modified = fs::metadata(path)?.modified()?;
        // mtime in the future (clock skew on network shares) counts as fresh
        Ok(SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO))
    }

    fn snapshot(&self, path: &Path) -> io::Result<FileSnapshot> {
        let meta = fs::metadata(path)?;
        Ok(FileSnapshot {
            size: meta.len(),
            modified: meta.modified()?,
        })
    }
}

/// State of the export path before a save began
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBaseline {
    path: PathBuf,
    previous_hash: Option<String>,
    previous_snapshot: Option<FileSnapshot>,
}

impl ExportBaseline {
    /// Record whether `document`'s export path is already taken, and by what
    pub fn capture(watcher: &dyn FileWatcher, document: &Document) -> Result<Self> {
        let path = document.export_path();
        if !watcher.exists(&path) {
            return Ok(Self {
                path,
                previous_hash: None,
                previous_snapshot: None,
            });
        }
        let hash = watcher.hash(&path)?;
        let snapshot = watcher.snapshot(&path)?;
        tracing::debug!("Export path {:?} already exists (sha256 {})", path, hash);
        Ok(Self {
            path,
            previous_hash: Some(hash),
            previous_snapshot: Some(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    /// Size and mtime of the file that was already at the path
    pub fn previous_snapshot(&self) -> Option<FileSnapshot> {
        self.previous_snapshot
    }
}

/// Wait for `document`'s export to appear and settle, then check it against
/// the baseline. The returned record is what removes the document from its
/// queue.
///
/// When the path was already taken, the old file does not count as having
/// appeared: its size or mtime has to move away from the baseline first.
/// A rewrite with identical content is then accepted, as is a changed file
/// younger than `acceptable_file_age`.
pub fn confirm_export(
    watcher: &dyn FileWatcher,
    document: &Document,
    baseline: &ExportBaseline,
    config: &EngineConfig,
) -> Result<ExportRecord> {
    let path = document.export_path();

    wait_for_write(
        watcher,
        &path,
        baseline.previous_snapshot(),
        config.max_export_wait,
        config.poll_interval,
    )?;
    let snapshot = wait_till_stable(
        watcher,
        &path,
        config.max_stable_wait,
        config.stability_interval,
    )?;
    let hash = watcher.hash(&path)?;

    if let Some(previous) = baseline.previous_hash() {
        let age = watcher.modified_age(&path)?;
        let changed = previous != hash;
        tracing::warn!(
            "{:?} existed before the save (content changed: {}, age {:?})",
            path,
            changed,
            age
        );
        if changed && age > config.acceptable_file_age {
            return Err(ExportError::StaleExport { path, age });
        }
    }

    tracing::info!("Confirmed export of {} at {:?} ({} bytes)", document, path, snapshot.size);
    Ok(ExportRecord::new(
        document,
        snapshot.size,
        hash,
        baseline.previous_hash().is_some(),
    ))
}

/// Poll until the file exists and differs from `previous`
fn wait_for_write(
    watcher: &dyn FileWatcher,
    path: &Path,
    previous: Option<FileSnapshot>,
    timeout: Duration,
    poll: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let written = || {
        watcher.exists(path)
            && match previous {
                Some(old) => watcher.snapshot(path).map_or(false, |now| now != old),
                None => true,
            }
    };
    while !written() {
        if Instant::now() >= deadline {
            return Err(ExportError::ExportTimeout {
                path: path.to_path_buf(),
                stage: ExportStage::Appear,
                timeout,
            });
        }
        thread::sleep(poll);
    }
    tracing::debug!("Export file {:?} written", path);
    Ok(())
}

/// Two snapshots `interval` apart must agree
fn wait_till_stable(
    watcher: &dyn FileWatcher,
    path: &Path,
    timeout: Duration,
    interval: Duration,
) -> Result<FileSnapshot> {
    let deadline = Instant::now() + timeout;
    let mut previous = watcher.snapshot(path).ok();
    loop {
        thread::sleep(interval);
        let current = watcher.snapshot(path).ok();
        match (previous, current) {
            (Some(a), Some(b)) if a == b => {
                tracing::debug!("Export file {:?} is stable at {} bytes", path, b.size);
                return Ok(b);
            }
            _ => {}
        }
        if Instant::now() >= deadline {
            return Err(ExportError::ExportTimeout {
                path: path.to_path_buf(),
                stage: ExportStage::Stabilize,
                timeout,
            });
        }
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            max_export_wait: Duration::from_millis(100),
            max_stable_wait: Duration::from_millis(200),
            stability_interval: Duration::from_millis(10),
            poll_interval: Duration::from_millis(5),
            acceptable_file_age: Duration::from_secs(30),
            ..EngineConfig::default()
        }
    }

    fn age_file(path: &Path, by: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        File::create(&path).unwrap();
        assert_eq!(
            FsWatcher.hash(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_confirm_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::invoice("12000", dir.path());
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();
        assert!(baseline.previous_hash().is_none());

        File::create(doc.export_path()).unwrap().write_all(b"%PDF-1.4").unwrap();
        let record = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap();
        assert_eq!(record.bytes, 8);
        assert!(!record.replaced_existing);
        assert_eq!(record.path, doc.export_path());
    }

    #[test]
    fn test_missing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::invoice("404", dir.path());
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();
        let err = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ExportTimeout { stage: ExportStage::Appear, .. }
        ));
    }

    #[test]
    fn test_old_rewritten_file_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::report("Sales by Item", dir.path());
        fs::write(doc.export_path(), "old").unwrap();
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();

        fs::write(doc.export_path(), "new").unwrap();
        age_file(&doc.export_path(), Duration::from_secs(3600));

        let err = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap_err();
        assert!(matches!(err, ExportError::StaleExport { .. }));
    }

    #[test]
    fn test_untouched_existing_file_never_confirms() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::invoice("12000", dir.path());
        fs::write(doc.export_path(), "last month").unwrap();
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();

        let err = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ExportTimeout { stage: ExportStage::Appear, .. }
        ));
    }

    #[test]
    fn test_identical_rewrite_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::invoice("12000", dir.path());
        fs::write(doc.export_path(), "%PDF-1.4").unwrap();
        age_file(&doc.export_path(), Duration::from_secs(10));
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();

        fs::write(doc.export_path(), "%PDF-1.4").unwrap();
        let record = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap();
        assert!(record.replaced_existing);
        assert_eq!(Some(record.sha256.as_str()), baseline.previous_hash());
    }

    #[test]
    fn test_fresh_overwrite_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::report("Sales by Item", dir.path());
        fs::write(doc.export_path(), "old").unwrap();
        let baseline = ExportBaseline::capture(&FsWatcher, &doc).unwrap();

        fs::write(doc.export_path(), "newer").unwrap();
        let record = confirm_export(&FsWatcher, &doc, &baseline, &fast_config()).unwrap();
        assert!(record.replaced_existing);
        assert_ne!(Some(record.sha256.as_str()), baseline.previous_hash());
    }
}
