/// Offline reconciliation of the image directory against the store
///
/// Deleting an entry never removes its file, so files pile up. This pass
/// removes every file in the image directory that is neither referenced by a
/// record nor the original snapshot of a referenced file. It is meant to be
/// run on its own, never in the middle of a capture or edit session.

use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;
use crate::imaging::pipeline::original_snapshot_path;
use crate::state::library::Library;

/// What a cleanup pass found and did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    /// Files looked at in the image directory
    pub scanned: usize,
    /// Files still in use (working files and their snapshots)
    pub kept: usize,
    /// Orphaned files (deleted unless this was a dry run)
    pub orphaned: Vec<PathBuf>,
    /// Entry ids whose working file is already gone
    pub dangling_entries: Vec<i64>,
}

/// Find orphaned files in `image_dir`; delete them unless `dry_run`.
pub fn reconcile(library: &Library, image_dir: &Path, dry_run: bool) -> Result<CleanupReport> {
    let mut keep: HashSet<PathBuf> = HashSet::new();
    for filepath in library.referenced_filepaths()? {
        keep.insert(normalize(&original_snapshot_path(&filepath)));
        keep.insert(normalize(&filepath));
    }

    let mut report = CleanupReport {
        dangling_entries: library.missing_files()?.into_iter().map(|e| e.id).collect(),
        ..CleanupReport::default()
    };

    if !image_dir.is_dir() {
        warn!("Image directory {} does not exist, nothing to clean", image_dir.display());
        return Ok(report);
    }

    // Only the top level: captures are never written to subdirectories
    for entry in WalkDir::new(image_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        report.scanned += 1;

        if keep.contains(&normalize(path)) {
            report.kept += 1;
            continue;
        }

        if dry_run {
            info!("Would delete: {}", path.display());
        } else {
            info!("🧹 Deleting file: {}", path.display());
            fs::remove_file(path)?;
        }
        report.orphaned.push(path.to_path_buf());
    }

    info!(
        "✅ Cleanup {}: {} scanned, {} kept, {} orphaned",
        if dry_run { "dry run" } else { "complete" },
        report.scanned,
        report.kept,
        report.orphaned.len()
    );

    Ok(report)
}

/// Compare paths by their canonical form when the file exists
fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_removes_only_unreferenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();

        let kept = dir.path().join("img_kept.png");
        let kept_snapshot = original_snapshot_path(&kept);
        let orphan = dir.path().join("img_orphan.png");
        let orphan_snapshot = original_snapshot_path(&orphan);
        for path in [&kept, &kept_snapshot, &orphan, &orphan_snapshot] {
            touch(path);
        }
        library.create::<&str>("kept", "", &kept, &[]).unwrap();

        let report = reconcile(&library, dir.path(), false).unwrap();

        assert_eq!(report.scanned, 4);
        assert_eq!(report.kept, 2);
        assert_eq!(report.orphaned.len(), 2);
        assert!(kept.exists() && kept_snapshot.exists());
        assert!(!orphan.exists() && !orphan_snapshot.exists());
    }

    #[test]
    fn test_deleted_entry_file_becomes_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();
        let path = dir.path().join("img_1.png");
        touch(&path);
        let entry = library.create::<&str>("one", "", &path, &[]).unwrap();

        library.delete(entry.id).unwrap();
        assert!(path.exists(), "live delete must not touch the file");

        let report = reconcile(&library, dir.path(), false).unwrap();
        assert_eq!(report.orphaned, vec![path.clone()]);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_referenced_paths_match_files_exactly() {
        use crate::error::{Error, ValidationIssue};
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();

        // A directory name that has no lossless text form
        let odd_dir = dir.path().join(OsStr::from_bytes(b"ph\xFFotos"));
        fs::create_dir(&odd_dir).unwrap();
        let odd = odd_dir.join("img_1.png");
        touch(&odd);
        touch(&original_snapshot_path(&odd));

        match library.create::<&str>("odd", "", &odd, &[]) {
            Err(Error::Validation(issues)) => {
                assert_eq!(issues, vec![ValidationIssue::FilepathNotUnicode(odd.clone())]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(library.entry_count().unwrap(), 0);

        let plain = odd_dir.with_file_name("img_2.png");
        touch(&plain);
        library.create::<&str>("plain", "", &plain, &[]).unwrap();
        assert_eq!(library.referenced_filepaths().unwrap(), vec![plain.clone()]);

        let report = reconcile(&library, dir.path(), false).unwrap();
        assert_eq!(report.kept, 1);
        assert!(report.orphaned.is_empty());
        assert!(report.dangling_entries.is_empty());
        assert!(plain.exists());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();
        let orphan = dir.path().join("stray.png");
        touch(&orphan);

        let report = reconcile(&library, dir.path(), true).unwrap();
        assert_eq!(report.orphaned, vec![orphan.clone()]);
        assert!(orphan.exists());
    }

    #[test]
    fn test_reports_entries_with_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open_in_memory().unwrap();
        let entry = library
            .create::<&str>("ghost", "", &dir.path().join("ghost.png"), &[])
            .unwrap();

        let report = reconcile(&library, dir.path(), false).unwrap();
        assert_eq!(report.dangling_entries, vec![entry.id]);
        assert_eq!(report.scanned, 0);
    }
}
