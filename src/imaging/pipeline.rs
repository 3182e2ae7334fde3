/// File-level edit pipeline
///
/// Every edit follows the same cycle on the working file:
/// 1. Read and decode the whole file
/// 2. Transform in memory
/// 3. Encode to a hidden sibling file, then rename it over the working file
///
/// A failure at any step leaves the working file at its last good write.
/// The "original" snapshot next to it is written once at capture time and
/// only ever read afterwards.

use image::{DynamicImage, ImageError, ImageFormat};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::filters;
use crate::error::{Error, Result};
use crate::state::edit::{check_factor, is_neutral, EditSettings, FilterKind, NEUTRAL_FACTOR};

/// Marker appended to the file stem of the original snapshot
pub const ORIGINAL_MARKER: &str = "-ORIGINAL";

/// Where the pristine copy of a working file lives
///
/// `img/img_20240101_120000_000001.png` -> `img/img_20240101_120000_000001-ORIGINAL.png`
pub fn original_snapshot_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, ORIGINAL_MARKER, ext.to_string_lossy()),
        None => format!("{}{}", stem, ORIGINAL_MARKER),
    };
    path.with_file_name(file_name)
}

/// Whether `path` names an original snapshot rather than a working file
pub fn is_snapshot_path(path: &Path) -> bool {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().ends_with(ORIGINAL_MARKER))
        .unwrap_or(false)
}

/// Save a freshly captured frame as the working file plus its original snapshot.
/// Returns the snapshot path.
pub fn write_capture(img: &DynamicImage, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    store("write_capture", path, img)?;

    // Byte copy of what was just written, so restore is exact
    let snapshot = original_snapshot_path(path);
    replace_with_copy("write_capture", path, &snapshot)?;

    info!("📸 Saved {} (+ original snapshot)", path.display());
    Ok(snapshot)
}

/// Apply a filter to the working file. `FilterKind::None` does nothing.
pub fn apply_filter(path: &Path, kind: FilterKind) -> Result<()> {
    if kind == FilterKind::None {
        return Ok(());
    }

    let img = load("apply_filter", path)?;
    let filtered = filters::apply(img, kind);
    store("apply_filter", path, &filtered)?;

    debug!("🎨 Applied {} filter to {}", kind, path.display());
    Ok(())
}

/// Multiplicative brightness, factor in 0.5..=1.5. 1.0 leaves the file alone.
pub fn adjust_brightness(path: &Path, factor: f32) -> Result<()> {
    check_factor("brightness", factor).map_err(Error::invalid)?;
    if is_neutral(factor) {
        return Ok(());
    }

    let img = load("adjust_brightness", path)?;
    store("adjust_brightness", path, &filters::brighten(img, factor))?;

    debug!("☀️  Brightness x{:.2} on {}", factor, path.display());
    Ok(())
}

/// Multiplicative contrast, factor in 0.5..=1.5. 1.0 leaves the file alone.
pub fn adjust_contrast(path: &Path, factor: f32) -> Result<()> {
    check_factor("contrast", factor).map_err(Error::invalid)?;
    if is_neutral(factor) {
        return Ok(());
    }

    let img = load("adjust_contrast", path)?;
    store("adjust_contrast", path, &filters::contrast(img, factor))?;

    debug!("🌓 Contrast x{:.2} on {}", factor, path.display());
    Ok(())
}

/// Filter, then brightness, then contrast; each step rewrites the working file.
pub fn apply_edits(path: &Path, settings: &EditSettings) -> Result<()> {
    settings.validate()?;

    let mut pending = *settings;
    apply_pending_edits(path, &mut pending)?;

    if !settings.is_unedited() {
        info!(
            "✅ Edits applied to {}: {}",
            path.display(),
            settings.to_json().unwrap_or_default()
        );
    }
    Ok(())
}

/// Same order as `apply_edits`, but each step is set back to neutral in
/// `pending` as soon as its write lands. After a failure `pending` holds only
/// the steps still to do, so applying it again never repeats a written step.
pub fn apply_pending_edits(path: &Path, pending: &mut EditSettings) -> Result<()> {
    apply_filter(path, pending.filter)?;
    pending.filter = FilterKind::None;

    adjust_brightness(path, pending.brightness)?;
    pending.brightness = NEUTRAL_FACTOR;

    adjust_contrast(path, pending.contrast)?;
    pending.contrast = NEUTRAL_FACTOR;

    Ok(())
}

/// Copy the original snapshot back over the working file.
/// Returns `false` (and changes nothing) when there is no snapshot.
pub fn restore_original(path: &Path) -> Result<bool> {
    let snapshot = original_snapshot_path(path);
    if !snapshot.is_file() {
        info!("No original snapshot for {}, nothing to restore", path.display());
        return Ok(false);
    }

    replace_with_copy("restore_original", &snapshot, path)?;

    info!("↩️  Restored {} from {}", path.display(), snapshot.display());
    Ok(true)
}

fn load(operation: &'static str, path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| Error::edit(operation, path, e))
}

/// Encode next to the target, then rename into place
fn store(operation: &'static str, path: &Path, img: &DynamicImage) -> Result<()> {
    let format = ImageFormat::from_path(path).map_err(|e| Error::edit(operation, path, e))?;
    let tmp = staging_path(path);

    if let Err(e) = img.save_with_format(&tmp, format) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::edit(operation, path, e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::edit(operation, path, ImageError::IoError(e))
    })
}

/// Byte-for-byte copy of `from` over `to`, staged the same way as `store`
fn replace_with_copy(operation: &'static str, from: &Path, to: &Path) -> Result<()> {
    let tmp = staging_path(to);

    if let Err(e) = fs::copy(from, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::edit(operation, to, ImageError::IoError(e)));
    }

    fs::rename(&tmp, to).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::edit(operation, to, ImageError::IoError(e))
    })
}

/// Hidden sibling used while writing, e.g. `img/.img_x.png.tmp`
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(8, 6, |x, y| {
            Rgb([(x * 30) as u8, (y * 40) as u8, ((x + y) * 12) as u8])
        }))
    }

    fn captured(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("img_20240101_120000_000001.png");
        write_capture(&frame(), &path).unwrap();
        path
    }

    #[test]
    fn test_snapshot_path_keeps_stem_and_extension() {
        let snapshot = original_snapshot_path(Path::new("img/img_1.png"));
        assert_eq!(snapshot, PathBuf::from("img/img_1-ORIGINAL.png"));
        assert!(is_snapshot_path(&snapshot));
        assert!(!is_snapshot_path(Path::new("img/img_1.png")));
    }

    #[test]
    fn test_capture_writes_working_file_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);

        let snapshot = original_snapshot_path(&path);
        assert!(path.is_file());
        assert!(snapshot.is_file());
        assert_eq!(fs::read(&path).unwrap(), fs::read(&snapshot).unwrap());
        assert_eq!(image::open(&path).unwrap(), frame());
    }

    #[test]
    fn test_invert_then_restore_matches_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);
        let before = fs::read(&path).unwrap();

        apply_filter(&path, FilterKind::Invert).unwrap();
        assert_ne!(fs::read(&path).unwrap(), before);

        assert!(restore_original(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_restore_after_edit_sequence_is_pixel_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);

        apply_filter(&path, FilterKind::Sepia).unwrap();
        adjust_brightness(&path, 1.3).unwrap();
        adjust_contrast(&path, 0.6).unwrap();
        apply_filter(&path, FilterKind::Sketch).unwrap();

        restore_original(&path).unwrap();
        assert_eq!(image::open(&path).unwrap(), frame());
    }

    #[test]
    fn test_snapshot_survives_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);
        let snapshot = original_snapshot_path(&path);
        let snapshot_bytes = fs::read(&snapshot).unwrap();

        apply_edits(
            &path,
            &EditSettings {
                filter: FilterKind::Greyscale,
                brightness: 1.4,
                contrast: 1.2,
            },
        )
        .unwrap();

        assert_eq!(fs::read(&snapshot).unwrap(), snapshot_bytes);
        assert!(image::open(&path).unwrap().as_luma8().is_some());
    }

    #[test]
    fn test_neutral_factors_leave_pixels_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);

        adjust_brightness(&path, 1.0).unwrap();
        adjust_contrast(&path, 1.0).unwrap();

        assert_eq!(image::open(&path).unwrap(), frame());
    }

    #[test]
    fn test_out_of_range_factor_is_rejected_without_touching_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);
        let before = fs::read(&path).unwrap();

        assert!(matches!(adjust_brightness(&path, 1.8), Err(Error::Validation(_))));
        assert!(matches!(adjust_contrast(&path, 0.1), Err(Error::Validation(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_restore_without_snapshot_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loose.png");
        frame().save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        assert!(!restore_original(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_undecodable_file_reports_edit_error_and_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();

        match apply_filter(&path, FilterKind::Invert) {
            Err(Error::Edit { operation, path: failed, .. }) => {
                assert_eq!(operation, "apply_filter");
                assert_eq!(failed, path);
            }
            other => panic!("expected edit error, got {other:?}"),
        }
        assert_eq!(fs::read(&path).unwrap(), b"not a png");
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_failed_step_leaves_only_remaining_steps_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);
        let mut pending = EditSettings {
            filter: FilterKind::Invert,
            brightness: 1.8,
            contrast: 1.2,
        };

        assert!(matches!(
            apply_pending_edits(&path, &mut pending),
            Err(Error::Validation(_))
        ));
        assert_eq!(pending.filter, FilterKind::None);
        assert_eq!(pending.brightness, 1.8);
        assert_eq!(pending.contrast, 1.2);

        // Retrying with a fixed factor must not invert a second time
        pending.brightness = 1.0;
        pending.contrast = 1.0;
        apply_pending_edits(&path, &mut pending).unwrap();
        assert!(pending.is_unedited());

        let inverted = filters::invert(frame());
        assert_eq!(image::open(&path).unwrap(), inverted);
    }

    #[test]
    fn test_failed_write_keeps_working_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = captured(&dir);
        let before = fs::read(&path).unwrap();

        // Nothing can be written where the staging file should go
        let staging = staging_path(&path);
        fs::create_dir(&staging).unwrap();

        match apply_filter(&path, FilterKind::Invert) {
            Err(Error::Edit { operation, path: failed, .. }) => {
                assert_eq!(operation, "apply_filter");
                assert_eq!(failed, path);
            }
            other => panic!("expected edit error, got {other:?}"),
        }
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(staging.is_dir());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 3, "unexpected files left behind: {names:?}");

        fs::remove_dir(&staging).unwrap();
        apply_filter(&path, FilterKind::Invert).unwrap();
        assert!(!staging.exists());
    }
}
