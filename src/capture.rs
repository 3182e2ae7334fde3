/// Frame acquisition
///
/// The camera itself is outside this crate. A `FrameSource` hands over one
/// encoded frame (JPEG, PNG, ...) per call; this module decodes it and picks
/// the filename the frame will be stored under.

use chrono::{DateTime, Local};
use image::DynamicImage;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix of every captured file name
pub const CAPTURE_PREFIX: &str = "img_";
/// Captured frames are stored losslessly
pub const CAPTURE_EXTENSION: &str = "png";

/// Anything that can produce an encoded camera frame on demand
pub trait FrameSource {
    fn grab_frame(&mut self) -> Result<Vec<u8>>;
}

/// Reads a frame from an image file, or from stdin when the path is `-`
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for FileFrameSource {
    fn grab_frame(&mut self) -> Result<Vec<u8>> {
        if self.path == Path::new("-") {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            return Ok(bytes);
        }
        Ok(std::fs::read(&self.path)?)
    }
}

/// Decode an encoded frame into pixels
///
/// `target` is only used to label the error.
pub fn decode_frame(bytes: &[u8], target: &Path) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::edit("decode_frame", target, e))
}

/// File name for a frame captured at `at`: `img_YYYYmmdd_HHMMSS_micros.png`
///
/// Sorts chronologically and is unique within one process run as long as two
/// frames are not captured within the same microsecond.
pub fn capture_file_name(at: DateTime<Local>) -> String {
    format!(
        "{}{}.{}",
        CAPTURE_PREFIX,
        at.format("%Y%m%d_%H%M%S_%6f"),
        CAPTURE_EXTENSION
    )
}

/// Next free capture path inside `image_dir`
pub fn next_capture_path(image_dir: &Path) -> PathBuf {
    let mut at = Local::now();
    let mut path = image_dir.join(capture_file_name(at));
    // Same-microsecond captures bump forward instead of overwriting
    while path.exists() {
        at += chrono::Duration::microseconds(1);
        path = image_dir.join(capture_file_name(at));
    }
    path
}
