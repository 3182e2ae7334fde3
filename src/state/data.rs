/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the database layer and the workflows.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Represents a single labelled photo in the library
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    /// Unique database ID, assigned on insert and never reused
    pub id: i64,
    /// User-facing title (never empty)
    pub title: String,
    /// Free text description, possibly generated
    pub description: String,
    /// Ordered tag list (duplicates allowed)
    pub tags: Vec<String>,
    /// Path to the working image file
    pub filepath: PathBuf,
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
}

impl ImageEntry {
    pub fn path(&self) -> &Path {
        &self.filepath
    }

    /// Whether the working file is still on disk
    pub fn file_exists(&self) -> bool {
        self.filepath.is_file()
    }
}
