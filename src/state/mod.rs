/// State management module
///
/// This module handles all persistent application state:
/// - Database connection and queries (library.rs)
/// - Shared data structures (data.rs)
/// - Tag list encoding for the tags column (tags.rs)
/// - Edit settings for non-destructive editing (edit.rs)

pub mod library;
pub mod data;
pub mod edit;
pub mod tags;
