/// Image editing module
///
/// This module handles:
/// - Pixel transforms for the fixed filter set and brightness/contrast (filters.rs)
/// - Reading, rewriting and restoring working files on disk (pipeline.rs)

pub mod filters;
pub mod pipeline;
