/// Error types shared by the store, the edit pipeline and the workflows
///
/// Each variant is scoped to the action that raised it: workflows hand the
/// error back alongside their (unchanged or rolled-forward) state instead of
/// aborting the whole session.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::describe::DescribeError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// A single reason why user input was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// Title is empty after trimming
    TitleRequired,
    /// Description is empty after trimming
    DescriptionRequired,
    /// The entry has no backing file path
    FilepathRequired,
    /// The file path cannot be stored as text without changing it
    FilepathNotUnicode(PathBuf),
    /// A tag is empty or contains the tag delimiter
    InvalidTag(String),
    /// Brightness/contrast factor outside the accepted range
    FactorOutOfRange { name: &'static str, value: f32 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::TitleRequired => write!(f, "Title is required."),
            ValidationIssue::DescriptionRequired => write!(f, "Description is required."),
            ValidationIssue::FilepathRequired => write!(f, "File path is required."),
            ValidationIssue::FilepathNotUnicode(path) => {
                write!(f, "File path {} is not valid UTF-8.", path.display())
            }
            ValidationIssue::InvalidTag(tag) => {
                write!(f, "Tag {:?} is empty or contains a comma.", tag)
            }
            ValidationIssue::FactorOutOfRange { name, value } => {
                write!(f, "{} factor {} is outside 0.5..=1.5.", name, value)
            }
        }
    }
}

/// Every failure the core can report
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed user input (one issue per field)
    #[error("invalid input: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// No record with this id
    #[error("no image entry with id {id}")]
    NotFound { id: i64 },

    /// The metadata store could not be read or written
    #[error("metadata store failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Decode, transform or write of an image file failed
    #[error("{operation} failed for {}: {source}", path.display())]
    Edit {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The description service was unreachable or answered nonsense
    #[error("description service: {0}")]
    ExternalService(#[from] DescribeError),

    /// A workflow received a command its current state does not accept
    #[error("cannot {command} while {state}")]
    UnexpectedCommand {
        state: &'static str,
        command: &'static str,
    },

    /// Configuration file could not be parsed or written
    #[error("configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a single-issue validation error
    pub fn invalid(issue: ValidationIssue) -> Self {
        Error::Validation(vec![issue])
    }

    /// Wrap an image failure with the operation and file it happened on
    pub fn edit(operation: &'static str, path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Error::Edit {
            operation,
            path: path.into(),
            source,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_issue() {
        let err = Error::Validation(vec![
            ValidationIssue::TitleRequired,
            ValidationIssue::DescriptionRequired,
        ]);
        assert_eq!(
            err.to_string(),
            "invalid input: Title is required. Description is required."
        );
    }

    #[test]
    fn test_edit_error_names_operation_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::edit("apply_filter", "/tmp/img.png", image::ImageError::IoError(io));
        let message = err.to_string();
        assert!(message.starts_with("apply_filter failed for /tmp/img.png"));
    }
}
