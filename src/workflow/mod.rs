/// User-facing workflows
///
/// Both workflows are explicit state machines: a handler takes the current
/// state by value plus one command, and returns the next state together with
/// the outcome of that command. Nothing is kept in ambient globals; the
/// caller stores the returned state and re-renders from it.
///
/// - capture.rs: capture a frame -> label it -> persist -> capture again
/// - browse.rs: grid listing and the per-entry edit session

use std::path::PathBuf;

use crate::describe::DescriptionService;
use crate::error::Result;
use crate::state::library::Library;

pub mod browse;
pub mod capture;

/// Everything a workflow handler needs besides its own state
pub struct Workspace {
    /// Metadata store
    pub library: Library,
    /// Directory captured frames are written to
    pub image_dir: PathBuf,
    /// Description generation collaborator
    pub describer: Box<dyn DescriptionService>,
    /// Credential passed to the describer (None = not configured)
    pub credential: Option<String>,
}

/// Result of handling one command
#[derive(Debug)]
pub struct Transition<S, E> {
    /// State to keep for the next command
    pub state: S,
    /// What the command did, or why it failed
    pub outcome: Result<E>,
}

impl<S, E> Transition<S, E> {
    pub fn ok(state: S, event: E) -> Self {
        Self {
            state,
            outcome: Ok(event),
        }
    }

    pub fn failed(state: S, error: crate::error::Error) -> Self {
        Self {
            state,
            outcome: Err(error),
        }
    }
}
