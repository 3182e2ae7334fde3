/// Capture webcam photos, label them, and edit them non-destructively.
///
/// The crate is organised leaves first:
/// - `state`: metadata store, tag encoding, edit settings
/// - `imaging`: pixel filters and the on-disk edit/restore pipeline
/// - `capture`, `describe`: the camera and description-service collaborators
/// - `workflow`: the capture and browse state machines
/// - `cleanup`: offline removal of files no record points at

pub mod capture;
pub mod cleanup;
pub mod color;
pub mod config;
pub mod describe;
pub mod error;
pub mod imaging;
pub mod state;
pub mod workflow;

pub use error::{Error, Result};
