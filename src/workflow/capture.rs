use log::{info, warn};
use std::path::PathBuf;

use super::{Transition, Workspace};
use crate::capture::{decode_frame, next_capture_path, FrameSource};
use crate::error::{Error, ValidationIssue};
use crate::imaging::pipeline;
use crate::state::data::ImageEntry;
use crate::state::tags;

/// Title, description and tags typed in after a capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelForm {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl LabelForm {
    pub fn new(title: impl Into<String>, description: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags,
        }
    }

    /// Trimmed copy of the form, or every problem with it.
    /// Title and description are required; tags are optional.
    pub fn validated(&self) -> Result<LabelForm, Error> {
        let title = self.title.trim();
        let description = self.description.trim();
        let tags = tags::normalize(&self.tags);

        let mut issues = Vec::new();
        if title.is_empty() {
            issues.push(ValidationIssue::TitleRequired);
        }
        if description.is_empty() {
            issues.push(ValidationIssue::DescriptionRequired);
        }
        if let Err(Error::Validation(tag_issues)) = tags::encode(&tags) {
            issues.extend(tag_issues);
        }

        if !issues.is_empty() {
            return Err(Error::Validation(issues));
        }

        Ok(LabelForm::new(title, description, tags))
    }
}

/// Where the capture page is
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CaptureState {
    /// Waiting for a frame
    #[default]
    Capturing,
    /// Frame saved, waiting for its labels
    Labeling {
        image_path: PathBuf,
        /// Last submitted input, kept so a rejected form can be re-shown
        draft: LabelForm,
    },
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Capturing => "capturing",
            CaptureState::Labeling { .. } => "labeling",
        }
    }
}

pub enum CaptureCommand {
    /// Encoded frame from the camera
    Frame(Vec<u8>),
    /// Submitted label form
    Label(LabelForm),
}

impl CaptureCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureCommand::Frame(_) => "save a frame",
            CaptureCommand::Label(_) => "submit labels",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Working file and snapshot written
    FrameSaved { image_path: PathBuf },
    /// Labels stored, back to capturing
    EntryCreated(ImageEntry),
}

/// Advance the capture state machine by one command
pub fn handle(
    state: CaptureState,
    command: CaptureCommand,
    workspace: &Workspace,
) -> Transition<CaptureState, CaptureEvent> {
    match (state, command) {
        (CaptureState::Capturing, CaptureCommand::Frame(bytes)) => save_frame(&bytes, workspace),
        (CaptureState::Labeling { image_path, .. }, CaptureCommand::Label(form)) => {
            submit_labels(image_path, form, workspace)
        }
        (state, command) => {
            let error = Error::UnexpectedCommand {
                state: state.name(),
                command: command.name(),
            };
            Transition::failed(state, error)
        }
    }
}

/// Pull one frame from `source` and feed it to the state machine
pub fn grab(
    state: CaptureState,
    source: &mut dyn FrameSource,
    workspace: &Workspace,
) -> Transition<CaptureState, CaptureEvent> {
    if !matches!(state, CaptureState::Capturing) {
        let error = Error::UnexpectedCommand {
            state: state.name(),
            command: CaptureCommand::Frame(Vec::new()).name(),
        };
        return Transition::failed(state, error);
    }

    match source.grab_frame() {
        Ok(bytes) => handle(state, CaptureCommand::Frame(bytes), workspace),
        Err(e) => Transition::failed(state, e),
    }
}

fn save_frame(bytes: &[u8], workspace: &Workspace) -> Transition<CaptureState, CaptureEvent> {
    let image_path = next_capture_path(&workspace.image_dir);

    // The store only accepts paths it can keep as text; refuse before writing
    if image_path.to_str().is_none() {
        let error = Error::invalid(ValidationIssue::FilepathNotUnicode(image_path));
        return Transition::failed(CaptureState::Capturing, error);
    }

    let saved = decode_frame(bytes, &image_path)
        .and_then(|img| pipeline::write_capture(&img, &image_path));

    match saved {
        Ok(_) => Transition::ok(
            CaptureState::Labeling {
                image_path: image_path.clone(),
                draft: LabelForm::default(),
            },
            CaptureEvent::FrameSaved { image_path },
        ),
        Err(e) => {
            warn!("Frame not saved: {}", e);
            Transition::failed(CaptureState::Capturing, e)
        }
    }
}

fn submit_labels(
    image_path: PathBuf,
    form: LabelForm,
    workspace: &Workspace,
) -> Transition<CaptureState, CaptureEvent> {
    let clean = match form.validated() {
        Ok(clean) => clean,
        // Stay on the form with what the user typed
        Err(e) => return Transition::failed(CaptureState::Labeling { image_path, draft: form }, e),
    };

    match workspace
        .library
        .create(&clean.title, &clean.description, &image_path, &clean.tags)
    {
        Ok(entry) => {
            info!("Image metadata for '{}' added successfully.", entry.title);
            Transition::ok(CaptureState::Capturing, CaptureEvent::EntryCreated(entry))
        }
        Err(e) => Transition::failed(CaptureState::Labeling { image_path, draft: form }, e),
    }
}
