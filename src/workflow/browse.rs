use log::{debug, info, warn};

use super::{Transition, Workspace};
use crate::error::{Error, Result, ValidationIssue};
use crate::imaging::pipeline;
use crate::state::data::ImageEntry;
use crate::state::edit::EditSettings;
use crate::state::library::Library;
use crate::state::tags;

/// Columns in the browse grid
pub const GRID_COLUMNS: usize = 3;

/// Entries laid out row-major, `GRID_COLUMNS` per row (last row may be short)
pub type Grid = Vec<Vec<ImageEntry>>;

/// Read every entry fresh from the store and lay them out as a grid
pub fn listing(library: &Library) -> Result<Grid> {
    Ok(arrange(library.get_all()?, GRID_COLUMNS))
}

pub fn arrange(entries: Vec<ImageEntry>, columns: usize) -> Grid {
    let columns = columns.max(1);
    let mut rows: Grid = Vec::with_capacity(entries.len().div_ceil(columns));
    for entry in entries {
        match rows.last_mut() {
            Some(row) if row.len() < columns => row.push(entry),
            _ => rows.push(vec![entry]),
        }
    }
    rows
}

/// In-progress values of an edit session (nothing is saved until Submit)
#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub settings: EditSettings,
}

impl EditDraft {
    pub fn from_entry(entry: &ImageEntry) -> Self {
        Self {
            title: entry.title.clone(),
            description: entry.description.clone(),
            tags: entry.tags.clone(),
            settings: EditSettings::default(),
        }
    }
}

/// One open edit session
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    /// Entry as it was when the session was opened
    pub entry: ImageEntry,
    pub draft: EditDraft,
}

/// Where the browse page is
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BrowseMode {
    #[default]
    Listing,
    Editing(EditSession),
}

impl BrowseMode {
    pub fn name(&self) -> &'static str {
        match self {
            BrowseMode::Listing => "listing",
            BrowseMode::Editing(_) => "editing",
        }
    }

    pub fn session(&self) -> Option<&EditSession> {
        match self {
            BrowseMode::Editing(session) => Some(session),
            BrowseMode::Listing => None,
        }
    }
}

pub enum BrowseCommand {
    /// Open the edit session for an entry, discarding any other open session
    Open(i64),
    /// Replace the draft with new form values
    Revise(EditDraft),
    /// Ask the description service for a new description (draft only)
    GenerateDescription,
    /// Apply edits to the working file and save metadata
    Submit,
    /// Delete the record (the file stays on disk)
    Delete,
    /// Put the original snapshot back over the working file
    Restore,
    /// Leave the session without saving
    Close,
}

impl BrowseCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BrowseCommand::Open(_) => "open an entry",
            BrowseCommand::Revise(_) => "revise the draft",
            BrowseCommand::GenerateDescription => "generate a description",
            BrowseCommand::Submit => "submit changes",
            BrowseCommand::Delete => "delete an entry",
            BrowseCommand::Restore => "restore the original",
            BrowseCommand::Close => "close the session",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseEvent {
    Opened(i64),
    Revised,
    DescriptionGenerated(String),
    Submitted(ImageEntry),
    Deleted(i64),
    /// `restored` is false when the entry had no snapshot
    Restored { id: i64, restored: bool },
    Closed,
}

/// Advance the browse state machine by one command
pub fn handle(
    mode: BrowseMode,
    command: BrowseCommand,
    workspace: &Workspace,
) -> Transition<BrowseMode, BrowseEvent> {
    match (mode, command) {
        (mode, BrowseCommand::Open(id)) => open(mode, id, workspace),
        (BrowseMode::Editing(mut session), BrowseCommand::Revise(draft)) => {
            session.draft = draft;
            Transition::ok(BrowseMode::Editing(session), BrowseEvent::Revised)
        }
        (BrowseMode::Editing(session), BrowseCommand::GenerateDescription) => {
            generate_description(session, workspace)
        }
        (BrowseMode::Editing(session), BrowseCommand::Submit) => submit(session, workspace),
        (BrowseMode::Editing(session), BrowseCommand::Delete) => delete(session, workspace),
        (BrowseMode::Editing(session), BrowseCommand::Restore) => restore(session),
        (BrowseMode::Editing(session), BrowseCommand::Close) => {
            debug!("Closed session for #{} without saving", session.entry.id);
            Transition::ok(BrowseMode::Listing, BrowseEvent::Closed)
        }
        (mode, command) => {
            let error = Error::UnexpectedCommand {
                state: mode.name(),
                command: command.name(),
            };
            Transition::failed(mode, error)
        }
    }
}

fn open(mode: BrowseMode, id: i64, workspace: &Workspace) -> Transition<BrowseMode, BrowseEvent> {
    match workspace.library.get_by_id(id) {
        Ok(entry) => {
            if let Some(previous) = mode.session() {
                if previous.entry.id != id {
                    debug!("Discarding unsaved edits for #{}", previous.entry.id);
                }
            }
            let draft = EditDraft::from_entry(&entry);
            Transition::ok(
                BrowseMode::Editing(EditSession { entry, draft }),
                BrowseEvent::Opened(id),
            )
        }
        Err(e) => Transition::failed(mode, e),
    }
}

fn generate_description(
    mut session: EditSession,
    workspace: &Workspace,
) -> Transition<BrowseMode, BrowseEvent> {
    info!("⏳ Generating description for #{}...", session.entry.id);

    let result = workspace
        .describer
        .describe(&session.entry.filepath, workspace.credential.as_deref());

    match result {
        Ok(description) => {
            session.draft.description = description.clone();
            Transition::ok(
                BrowseMode::Editing(session),
                BrowseEvent::DescriptionGenerated(description),
            )
        }
        Err(e) => {
            warn!("Description generation failed: {}", e);
            Transition::failed(BrowseMode::Editing(session), Error::ExternalService(e))
        }
    }
}

/// Title must be present and tags encodable before anything is written
fn validate_draft(draft: &EditDraft) -> Result<(String, Vec<String>)> {
    let title = draft.title.trim().to_string();
    let tags = tags::normalize(&draft.tags);

    let mut issues = Vec::new();
    if title.is_empty() {
        issues.push(ValidationIssue::TitleRequired);
    }
    if let Err(Error::Validation(tag_issues)) = tags::encode(&tags) {
        issues.extend(tag_issues);
    }
    if let Err(Error::Validation(factor_issues)) = draft.settings.validate() {
        issues.extend(factor_issues);
    }

    if issues.is_empty() {
        Ok((title, tags))
    } else {
        Err(Error::Validation(issues))
    }
}

fn submit(mut session: EditSession, workspace: &Workspace) -> Transition<BrowseMode, BrowseEvent> {
    let id = session.entry.id;

    let (title, tags) = match validate_draft(&session.draft) {
        Ok(clean) => clean,
        Err(e) => return Transition::failed(BrowseMode::Editing(session), e),
    };

    // Re-read so a vanished entry fails before the file is touched
    let current = match workspace.library.get_by_id(id) {
        Ok(current) => current,
        Err(e) => return Transition::failed(BrowseMode::Listing, e),
    };

    // Steps already written are cleared from the draft so a retry skips them
    if let Err(e) = pipeline::apply_pending_edits(&current.filepath, &mut session.draft.settings) {
        return Transition::failed(BrowseMode::Editing(session), e);
    }

    match workspace
        .library
        .update(id, &title, &session.draft.description, &tags)
    {
        Ok(entry) => {
            info!("Changes saved successfully for #{}", id);
            Transition::ok(BrowseMode::Listing, BrowseEvent::Submitted(entry))
        }
        Err(e @ Error::NotFound { .. }) => Transition::failed(BrowseMode::Listing, e),
        Err(e) => Transition::failed(BrowseMode::Editing(session), e),
    }
}

fn delete(session: EditSession, workspace: &Workspace) -> Transition<BrowseMode, BrowseEvent> {
    let id = session.entry.id;
    match workspace.library.delete(id) {
        Ok(()) => Transition::ok(BrowseMode::Listing, BrowseEvent::Deleted(id)),
        Err(e @ Error::NotFound { .. }) => Transition::failed(BrowseMode::Listing, e),
        Err(e) => Transition::failed(BrowseMode::Editing(session), e),
    }
}

fn restore(session: EditSession) -> Transition<BrowseMode, BrowseEvent> {
    let id = session.entry.id;
    match pipeline::restore_original(&session.entry.filepath) {
        Ok(restored) => Transition::ok(BrowseMode::Listing, BrowseEvent::Restored { id, restored }),
        Err(e) => Transition::failed(BrowseMode::Editing(session), e),
    }
}
