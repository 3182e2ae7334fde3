use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use photo_labeler::capture::FileFrameSource;
use photo_labeler::cleanup;
use photo_labeler::config::{default_config_path, Config};
use photo_labeler::describe::OpenAiDescriber;
use photo_labeler::error::{Error, Result, ValidationIssue};
use photo_labeler::state::data::ImageEntry;
use photo_labeler::state::edit::{EditSettings, FilterKind};
use photo_labeler::state::library::Library;
use photo_labeler::workflow::browse::{self, BrowseCommand, BrowseEvent, BrowseMode};
use photo_labeler::workflow::capture::{self, CaptureCommand, CaptureEvent, CaptureState, LabelForm};
use photo_labeler::workflow::Workspace;

/// Capture photos, label them, and apply non-destructive edits
#[derive(Debug, Parser)]
#[command(name = "photo-labeler", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key for description generation (overrides the stored one)
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Library(LibraryCommand),
    /// Show or change stored settings
    Settings {
        /// Store an API key in the config file
        #[arg(long)]
        set_api_key: Option<String>,
        /// Remove the stored API key
        #[arg(long, conflicts_with = "set_api_key")]
        clear_api_key: bool,
    },
}

/// Commands that work on the image library
#[derive(Debug, Subcommand)]
enum LibraryCommand {
    /// Save a camera frame and label it
    Capture {
        /// Encoded frame to store (`-` reads stdin)
        #[arg(long)]
        frame: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Repeat for several tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show all entries as a three column grid
    List,
    /// Show one entry
    Show { id: i64 },
    /// Edit metadata and apply filters to an entry's image
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replace the tag list (repeat for several tags)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        /// none, greyscale, sepia, sketch or invert
        #[arg(long, default_value_t = FilterKind::None)]
        filter: FilterKind,
        /// 0.5 to 1.5
        #[arg(long, default_value_t = 1.0)]
        brightness: f32,
        /// 0.5 to 1.5
        #[arg(long, default_value_t = 1.0)]
        contrast: f32,
        /// Replace the description with a generated one
        #[arg(long, conflicts_with = "description")]
        generate_description: bool,
    },
    /// Print a generated description without saving it
    Describe { id: i64 },
    /// Put the originally captured image back
    Restore { id: i64 },
    /// Delete an entry (its image file stays until `cleanup`)
    Delete { id: i64 },
    /// Delete image files no entry refers to
    Cleanup {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = match cli.verbose {
        0 => config.logging.level_filter(),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();

    debug!("Using config {}", config_path.display());

    match run(cli, config, config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, mut config: Config, config_path: PathBuf) -> Result<()> {
    match cli.command {
        Command::Settings {
            set_api_key,
            clear_api_key,
        } => settings(&mut config, &config_path, set_api_key.as_deref(), clear_api_key),
        Command::Library(command) => {
            let workspace = open_workspace(&config, cli.api_key.as_deref())?;
            dispatch(&workspace, command)
        }
    }
}

fn open_workspace(config: &Config, api_key: Option<&str>) -> Result<Workspace> {
    let library = Library::open(&config.storage.database_path)?;
    let image_count = library.entry_count()?;
    debug!("🎨 Library ready with {} images", image_count);

    Ok(Workspace {
        library,
        image_dir: config.storage.image_dir.clone(),
        describer: Box::new(OpenAiDescriber::new(&config.describe)),
        credential: config.api_key(api_key),
    })
}

fn dispatch(workspace: &Workspace, command: LibraryCommand) -> Result<()> {
    match command {
        LibraryCommand::Capture {
            frame,
            title,
            description,
            tags,
        } => {
            let form = LabelForm::new(title.unwrap_or_default(), description.unwrap_or_default(), tags);
            capture_and_label(workspace, frame, form)
        }
        LibraryCommand::List => list(&workspace.library),
        LibraryCommand::Show { id } => {
            print_entry(&workspace.library.get_by_id(id)?);
            Ok(())
        }
        LibraryCommand::Edit {
            id,
            title,
            description,
            tags,
            clear_tags,
            filter,
            brightness,
            contrast,
            generate_description,
        } => {
            let edits = EditRequest {
                title,
                description,
                tags: if clear_tags { Some(Vec::new()) } else if tags.is_empty() { None } else { Some(tags) },
                settings: EditSettings {
                    filter,
                    brightness,
                    contrast,
                },
                generate_description,
            };
            edit(workspace, id, edits)
        }
        LibraryCommand::Describe { id } => describe(workspace, id),
        LibraryCommand::Restore { id } => {
            match run_session(workspace, id, BrowseCommand::Restore)? {
                BrowseEvent::Restored { restored: true, .. } => println!("↩️  Restored original image for #{}", id),
                _ => println!("No original snapshot for #{}, nothing to restore", id),
            }
            Ok(())
        }
        LibraryCommand::Delete { id } => {
            run_session(workspace, id, BrowseCommand::Delete)?;
            println!("🗑️  Deleted entry #{} (image file kept until cleanup)", id);
            Ok(())
        }
        LibraryCommand::Cleanup { dry_run } => {
            let report = cleanup::reconcile(&workspace.library, &workspace.image_dir, dry_run)?;
            for path in &report.orphaned {
                let verb = if dry_run { "Would delete" } else { "Deleted" };
                println!("{}: {}", verb, path.display());
            }
            for id in &report.dangling_entries {
                println!("⚠️  Entry #{} points at a missing file", id);
            }
            println!(
                "Scanned {} files, kept {}, {} orphaned.",
                report.scanned,
                report.kept,
                report.orphaned.len()
            );
            Ok(())
        }
    }
}

fn settings(config: &mut Config, path: &Path, set_api_key: Option<&str>, clear: bool) -> Result<()> {
    if let Some(key) = set_api_key {
        config.describe.api_key = Some(key.trim().to_string());
        config.save(path)?;
    } else if clear {
        config.describe.api_key = None;
        config.save(path)?;
    }

    println!("Config file:   {}", path.display());
    println!("Image folder:  {}", config.storage.image_dir.display());
    println!("Database:      {}", config.storage.database_path.display());
    println!("Model:         {}", config.describe.model);
    println!(
        "API key:       {}",
        if config.describe.api_key.is_some() { "set" } else { "not set" }
    );
    Ok(())
}

/// Capturing -> Labeling -> Capturing, re-prompting on stdin for missing fields
fn capture_and_label(workspace: &Workspace, frame: PathBuf, mut form: LabelForm) -> Result<()> {
    let mut source = FileFrameSource::new(frame);
    let transition = capture::grab(CaptureState::Capturing, &mut source, workspace);
    let mut state = transition.state;
    if let CaptureEvent::FrameSaved { image_path } = transition.outcome? {
        println!("📸 Saved frame to {}", image_path.display());
    }

    loop {
        let transition = capture::handle(state, CaptureCommand::Label(form.clone()), workspace);
        state = transition.state;

        match transition.outcome {
            Ok(CaptureEvent::EntryCreated(entry)) => {
                println!("✅ Image metadata for '{}' added successfully.", entry.title);
                print_entry(&entry);
                return Ok(());
            }
            Ok(CaptureEvent::FrameSaved { .. }) => return Ok(()),
            Err(Error::Validation(issues)) => {
                let answerable = issues.iter().all(|issue| {
                    matches!(
                        issue,
                        ValidationIssue::TitleRequired
                            | ValidationIssue::DescriptionRequired
                            | ValidationIssue::InvalidTag(_)
                    )
                });
                if !answerable {
                    return Err(Error::Validation(issues));
                }
                for issue in &issues {
                    println!("⚠️  {}", issue);
                }
                for issue in &issues {
                    match issue {
                        ValidationIssue::TitleRequired => form.title = prompt("Title")?,
                        ValidationIssue::DescriptionRequired => form.description = prompt("Description")?,
                        ValidationIssue::InvalidTag(bad) => form.tags.retain(|tag| tag.trim() != bad.as_str()),
                        _ => {}
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(Error::invalid(match label {
            "Title" => ValidationIssue::TitleRequired,
            _ => ValidationIssue::DescriptionRequired,
        }));
    }
    Ok(line.trim().to_string())
}

fn list(library: &Library) -> Result<()> {
    let grid = browse::listing(library)?;
    if grid.is_empty() {
        println!("No images yet. Capture one with `photo-labeler capture --frame <file>`.");
        return Ok(());
    }

    for row in &grid {
        let cells: Vec<String> = row
            .iter()
            .map(|entry| format!("#{:<4} {:<24}", entry.id, truncate(&entry.title, 24)))
            .collect();
        println!("{}", cells.join(" | "));
    }
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn print_entry(entry: &ImageEntry) {
    println!("#{} {}", entry.id, entry.title);
    println!("  description: {}", entry.description);
    println!("  tags:        {}", entry.tags.join(", "));
    println!("  file:        {}", entry.filepath.display());
    println!("  created:     {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
}

struct EditRequest {
    title: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    settings: EditSettings,
    generate_description: bool,
}

/// Open -> (GenerateDescription) -> Revise -> Submit
fn edit(workspace: &Workspace, id: i64, request: EditRequest) -> Result<()> {
    let opened = browse::handle(BrowseMode::Listing, BrowseCommand::Open(id), workspace);
    opened.outcome?;
    let mut mode = opened.state;

    if request.generate_description {
        println!("⏳ Generating description...");
        let generated = browse::handle(mode, BrowseCommand::GenerateDescription, workspace);
        mode = generated.state;
        match generated.outcome {
            Ok(BrowseEvent::DescriptionGenerated(text)) => println!("📝 {}", text),
            Ok(_) => {}
            // Keep the current description and carry on with the other edits
            Err(e) => println!("⚠️  {}", e),
        }
    }

    let mut draft = match mode.session() {
        Some(session) => session.draft.clone(),
        None => return Err(Error::NotFound { id }),
    };
    if let Some(title) = request.title {
        draft.title = title;
    }
    if let Some(description) = request.description {
        draft.description = description;
    }
    if let Some(tags) = request.tags {
        draft.tags = tags;
    }
    draft.settings = request.settings;

    let revised = browse::handle(mode, BrowseCommand::Revise(draft), workspace);
    let submitted = browse::handle(revised.state, BrowseCommand::Submit, workspace);

    if let BrowseEvent::Submitted(entry) = submitted.outcome? {
        println!("✅ Changes saved successfully!");
        print_entry(&entry);
    }
    Ok(())
}

fn describe(workspace: &Workspace, id: i64) -> Result<()> {
    println!("⏳ Generating description...");
    let event = run_session(workspace, id, BrowseCommand::GenerateDescription)?;
    if let BrowseEvent::DescriptionGenerated(text) = event {
        println!("{}", text);
    }
    Ok(())
}

/// Open a session for `id`, run one command, and return its event
fn run_session(workspace: &Workspace, id: i64, command: BrowseCommand) -> Result<BrowseEvent> {
    let opened = browse::handle(BrowseMode::Listing, BrowseCommand::Open(id), workspace);
    opened.outcome?;
    browse::handle(opened.state, command, workspace).outcome
}
