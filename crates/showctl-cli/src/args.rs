//! CLI argument parsing with clap derive macros.

use clap::{Args, Parser, Subcommand};

use showctl_core::layers::{DocumentSelector, LayerSelector};
use showctl_core::shots::ShotSelector;

/// Control plane for the studio production-automation application.
///
/// A background daemon owns the one serialized automation session against
/// the studio (document → layer → shot); every other command talks to it.
#[derive(Debug, Parser)]
#[command(name = "showctl", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the daemon that owns the studio automation session
    #[command(after_help = "\
Examples:
  showctl daemon                        # Attach to (or launch) the studio app
  showctl daemon --fake                 # Run against the in-memory fake studio
  showctl daemon --poll-ms 250          # Faster snapshot cache refresh
  SHOWCTL_APP=Wirecast showctl daemon   # Explicit automation target")]
    Daemon(DaemonArgs),

    /// Read the recording/broadcast/preview/program state
    #[command(after_help = "\
Examples:
  showctl get                           # Cached state (at most one poll interval old)
  showctl get --fresh                   # Live read through the automation session")]
    Get(GetArgs),

    /// Apply a partial desired state (JSON object)
    #[command(after_help = "\
Examples:
  showctl set '{\"isRecording\": true}'
  showctl set '{\"isRecording\": true, \"isBroadcasting\": false}'

Absent fields are left untouched; mistyped fields are skipped individually.
The reply is the freshly rebuilt state, not an echo of the request.")]
    Set(SetArgs),

    /// Switch the document cursor by index or name
    Document(DocumentArgs),

    /// Switch the layer cursor (text, overlay, normal, underlay, audio)
    Layer(LayerArgs),

    /// List the shots of the current layer
    Shots,

    /// Rename a shot by id or current name
    Rename(RenameArgs),

    /// Add a media file as a shot on the current layer
    AddShot(AddShotArgs),

    /// Remove a shot by id or name (no-op for unknown names)
    RemoveShot(RemoveShotArgs),

    /// Take the current layer's active shot live
    Go,

    /// Get or set the document's transition speed
    #[command(after_help = "\
Examples:
  showctl speed                         # Read the current speed
  showctl speed fastest                 # One of: slowest, slow, normal, faster, fastest")]
    Speed(SpeedArgs),

    /// Stop the daemon
    Stop,

    /// Show usage examples
    Examples,
}

#[derive(Debug, Args)]
pub struct DaemonArgs {
    /// Run against the in-memory fake studio instead of the real application
    #[arg(long)]
    pub fake: bool,

    /// Poll interval for the cached state snapshot, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_ms: u64,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Bypass the poll cache and read live state
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Desired state as a JSON object
    pub state: String,
}

#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// Document index (1-based) or name
    pub document: String,
}

#[derive(Debug, Args)]
pub struct LayerArgs {
    /// Layer index (1-5) or name (case-insensitive)
    pub layer: String,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Shot id or current name
    pub shot: String,
    /// New name
    pub name: String,
}

#[derive(Debug, Args)]
pub struct AddShotArgs {
    /// Path of the media asset
    pub media: String,
}

#[derive(Debug, Args)]
pub struct RemoveShotArgs {
    /// Shot id or name
    pub shot: String,
}

#[derive(Debug, Args)]
pub struct SpeedArgs {
    /// Transition speed to set; omit to read the current one
    pub speed: Option<String>,
}

/// Parse an index-or-name argument into a document selector.
pub fn parse_document_selector(raw: &str) -> DocumentSelector {
    match raw.parse::<i32>() {
        Ok(index) => DocumentSelector::Index(index),
        Err(_) => DocumentSelector::Name(raw.to_string()),
    }
}

/// Parse an index-or-name argument into a layer selector.
pub fn parse_layer_selector(raw: &str) -> LayerSelector {
    match raw.parse::<i32>() {
        Ok(index) => LayerSelector::Index(index),
        Err(_) => LayerSelector::Name(raw.to_string()),
    }
}

/// Parse an id-or-name argument into a shot selector.
pub fn parse_shot_selector(raw: &str) -> ShotSelector {
    match raw.parse::<i32>() {
        Ok(id) => ShotSelector::Id(id),
        Err(_) => ShotSelector::Name(raw.to_string()),
    }
}

pub const EXAMPLES_TEXT: &str = "\
showctl usage examples

Start the daemon (attaches to the studio app, or launches it):
  showctl daemon
  showctl daemon --fake            # in-memory fake studio, no real app needed

Read state (cached, or live with --fresh):
  showctl get
  showctl get --fresh

Apply desired state (partial, lenient):
  showctl set '{\"isRecording\": true}'
  showctl set '{\"isRecording\": true, \"isBroadcasting\": false}'

Move the cursor:
  showctl document 1               # by index
  showctl document \"Sunday Show\"   # by name
  showctl layer normal             # by name
  showctl layer 3                  # same layer by index

Work with shots on the current layer:
  showctl shots
  showctl rename 7 \"Wide Angle\"
  showctl rename \"Camera 1\" \"Camera A\"
  showctl add-shot /media/intro.mov
  showctl remove-shot 7
  showctl go

Transition speed:
  showctl speed
  showctl speed fastest

Stop the daemon:
  showctl stop
";
