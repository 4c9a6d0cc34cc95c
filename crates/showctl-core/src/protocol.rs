//! Protocol types for CLI-daemon communication.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::layers::{DocumentSelector, LayerSelector, TransitionSpeed};
use crate::shots::{ShotInfo, ShotSelector};
use crate::state::StateSnapshot;

/// A request from CLI to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub command: Command,
}

/// Commands the daemon can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Read the composed recording/broadcast/shot state.
    ///
    /// By default the poll cache is consulted first; `fresh` forces a live
    /// round-trip through the serialized worker.
    Get {
        #[serde(default)]
        fresh: bool,
    },
    /// Apply a partial desired state. Carried as raw JSON: fields are
    /// individually optional and mistyped fields are skipped, not fatal.
    Set { state: serde_json::Value },
    /// Switch the document cursor by index or name.
    SwitchDocument { document: DocumentSelector },
    /// Switch the layer cursor by index or name.
    SwitchLayer { layer: LayerSelector },
    /// List the shots of the current layer.
    Shots,
    /// Rename a shot addressed by id or current name.
    RenameShot { shot: ShotSelector, name: String },
    /// Create a shot for a media file on the current layer.
    AddShot { media: String },
    /// Remove a shot by id or name (no-op for unknown names).
    RemoveShot { shot: ShotSelector },
    /// Take the current layer's active shot live.
    Go,
    /// Read the document's transition speed.
    GetTransitionSpeed,
    /// Set the document's transition speed.
    SetTransitionSpeed { speed: String },
    /// Shutdown the daemon gracefully.
    Shutdown,
}

/// A response from daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl Response {
    pub fn success(id: impl Into<String>, data: ResponseData) -> Self {
        Self {
            id: id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ApiError) -> Self {
        Self {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Response payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// A freshly built (or cached) state snapshot.
    State(StateSnapshot),
    /// Shots of the current layer.
    Shots { shots: Vec<ShotInfo> },
    /// A shot was created.
    ShotAdded { shot_id: i32 },
    /// The document's transition speed.
    TransitionSpeed { speed: TransitionSpeed },
    /// Outcome of a command with the boolean not-applied contract.
    ///
    /// `applied: false` is a routine caller outcome (invalid selector,
    /// unknown shot), never a protocol fault.
    Applied { applied: bool, message: String },
    /// Generic success message.
    Ok { message: String },
}
