//! Snapshot and desired-state values exchanged with the control plane.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Sentinel shot id meaning "no shot". Never represented as null.
pub const NO_SHOT: i32 = 0;

/// Immutable read of recording/broadcast/preview/program state at one
/// instant.
///
/// The shot ids reference shots in the layer that was selected when the
/// snapshot was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub is_recording: bool,
    pub is_broadcasting: bool,
    pub preview_shot_id: i32,
    pub program_shot_id: i32,
}

/// A partial desired state. Absent fields are left untouched when applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DesiredState {
    pub is_recording: Option<bool>,
    pub is_broadcasting: Option<bool>,
    pub preview_shot_id: Option<i32>,
    pub program_shot_id: Option<i32>,
}

impl DesiredState {
    /// Lenient parse of an arbitrary JSON payload.
    ///
    /// Presence is a first-class signal: absent fields stay `None`. A field
    /// that is present but of the wrong type is skipped individually (with
    /// a warning) so the remaining valid fields still apply. A malformed
    /// payload never aborts the whole call.
    pub fn from_json(input: &serde_json::Value) -> Self {
        let Some(map) = input.as_object() else {
            if !input.is_null() {
                warn!("desired state is not an object, ignoring: {}", input);
            }
            return Self::default();
        };

        let mut desired = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "isRecording" => desired.is_recording = expect_bool(key, value),
                "isBroadcasting" => desired.is_broadcasting = expect_bool(key, value),
                "previewShotId" => desired.preview_shot_id = expect_shot_id(key, value),
                "programShotId" => desired.program_shot_id = expect_shot_id(key, value),
                other => debug!("ignoring unknown desired-state field '{}'", other),
            }
        }
        desired
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.is_recording.is_none()
            && self.is_broadcasting.is_none()
            && self.preview_shot_id.is_none()
            && self.program_shot_id.is_none()
    }
}

fn expect_bool(key: &str, value: &serde_json::Value) -> Option<bool> {
    let flag = value.as_bool();
    if flag.is_none() {
        warn!("skipping field '{}': expected a boolean, got {}", key, value);
    }
    flag
}

fn expect_shot_id(key: &str, value: &serde_json::Value) -> Option<i32> {
    let id = value.as_i64().and_then(|wide| i32::try_from(wide).ok());
    if id.is_none() {
        warn!("skipping field '{}': expected a shot id, got {}", key, value);
    }
    id
}
