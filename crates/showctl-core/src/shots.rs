//! Per-call shot resolution and mutation on the current layer cursor.
//!
//! Shots are never cached entities: every lookup re-resolves through the
//! dispatcher against the cursor, and no handle outlives the call that
//! produced it. The stable integer id is the only identity; id 0 means
//! "no shot".

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::state::NO_SHOT;
use crate::studio::StudioSession;
use crate::value::{ObjectHandle, Role};

/// Selects a shot by stable id or by current name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShotSelector {
    Id(i32),
    Name(String),
}

/// A shot as listed to the control plane, with its derived facets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotInfo {
    pub id: i32,
    pub name: String,
    pub live: bool,
    pub preview: bool,
    pub playlist: bool,
}

impl ShotInfo {
    /// Human-readable status summary.
    pub fn status_line(&self) -> String {
        let playlist = if self.playlist { " PLAYLIST" } else { "" };
        format!(
            "{}{}\t\t(PREVIEW: {}, LIVE: {})",
            self.name,
            playlist,
            yes_no(self.preview),
            yes_no(self.live)
        )
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

/// Exact-name search mode for `ShotIDByName`.
const NAME_SEARCH_EXACT: i32 = 2;

impl StudioSession {
    /// Number of shots in the current layer.
    pub fn shot_count(&mut self) -> Result<i32, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher
            .invoke_int(Role::Layer, &layer, "ShotCount", &[])
    }

    /// Resolve a shot id by name within the current layer.
    pub fn shot_id_by_name(&mut self, name: &str) -> Result<Option<i32>, DispatchError> {
        let layer = self.layer_handle();
        let id = self.dispatcher.invoke_int(
            Role::Layer,
            &layer,
            "ShotIDByName",
            &[name.into(), NAME_SEARCH_EXACT.into()],
        )?;
        Ok(existing(id))
    }

    /// Resolve a shot id by 0-based position within the current layer.
    pub fn shot_id_by_index(&mut self, index: i32) -> Result<Option<i32>, DispatchError> {
        let layer = self.layer_handle();
        let id = self
            .dispatcher
            .invoke_int(Role::Layer, &layer, "ShotIDByIndex", &[index.into()])?;
        Ok(existing(id))
    }

    /// Resolve the shot object for an id. The handle is only valid for the
    /// duration of the call that consumes it.
    pub fn shot_handle_by_id(
        &mut self,
        id: i32,
    ) -> Result<Option<ObjectHandle>, DispatchError> {
        let document = self.document_handle();
        self.dispatcher
            .invoke_handle(Role::Document, &document, "ShotByShotID", &[id.into()])
    }

    /// Name of the shot with the given id, if it exists.
    pub fn shot_name_by_id(&mut self, id: i32) -> Result<Option<String>, DispatchError> {
        let Some(shot) = self.shot_handle_by_id(id)? else {
            return Ok(None);
        };
        self.dispatcher
            .get_str(Role::Shot, &shot, "Name")
            .map(Some)
    }

    /// Rename a shot by id. `false` when no shot matches.
    pub fn rename_shot(&mut self, id: i32, new_name: &str) -> Result<bool, DispatchError> {
        let Some(shot) = self.shot_handle_by_id(id)? else {
            return Ok(false);
        };
        self.dispatcher
            .set(Role::Shot, &shot, "Name", new_name.into())?;
        Ok(true)
    }

    /// Rename a shot by current name. `false` when no shot matches.
    pub fn rename_shot_by_name(
        &mut self,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, DispatchError> {
        match self.shot_id_by_name(old_name)? {
            Some(id) => self.rename_shot(id, new_name),
            None => Ok(false),
        }
    }

    /// Create a shot for the media at `path` on the current layer,
    /// returning the new shot's id.
    pub fn add_shot_with_media(&mut self, path: &str) -> Result<i32, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher
            .invoke_int(Role::Layer, &layer, "AddShotWithMedia", &[path.into()])
    }

    /// Remove a shot by id from the current layer. The external model
    /// treats an unknown id as a no-op, and so does this call.
    pub fn remove_shot_by_id(&mut self, id: i32) -> Result<(), DispatchError> {
        self.invoke_on_layer("RemoveShotByID", &[id.into()])
            .map(|_| ())
    }

    /// Remove a shot by name. A no-op, not an error, when the name is
    /// unknown.
    pub fn remove_shot_by_name(&mut self, name: &str) -> Result<(), DispatchError> {
        match self.shot_id_by_name(name)? {
            Some(id) => self.remove_shot_by_id(id),
            None => Ok(()),
        }
    }

    /// Detach the media asset at `path` from the document.
    pub fn remove_media(&mut self, path: &str) -> Result<(), DispatchError> {
        let document = self.document_handle();
        self.dispatcher
            .invoke(Role::Document, &document, "RemoveMedia", &[path.into()])
            .map(|_| ())
    }

    /// Id of the active (clicked) shot of the current layer. The active
    /// shot is what `go` takes live; it is not necessarily live yet.
    pub fn active_shot_id(&mut self) -> Result<i32, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher.get_int(Role::Layer, &layer, "ActiveShotID")
    }

    /// Make a shot the active shot of the current layer. `false` when the
    /// id matches nothing.
    pub fn set_active_shot(&mut self, id: i32) -> Result<bool, DispatchError> {
        if self.shot_handle_by_id(id)?.is_none() {
            return Ok(false);
        }
        let layer = self.layer_handle();
        self.dispatcher
            .set(Role::Layer, &layer, "ActiveShotID", id.into())?;
        Ok(true)
    }

    /// Id of the shot in preview on the current layer (0 when none).
    pub fn preview_shot_id(&mut self) -> Result<i32, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher
            .invoke_int(Role::Layer, &layer, "PreviewShotID", &[])
    }

    /// Id of the live shot on the current layer (0 when none).
    pub fn live_shot_id(&mut self) -> Result<i32, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher
            .invoke_int(Role::Layer, &layer, "LiveShotID", &[])
    }

    /// Whether the shot is currently live. `false` for unknown ids.
    pub fn is_shot_live(&mut self, id: i32) -> Result<bool, DispatchError> {
        self.shot_facet(id, "Live")
    }

    /// Whether the shot is currently in preview. `false` for unknown ids.
    pub fn is_shot_in_preview(&mut self, id: i32) -> Result<bool, DispatchError> {
        self.shot_facet(id, "Preview")
    }

    /// Whether the shot is a playlist shot. `false` for unknown ids.
    pub fn is_shot_playlist(&mut self, id: i32) -> Result<bool, DispatchError> {
        self.shot_facet(id, "Playlist")
    }

    fn shot_facet(&mut self, id: i32, member: &str) -> Result<bool, DispatchError> {
        let Some(shot) = self.shot_handle_by_id(id)? else {
            return Ok(false);
        };
        self.dispatcher.invoke_flag(Role::Shot, &shot, member, &[])
    }

    /// Advance a playlist shot to its next entry. `false` for unknown ids.
    pub fn next_shot(&mut self, id: i32) -> Result<bool, DispatchError> {
        self.playlist_step(id, "NextShot")
    }

    /// Step a playlist shot back to its previous entry. `false` for
    /// unknown ids.
    pub fn previous_shot(&mut self, id: i32) -> Result<bool, DispatchError> {
        self.playlist_step(id, "PreviousShot")
    }

    fn playlist_step(&mut self, id: i32, member: &str) -> Result<bool, DispatchError> {
        let Some(shot) = self.shot_handle_by_id(id)? else {
            return Ok(false);
        };
        self.dispatcher.invoke(Role::Shot, &shot, member, &[])?;
        Ok(true)
    }

    /// Take the current layer's active shot live.
    pub fn go(&mut self) -> Result<(), DispatchError> {
        self.invoke_on_layer("Go", &[]).map(|_| ())
    }

    /// List the shots of the current layer with their derived facets.
    ///
    /// Facets are computed for this listing only; nothing is retained.
    pub fn list_shots(&mut self) -> Result<Vec<ShotInfo>, DispatchError> {
        let count = self.shot_count()?;
        let live = self.live_shot_id()?;
        let preview = self.preview_shot_id()?;

        let mut shots = Vec::new();
        for index in 0..count {
            let Some(id) = self.shot_id_by_index(index)? else {
                continue;
            };
            let name = self.shot_name_by_id(id)?.unwrap_or_default();
            let playlist = self.is_shot_playlist(id)?;
            shots.push(ShotInfo {
                id,
                name,
                live: id == live,
                preview: id == preview,
                playlist,
            });
        }
        Ok(shots)
    }
}

/// Map the external 0 sentinel to `None`.
fn existing(id: i32) -> Option<i32> {
    (id != NO_SHOT).then_some(id)
}
