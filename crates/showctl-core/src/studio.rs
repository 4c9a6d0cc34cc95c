//! The automation session: acquisition, the document/layer cursor, and
//! document-level operations.
//!
//! A session owns the dispatcher and the root handle for the process
//! lifetime. Every shot-level call elsewhere in the crate is implicitly
//! relative to the cursor held here.

use tracing::{debug, info};

use crate::bridge::{Bridge, Dispatcher};
use crate::error::{AcquireError, DispatchError};
use crate::layers::{DocumentSelector, Layer, LayerSelector, TransitionSpeed};
use crate::state::StateSnapshot;
use crate::value::{ObjectHandle, Role, Value};

/// A live automation session against the external studio application.
pub struct StudioSession {
    pub(crate) dispatcher: Dispatcher,
    app: ObjectHandle,
    pub(crate) document: ObjectHandle,
    pub(crate) layer: ObjectHandle,
    selected_layer: Layer,
}

impl StudioSession {
    /// Acquire the external application and select the initial cursor:
    /// document index 1, layer `normal`.
    ///
    /// Attaches to a running instance first and falls back to launching a
    /// new one. Both paths failing is fatal: no other component may
    /// operate without a session.
    pub fn acquire(mut bridge: Box<dyn Bridge>) -> Result<Self, AcquireError> {
        let app = match bridge.attach() {
            Ok(handle) => {
                debug!("attached to running '{}' instance", bridge.app_name());
                handle
            }
            Err(attach) => match bridge.launch() {
                Ok(handle) => {
                    info!("launched new '{}' instance", bridge.app_name());
                    handle
                }
                Err(launch) => {
                    return Err(AcquireError::Unavailable {
                        app: bridge.app_name().to_string(),
                        attach,
                        launch,
                    });
                }
            },
        };

        let mut dispatcher = Dispatcher::new(bridge);
        let document = dispatcher
            .invoke_handle(Role::Application, &app, "DocumentByIndex", &[1.into()])?
            .ok_or(AcquireError::NoDocument)?;
        let initial = Layer::Normal;
        let layer = dispatcher
            .invoke_handle(
                Role::Document,
                &document,
                "LayerByName",
                &[initial.name().into()],
            )?
            .ok_or(AcquireError::NoLayer(initial.name()))?;

        Ok(Self {
            dispatcher,
            app,
            document,
            layer,
            selected_layer: initial,
        })
    }

    /// The layer the cursor currently points at.
    pub fn selected_layer(&self) -> Layer {
        self.selected_layer
    }

    /// Switch the document cursor.
    ///
    /// On success the previously selected layer is re-applied on the new
    /// document, so the cursor keeps its layer across documents. Returns
    /// `false`, with the old cursor intact, when the document, or its
    /// layer, cannot be resolved.
    pub fn switch_document(
        &mut self,
        selector: &DocumentSelector,
    ) -> Result<bool, DispatchError> {
        let new_document = match selector {
            DocumentSelector::Index(index) => self.dispatcher.invoke_handle(
                Role::Application,
                &self.app,
                "DocumentByIndex",
                &[(*index).into()],
            )?,
            DocumentSelector::Name(name) => self.dispatcher.invoke_handle(
                Role::Application,
                &self.app,
                "DocumentByName",
                &[name.as_str().into()],
            )?,
        };
        let Some(new_document) = new_document else {
            debug!("document {} not found, cursor unchanged", selector);
            return Ok(false);
        };

        // Resolve the remembered layer on the new document before touching
        // the cursor, so a failure leaves the old document selected.
        let Some(new_layer) = self.resolve_layer(&new_document, self.selected_layer)? else {
            debug!(
                "document {} has no '{}' layer, cursor unchanged",
                selector, self.selected_layer
            );
            return Ok(false);
        };

        self.document = new_document;
        self.layer = new_layer;
        debug!(
            "switched to document {}, layer '{}'",
            selector, self.selected_layer
        );
        Ok(true)
    }

    /// Switch the layer cursor on the current document.
    ///
    /// Anything outside the fixed five-name table returns `false` without
    /// mutating state.
    pub fn switch_layer(&mut self, selector: &LayerSelector) -> Result<bool, DispatchError> {
        let Some(layer) = selector.resolve() else {
            debug!("invalid layer selector {:?}, cursor unchanged", selector);
            return Ok(false);
        };
        let document = self.document.clone();
        let Some(handle) = self.resolve_layer(&document, layer)? else {
            return Ok(false);
        };
        self.layer = handle;
        self.selected_layer = layer;
        Ok(true)
    }

    fn resolve_layer(
        &mut self,
        document: &ObjectHandle,
        layer: Layer,
    ) -> Result<Option<ObjectHandle>, DispatchError> {
        self.dispatcher.invoke_handle(
            Role::Document,
            document,
            "LayerByName",
            &[layer.name().into()],
        )
    }

    pub fn is_recording(&mut self) -> Result<bool, DispatchError> {
        self.dispatcher
            .invoke_flag(Role::Document, &self.document, "IsArchivingToDisk", &[])
    }

    pub fn start_recording(&mut self) -> Result<(), DispatchError> {
        self.archive_to_disk("start")
    }

    pub fn stop_recording(&mut self) -> Result<(), DispatchError> {
        self.archive_to_disk("stop")
    }

    pub fn toggle_recording(&mut self) -> Result<(), DispatchError> {
        if self.is_recording()? {
            self.stop_recording()
        } else {
            self.start_recording()
        }
    }

    fn archive_to_disk(&mut self, verb: &str) -> Result<(), DispatchError> {
        self.dispatcher
            .invoke(
                Role::Document,
                &self.document,
                "ArchiveToDisk",
                &[verb.into()],
            )
            .map(|_| ())
    }

    pub fn is_broadcasting(&mut self) -> Result<bool, DispatchError> {
        self.dispatcher
            .invoke_flag(Role::Document, &self.document, "IsBroadcasting", &[])
    }

    pub fn start_broadcast(&mut self) -> Result<(), DispatchError> {
        self.broadcast("start")
    }

    pub fn stop_broadcast(&mut self) -> Result<(), DispatchError> {
        self.broadcast("stop")
    }

    pub fn toggle_broadcast(&mut self) -> Result<(), DispatchError> {
        if self.is_broadcasting()? {
            self.stop_broadcast()
        } else {
            self.start_broadcast()
        }
    }

    fn broadcast(&mut self, verb: &str) -> Result<(), DispatchError> {
        self.dispatcher
            .invoke(
                Role::Document,
                &self.document,
                "Broadcast",
                &[verb.into()],
            )
            .map(|_| ())
    }

    /// Current transition speed of the document.
    pub fn transition_speed(&mut self) -> Result<TransitionSpeed, DispatchError> {
        let raw =
            self.dispatcher
                .get_str(Role::Document, &self.document, "TransitionSpeed")?;
        TransitionSpeed::from_name(&raw).ok_or(DispatchError {
            role: Role::Document,
            member: "TransitionSpeed".to_string(),
            source: crate::error::CallError::Failed(format!(
                "unrecognized transition speed '{}'",
                raw
            )),
        })
    }

    /// Set the transition speed. `false` for names outside the fixed table.
    pub fn set_transition_speed(&mut self, raw: &str) -> Result<bool, DispatchError> {
        let Some(speed) = TransitionSpeed::from_name(raw) else {
            return Ok(false);
        };
        self.dispatcher.set(
            Role::Document,
            &self.document,
            "TransitionSpeed",
            speed.name().into(),
        )?;
        Ok(true)
    }

    pub fn auto_live(&mut self) -> Result<bool, DispatchError> {
        self.dispatcher
            .get_flag(Role::Document, &self.document, "AutoLive")
    }

    pub fn set_auto_live(&mut self, on: bool) -> Result<(), DispatchError> {
        self.dispatcher
            .set(Role::Document, &self.document, "AutoLive", on.into())
    }

    pub fn toggle_auto_live(&mut self) -> Result<(), DispatchError> {
        let on = self.auto_live()?;
        self.set_auto_live(!on)
    }

    /// Index of the active transition popup (1 or 2).
    pub fn active_transition_index(&mut self) -> Result<i32, DispatchError> {
        self.dispatcher
            .get_int(Role::Document, &self.document, "ActiveTransitionIndex")
    }

    /// Select the active transition popup. Only indices 1 and 2 exist;
    /// anything else returns `false`.
    pub fn set_active_transition_index(&mut self, index: i32) -> Result<bool, DispatchError> {
        if index != 1 && index != 2 {
            return Ok(false);
        }
        self.dispatcher.set(
            Role::Document,
            &self.document,
            "ActiveTransitionIndex",
            index.into(),
        )?;
        Ok(true)
    }

    pub fn audio_muted_to_speakers(&mut self) -> Result<bool, DispatchError> {
        self.dispatcher
            .get_flag(Role::Document, &self.document, "AudioMutedToSpeaker")
    }

    pub fn set_audio_muted_to_speakers(&mut self, muted: bool) -> Result<(), DispatchError> {
        self.dispatcher.set(
            Role::Document,
            &self.document,
            "AudioMutedToSpeaker",
            muted.into(),
        )
    }

    /// Save a still image of the current output to `path`.
    pub fn save_snapshot(&mut self, path: &str) -> Result<(), DispatchError> {
        self.dispatcher
            .invoke(
                Role::Document,
                &self.document,
                "SaveSnapshot",
                &[path.into()],
            )
            .map(|_| ())
    }

    pub fn layer_visible(&mut self) -> Result<bool, DispatchError> {
        self.dispatcher
            .get_flag(Role::Layer, &self.layer, "Visible")
    }

    pub fn toggle_layer_visibility(&mut self) -> Result<(), DispatchError> {
        let visible = self.layer_visible()?;
        self.dispatcher.set(
            Role::Layer,
            &self.layer,
            "Visible",
            (!visible).into(),
        )
    }

    /// Compose a fresh snapshot from the current cursor. Pure read, no
    /// mutation; nothing is cached here.
    pub fn snapshot(&mut self) -> Result<StateSnapshot, DispatchError> {
        Ok(StateSnapshot {
            is_recording: self.is_recording()?,
            is_broadcasting: self.is_broadcasting()?,
            preview_shot_id: self.preview_shot_id()?,
            program_shot_id: self.active_shot_id()?,
        })
    }

    pub(crate) fn layer_handle(&self) -> ObjectHandle {
        self.layer.clone()
    }

    pub(crate) fn document_handle(&self) -> ObjectHandle {
        self.document.clone()
    }

    pub(crate) fn invoke_on_layer(
        &mut self,
        member: &str,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let layer = self.layer_handle();
        self.dispatcher.invoke(Role::Layer, &layer, member, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStudio;

    fn session_with(fake: &FakeStudio) -> StudioSession {
        StudioSession::acquire(fake.boxed()).expect("acquire")
    }

    #[test]
    fn test_acquire_attaches_to_running_instance() {
        let fake = FakeStudio::new();
        fake.set_running(true);
        let session = session_with(&fake);
        assert_eq!(session.selected_layer(), Layer::Normal);
        // No launch happened
        assert_eq!(fake.call_count("Launch"), 0);
    }

    #[test]
    fn test_acquire_falls_back_to_launch() {
        let fake = FakeStudio::new();
        // Not running: attach fails, launch succeeds
        let session = session_with(&fake);
        assert_eq!(session.selected_layer(), Layer::Normal);
        assert_eq!(fake.call_count("Launch"), 1);
    }

    #[test]
    fn test_acquire_fails_when_neither_path_works() {
        let fake = FakeStudio::new();
        fake.set_launchable(false);
        let result = StudioSession::acquire(fake.boxed());
        assert!(matches!(result, Err(AcquireError::Unavailable { .. })));
    }

    #[test]
    fn test_switch_layer_updates_cursor() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert!(session
            .switch_layer(&LayerSelector::Name("Audio".into()))
            .expect("switch"));
        assert_eq!(session.selected_layer(), Layer::Audio);

        assert!(session
            .switch_layer(&LayerSelector::Index(1))
            .expect("switch"));
        assert_eq!(session.selected_layer(), Layer::Text);
    }

    #[test]
    fn test_invalid_layer_leaves_cursor_unchanged() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert!(!session
            .switch_layer(&LayerSelector::Name("backdrop".into()))
            .expect("switch"));
        assert_eq!(session.selected_layer(), Layer::Normal);

        assert!(!session
            .switch_layer(&LayerSelector::Index(0))
            .expect("switch"));
        assert_eq!(session.selected_layer(), Layer::Normal);
    }

    #[test]
    fn test_switch_document_reapplies_remembered_layer() {
        let fake = FakeStudio::new();
        fake.add_document("Second Show");
        let mut session = session_with(&fake);

        session
            .switch_layer(&LayerSelector::Name("overlay".into()))
            .expect("switch layer");
        assert!(session
            .switch_document(&DocumentSelector::Name("Second Show".into()))
            .expect("switch document"));
        // The overlay selection survives the document switch
        assert_eq!(session.selected_layer(), Layer::Overlay);
    }

    #[test]
    fn test_switch_document_unknown_leaves_cursor() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert!(!session
            .switch_document(&DocumentSelector::Name("No Such Show".into()))
            .expect("switch"));
        assert!(!session
            .switch_document(&DocumentSelector::Index(7))
            .expect("switch"));
        assert_eq!(session.selected_layer(), Layer::Normal);
    }

    #[test]
    fn test_recording_and_broadcast_commands() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert!(!session.is_recording().expect("read"));
        session.start_recording().expect("start");
        assert!(session.is_recording().expect("read"));
        session.stop_recording().expect("stop");
        assert!(!session.is_recording().expect("read"));

        session.start_broadcast().expect("start");
        assert!(session.is_broadcasting().expect("read"));

        assert_eq!(
            fake.commands(),
            vec!["ArchiveToDisk start", "ArchiveToDisk stop", "Broadcast start"]
        );
    }

    #[test]
    fn test_transition_speed_round_trip() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert_eq!(
            session.transition_speed().expect("read"),
            TransitionSpeed::Normal
        );
        assert!(session.set_transition_speed("FASTEST").expect("set"));
        assert_eq!(
            session.transition_speed().expect("read"),
            TransitionSpeed::Fastest
        );
        // Outside the closed table: rejected without touching the document
        assert!(!session.set_transition_speed("warp").expect("set"));
        assert_eq!(
            session.transition_speed().expect("read"),
            TransitionSpeed::Fastest
        );
    }

    #[test]
    fn test_active_transition_index_bounds() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        assert!(session.set_active_transition_index(2).expect("set"));
        assert_eq!(session.active_transition_index().expect("read"), 2);
        assert!(!session.set_active_transition_index(3).expect("set"));
        assert!(!session.set_active_transition_index(0).expect("set"));
        assert_eq!(session.active_transition_index().expect("read"), 2);
    }

    #[test]
    fn test_snapshot_composes_all_four_fields() {
        let fake = FakeStudio::new();
        let camera = fake.add_shot(Layer::Normal, "Camera 1");
        let title = fake.add_shot(Layer::Normal, "Title");
        fake.set_recording(true);
        fake.set_preview_shot(Layer::Normal, camera);
        fake.set_active_shot(Layer::Normal, title);

        let mut session = session_with(&fake);
        let snapshot = session.snapshot().expect("snapshot");
        assert!(snapshot.is_recording);
        assert!(!snapshot.is_broadcasting);
        assert_eq!(snapshot.preview_shot_id, camera);
        assert_eq!(snapshot.program_shot_id, title);
    }

    #[test]
    fn test_snapshot_tolerates_absent_shots() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);
        let snapshot = session.snapshot().expect("snapshot");
        assert_eq!(snapshot.preview_shot_id, crate::state::NO_SHOT);
        assert_eq!(snapshot.program_shot_id, crate::state::NO_SHOT);
    }

    #[test]
    fn test_layer_visibility_toggle() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);
        assert!(session.layer_visible().expect("read"));
        session.toggle_layer_visibility().expect("toggle");
        assert!(!session.layer_visible().expect("read"));
    }
}
