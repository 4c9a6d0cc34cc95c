//! Applying a desired state: diff against live state, issue only the
//! commands that close the gap.

use tracing::debug;

use crate::error::DispatchError;
use crate::state::{DesiredState, StateSnapshot};
use crate::studio::StudioSession;

impl StudioSession {
    /// Apply a partial desired state to the live document.
    ///
    /// For each present flag, a start/stop command is issued only when the
    /// desired value differs from the freshly-read current value, so applying
    /// the same desired state twice issues the command once. Absent fields
    /// are left untouched.
    ///
    /// `preview_shot_id` and `program_shot_id` are accepted but not
    /// applied; preview/program selection is read-only on this path. The
    /// returned snapshot is rebuilt after the commands, reflecting the true
    /// post-command state rather than the caller's assumed state.
    pub fn reconcile(&mut self, desired: &DesiredState) -> Result<StateSnapshot, DispatchError> {
        debug!("reconciling desired state: {:?}", desired);
        let current = self.snapshot()?;

        if let Some(recording) = desired.is_recording {
            if recording != current.is_recording {
                if recording {
                    self.start_recording()?;
                } else {
                    self.stop_recording()?;
                }
            }
        }

        if let Some(broadcasting) = desired.is_broadcasting {
            if broadcasting != current.is_broadcasting {
                if broadcasting {
                    self.start_broadcast()?;
                } else {
                    self.stop_broadcast()?;
                }
            }
        }

        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Layer;
    use crate::testing::FakeStudio;
    use serde_json::json;

    fn session_with(fake: &FakeStudio) -> StudioSession {
        StudioSession::acquire(fake.boxed()).expect("acquire")
    }

    fn desired(payload: serde_json::Value) -> DesiredState {
        DesiredState::from_json(&payload)
    }

    #[test]
    fn test_set_recording_twice_issues_one_command() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        let wanted = desired(json!({ "isRecording": true }));
        let first = session.reconcile(&wanted).expect("reconcile");
        assert!(first.is_recording);

        let second = session.reconcile(&wanted).expect("reconcile");
        assert!(second.is_recording);

        // Exactly one StartRecording command reached the external object
        assert_eq!(fake.commands(), vec!["ArchiveToDisk start"]);
    }

    #[test]
    fn test_full_scenario_from_all_false() {
        let fake = FakeStudio::new();
        let camera = fake.add_shot(Layer::Normal, "Camera 1");
        let title = fake.add_shot(Layer::Normal, "Title");
        assert_eq!((camera, title), (1, 2));
        fake.set_active_shot(Layer::Normal, title);

        let mut session = session_with(&fake);
        let result = session
            .reconcile(&desired(json!({
                "isRecording": true,
                "isBroadcasting": false,
                "previewShotId": 0,
                "programShotId": 2,
            })))
            .expect("reconcile");

        assert_eq!(fake.commands(), vec!["ArchiveToDisk start"]);
        assert!(result.is_recording);
        assert!(!result.is_broadcasting);
        assert_eq!(result.preview_shot_id, 0);
        assert_eq!(result.program_shot_id, 2);
    }

    #[test]
    fn test_stop_paths_are_also_idempotent() {
        let fake = FakeStudio::new();
        fake.set_recording(true);
        fake.set_broadcasting(true);
        let mut session = session_with(&fake);

        let wanted = desired(json!({ "isRecording": false, "isBroadcasting": false }));
        session.reconcile(&wanted).expect("reconcile");
        session.reconcile(&wanted).expect("reconcile");

        assert_eq!(
            fake.commands(),
            vec!["ArchiveToDisk stop", "Broadcast stop"]
        );
    }

    #[test]
    fn test_absent_fields_are_untouched() {
        let fake = FakeStudio::new();
        fake.set_broadcasting(true);
        let mut session = session_with(&fake);

        let result = session
            .reconcile(&desired(json!({ "isRecording": true })))
            .expect("reconcile");

        assert!(result.is_recording);
        assert!(result.is_broadcasting, "absent field must stay untouched");
        assert_eq!(fake.commands(), vec!["ArchiveToDisk start"]);
    }

    #[test]
    fn test_shot_ids_are_read_only_on_this_path() {
        let fake = FakeStudio::new();
        let camera = fake.add_shot(Layer::Normal, "Camera 1");
        fake.add_shot(Layer::Normal, "Title");
        fake.set_preview_shot(Layer::Normal, camera);
        let mut session = session_with(&fake);

        let result = session
            .reconcile(&desired(json!({ "previewShotId": 5 })))
            .expect("reconcile");

        // No command issued, no selection mutated
        assert!(fake.commands().is_empty());
        assert_eq!(result.preview_shot_id, camera);
        assert!(!result.is_recording);
        assert!(!result.is_broadcasting);
    }

    #[test]
    fn test_mistyped_field_is_skipped_rest_applied() {
        let fake = FakeStudio::new();
        let mut session = session_with(&fake);

        let result = session
            .reconcile(&desired(json!({
                "isRecording": "not-a-bool",
                "isBroadcasting": true,
            })))
            .expect("reconcile");

        assert!(!result.is_recording, "mistyped field must be skipped");
        assert!(result.is_broadcasting, "valid fields still apply");
        assert_eq!(fake.commands(), vec!["Broadcast start"]);
    }

    #[test]
    fn test_empty_payload_is_a_pure_read() {
        let fake = FakeStudio::new();
        fake.set_recording(true);
        let mut session = session_with(&fake);

        let result = session
            .reconcile(&DesiredState::default())
            .expect("reconcile");
        assert!(result.is_recording);
        assert!(fake.commands().is_empty());
    }
}
