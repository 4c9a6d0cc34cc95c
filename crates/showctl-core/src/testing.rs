//! In-memory fake studio for exercising the dispatcher stack without the
//! external application.
//!
//! `FakeStudio` implements [`Bridge`] over a small document → layer → shot
//! model and records every mutating command it receives, so tests can
//! assert exactly which commands reached the "external" object. Cloning a
//! `FakeStudio` shares the underlying model: keep one clone as a probe
//! while a session owns another as its bridge.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::bridge::Bridge;
use crate::error::CallError;
use crate::layers::Layer;
use crate::value::{ObjectHandle, Value};

#[derive(Debug, Clone)]
struct FakeShot {
    id: i32,
    name: String,
    media: Option<String>,
    playlist: bool,
}

#[derive(Debug)]
struct FakeLayer {
    shots: Vec<FakeShot>,
    active_shot_id: i32,
    preview_shot_id: i32,
    live_shot_id: i32,
    visible: bool,
}

impl Default for FakeLayer {
    fn default() -> Self {
        Self {
            shots: Vec::new(),
            active_shot_id: 0,
            preview_shot_id: 0,
            live_shot_id: 0,
            visible: true,
        }
    }
}

#[derive(Debug)]
struct FakeDocument {
    name: String,
    layers: [FakeLayer; 5],
    recording: bool,
    broadcasting: bool,
    transition_speed: String,
    auto_live: bool,
    active_transition_index: i32,
    audio_muted: bool,
}

impl FakeDocument {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: Default::default(),
            recording: false,
            broadcasting: false,
            transition_speed: "normal".to_string(),
            auto_live: false,
            active_transition_index: 1,
            audio_muted: false,
        }
    }

    fn layer(&self, layer: Layer) -> &FakeLayer {
        &self.layers[(layer.index() - 1) as usize]
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut FakeLayer {
        &mut self.layers[(layer.index() - 1) as usize]
    }

    /// The layer holding a shot id, if any.
    fn layer_of_shot(&self, id: i32) -> Option<&FakeLayer> {
        self.layers
            .iter()
            .find(|layer| layer.shots.iter().any(|shot| shot.id == id))
    }

    fn shot(&self, id: i32) -> Option<&FakeShot> {
        self.layers
            .iter()
            .flat_map(|layer| layer.shots.iter())
            .find(|shot| shot.id == id)
    }

    fn shot_mut(&mut self, id: i32) -> Option<&mut FakeShot> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.shots.iter_mut())
            .find(|shot| shot.id == id)
    }
}

#[derive(Debug)]
struct Inner {
    running: bool,
    launchable: bool,
    documents: Vec<FakeDocument>,
    next_shot_id: i32,
    /// Mutating commands, in issue order, e.g. "ArchiveToDisk start".
    commands: Vec<String>,
    /// Every member call, including reads.
    calls: Vec<String>,
}

/// Parsed form of a handle minted by this fake.
enum Target {
    App,
    Document(usize),
    Layer(usize, Layer),
    Shot(usize, i32),
}

fn parse_target(handle: &ObjectHandle) -> Option<Target> {
    let spec = handle.as_str();
    if spec == "app" {
        return Some(Target::App);
    }
    let rest = spec.strip_prefix("doc:")?;
    if let Some((doc, tail)) = rest.split_once('/') {
        let doc: usize = doc.parse().ok()?;
        if let Some(name) = tail.strip_prefix("layer:") {
            return Some(Target::Layer(doc, Layer::from_name(name)?));
        }
        if let Some(id) = tail.strip_prefix("shot:") {
            return Some(Target::Shot(doc, id.parse().ok()?));
        }
        return None;
    }
    Some(Target::Document(rest.parse().ok()?))
}

fn document_handle(index: usize) -> ObjectHandle {
    ObjectHandle::new(format!("doc:{}", index))
}

fn layer_handle(index: usize, layer: Layer) -> ObjectHandle {
    ObjectHandle::new(format!("doc:{}/layer:{}", index, layer.name()))
}

fn shot_handle(index: usize, id: i32) -> ObjectHandle {
    ObjectHandle::new(format!("doc:{}/shot:{}", index, id))
}

/// Shot name derived from a media path, the way the external application
/// names new shots: last path component without its extension.
fn shot_name_from_media(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file)
        .to_string()
}

fn int_arg(args: &[Value], position: usize) -> Result<i32, CallError> {
    args.get(position)
        .and_then(Value::as_int)
        .ok_or(CallError::TypeMismatch {
            expected: "int argument",
            found: "missing or mistyped",
        })
}

fn str_arg<'a>(args: &'a [Value], position: usize) -> Result<&'a str, CallError> {
    args.get(position)
        .and_then(Value::as_str)
        .ok_or(CallError::TypeMismatch {
            expected: "string argument",
            found: "missing or mistyped",
        })
}

fn flag_value(value: &Value) -> Result<bool, CallError> {
    value.as_flag().ok_or(CallError::TypeMismatch {
        expected: "flag",
        found: "other",
    })
}

/// An in-memory studio application behind the [`Bridge`] interface.
#[derive(Clone)]
pub struct FakeStudio {
    inner: Arc<Mutex<Inner>>,
    delay_ms: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeStudio {
    /// A fake with one empty document, not yet running (so acquisition
    /// exercises the attach → launch fallback).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                running: false,
                launchable: true,
                documents: vec![FakeDocument::new("Document 1")],
                next_shot_id: 1,
                commands: Vec::new(),
                calls: Vec::new(),
            })),
            delay_ms: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A running fake populated with a few shots, for `--fake` daemon runs.
    pub fn with_demo_content() -> Self {
        let fake = Self::new();
        fake.set_running(true);
        let camera_one = fake.add_shot(Layer::Normal, "Camera 1");
        let camera_two = fake.add_shot(Layer::Normal, "Camera 2");
        fake.add_shot(Layer::Overlay, "Lower Third");
        fake.set_live_shot(Layer::Normal, camera_one);
        fake.set_preview_shot(Layer::Normal, camera_two);
        fake.set_active_shot(Layer::Normal, camera_two);
        fake
    }

    /// Box a shared clone as a bridge for a session.
    pub fn boxed(&self) -> Box<dyn Bridge> {
        Box::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, apply the configured per-call delay, and run `f`
    /// under the model lock. The in-flight gauge brackets the whole call so
    /// tests can assert that callers never overlap.
    fn track<R>(&self, member: &str, f: impl FnOnce(&mut Inner) -> R) -> R {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let result = {
            let mut inner = self.lock();
            inner.calls.push(member.to_string());
            f(&mut inner)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    // Probe API (test-side observation and setup) -------------------------

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn set_launchable(&self, launchable: bool) {
        self.lock().launchable = launchable;
    }

    /// Artificial latency for every bridge call.
    pub fn set_call_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Mutating commands issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// How many times a member (by exact name) was called, reads included.
    pub fn call_count(&self, member: &str) -> usize {
        self.lock().calls.iter().filter(|m| *m == member).count()
    }

    /// Highest number of bridge calls ever observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn add_document(&self, name: &str) {
        self.lock().documents.push(FakeDocument::new(name));
    }

    /// Add a shot to the first document, returning its id.
    pub fn add_shot(&self, layer: Layer, name: &str) -> i32 {
        let mut inner = self.lock();
        let id = inner.next_shot_id;
        inner.next_shot_id += 1;
        inner.documents[0].layer_mut(layer).shots.push(FakeShot {
            id,
            name: name.to_string(),
            media: None,
            playlist: false,
        });
        id
    }

    /// Mark a shot on the first document as a playlist shot.
    pub fn set_playlist(&self, id: i32, playlist: bool) {
        if let Some(shot) = self.lock().documents[0].shot_mut(id) {
            shot.playlist = playlist;
        }
    }

    pub fn set_recording(&self, recording: bool) {
        self.lock().documents[0].recording = recording;
    }

    pub fn set_broadcasting(&self, broadcasting: bool) {
        self.lock().documents[0].broadcasting = broadcasting;
    }

    pub fn set_preview_shot(&self, layer: Layer, id: i32) {
        self.lock().documents[0].layer_mut(layer).preview_shot_id = id;
    }

    pub fn set_live_shot(&self, layer: Layer, id: i32) {
        self.lock().documents[0].layer_mut(layer).live_shot_id = id;
    }

    pub fn set_active_shot(&self, layer: Layer, id: i32) {
        self.lock().documents[0].layer_mut(layer).active_shot_id = id;
    }
}

impl Default for FakeStudio {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn document(&mut self, index: usize) -> Result<&mut FakeDocument, CallError> {
        self.documents
            .get_mut(index)
            .ok_or_else(|| CallError::Failed(format!("no document at slot {}", index)))
    }

    fn command(&mut self, text: String) {
        self.commands.push(text);
    }
}

impl Bridge for FakeStudio {
    fn app_name(&self) -> &str {
        "FakeStudio"
    }

    fn attach(&mut self) -> Result<ObjectHandle, CallError> {
        self.track("Attach", |inner| {
            if inner.running {
                Ok(ObjectHandle::new("app"))
            } else {
                Err(CallError::Failed("application is not running".into()))
            }
        })
    }

    fn launch(&mut self) -> Result<ObjectHandle, CallError> {
        self.track("Launch", |inner| {
            if inner.launchable {
                inner.running = true;
                Ok(ObjectHandle::new("app"))
            } else {
                Err(CallError::Failed("launch failed".into()))
            }
        })
    }

    fn get_property(&mut self, target: &ObjectHandle, member: &str) -> Result<Value, CallError> {
        self.track(member, |inner| {
            match parse_target(target)
                .ok_or_else(|| CallError::Failed(format!("unknown handle '{}'", target)))?
            {
                Target::Document(index) => {
                    let doc = inner.document(index)?;
                    match member {
                        "TransitionSpeed" => Ok(Value::Str(doc.transition_speed.clone())),
                        "AutoLive" => Ok(Value::Int(doc.auto_live as i32)),
                        "ActiveTransitionIndex" => Ok(Value::Int(doc.active_transition_index)),
                        "AudioMutedToSpeaker" => Ok(Value::Int(doc.audio_muted as i32)),
                        _ => Err(CallError::MemberNotFound),
                    }
                }
                Target::Layer(index, layer) => {
                    let slot = inner.document(index)?.layer(layer);
                    match member {
                        "ActiveShotID" => Ok(Value::Int(slot.active_shot_id)),
                        "Visible" => Ok(Value::Int(slot.visible as i32)),
                        _ => Err(CallError::MemberNotFound),
                    }
                }
                Target::Shot(index, id) => {
                    let doc = inner.document(index)?;
                    let shot = doc
                        .shot(id)
                        .ok_or_else(|| CallError::Failed(format!("no shot with id {}", id)))?;
                    match member {
                        "Name" => Ok(Value::Str(shot.name.clone())),
                        _ => Err(CallError::MemberNotFound),
                    }
                }
                Target::App => Err(CallError::MemberNotFound),
            }
        })
    }

    fn set_property(
        &mut self,
        target: &ObjectHandle,
        member: &str,
        value: Value,
    ) -> Result<(), CallError> {
        self.track(member, |inner| {
            match parse_target(target)
                .ok_or_else(|| CallError::Failed(format!("unknown handle '{}'", target)))?
            {
                Target::Document(index) => {
                    let doc = inner.document(index)?;
                    match member {
                        "TransitionSpeed" => {
                            let speed = value
                                .as_str()
                                .ok_or(CallError::TypeMismatch {
                                    expected: "string",
                                    found: "other",
                                })?
                                .to_string();
                            doc.transition_speed = speed.clone();
                            inner.command(format!("TransitionSpeed {}", speed));
                        }
                        "AutoLive" => {
                            let on = flag_value(&value)?;
                            doc.auto_live = on;
                            inner.command(format!("AutoLive {}", on));
                        }
                        "ActiveTransitionIndex" => {
                            let index = value.as_int().ok_or(CallError::TypeMismatch {
                                expected: "int",
                                found: "other",
                            })?;
                            doc.active_transition_index = index;
                            inner.command(format!("ActiveTransitionIndex {}", index));
                        }
                        "AudioMutedToSpeaker" => {
                            let muted = flag_value(&value)?;
                            doc.audio_muted = muted;
                            inner.command(format!("AudioMutedToSpeaker {}", muted));
                        }
                        _ => return Err(CallError::MemberNotFound),
                    }
                    Ok(())
                }
                Target::Layer(index, layer) => {
                    match member {
                        "ActiveShotID" => {
                            let id = value.as_int().ok_or(CallError::TypeMismatch {
                                expected: "int",
                                found: "other",
                            })?;
                            inner.document(index)?.layer_mut(layer).active_shot_id = id;
                            inner.command(format!("ActiveShotID {}", id));
                        }
                        "Visible" => {
                            let visible = flag_value(&value)?;
                            inner.document(index)?.layer_mut(layer).visible = visible;
                            inner.command(format!("Visible {}", visible));
                        }
                        _ => return Err(CallError::MemberNotFound),
                    }
                    Ok(())
                }
                Target::Shot(index, id) => match member {
                    "Name" => {
                        let name = value
                            .as_str()
                            .ok_or(CallError::TypeMismatch {
                                expected: "string",
                                found: "other",
                            })?
                            .to_string();
                        let shot = inner
                            .document(index)?
                            .shot_mut(id)
                            .ok_or_else(|| CallError::Failed(format!("no shot with id {}", id)))?;
                        shot.name = name.clone();
                        inner.command(format!("SetShotName {} {}", id, name));
                        Ok(())
                    }
                    _ => Err(CallError::MemberNotFound),
                },
                Target::App => Err(CallError::MemberNotFound),
            }
        })
    }

    fn invoke(
        &mut self,
        target: &ObjectHandle,
        member: &str,
        args: &[Value],
    ) -> Result<Value, CallError> {
        self.track(member, |inner| {
            match parse_target(target)
                .ok_or_else(|| CallError::Failed(format!("unknown handle '{}'", target)))?
            {
                Target::App => match member {
                    "DocumentByIndex" => {
                        let index = int_arg(args, 0)?;
                        let slot = index - 1;
                        if slot >= 0 && (slot as usize) < inner.documents.len() {
                            Ok(Value::Object(document_handle(slot as usize)))
                        } else {
                            Ok(Value::Null)
                        }
                    }
                    "DocumentByName" => {
                        let name = str_arg(args, 0)?;
                        match inner.documents.iter().position(|doc| doc.name == name) {
                            Some(slot) => Ok(Value::Object(document_handle(slot))),
                            None => Ok(Value::Null),
                        }
                    }
                    _ => Err(CallError::MemberNotFound),
                },
                Target::Document(index) => match member {
                    "IsBroadcasting" => {
                        Ok(Value::Int(inner.document(index)?.broadcasting as i32))
                    }
                    "IsArchivingToDisk" => {
                        Ok(Value::Int(inner.document(index)?.recording as i32))
                    }
                    "Broadcast" => {
                        let verb = str_arg(args, 0)?.to_string();
                        inner.document(index)?.broadcasting = verb == "start";
                        inner.command(format!("Broadcast {}", verb));
                        Ok(Value::Null)
                    }
                    "ArchiveToDisk" => {
                        let verb = str_arg(args, 0)?.to_string();
                        inner.document(index)?.recording = verb == "start";
                        inner.command(format!("ArchiveToDisk {}", verb));
                        Ok(Value::Null)
                    }
                    "LayerByName" => {
                        let name = str_arg(args, 0)?;
                        match Layer::from_name(name) {
                            Some(layer) => Ok(Value::Object(layer_handle(index, layer))),
                            None => Ok(Value::Null),
                        }
                    }
                    "ShotByShotID" => {
                        let id = int_arg(args, 0)?;
                        if inner.document(index)?.shot(id).is_some() {
                            Ok(Value::Object(shot_handle(index, id)))
                        } else {
                            Ok(Value::Null)
                        }
                    }
                    "SaveSnapshot" => {
                        let path = str_arg(args, 0)?.to_string();
                        inner.command(format!("SaveSnapshot {}", path));
                        Ok(Value::Null)
                    }
                    "RemoveMedia" => {
                        let path = str_arg(args, 0)?.to_string();
                        for layer in inner.document(index)?.layers.iter_mut() {
                            layer
                                .shots
                                .retain(|shot| shot.media.as_deref() != Some(path.as_str()));
                        }
                        inner.command(format!("RemoveMedia {}", path));
                        Ok(Value::Null)
                    }
                    _ => Err(CallError::MemberNotFound),
                },
                Target::Layer(index, layer) => match member {
                    "ShotCount" => Ok(Value::Int(
                        inner.document(index)?.layer(layer).shots.len() as i32,
                    )),
                    "ShotIDByName" => {
                        let name = str_arg(args, 0)?;
                        let id = inner
                            .document(index)?
                            .layer(layer)
                            .shots
                            .iter()
                            .find(|shot| shot.name == name)
                            .map(|shot| shot.id)
                            .unwrap_or(0);
                        Ok(Value::Int(id))
                    }
                    "ShotIDByIndex" => {
                        let position = int_arg(args, 0)?;
                        let shots = &inner.document(index)?.layer(layer).shots;
                        let id = usize::try_from(position)
                            .ok()
                            .and_then(|p| shots.get(p))
                            .map(|shot| shot.id)
                            .unwrap_or(0);
                        Ok(Value::Int(id))
                    }
                    "AddShotWithMedia" => {
                        let path = str_arg(args, 0)?.to_string();
                        let id = inner.next_shot_id;
                        inner.next_shot_id += 1;
                        let shot = FakeShot {
                            id,
                            name: shot_name_from_media(&path),
                            media: Some(path.clone()),
                            playlist: false,
                        };
                        inner.document(index)?.layer_mut(layer).shots.push(shot);
                        inner.command(format!("AddShotWithMedia {}", path));
                        Ok(Value::Int(id))
                    }
                    "RemoveShotByID" => {
                        let id = int_arg(args, 0)?;
                        inner
                            .document(index)?
                            .layer_mut(layer)
                            .shots
                            .retain(|shot| shot.id != id);
                        inner.command(format!("RemoveShotByID {}", id));
                        Ok(Value::Null)
                    }
                    "Go" => {
                        let slot = inner.document(index)?.layer_mut(layer);
                        slot.live_shot_id = slot.active_shot_id;
                        inner.command("Go".to_string());
                        Ok(Value::Null)
                    }
                    "PreviewShotID" => Ok(Value::Int(
                        inner.document(index)?.layer(layer).preview_shot_id,
                    )),
                    "LiveShotID" => Ok(Value::Int(
                        inner.document(index)?.layer(layer).live_shot_id,
                    )),
                    _ => Err(CallError::MemberNotFound),
                },
                Target::Shot(index, id) => {
                    let doc = inner.document(index)?;
                    let shot = doc
                        .shot(id)
                        .cloned()
                        .ok_or_else(|| CallError::Failed(format!("no shot with id {}", id)))?;
                    match member {
                        "Preview" => {
                            let in_preview = doc
                                .layer_of_shot(id)
                                .map(|layer| layer.preview_shot_id == id)
                                .unwrap_or(false);
                            Ok(Value::Int(in_preview as i32))
                        }
                        "Live" => {
                            let live = doc
                                .layer_of_shot(id)
                                .map(|layer| layer.live_shot_id == id)
                                .unwrap_or(false);
                            Ok(Value::Int(live as i32))
                        }
                        "Playlist" => Ok(Value::Int(shot.playlist as i32)),
                        "NextShot" => {
                            inner.command(format!("NextShot {}", id));
                            Ok(Value::Null)
                        }
                        "PreviousShot" => {
                            inner.command(format!("PreviousShot {}", id));
                            Ok(Value::Null)
                        }
                        _ => Err(CallError::MemberNotFound),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_respects_running_flag() {
        let fake = FakeStudio::new();
        let mut bridge = fake.boxed();
        assert!(bridge.attach().is_err());
        fake.set_running(true);
        assert!(bridge.attach().is_ok());
    }

    #[test]
    fn test_launch_flips_running() {
        let fake = FakeStudio::new();
        let mut bridge = fake.boxed();
        bridge.launch().expect("launch");
        assert!(bridge.attach().is_ok());
    }

    #[test]
    fn test_shot_name_from_media_path() {
        assert_eq!(shot_name_from_media("/media/intro.mov"), "intro");
        assert_eq!(shot_name_from_media("clip"), "clip");
        assert_eq!(shot_name_from_media("C:\\media\\bumper.mp4"), "bumper");
    }

    #[test]
    fn test_unknown_member_reported_not_found() {
        let fake = FakeStudio::new();
        fake.set_running(true);
        let mut bridge = fake.boxed();
        let app = bridge.attach().expect("attach");
        assert_eq!(
            bridge.invoke(&app, "Bogus", &[]),
            Err(CallError::MemberNotFound)
        );
    }

    #[test]
    fn test_calls_are_recorded() {
        let fake = FakeStudio::new();
        fake.set_running(true);
        let mut bridge = fake.boxed();
        let app = bridge.attach().expect("attach");
        let _ = bridge.invoke(&app, "DocumentByIndex", &[Value::Int(1)]);
        assert_eq!(fake.call_count("DocumentByIndex"), 1);
        assert_eq!(fake.call_count("Attach"), 1);
        // Reads are calls but not commands
        assert!(fake.commands().is_empty());
    }
}
