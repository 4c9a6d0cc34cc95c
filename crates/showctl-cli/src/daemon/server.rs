//! Unix socket server for the daemon process.
//!
//! The server is the control-plane boundary: it translates JSON-line
//! requests into jobs for the serialized studio worker and snapshots into
//! responses. Plain reads are served from the poll cache without entering
//! the worker at all; Set always goes through the worker so the reply
//! reflects the caller's just-applied command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use showctl_core::error::{ApiError, DispatchError};
use showctl_core::layers::{DocumentSelector, LayerSelector};
use showctl_core::protocol::{Command, Request, Response, ResponseData};
use showctl_core::shots::ShotSelector;
use showctl_core::state::DesiredState;

use crate::daemon::paths;
use crate::daemon::poll::StateCache;
use crate::daemon::worker::{StudioHandle, WorkerGone};

/// Maximum number of concurrent client connections to prevent resource exhaustion.
const MAX_CONNECTIONS: usize = 100;

/// How long to wait for in-flight connections to complete during shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum request size in bytes (1 MB should be plenty for any reasonable request).
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// The daemon server that listens for client connections.
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
    pid_path: PathBuf,
    studio: StudioHandle,
    cache: Arc<StateCache>,
    /// Semaphore to limit concurrent connections and prevent resource exhaustion.
    connection_semaphore: Arc<Semaphore>,
    /// Shutdown signal for graceful termination (allows Drop to run and clean up files).
    shutdown: Arc<Notify>,
}

impl DaemonServer {
    /// Create a new daemon server bound to the default socket path.
    pub async fn bind(studio: StudioHandle, cache: Arc<StateCache>) -> Result<Self> {
        let socket_path = paths::get_socket_path();
        let pid_path = paths::get_pid_path();
        Self::bind_to(socket_path, pid_path, studio, cache).await
    }

    /// Create a new daemon server bound to a specific socket path.
    ///
    /// Uses a bind-first approach to avoid TOCTOU race conditions:
    /// 1. Try to bind directly
    /// 2. If socket in use, check PID file to see if daemon is alive
    /// 3. If daemon dead, remove stale socket and retry
    /// 4. If daemon alive, return error
    pub async fn bind_to(
        socket_path: PathBuf,
        pid_path: PathBuf,
        studio: StudioHandle,
        cache: Arc<StateCache>,
    ) -> Result<Self> {
        // Ensure socket directory exists with secure permissions (0700)
        paths::ensure_socket_dir().context("Failed to create socket directory")?;

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory for {:?}", socket_path)
            })?;
        }

        // Helper to write PID file immediately after successful bind.
        // This closes the race window where another process could see our socket
        // but not find a valid PID file, incorrectly assuming we're dead.
        let write_pid = |pid_path: &PathBuf| -> Result<()> {
            std::fs::write(pid_path, std::process::id().to_string())
                .with_context(|| format!("Failed to write PID file: {:?}", pid_path))
        };

        // Try to bind directly (avoid TOCTOU race)
        let listener = match UnixListener::bind(&socket_path) {
            Ok(l) => {
                write_pid(&pid_path)?;
                l
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                // Socket exists, check if daemon is still alive
                if is_daemon_alive(&pid_path) {
                    anyhow::bail!(
                        "Daemon already running (socket {:?} in use, PID file valid)",
                        socket_path
                    );
                }

                // Daemon is dead, but verify the socket file is safe to remove
                // Don't follow symlinks (could delete unintended files)
                let metadata = std::fs::symlink_metadata(&socket_path)
                    .with_context(|| format!("Failed to stat socket path: {:?}", socket_path))?;

                if metadata.file_type().is_symlink() {
                    anyhow::bail!(
                        "Socket path {:?} is a symlink, refusing to delete for safety",
                        socket_path
                    );
                }

                // On Unix, verify it's actually a socket file
                #[cfg(unix)]
                {
                    use std::os::unix::fs::FileTypeExt;
                    if !metadata.file_type().is_socket() {
                        anyhow::bail!(
                            "Path {:?} exists but is not a socket file (type: {:?})",
                            socket_path,
                            metadata.file_type()
                        );
                    }
                }

                // Safe to remove stale socket
                info!("Removing stale socket from dead daemon");
                std::fs::remove_file(&socket_path)
                    .with_context(|| format!("Failed to remove stale socket: {:?}", socket_path))?;

                let l = UnixListener::bind(&socket_path)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path))?;
                write_pid(&pid_path)?;
                l
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path));
            }
        };

        info!("Daemon listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            pid_path,
            studio,
            cache,
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Run the server, accepting connections and handling requests.
    ///
    /// Limits concurrent connections via semaphore. Connections may arrive
    /// in parallel, but their Get/Set work is funneled through the single
    /// studio worker; only cache reads bypass it.
    ///
    /// On shutdown, waits for in-flight connections to complete (with timeout).
    /// Returns when shutdown is signaled, allowing Drop to clean up socket/PID files.
    pub async fn run(&self) -> Result<()> {
        // Track spawned connection handlers for graceful shutdown
        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            // Acquire a permit before spawning the connection handler.
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting new connection",
                                        MAX_CONNECTIONS
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted new connection");
                            let studio = self.studio.clone();
                            let cache = self.cache.clone();
                            let shutdown = self.shutdown.clone();
                            connection_tasks.spawn(async move {
                                // Permit is held for the lifetime of the connection handler
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, studio, cache, shutdown).await {
                                    error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                // Reap completed connection tasks to prevent unbounded growth
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {
                    // Task completed, nothing to do (errors logged in handler)
                }
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received, waiting for in-flight connections");
                    break;
                }
            }
        }

        // Graceful shutdown: wait for in-flight connections with timeout
        if !connection_tasks.is_empty() {
            let pending = connection_tasks.len();
            info!(
                "Waiting for {} in-flight connection(s) to complete",
                pending
            );

            let shutdown_deadline = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, async {
                while connection_tasks.join_next().await.is_some() {
                    // Keep draining until all tasks complete
                }
            })
            .await;

            if shutdown_deadline.is_err() {
                let remaining = connection_tasks.len();
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} connection(s)",
                    GRACEFUL_SHUTDOWN_TIMEOUT, remaining
                );
                connection_tasks.abort_all();
            }
        }

        Ok(())
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        // Clean up socket file on shutdown
        if self.socket_path.exists() && std::fs::remove_file(&self.socket_path).is_err() {
            warn!("Failed to remove socket on shutdown");
        }
        // Clean up PID file on shutdown
        if self.pid_path.exists() && std::fs::remove_file(&self.pid_path).is_err() {
            warn!("Failed to remove PID file on shutdown");
        }
    }
}

/// Check if a daemon process is still alive by reading its PID file.
///
/// Returns true if:
/// - PID file exists and contains a valid PID
/// - AND that process is still running (verified via kill(pid, 0))
fn is_daemon_alive(pid_path: &Path) -> bool {
    let pid_str = match std::fs::read_to_string(pid_path) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let pid: i32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => return false,
    };

    // kill(pid, 0) checks if process exists without sending a signal.
    // SAFETY: libc::kill with signal 0 is a POSIX-defined no-op that only checks
    // whether the process exists and the caller has permission to signal it.
    // The pid is validated as a valid i32 above. No actual signal is delivered.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Read a line with a maximum size limit to prevent memory DoS.
///
/// Returns the number of bytes read (0 means EOF).
/// Returns an error if the line exceeds max_size before finding a newline.
async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_size: usize,
) -> Result<usize> {
    use tokio::io::AsyncBufReadExt;

    let mut total = 0;
    let mut bytes = Vec::new();

    loop {
        let available = reader
            .fill_buf()
            .await
            .context("Failed to read from client")?;

        if available.is_empty() {
            // EOF
            if !bytes.is_empty() {
                let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
                buf.push_str(line);
            }
            return Ok(total);
        }

        // Find newline in available data
        let newline_pos = available.iter().position(|&b| b == b'\n');
        let bytes_to_consume = newline_pos.map(|p| p + 1).unwrap_or(available.len());

        // Check size limit before consuming
        if total + bytes_to_consume > max_size {
            anyhow::bail!("Request too large: exceeded {} byte limit", max_size);
        }

        // Append raw bytes and validate UTF-8 once at the end
        bytes.extend_from_slice(&available[..bytes_to_consume]);
        total += bytes_to_consume;

        reader.consume(bytes_to_consume);

        if newline_pos.is_some() {
            // Found newline, done
            break;
        }
    }

    let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
    buf.push_str(line);
    Ok(total)
}

/// Handle a single client connection.
async fn handle_connection(
    stream: UnixStream,
    studio: StudioHandle,
    cache: Arc<StateCache>,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();

        // Read line with size limit to prevent memory DoS
        let bytes_read = read_line_bounded(&mut reader, &mut line, MAX_REQUEST_SIZE).await?;

        if bytes_read == 0 {
            debug!("Client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {} bytes", trimmed.len());

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle_request(request, &studio, &cache, &shutdown).await,
            Err(e) => Response::error(
                "unknown",
                ApiError::invalid_input_with_suggestion(
                    format!("Invalid JSON request: {}", e),
                    "Ensure the request is valid JSON with 'id' and 'command' fields. Example: {\"id\":\"1\",\"command\":{\"action\":\"get\"}}",
                ),
            ),
        };

        let response_json =
            serde_json::to_string(&response).context("Failed to serialize response")?;
        debug!("Sending: {}", response_json);

        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline")?;
        writer.flush().await.context("Failed to flush")?;
    }

    Ok(())
}

/// Handle a single request and return a response.
async fn handle_request(
    request: Request,
    studio: &StudioHandle,
    cache: &Arc<StateCache>,
    shutdown: &Arc<Notify>,
) -> Response {
    debug!("Handling command: {:?}", request.command);

    match request.command {
        Command::Get { fresh } => handle_get(&request.id, studio, cache, fresh).await,

        Command::Set { state } => handle_set(&request.id, studio, cache, state).await,

        Command::SwitchDocument { document } => {
            handle_switch_document(&request.id, studio, document).await
        }

        Command::SwitchLayer { layer } => handle_switch_layer(&request.id, studio, layer).await,

        Command::Shots => handle_shots(&request.id, studio).await,

        Command::RenameShot { shot, name } => {
            handle_rename_shot(&request.id, studio, shot, name).await
        }

        Command::AddShot { media } => handle_add_shot(&request.id, studio, media).await,

        Command::RemoveShot { shot } => handle_remove_shot(&request.id, studio, shot).await,

        Command::Go => handle_go(&request.id, studio).await,

        Command::GetTransitionSpeed => handle_get_transition_speed(&request.id, studio).await,

        Command::SetTransitionSpeed { speed } => {
            handle_set_transition_speed(&request.id, studio, speed).await
        }

        Command::Shutdown => handle_shutdown(&request.id, shutdown),
    }
}

/// Flatten the worker and dispatch layers into a protocol response.
fn respond<T>(
    request_id: &str,
    outcome: Result<Result<T, DispatchError>, WorkerGone>,
    ok: impl FnOnce(T) -> ResponseData,
) -> Response {
    match outcome {
        Ok(Ok(value)) => Response::success(request_id, ok(value)),
        Ok(Err(e)) => Response::error(request_id, ApiError::studio_call_failed(&e)),
        Err(_) => Response::error(request_id, ApiError::worker_gone()),
    }
}

/// Turn a boolean not-applied outcome into an Applied payload.
fn applied(applied: bool, action: &str) -> ResponseData {
    let message = if applied {
        format!("{} applied", action)
    } else {
        format!("{} not applied", action)
    };
    ResponseData::Applied { applied, message }
}

/// Handle get command.
///
/// The cached snapshot is the fast path: readers tolerating staleness up to
/// one poll interval never enter the serialized worker.
async fn handle_get(
    request_id: &str,
    studio: &StudioHandle,
    cache: &Arc<StateCache>,
    fresh: bool,
) -> Response {
    if !fresh {
        if let Some(snapshot) = cache.get().await {
            return Response::success(request_id, ResponseData::State(snapshot));
        }
        debug!("cache empty, falling through to live read");
    }

    let outcome = studio.with_session(|session| session.snapshot()).await;
    if let Ok(Ok(snapshot)) = &outcome {
        cache.publish(*snapshot).await;
    }
    respond(request_id, outcome, ResponseData::State)
}

/// Handle set command: lenient parse, then diff-and-apply on the worker.
///
/// The response is always a freshly rebuilt state, never an echo of the
/// request, and it reflects this caller's just-applied command because Set
/// runs through the serialized worker.
async fn handle_set(
    request_id: &str,
    studio: &StudioHandle,
    cache: &Arc<StateCache>,
    state: serde_json::Value,
) -> Response {
    let desired = DesiredState::from_json(&state);
    let outcome = studio
        .with_session(move |session| session.reconcile(&desired))
        .await;
    if let Ok(Ok(snapshot)) = &outcome {
        cache.publish(*snapshot).await;
    }
    respond(request_id, outcome, ResponseData::State)
}

/// Handle switch-document command.
async fn handle_switch_document(
    request_id: &str,
    studio: &StudioHandle,
    document: DocumentSelector,
) -> Response {
    let outcome = studio
        .with_session(move |session| session.switch_document(&document))
        .await;
    respond(request_id, outcome, |done| applied(done, "document switch"))
}

/// Handle switch-layer command.
async fn handle_switch_layer(
    request_id: &str,
    studio: &StudioHandle,
    layer: LayerSelector,
) -> Response {
    let outcome = studio
        .with_session(move |session| session.switch_layer(&layer))
        .await;
    respond(request_id, outcome, |done| applied(done, "layer switch"))
}

/// Handle shots listing.
async fn handle_shots(request_id: &str, studio: &StudioHandle) -> Response {
    let outcome = studio.with_session(|session| session.list_shots()).await;
    respond(request_id, outcome, |shots| ResponseData::Shots { shots })
}

/// Handle rename-shot command.
async fn handle_rename_shot(
    request_id: &str,
    studio: &StudioHandle,
    shot: ShotSelector,
    name: String,
) -> Response {
    let outcome = studio
        .with_session(move |session| match &shot {
            ShotSelector::Id(id) => session.rename_shot(*id, &name),
            ShotSelector::Name(old_name) => session.rename_shot_by_name(old_name, &name),
        })
        .await;
    respond(request_id, outcome, |done| applied(done, "rename"))
}

/// Handle add-shot command.
async fn handle_add_shot(request_id: &str, studio: &StudioHandle, media: String) -> Response {
    let outcome = studio
        .with_session(move |session| session.add_shot_with_media(&media))
        .await;
    respond(request_id, outcome, |shot_id| ResponseData::ShotAdded {
        shot_id,
    })
}

/// Handle remove-shot command. Removing an unknown shot is a no-op, not an
/// error.
async fn handle_remove_shot(
    request_id: &str,
    studio: &StudioHandle,
    shot: ShotSelector,
) -> Response {
    let outcome = studio
        .with_session(move |session| match &shot {
            ShotSelector::Id(id) => session.remove_shot_by_id(*id),
            ShotSelector::Name(name) => session.remove_shot_by_name(name),
        })
        .await;
    respond(request_id, outcome, |()| ResponseData::Ok {
        message: "Shot removed (no-op if it did not exist)".to_string(),
    })
}

/// Handle go command.
async fn handle_go(request_id: &str, studio: &StudioHandle) -> Response {
    let outcome = studio.with_session(|session| session.go()).await;
    respond(request_id, outcome, |()| ResponseData::Ok {
        message: "Active shot taken live".to_string(),
    })
}

/// Handle transition speed read.
async fn handle_get_transition_speed(request_id: &str, studio: &StudioHandle) -> Response {
    let outcome = studio
        .with_session(|session| session.transition_speed())
        .await;
    respond(request_id, outcome, |speed| ResponseData::TransitionSpeed {
        speed,
    })
}

/// Handle transition speed write. Names outside the closed table come back
/// as not applied.
async fn handle_set_transition_speed(
    request_id: &str,
    studio: &StudioHandle,
    speed: String,
) -> Response {
    let outcome = studio
        .with_session(move |session| session.set_transition_speed(&speed))
        .await;
    respond(request_id, outcome, |done| {
        applied(done, "transition speed")
    })
}

/// Handle shutdown command - gracefully stop the daemon.
///
/// Signals the main run loop to exit after the response flushes. The
/// DaemonServer's Drop impl cleans up the socket and PID files.
fn handle_shutdown(request_id: &str, shutdown: &Arc<Notify>) -> Response {
    info!("Received shutdown command, stopping daemon");

    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        // Brief delay to allow response to flush before signaling shutdown
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_waiters();
    });

    Response::success(
        request_id,
        ResponseData::Ok {
            message: "Daemon shutting down".to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use showctl_core::error::ErrorCode;
    use showctl_core::layers::Layer;
    use showctl_core::testing::FakeStudio;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;
    use uuid::Uuid;

    struct TestDaemon {
        fake: FakeStudio,
        socket_path: PathBuf,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestDaemon {
        fn stop(self) {
            self.server_handle.abort();
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }

    /// Bind a server on a unique temp socket against a fresh fake studio.
    async fn start_daemon() -> TestDaemon {
        let fake = FakeStudio::new();
        fake.set_running(true);
        start_daemon_with(fake).await
    }

    async fn start_daemon_with(fake: FakeStudio) -> TestDaemon {
        let short_id = Uuid::new_v4().simple().to_string();
        let socket_path =
            std::env::temp_dir().join(format!("showctl-test-{}.sock", &short_id[..8]));
        let pid_path = socket_path.with_extension("pid");

        let studio = StudioHandle::spawn(fake.boxed())
            .await
            .expect("spawn worker");
        let cache = Arc::new(StateCache::new());
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, studio, cache)
            .await
            .expect("Failed to bind server");

        let server_handle = tokio::spawn(async move {
            let _ = timeout(Duration::from_secs(5), server.run()).await;
        });

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        TestDaemon {
            fake,
            socket_path,
            server_handle,
        }
    }

    async fn connect(socket_path: &Path) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
        let stream = UnixStream::connect(socket_path)
            .await
            .expect("Failed to connect");
        let (reader, writer) = stream.into_split();
        (BufReader::new(reader), writer)
    }

    async fn roundtrip(
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        id: &str,
        command: Command,
    ) -> Response {
        let request = Request {
            id: id.to_string(),
            command,
        };
        let request_json = serde_json::to_string(&request).unwrap();
        writer
            .write_all(request_json.as_bytes())
            .await
            .expect("write");
        writer.write_all(b"\n").await.expect("newline");
        writer.flush().await.expect("flush");

        let mut response_line = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut response_line))
            .await
            .expect("timeout")
            .expect("read");
        serde_json::from_str(&response_line).expect("parse response")
    }

    #[tokio::test]
    async fn test_get_returns_state() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let response = roundtrip(
            &mut reader,
            &mut writer,
            "get-1",
            Command::Get { fresh: true },
        )
        .await;

        assert!(response.success);
        assert_eq!(response.id, "get-1");
        match response.data {
            Some(ResponseData::State(state)) => {
                assert!(!state.is_recording);
                assert!(!state.is_broadcasting);
            }
            other => panic!("Expected State, got: {:?}", other),
        }

        daemon.stop();
    }

    #[tokio::test]
    async fn test_set_is_idempotent_over_the_wire() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let payload = json!({ "isRecording": true });
        let first = roundtrip(
            &mut reader,
            &mut writer,
            "set-1",
            Command::Set {
                state: payload.clone(),
            },
        )
        .await;
        assert!(first.success);

        let second = roundtrip(
            &mut reader,
            &mut writer,
            "set-2",
            Command::Set { state: payload },
        )
        .await;
        assert!(second.success);
        match second.data {
            Some(ResponseData::State(state)) => assert!(state.is_recording),
            other => panic!("Expected State, got: {:?}", other),
        }

        // Exactly one command reached the studio across both sets
        assert_eq!(daemon.fake.commands(), vec!["ArchiveToDisk start"]);
        daemon.stop();
    }

    #[tokio::test]
    async fn test_set_with_mistyped_field_still_applies_rest() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let response = roundtrip(
            &mut reader,
            &mut writer,
            "set-odd",
            Command::Set {
                state: json!({ "isRecording": "not-a-bool", "isBroadcasting": true }),
            },
        )
        .await;

        assert!(response.success, "lenient parse must not fault");
        match response.data {
            Some(ResponseData::State(state)) => {
                assert!(!state.is_recording);
                assert!(state.is_broadcasting);
            }
            other => panic!("Expected State, got: {:?}", other),
        }
        daemon.stop();
    }

    #[tokio::test]
    async fn test_switch_layer_invalid_is_not_applied() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let response = roundtrip(
            &mut reader,
            &mut writer,
            "layer-1",
            Command::SwitchLayer {
                layer: LayerSelector::Name("backdrop".into()),
            },
        )
        .await;

        // Routine caller outcome, not a protocol fault
        assert!(response.success);
        match response.data {
            Some(ResponseData::Applied { applied, .. }) => assert!(!applied),
            other => panic!("Expected Applied, got: {:?}", other),
        }

        let valid = roundtrip(
            &mut reader,
            &mut writer,
            "layer-2",
            Command::SwitchLayer {
                layer: LayerSelector::Name("Audio".into()),
            },
        )
        .await;
        match valid.data {
            Some(ResponseData::Applied { applied, .. }) => assert!(applied),
            other => panic!("Expected Applied, got: {:?}", other),
        }
        daemon.stop();
    }

    #[tokio::test]
    async fn test_shots_listing() {
        let fake = FakeStudio::new();
        fake.set_running(true);
        let camera = fake.add_shot(Layer::Normal, "Camera 1");
        fake.add_shot(Layer::Normal, "Title");
        fake.set_live_shot(Layer::Normal, camera);

        let daemon = start_daemon_with(fake).await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let response = roundtrip(&mut reader, &mut writer, "shots-1", Command::Shots).await;
        match response.data {
            Some(ResponseData::Shots { shots }) => {
                assert_eq!(shots.len(), 2);
                assert_eq!(shots[0].name, "Camera 1");
                assert!(shots[0].live);
            }
            other => panic!("Expected Shots, got: {:?}", other),
        }
        daemon.stop();
    }

    #[tokio::test]
    async fn test_add_and_remove_shot_over_the_wire() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let added = roundtrip(
            &mut reader,
            &mut writer,
            "add-1",
            Command::AddShot {
                media: "/media/intro.mov".to_string(),
            },
        )
        .await;
        let shot_id = match added.data {
            Some(ResponseData::ShotAdded { shot_id }) => shot_id,
            other => panic!("Expected ShotAdded, got: {:?}", other),
        };

        let removed = roundtrip(
            &mut reader,
            &mut writer,
            "rm-1",
            Command::RemoveShot {
                shot: ShotSelector::Id(shot_id),
            },
        )
        .await;
        assert!(removed.success);

        // Removing an unknown name is still success (no-op contract)
        let noop = roundtrip(
            &mut reader,
            &mut writer,
            "rm-2",
            Command::RemoveShot {
                shot: ShotSelector::Name("ghost".into()),
            },
        )
        .await;
        assert!(noop.success);
        daemon.stop();
    }

    #[tokio::test]
    async fn test_transition_speed_round_trip() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        let set = roundtrip(
            &mut reader,
            &mut writer,
            "speed-1",
            Command::SetTransitionSpeed {
                speed: "fastest".to_string(),
            },
        )
        .await;
        match set.data {
            Some(ResponseData::Applied { applied, .. }) => assert!(applied),
            other => panic!("Expected Applied, got: {:?}", other),
        }

        let get = roundtrip(
            &mut reader,
            &mut writer,
            "speed-2",
            Command::GetTransitionSpeed,
        )
        .await;
        match get.data {
            Some(ResponseData::TransitionSpeed { speed }) => {
                assert_eq!(speed, showctl_core::layers::TransitionSpeed::Fastest)
            }
            other => panic!("Expected TransitionSpeed, got: {:?}", other),
        }

        let invalid = roundtrip(
            &mut reader,
            &mut writer,
            "speed-3",
            Command::SetTransitionSpeed {
                speed: "warp".to_string(),
            },
        )
        .await;
        match invalid.data {
            Some(ResponseData::Applied { applied, .. }) => assert!(!applied),
            other => panic!("Expected Applied, got: {:?}", other),
        }
        daemon.stop();
    }

    #[tokio::test]
    async fn test_invalid_json_yields_invalid_input() {
        let daemon = start_daemon().await;
        let (mut reader, mut writer) = connect(&daemon.socket_path).await;

        writer
            .write_all(b"this is not json\n")
            .await
            .expect("write");
        writer.flush().await.expect("flush");

        let mut response_line = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut response_line))
            .await
            .expect("timeout")
            .expect("read");

        let response: Response = serde_json::from_str(&response_line).expect("parse");
        assert!(!response.success);
        let error = response.error.expect("error");
        assert_eq!(error.code, ErrorCode::InvalidInput);
        daemon.stop();
    }

    #[tokio::test]
    async fn test_read_line_bounded_handles_utf8_chunks() {
        let data = "hello 你好\n".as_bytes().to_vec();
        let cursor = std::io::Cursor::new(data);
        let mut reader = BufReader::with_capacity(1, cursor);
        let mut buf = String::new();

        let bytes = read_line_bounded(&mut reader, &mut buf, 1024)
            .await
            .expect("read line");

        assert!(bytes > 0);
        assert_eq!(buf, "hello 你好\n");
    }
}
