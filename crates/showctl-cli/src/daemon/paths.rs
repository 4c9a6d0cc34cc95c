//! Socket and PID file path resolution.
//!
//! Priority for socket directory:
//! 1. `SHOWCTL_SOCKET_DIR` (explicit override)
//! 2. `XDG_RUNTIME_DIR/showctl` (Linux standard)
//! 3. `~/.showctl` (home directory fallback)
//! 4. System temp dir (last resort)

use std::env;
use std::path::PathBuf;

/// Get socket directory with priority fallback.
///
/// Priority:
/// 1. `SHOWCTL_SOCKET_DIR` (explicit override, ignores empty string)
/// 2. `XDG_RUNTIME_DIR/showctl` (Linux standard, ignores empty string)
/// 3. `~/.showctl` (home directory fallback)
/// 4. System temp dir (last resort)
pub fn get_socket_dir() -> PathBuf {
    // 1. Explicit override (ignore empty)
    if let Ok(dir) = env::var("SHOWCTL_SOCKET_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    // 2. XDG_RUNTIME_DIR (Linux standard, ignore empty)
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join("showctl");
        }
    }

    // 3. Home directory fallback
    if let Some(home) = dirs::home_dir() {
        return home.join(".showctl");
    }

    // 4. Last resort: temp dir
    env::temp_dir().join("showctl")
}

/// Socket path of the daemon. One daemon per user: the studio application
/// itself is a singleton, so there is nothing to multiplex.
pub fn get_socket_path() -> PathBuf {
    get_socket_dir().join("daemon.sock")
}

/// PID file path of the daemon.
pub fn get_pid_path() -> PathBuf {
    get_socket_dir().join("daemon.pid")
}

/// Ensure socket directory exists with secure permissions (0700 on Unix).
pub fn ensure_socket_dir() -> std::io::Result<()> {
    let dir = get_socket_dir();
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}
