//! IPC (Inter-Process Communication) via Unix sockets
//!
//! Provides message-based communication between the CLI and the daemon.
//! Uses length-prefixed JSON over Unix domain sockets.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

mod messages;
pub use messages::{PresetRequest, PresetResponse};

use crate::constants::{ipc::MAX_MESSAGE_SIZE, paths};

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(paths::APP_DIR).join(paths::SOCKET_FILE));
    }

    // Fallback to cache dir
    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(paths::APP_DIR).join(paths::SOCKET_FILE))
}

/// Client connection to the daemon
pub struct PresetClient {
    pub(crate) stream: UnixStream,
}

impl PresetClient {
    /// Connect to specific socket path
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("Failed to connect to daemon at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send_request(&mut self, req: &PresetRequest) -> Result<()> {
        write_message(&mut self.stream, req)
    }

    /// Receive response (blocking)
    pub fn recv_response(&mut self) -> Result<PresetResponse> {
        read_message(&mut self.stream)
    }

    /// Send request and wait for response (convenience method)
    pub fn request(&mut self, req: PresetRequest) -> Result<PresetResponse> {
        self.send_request(&req)?;
        self.recv_response()
    }

    /// Daemon side: next request from this client (blocking)
    pub fn recv_request(&mut self) -> Result<PresetRequest> {
        read_message(&mut self.stream)
    }

    /// Daemon side: reply to this client
    pub fn send_response(&mut self, resp: &PresetResponse) -> Result<()> {
        write_message(&mut self.stream, resp)
    }
}

/// Server listener for the daemon
pub struct PresetServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl PresetServer {
    /// Create server and bind to specific socket path
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        // Create directory if needed
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Refuse to steal the socket from a live daemon
        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                return Err(anyhow!("A daemon is already listening on {}", socket_path.display()));
            }
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &socket_path,
                std::fs::Permissions::from_mode(crate::constants::ipc::SOCKET_MODE),
            )
            .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<PresetClient> {
        let (stream, _addr) = self.listener.accept()
            .context("Failed to accept IPC connection")?;
        Ok(PresetClient { stream })
    }

    /// Get socket path
    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for PresetServer {
    fn drop(&mut self) {
        // Clean up socket file
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write length-prefixed message to stream
fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;

    // Write JSON payload
    stream
        .write_all(&json)
        .context("Failed to write message payload")?;

    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
fn read_message<R: Read, T: for<'de> Deserialize<'de>>(stream: &mut R) -> Result<T> {
    // Read length prefix
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    // Read JSON payload
    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    // Deserialize
    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
