//! Device thread: owns the transport and processes commands via a channel.
//!
//! The transport does blocking I/O, so it lives on its own thread. The
//! async HTTP server communicates with it by sending `DeviceCommand`
//! values through an `mpsc` channel, and reads back a shared
//! `DeviceStatus`.
//!
//! ## Rust concepts
//! - `std::sync::mpsc` channels with `recv_timeout()` to interleave
//!   commands and polling
//! - `Arc<Mutex<T>>` for shared mutable state
//! - `Instant` arithmetic for an expiring unlock window

use crate::protocol::{self, DeviceEvent, RemotePayload};
use crate::transport::Transport;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Device log is trimmed to this many bytes, keeping the newest lines.
pub const LOG_LIMIT: usize = 8000;

/// How long a hardware unlock lets remote commands through.
pub const REMOTE_UNLOCK_WINDOW: Duration = Duration::from_secs(20);

/// Oldest relay payloads are dropped once this many are waiting.
pub const REMOTE_QUEUE_LIMIT: usize = 24;

/// How often the transport is polled for incoming lines while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Payloads waiting for the remote relay to collect them.
pub type RemoteQueue = Arc<Mutex<VecDeque<RemotePayload>>>;

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent from the HTTP server to the device thread.
pub enum DeviceCommand {
    /// Send one protocol line (without trailing newline).
    Send(String),
    /// Stop the device thread.
    Shutdown,
}

// ── Status ───────────────────────────────────────────────────────────

/// Shared status that the HTTP server reads to report device state.
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct DeviceStatus {
    /// Whether the transport is currently usable
    pub connected: bool,
    /// Transport description (e.g. "serial:/dev/ttyACM0" or "none")
    pub transport: String,
    /// Commands are queued for the remote relay even without a device
    pub remote_only: bool,
    /// Whether the hardware unlock window is open
    pub remote_unlocked: bool,
    /// Sequence number of the last PONG received
    pub last_pong: Option<String>,
    /// Number of lines written to the device
    pub commands_sent: u64,
    /// Recent device log (newest last)
    pub log: String,
    /// Server version
    pub version: String,
}

impl DeviceStatus {
    pub fn new(transport: String, remote_only: bool) -> Self {
        Self {
            connected: false,
            transport,
            remote_only,
            remote_unlocked: false,
            last_pong: None,
            commands_sent: 0,
            log: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Append a line to the log, dropping the oldest text past `LOG_LIMIT`.
    pub fn append_log(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        self.log.push_str(line);
        self.log.push('\n');

        if self.log.len() > LOG_LIMIT {
            let mut cut = self.log.len() - LOG_LIMIT;
            while !self.log.is_char_boundary(cut) {
                cut += 1;
            }
            self.log.drain(..cut);
        }
    }
}

// ── Remote unlock window ─────────────────────────────────────────────

/// Tracks the time-limited remote-access window the device opens.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoteWindow {
    expires_at: Option<Instant>,
}

impl RemoteWindow {
    pub fn open(&mut self, now: Instant, duration: Duration) {
        self.expires_at = Some(now + duration.max(Duration::from_secs(1)));
    }

    pub fn close(&mut self) {
        self.expires_at = None;
    }

    /// Whether the window is open at `now`. Expired windows close themselves.
    pub fn is_open(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) if now <= expires_at => true,
            Some(_) => {
                self.expires_at = None;
                false
            }
            None => false,
        }
    }
}

// ── Device loop ──────────────────────────────────────────────────────

/// Everything the device thread needs besides its channel.
pub struct DeviceContext {
    pub status: Arc<Mutex<DeviceStatus>>,
    pub remote_queue: RemoteQueue,
}

/// Main device loop. Runs on a dedicated thread and owns the transport.
///
/// Returns when a `Shutdown` command arrives or the channel is closed.
/// Between commands the transport is polled for device lines.
pub fn device_loop(rx: Receiver<DeviceCommand>, mut transport: Box<dyn Transport>, ctx: DeviceContext) {
    let mut device = Device {
        window: RemoteWindow::default(),
        line_buffer: String::new(),
        was_connected: transport.is_ready(),
        ctx,
    };

    tracing::info!("Device thread started on {}", transport.describe());
    if device.was_connected {
        device.enqueue(RemotePayload::Connection {
            status: "connected".to_string(),
            transport: Some(transport.describe()),
        });
    }

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(DeviceCommand::Send(line)) => device.send(transport.as_mut(), &line),
            Ok(DeviceCommand::Shutdown) => {
                tracing::info!("Device thread: shutdown requested.");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("Device thread: channel closed, shutting down.");
                break;
            }
        }

        device.poll(transport.as_mut(), Instant::now());
    }
}

struct Device {
    window: RemoteWindow,
    line_buffer: String,
    /// Link state seen by the previous poll.
    was_connected: bool,
    ctx: DeviceContext,
}

impl Device {
    /// Write a command line and relay it. Blank lines are ignored.
    fn send(&mut self, transport: &mut dyn Transport, command: &str) {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return;
        }

        let remote_only = self.ctx.status.lock().unwrap().remote_only;

        if transport.is_ready() {
            let line = format!("{trimmed}\n");
            if let Err(e) = transport.send_bytes(line.as_bytes()) {
                tracing::error!("Send failed: {}", e);
                self.log(&format!("Send failed: {e}"));
                return;
            }
            tracing::debug!("-> {}", abbreviate(trimmed));
            self.ctx.status.lock().unwrap().commands_sent += 1;
        } else if remote_only {
            self.log(&format!("[remote] {}", abbreviate(trimmed)));
        } else {
            tracing::warn!("Not connected, dropping: {}", abbreviate(trimmed));
            self.log("Not connected");
            return;
        }

        if let Some(payload) = protocol::classify_for_remote(trimmed) {
            self.enqueue(payload);
        }
    }

    /// Drain incoming bytes, handle complete lines, refresh status.
    fn poll(&mut self, transport: &mut dyn Transport, now: Instant) {
        match transport.receive_bytes() {
            Ok(bytes) if !bytes.is_empty() => {
                self.line_buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(end) = self.line_buffer.find('\n') {
                    let line: String = self.line_buffer.drain(..=end).collect();
                    self.handle_line(line.trim_end_matches(['\r', '\n']), now);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Receive failed: {}", e),
        }

        let connected = transport.is_ready();
        if self.was_connected && !connected {
            tracing::warn!("Device link lost on {}", transport.describe());
            self.log("Disconnected");
            self.window.close();
            self.enqueue(RemotePayload::Connection {
                status: "disconnected".to_string(),
                transport: None,
            });
        }
        self.was_connected = connected;

        let open = self.window.is_open(now);
        let mut status = self.ctx.status.lock().unwrap();
        status.connected = connected;
        status.remote_unlocked = open;
    }

    fn handle_line(&mut self, line: &str, now: Instant) {
        if line.is_empty() {
            return;
        }
        self.log(line);

        match protocol::parse_device_line(line) {
            DeviceEvent::RemoteUnlockActive | DeviceEvent::RemoteUnlockExtended => {
                self.window.open(now, REMOTE_UNLOCK_WINDOW);
                tracing::info!("Remote command window active for 20 seconds.");
                self.relay_telemetry(line);
            }
            DeviceEvent::RemoteLocked => {
                self.window.close();
                tracing::info!("Remote commands blocked until the hardware unlock button is pressed.");
                self.relay_telemetry(line);
            }
            DeviceEvent::Locked => self.window.close(),
            DeviceEvent::Pong { sequence, unlocked } => {
                match unlocked {
                    Some(true) => self.window.open(now, REMOTE_UNLOCK_WINDOW),
                    Some(false) => self.window.close(),
                    None => {}
                }
                self.ctx.status.lock().unwrap().last_pong = Some(sequence);
                self.enqueue(RemotePayload::Telemetry {
                    name: "PING".to_string(),
                    data: Some(line.to_string()),
                });
            }
            DeviceEvent::Other(_) => {}
        }
    }

    fn relay_telemetry(&self, line: &str) {
        self.enqueue(RemotePayload::Telemetry {
            name: line.to_string(),
            data: None,
        });
    }

    /// Queue a payload for the relay, keeping only the newest `REMOTE_QUEUE_LIMIT`.
    fn enqueue(&self, payload: RemotePayload) {
        let mut queue = self.ctx.remote_queue.lock().unwrap();
        queue.push_back(payload);
        while queue.len() > REMOTE_QUEUE_LIMIT {
            queue.pop_front();
        }
    }

    fn log(&self, line: &str) {
        self.ctx.status.lock().unwrap().append_log(line);
    }
}

/// Shorten frame payloads for logs.
fn abbreviate(line: &str) -> String {
    const MAX: usize = 80;
    match line.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}… ({} chars)", &line[..cut], line.len()),
        None => line.to_string(),
    }
}
