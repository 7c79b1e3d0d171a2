//! The visor's line protocol.
//!
//! Commands go out as single ASCII lines (`MODE 3\n`, `FRAME 0 FF0000...\n`).
//! The device answers with status lines such as `PONG 12 UNLOCKED` or
//! `REMOTE_LOCKED`. Outbound commands that matter to the remote relay are
//! also classified into [`RemotePayload`]s.

use crate::Color;
use crate::codec::clean_hex_payload;
use serde::Serialize;
use std::fmt;

/// Frame slots map onto device modes starting here (`MODE 19` shows slot 0).
pub const CUSTOM_MODE_BASE: u16 = 19;

/// Frame data longer than this is abbreviated in relay previews.
pub const FRAME_PREVIEW_LIMIT: usize = 160;

/// A command the device understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Ping,
    Mode(u16),
    Text(String),
    Bright(u8),
    TextSpeed(u32),
    TextFx(u8),
    TextColor(Color),
    SwoopColor(Color, Color),
    Lyric(String),
    Pattern(String),
    /// Upload a hardware-ordered frame into a slot.
    Frame { slot: u8, hex: String },
    ShowFrame(u8),
    ClearFrame(u8),
}

impl Command {
    /// The mode that displays a custom frame slot.
    pub fn show_slot_mode(slot: u8) -> Self {
        Command::Mode(CUSTOM_MODE_BASE + slot as u16)
    }

    /// Wire form, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping => write!(f, "PING"),
            Command::Mode(mode) => write!(f, "MODE {mode}"),
            Command::Text(text) => write!(f, "TEXT {text}"),
            Command::Bright(value) => write!(f, "BRIGHT {value}"),
            Command::TextSpeed(speed) => write!(f, "TEXTSPEED {speed}"),
            Command::TextFx(effect) => write!(f, "TEXTFX {effect}"),
            Command::TextColor(color) => write!(f, "TEXTCOLOR {color}"),
            Command::SwoopColor(left, right) => write!(f, "SWOOPCOLOR {left} {right}"),
            Command::Lyric(text) => write!(f, "LYRIC {text}"),
            Command::Pattern(args) => write!(f, "PATTERN {args}"),
            Command::Frame { slot, hex } => write!(f, "FRAME {slot} {hex}"),
            Command::ShowFrame(slot) => write!(f, "SHOWFRAME {slot}"),
            Command::ClearFrame(slot) => write!(f, "CLEARFRAME {slot}"),
        }
    }
}

/// Commands that upload a frame to `slot` and switch the display to it.
pub fn frame_upload(slot: u8, hex: String) -> [Command; 2] {
    [Command::Frame { slot, hex }, Command::show_slot_mode(slot)]
}

// ── Remote relay payloads ────────────────────────────────────────────

/// What the remote relay is told about an outbound command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RemotePayload {
    FrameUpload {
        name: String,
        slot: String,
        #[serde(rename = "dataLength")]
        data_length: usize,
        #[serde(rename = "dataPreview")]
        data_preview: String,
        data: String,
    },
    FrameClear {
        name: String,
        slot: String,
    },
    Command {
        name: String,
        data: String,
    },
    /// Lock state or ping reply reported by the device itself.
    Telemetry {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    /// The device link came up or went away.
    Connection {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        transport: Option<String>,
    },
}

/// Commands relayed verbatim as `{type: "command"}`.
const RELAYED_COMMANDS: &[&str] = &[
    "MODE",
    "TEXT",
    "BRIGHT",
    "LYRIC",
    "SHOWFRAME",
    "TEXTSPEED",
    "TEXTFX",
    "PATTERN",
];

/// Classify an outbound command line for the remote relay.
///
/// Returns `None` for blank lines and commands the relay does not track.
pub fn classify_for_remote(line: &str) -> Option<RemotePayload> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let name = parts.first()?.to_ascii_uppercase();
    let slot = || parts.get(1).copied().unwrap_or("0").to_string();

    match name.as_str() {
        "FRAME" => {
            let data = clean_hex_payload(&parts.get(2..).unwrap_or_default().concat());
            Some(RemotePayload::FrameUpload {
                name,
                slot: slot(),
                data_length: data.len(),
                data_preview: frame_preview(&data),
                data,
            })
        }
        "CLEARFRAME" => Some(RemotePayload::FrameClear { name, slot: slot() }),
        "SWOOPCOLOR" => Some(RemotePayload::Command {
            data: parts.iter().skip(1).take(2).copied().collect::<Vec<_>>().join(" "),
            name,
        }),
        _ if RELAYED_COMMANDS.contains(&name.as_str()) => Some(RemotePayload::Command {
            data: parts[1..].join(" "),
            name,
        }),
        _ => None,
    }
}

fn frame_preview(data: &str) -> String {
    if data.len() > FRAME_PREVIEW_LIMIT {
        format!("{}… ({} chars)", &data[..FRAME_PREVIEW_LIMIT], data.len())
    } else {
        data.to_string()
    }
}

// ── Device lines ─────────────────────────────────────────────────────

/// A line received from the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    RemoteUnlockActive,
    RemoteUnlockExtended,
    RemoteLocked,
    Locked,
    /// Reply to `PING`; `unlocked` is `None` when the reply carries no lock state.
    Pong {
        sequence: String,
        unlocked: Option<bool>,
    },
    Other(String),
}

pub fn parse_device_line(line: &str) -> DeviceEvent {
    let line = line.trim();
    match line {
        "REMOTE_UNLOCK_ACTIVE" => DeviceEvent::RemoteUnlockActive,
        "REMOTE_UNLOCK_EXTENDED" => DeviceEvent::RemoteUnlockExtended,
        "REMOTE_LOCKED" => DeviceEvent::RemoteLocked,
        "LOCKED" => DeviceEvent::Locked,
        _ if line.starts_with("PONG ") => {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let unlocked = match parts.get(2).map(|s| s.to_ascii_uppercase()).as_deref() {
                Some("UNLOCKED") => Some(true),
                Some("LOCKED") => Some(false),
                _ => None,
            };
            DeviceEvent::Pong {
                sequence: parts.get(1).copied().unwrap_or_default().to_string(),
                unlocked,
            }
        }
        _ => DeviceEvent::Other(line.to_string()),
    }
}
