//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::AutoTypeEvent;
use crate::sequence::EntryPayload;
use crate::state::{State, StatusSnapshot};

/// Requests from a client to the daemon
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Type an entry now; without `entry` the armed one is used
    AutoType {
        #[serde(default)]
        entry: Option<EntryPayload>,
        #[serde(default)]
        template: Option<String>,
    },

    /// Remember an entry for the hotkey to type
    Arm {
        entry: EntryPayload,
        #[serde(default)]
        template: Option<String>,
    },

    /// Forget the armed entry
    Disarm,

    /// Register (or replace) the global hotkey, e.g. "Ctrl+Alt+A"
    RegisterHotkey { hotkey: String },

    UnregisterHotkey,

    /// Stop the running sequence at the next action boundary
    Cancel,

    /// Subscribe to event notifications
    Subscribe,
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Sequence finished typing
    Typed { actions: usize },

    Armed,

    Disarmed { was_armed: bool },

    HotkeyRegistered { hotkey: String },

    HotkeyUnregistered,

    Cancelled { was_running: bool },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: AutoTypeEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    pub state: State,

    /// Whether a global hotkey is registered
    pub hotkey_registered: bool,

    pub hotkey: Option<String>,

    /// Whether an entry is armed for the hotkey
    pub armed: bool,

    /// Whether the OS currently permits key injection
    pub injection_available: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn from_snapshot(snapshot: StatusSnapshot, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: snapshot.state,
            hotkey_registered: snapshot.hotkey.is_some(),
            hotkey: snapshot.hotkey,
            armed: snapshot.armed,
            injection_available: snapshot.injection_available,
            uptime_secs,
        }
    }
}
