//! Events broadcast by the state machine
//!
//! Observers (IPC subscribers, logs) receive these; none of them carry
//! credential material.

use serde::{Deserialize, Serialize};

/// Events emitted as hotkeys fire and sequences run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoTypeEvent {
    /// A global hotkey is now active
    HotkeyRegistered { hotkey: String },

    /// The global hotkey was released
    HotkeyUnregistered,

    /// The registered chord was pressed
    HotkeyTriggered,

    /// The OS disabled the listener and it was turned back on
    ListenerRestarted,

    /// A trigger arrived while it could not be served
    TriggerRejected { reason: String },

    /// A sequence began executing
    SequenceStarted {
        /// Number of compiled actions
        actions: usize,
    },

    /// A sequence ran to completion
    SequenceFinished {
        actions: usize,
        /// Wall-clock time spent typing
        duration_ms: u64,
    },

    /// Compilation or injection failed, or the run was cancelled
    SequenceFailed { error: String },
}

impl std::fmt::Display for AutoTypeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoTypeEvent::HotkeyRegistered { hotkey } => {
                write!(f, "HOTKEY_REGISTERED ({})", hotkey)
            }
            AutoTypeEvent::HotkeyUnregistered => write!(f, "HOTKEY_UNREGISTERED"),
            AutoTypeEvent::HotkeyTriggered => write!(f, "HOTKEY_TRIGGERED"),
            AutoTypeEvent::ListenerRestarted => write!(f, "LISTENER_RESTARTED"),
            AutoTypeEvent::TriggerRejected { reason } => {
                write!(f, "TRIGGER_REJECTED ({})", reason)
            }
            AutoTypeEvent::SequenceStarted { actions } => {
                write!(f, "SEQUENCE_STARTED ({} actions)", actions)
            }
            AutoTypeEvent::SequenceFinished {
                actions,
                duration_ms,
            } => {
                write!(f, "SEQUENCE_FINISHED ({} actions, {}ms)", actions, duration_ms)
            }
            AutoTypeEvent::SequenceFailed { error } => write!(f, "SEQUENCE_FAILED ({})", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AutoTypeEvent::SequenceFinished {
            actions: 4,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("sequence_finished"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"hotkey_registered","hotkey":"Ctrl+Alt+A"}"#;
        let event: AutoTypeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AutoTypeEvent::HotkeyRegistered {
                hotkey: "Ctrl+Alt+A".into()
            }
        );
    }

    #[test]
    fn test_display() {
        let event = AutoTypeEvent::TriggerRejected {
            reason: "busy".into(),
        };
        assert_eq!(event.to_string(), "TRIGGER_REJECTED (busy)");
    }
}
