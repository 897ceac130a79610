//! State machine module for trigger handling
//!
//! Two states:
//! - Idle: waiting for the hotkey or an auto-type request
//! - Typing: a sequence is executing; further triggers are rejected

mod machine;

pub use machine::{Command, CommandError, Controller, State, StateMachine, StatusSnapshot};
