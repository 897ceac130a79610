//! autotype: Auto-Type engine
//!
//! - `sequence`: template compiler producing a `CompiledSequence`
//! - `inject`: per-platform key synthesis of a sequence
//! - `hotkey`: system-wide hotkey registration and trigger delivery
//! - `engine`, `state`, `ipc`: the pieces the `autotyped` daemon is built from

pub mod config;
pub mod engine;
pub mod events;
pub mod hotkey;
pub mod inject;
#[cfg(unix)]
pub mod ipc;
pub mod keys;
pub mod lifecycle;
pub mod permissions;
pub mod sequence;
pub mod state;
