//! Auto-Type sequences: the action model, the credential accessor and the
//! template compiler.

mod action;
mod compiler;
mod credential;

pub use action::{Action, CompiledSequence, SpecialKey};
pub use compiler::{compile, CompileError, DEFAULT_TEMPLATE};
pub use credential::{Credential, Entry, EntryPayload, ScopedPassword};
