//! Key injection: executes a `CompiledSequence` against the OS input API.
//!
//! - macOS: `CGEvent` keyboard events (requires Accessibility permission)
//! - Windows: `SendInput`
//! - Other platforms: unsupported, every sequence fails up front

mod synth;
mod unsupported;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::sequence::CompiledSequence;

pub use synth::{KeySynth, SynthInjector};
pub use unsupported::UnsupportedInjector;

/// Errors raised while performing a sequence
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionError {
    /// Carries the text telling the user which setting to change
    #[error("input synthesis not permitted: {0}")]
    PermissionDenied(String),

    #[error("key injection is not supported on this platform")]
    UnsupportedPlatform,

    #[error("auto-type cancelled")]
    Cancelled,

    #[error("native input synthesis failed: {0}")]
    SynthesisFailed(String),
}

/// Capability set implemented once per OS
pub trait PlatformInjector: Send {
    /// Whether the OS lets this process synthesize input
    fn is_available(&self) -> bool;

    /// Force Shift, Control, Alt and Command into the up state
    fn release_modifiers(&mut self);

    /// Execute `sequence` synchronously.
    ///
    /// Sleeps `inter_action_delay` after every action. `cancel` is only
    /// consulted between actions.
    fn perform_sequence(
        &mut self,
        sequence: &CompiledSequence,
        inter_action_delay: Duration,
        cancel: &CancelToken,
    ) -> Result<(), InjectionError>;

    /// Message of the most recent failure, if any
    fn last_error(&self) -> Option<String>;
}

/// Shared flag asking a running sequence to stop at the next action boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Create the injector for the current platform
pub fn platform_injector() -> Box<dyn PlatformInjector> {
    #[cfg(target_os = "macos")]
    {
        Box::new(SynthInjector::new(macos::MacKeySynth::new()))
    }

    #[cfg(target_os = "windows")]
    {
        Box::new(SynthInjector::new(windows::WindowsKeySynth::new()))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Box::new(UnsupportedInjector::new())
    }
}
