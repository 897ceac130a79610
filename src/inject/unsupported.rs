//! Injector for platforms without a native backend.

use std::time::Duration;

use tracing::warn;

use super::{CancelToken, InjectionError, PlatformInjector};
use crate::sequence::CompiledSequence;

/// Reports `UnsupportedPlatform` for every sequence without sending input
#[derive(Debug, Default)]
pub struct UnsupportedInjector {
    last_error: Option<String>,
}

impl UnsupportedInjector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlatformInjector for UnsupportedInjector {
    fn is_available(&self) -> bool {
        false
    }

    fn release_modifiers(&mut self) {}

    fn perform_sequence(
        &mut self,
        sequence: &CompiledSequence,
        _inter_action_delay: Duration,
        _cancel: &CancelToken,
    ) -> Result<(), InjectionError> {
        warn!(
            actions = sequence.len(),
            "key injection unavailable on this platform"
        );
        let err = InjectionError::UnsupportedPlatform;
        self.last_error = Some(err.to_string());
        Err(err)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}
