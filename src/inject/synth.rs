//! Sequence driver shared by every native backend
//!
//! Backends only know how to emit single key halves and Unicode
//! characters; ordering, Shift bracketing, delays, cancellation and
//! the permission precheck live here.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CancelToken, InjectionError, PlatformInjector};
use crate::keys::{CharKey, KeyCodeTable, NativeKeyCode};
use crate::permissions;
use crate::sequence::{Action, CompiledSequence, SpecialKey};

/// Low-level native keyboard synthesis
pub trait KeySynth: Send {
    /// Layout used to resolve keys and characters
    fn key_table(&self) -> &'static KeyCodeTable;

    /// Whether the OS currently allows synthesis
    fn is_trusted(&self) -> bool;

    /// Text telling the user how to grant the missing permission
    fn permission_hint(&self) -> &'static str {
        permissions::REMEDIATION
    }

    fn key_event(&mut self, code: NativeKeyCode, down: bool) -> Result<(), InjectionError>;

    /// Emit a character that has no key in the layout table
    fn unicode_char(&mut self, ch: char) -> Result<(), InjectionError>;
}

/// `PlatformInjector` built on a `KeySynth`
pub struct SynthInjector<S> {
    synth: S,
    last_error: Option<String>,
}

impl<S: KeySynth> SynthInjector<S> {
    pub fn new(synth: S) -> Self {
        Self {
            synth,
            last_error: None,
        }
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    fn special_code(&self, key: SpecialKey) -> Option<NativeKeyCode> {
        self.synth.key_table().special_key_code(key)
    }

    fn press(&mut self, code: NativeKeyCode) -> Result<(), InjectionError> {
        self.synth.key_event(code, true)?;
        self.synth.key_event(code, false)
    }

    fn type_char(&mut self, ch: char) -> Result<(), InjectionError> {
        let Some(CharKey { code, shift }) = self.synth.key_table().char_to_code(ch) else {
            if let Err(e) = self.synth.unicode_char(ch) {
                warn!(error = %e, "unicode fallback failed, character skipped");
            }
            return Ok(());
        };

        let shift_code = if shift {
            self.special_code(SpecialKey::Shift)
        } else {
            None
        };

        if let Some(shift_code) = shift_code {
            self.synth.key_event(shift_code, true)?;
        }
        let result = self.press(code);
        if let Some(shift_code) = shift_code {
            self.synth.key_event(shift_code, false)?;
        }
        result
    }

    fn execute(&mut self, action: &Action) -> Result<(), InjectionError> {
        match action {
            Action::Text(text) => {
                let mut prev = None;
                for ch in text.chars() {
                    // CRLF is one line break
                    if !(ch == '\n' && prev == Some('\r')) {
                        self.type_char(ch)?;
                    }
                    prev = Some(ch);
                }
                Ok(())
            }
            Action::KeyPress(key) => match self.special_code(*key) {
                Some(code) => self.press(code),
                None => {
                    debug!(%key, "no native code for key, skipped");
                    Ok(())
                }
            },
            Action::KeyDown(key) | Action::KeyUp(key) => {
                let down = matches!(action, Action::KeyDown(_));
                match self.special_code(*key) {
                    Some(code) => self.synth.key_event(code, down),
                    None => {
                        debug!(%key, "no native code for key, skipped");
                        Ok(())
                    }
                }
            }
            Action::Delay(ms) => {
                thread::sleep(Duration::from_millis(*ms));
                Ok(())
            }
        }
    }

    fn run(
        &mut self,
        sequence: &CompiledSequence,
        inter_action_delay: Duration,
        cancel: &CancelToken,
    ) -> Result<(), InjectionError> {
        for action in sequence {
            if cancel.is_cancelled() {
                return Err(InjectionError::Cancelled);
            }
            self.execute(action)?;
            if !inter_action_delay.is_zero() {
                thread::sleep(inter_action_delay);
            }
        }
        Ok(())
    }
}

impl<S: KeySynth> PlatformInjector for SynthInjector<S> {
    fn is_available(&self) -> bool {
        self.synth.is_trusted()
    }

    fn release_modifiers(&mut self) {
        for key in SpecialKey::MODIFIERS {
            if let Some(code) = self.special_code(key) {
                if let Err(e) = self.synth.key_event(code, false) {
                    warn!(%key, error = %e, "failed to release modifier");
                }
            }
        }
    }

    fn perform_sequence(
        &mut self,
        sequence: &CompiledSequence,
        inter_action_delay: Duration,
        cancel: &CancelToken,
    ) -> Result<(), InjectionError> {
        self.last_error = None;

        if !self.is_available() {
            let err = InjectionError::PermissionDenied(self.synth.permission_hint().to_string());
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.release_modifiers();

        info!(actions = sequence.len(), "performing auto-type sequence");
        let result = self.run(sequence, inter_action_delay, cancel);

        // A KeyDown without its KeyUp must not outlive the sequence
        self.release_modifiers();

        if let Err(e) = &result {
            warn!(error = %e, "auto-type sequence aborted");
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keys::WINDOWS_US;
    use std::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum SynthEvent {
        Down(NativeKeyCode),
        Up(NativeKeyCode),
        Unicode(char),
    }

    /// Records every native call instead of touching the OS
    #[derive(Default)]
    pub(crate) struct RecordingSynth {
        pub events: Vec<SynthEvent>,
        pub untrusted: bool,
        pub fail_unicode: bool,
        /// Cancel this token once `events.len()` reaches the given count
        pub cancel_after: Option<(usize, CancelToken)>,
    }

    impl KeySynth for RecordingSynth {
        fn key_table(&self) -> &'static KeyCodeTable {
            &WINDOWS_US
        }

        fn is_trusted(&self) -> bool {
            !self.untrusted
        }

        fn key_event(&mut self, code: NativeKeyCode, down: bool) -> Result<(), InjectionError> {
            self.events.push(if down {
                SynthEvent::Down(code)
            } else {
                SynthEvent::Up(code)
            });
            if let Some((count, token)) = &self.cancel_after {
                if self.events.len() >= *count {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn unicode_char(&mut self, ch: char) -> Result<(), InjectionError> {
            if self.fail_unicode {
                return Err(InjectionError::SynthesisFailed("no unicode".into()));
            }
            self.events.push(SynthEvent::Unicode(ch));
            Ok(())
        }
    }

    const SHIFT: NativeKeyCode = 0x10;
    const TAB: NativeKeyCode = 0x09;

    fn sequence(actions: Vec<Action>) -> CompiledSequence {
        actions.into_iter().collect()
    }

    /// Events after the leading modifier release, minus the trailing one
    fn body(events: &[SynthEvent]) -> &[SynthEvent] {
        let n = SpecialKey::MODIFIERS.len();
        &events[n..events.len() - n]
    }

    fn perform(
        injector: &mut SynthInjector<RecordingSynth>,
        actions: Vec<Action>,
    ) -> Result<(), InjectionError> {
        injector.perform_sequence(&sequence(actions), Duration::ZERO, &CancelToken::new())
    }

    #[test]
    fn test_permission_precheck_sends_nothing() {
        let mut injector = SynthInjector::new(RecordingSynth {
            untrusted: true,
            ..Default::default()
        });
        let result = perform(&mut injector, vec![Action::Text("abc".into())]);
        assert!(matches!(result, Err(InjectionError::PermissionDenied(_))));
        assert!(injector.synth().events.is_empty());
        assert!(injector.last_error().is_some());
    }

    #[test]
    fn test_modifiers_released_first() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        perform(&mut injector, vec![Action::KeyPress(SpecialKey::Tab)]).unwrap();
        let events = &injector.synth().events;
        assert_eq!(
            &events[..4],
            &[
                SynthEvent::Up(0x10),
                SynthEvent::Up(0x11),
                SynthEvent::Up(0x12),
                SynthEvent::Up(0x5B),
            ]
        );
        assert_eq!(body(events), &[SynthEvent::Down(TAB), SynthEvent::Up(TAB)]);
        assert_eq!(injector.last_error(), None);
    }

    #[test]
    fn test_shift_bracketing() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        perform(&mut injector, vec![Action::Text("aB".into())]).unwrap();
        assert_eq!(
            body(&injector.synth().events),
            &[
                SynthEvent::Down(0x41),
                SynthEvent::Up(0x41),
                SynthEvent::Down(SHIFT),
                SynthEvent::Down(0x42),
                SynthEvent::Up(0x42),
                SynthEvent::Up(SHIFT),
            ]
        );
    }

    #[test]
    fn test_unicode_fallback() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        perform(&mut injector, vec![Action::Text("é1".into())]).unwrap();
        assert_eq!(
            body(&injector.synth().events),
            &[
                SynthEvent::Unicode('é'),
                SynthEvent::Down(0x31),
                SynthEvent::Up(0x31),
            ]
        );
    }

    #[test]
    fn test_unicode_failure_does_not_abort() {
        let mut injector = SynthInjector::new(RecordingSynth {
            fail_unicode: true,
            ..Default::default()
        });
        perform(&mut injector, vec![Action::Text("ж1".into())]).unwrap();
        assert_eq!(
            body(&injector.synth().events),
            &[SynthEvent::Down(0x31), SynthEvent::Up(0x31)]
        );
    }

    #[test]
    fn test_crlf_presses_enter_once() {
        const ENTER: NativeKeyCode = 0x0D;
        let mut injector = SynthInjector::new(RecordingSynth::default());
        perform(&mut injector, vec![Action::Text("a\r\nb\n\rc".into())]).unwrap();
        let enters = body(&injector.synth().events)
            .iter()
            .filter(|e| **e == SynthEvent::Down(ENTER))
            .count();
        // "\r\n" is one break, "\n\r" is two
        assert_eq!(enters, 3);
        assert_eq!(
            &body(&injector.synth().events)[..4],
            &[
                SynthEvent::Down(0x41),
                SynthEvent::Up(0x41),
                SynthEvent::Down(ENTER),
                SynthEvent::Up(ENTER),
            ]
        );
    }

    #[test]
    fn test_key_down_up_halves() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        perform(
            &mut injector,
            vec![
                Action::KeyDown(SpecialKey::Control),
                Action::Text("v".into()),
                Action::KeyUp(SpecialKey::Control),
            ],
        )
        .unwrap();
        assert_eq!(
            body(&injector.synth().events),
            &[
                SynthEvent::Down(0x11),
                SynthEvent::Down(0x56),
                SynthEvent::Up(0x56),
                SynthEvent::Up(0x11),
            ]
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        let token = CancelToken::new();
        token.cancel();
        let result = injector.perform_sequence(
            &sequence(vec![Action::Text("abc".into())]),
            Duration::ZERO,
            &token,
        );
        assert_eq!(result, Err(InjectionError::Cancelled));
        assert!(body(&injector.synth().events).is_empty());
        assert_eq!(injector.last_error(), Some("auto-type cancelled".into()));
    }

    #[test]
    fn test_cancel_waits_for_action_boundary() {
        let token = CancelToken::new();
        // 4 modifier releases, then cancel as soon as the first key goes down
        let mut injector = SynthInjector::new(RecordingSynth {
            cancel_after: Some((5, token.clone())),
            ..Default::default()
        });
        let result = injector.perform_sequence(
            &sequence(vec![
                Action::Text("ab".into()),
                Action::KeyPress(SpecialKey::Tab),
            ]),
            Duration::ZERO,
            &token,
        );
        assert_eq!(result, Err(InjectionError::Cancelled));
        // The whole first action ran, down/up pairs stay balanced
        assert_eq!(
            body(&injector.synth().events),
            &[
                SynthEvent::Down(0x41),
                SynthEvent::Up(0x41),
                SynthEvent::Down(0x42),
                SynthEvent::Up(0x42),
            ]
        );
    }

    #[test]
    fn test_inter_action_delay_applies_to_every_action() {
        let mut injector = SynthInjector::new(RecordingSynth::default());
        let start = Instant::now();
        injector
            .perform_sequence(
                &sequence(vec![
                    Action::KeyPress(SpecialKey::Tab),
                    Action::Delay(10),
                    Action::KeyPress(SpecialKey::Tab),
                ]),
                Duration::from_millis(15),
                &CancelToken::new(),
            )
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
