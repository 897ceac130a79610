//! Auto-Type context object
//!
//! Owns the platform injector and enforces at most one in-flight sequence.
//! Constructed by the daemon at startup and shared by handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::inject::{CancelToken, InjectionError, PlatformInjector};
use crate::sequence::{compile, CompileError, CompiledSequence, Credential, DEFAULT_TEMPLATE};

/// Errors from a full compile-and-type request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutoTypeError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Injection(#[from] InjectionError),

    #[error("another auto-type sequence is already running")]
    Busy,
}

/// Tunables applied to every sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTypeOptions {
    /// Sleep after every action
    pub inter_action_delay: Duration,
    /// Template used when the caller does not supply one
    pub default_template: String,
}

impl Default for AutoTypeOptions {
    fn default() -> Self {
        Self {
            inter_action_delay: Duration::from_millis(10),
            default_template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

pub struct AutoType {
    injector: Mutex<Box<dyn PlatformInjector>>,
    options: AutoTypeOptions,
    /// Token of the sequence in flight
    current: Mutex<Option<CancelToken>>,
    busy: AtomicBool,
    last_error: Mutex<Option<String>>,
}

/// Clears the busy flag however the run ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AutoType {
    pub fn new(injector: Box<dyn PlatformInjector>, options: AutoTypeOptions) -> Self {
        Self {
            injector: Mutex::new(injector),
            options,
            current: Mutex::new(None),
            busy: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &AutoTypeOptions {
        &self.options
    }

    /// Compile `template`, or the configured default, against `credential`
    pub fn compile(
        &self,
        template: Option<&str>,
        credential: &dyn Credential,
    ) -> Result<CompiledSequence, CompileError> {
        let template = template.unwrap_or(&self.options.default_template);
        compile(template, Some(credential))
    }

    /// Run `sequence`, waiting for any running sequence to finish first
    pub fn perform(&self, sequence: &CompiledSequence) -> Result<(), AutoTypeError> {
        let injector = self.injector.lock().unwrap_or_else(PoisonError::into_inner);
        self.run(injector, sequence, CancelToken::new())
    }

    /// Run `sequence` unless another one is in flight
    pub fn try_perform(&self, sequence: &CompiledSequence) -> Result<(), AutoTypeError> {
        self.try_perform_with(sequence, CancelToken::new())
    }

    /// Like `try_perform`, stopped through a token the caller already holds.
    /// A token cancelled before the run starts types nothing.
    pub fn try_perform_with(
        &self,
        sequence: &CompiledSequence,
        cancel: CancelToken,
    ) -> Result<(), AutoTypeError> {
        let injector = match self.injector.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("auto-type rejected, sequence in flight");
                return Err(AutoTypeError::Busy);
            }
        };
        self.run(injector, sequence, cancel)
    }

    /// Compile and type in one step. Returns the number of actions sent.
    pub fn type_credential(
        &self,
        template: Option<&str>,
        credential: &dyn Credential,
    ) -> Result<usize, AutoTypeError> {
        let sequence = self.compile(template, credential).map_err(|e| {
            warn!(error = %e, "auto-type template rejected");
            self.set_last_error(Some(e.to_string()));
            e
        })?;
        self.try_perform(&sequence)?;
        Ok(sequence.len())
    }

    /// Stop the running sequence at the next action boundary
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.as_ref() {
            info!("auto-type cancellation requested");
            token.cancel();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_available(&self) -> bool {
        match self.injector.try_lock() {
            Ok(injector) => injector.is_available(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_available(),
            // Typing right now, so synthesis was permitted
            Err(TryLockError::WouldBlock) => true,
        }
    }

    /// Message of the most recent failed request
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    fn run(
        &self,
        mut injector: MutexGuard<'_, Box<dyn PlatformInjector>>,
        sequence: &CompiledSequence,
        cancel: CancelToken,
    ) -> Result<(), AutoTypeError> {
        self.busy.store(true, Ordering::SeqCst);
        let _busy = BusyGuard(&self.busy);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let result =
            injector.perform_sequence(sequence, self.options.inter_action_delay, &cancel);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.set_last_error(injector.last_error());
        result.map_err(AutoTypeError::from)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inject::UnsupportedInjector;
    use crate::sequence::{Action, Entry, SpecialKey};
    use std::sync::mpsc as std_mpsc;
    use std::sync::Arc;
    use std::thread;

    /// Injector double that records every action it is asked to run
    #[derive(Default)]
    pub(crate) struct RecordingInjector {
        pub log: Arc<Mutex<Vec<String>>>,
        pub step: Duration,
        pub unavailable: bool,
        /// Signalled on entry; the run then waits for `release`
        pub gate: Option<(std_mpsc::Sender<()>, std_mpsc::Receiver<()>)>,
        pub last_error: Option<String>,
    }

    impl PlatformInjector for RecordingInjector {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn release_modifiers(&mut self) {}

        fn perform_sequence(
            &mut self,
            sequence: &CompiledSequence,
            _inter_action_delay: Duration,
            cancel: &CancelToken,
        ) -> Result<(), InjectionError> {
            self.last_error = None;
            if self.unavailable {
                self.last_error = Some("denied".into());
                return Err(InjectionError::PermissionDenied("denied".into()));
            }
            if let Some((started, release)) = &self.gate {
                let _ = started.send(());
                let _ = release.recv();
            }
            for action in sequence {
                if cancel.is_cancelled() {
                    self.last_error = Some(InjectionError::Cancelled.to_string());
                    return Err(InjectionError::Cancelled);
                }
                let record = match action {
                    Action::Text(text) => text.clone(),
                    other => format!("{:?}", other),
                };
                self.log.lock().unwrap().push(record);
                thread::sleep(self.step);
            }
            Ok(())
        }

        fn last_error(&self) -> Option<String> {
            self.last_error.clone()
        }
    }

    fn text_sequence(parts: &[&str]) -> CompiledSequence {
        parts.iter().map(|p| Action::Text(p.to_string())).collect()
    }

    #[test]
    fn test_concurrent_sequences_do_not_interleave() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let injector = RecordingInjector {
            log: Arc::clone(&log),
            step: Duration::from_millis(5),
            ..Default::default()
        };
        let engine = Arc::new(AutoType::new(Box::new(injector), AutoTypeOptions::default()));

        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|tag| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let parts: Vec<String> = (0..4).map(|i| format!("{tag}{i}")).collect();
                    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
                    engine.perform(&text_sequence(&refs))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 8);
        let first = &log[0][..1];
        assert!(log[..4].iter().all(|r| r.starts_with(first)));
        assert!(log[4..].iter().all(|r| !r.starts_with(first)));
    }

    #[test]
    fn test_try_perform_busy_while_running() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let injector = RecordingInjector {
            gate: Some((started_tx, release_rx)),
            ..Default::default()
        };
        let engine = Arc::new(AutoType::new(Box::new(injector), AutoTypeOptions::default()));

        let runner = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.perform(&text_sequence(&["x"])))
        };
        started_rx.recv().unwrap();

        assert!(engine.is_busy());
        assert_eq!(
            engine.try_perform(&text_sequence(&["y"])),
            Err(AutoTypeError::Busy)
        );

        release_tx.send(()).unwrap();
        runner.join().unwrap().unwrap();
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_cancel_during_run() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let injector = RecordingInjector {
            log: Arc::clone(&log),
            gate: Some((started_tx, release_rx)),
            ..Default::default()
        };
        let engine = Arc::new(AutoType::new(Box::new(injector), AutoTypeOptions::default()));

        let runner = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.perform(&text_sequence(&["x", "y"])))
        };
        started_rx.recv().unwrap();
        engine.cancel();
        release_tx.send(()).unwrap();

        let result = runner.join().unwrap();
        assert_eq!(result, Err(AutoTypeError::Injection(InjectionError::Cancelled)));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(engine.last_error(), Some("auto-type cancelled".into()));

        // A fresh run is not affected by the earlier cancellation
        let engine = AutoType::new(
            Box::new(RecordingInjector::default()),
            AutoTypeOptions::default(),
        );
        engine.cancel();
        assert!(engine.perform(&text_sequence(&["z"])).is_ok());
    }

    #[test]
    fn test_token_cancelled_before_run_types_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = AutoType::new(
            Box::new(RecordingInjector {
                log: Arc::clone(&log),
                ..Default::default()
            }),
            AutoTypeOptions::default(),
        );
        let token = CancelToken::new();
        token.cancel();

        let result = engine.try_perform_with(&text_sequence(&["x", "y"]), token);
        assert_eq!(result, Err(AutoTypeError::Injection(InjectionError::Cancelled)));
        assert!(log.lock().unwrap().is_empty());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_type_credential_uses_default_template() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = AutoType::new(
            Box::new(RecordingInjector {
                log: Arc::clone(&log),
                ..Default::default()
            }),
            AutoTypeOptions::default(),
        );
        let entry = Entry::new("alice", "secret");

        assert_eq!(engine.type_credential(None, &entry), Ok(4));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "alice".to_string(),
                format!("{:?}", Action::KeyPress(SpecialKey::Tab)),
                "secret".to_string(),
                format!("{:?}", Action::KeyPress(SpecialKey::Enter)),
            ]
        );
    }

    #[test]
    fn test_type_credential_compile_error() {
        let engine = AutoType::new(
            Box::new(RecordingInjector::default()),
            AutoTypeOptions::default(),
        );
        let entry = Entry::new("alice", "secret");
        let err = engine.type_credential(Some("{NOPE}"), &entry).unwrap_err();
        assert_eq!(
            err,
            AutoTypeError::Compile(CompileError::UnknownPlaceholder("NOPE".into()))
        );
        assert!(engine.last_error().is_some());
    }

    #[test]
    fn test_permission_failure_reported() {
        let engine = AutoType::new(
            Box::new(RecordingInjector {
                unavailable: true,
                ..Default::default()
            }),
            AutoTypeOptions::default(),
        );
        assert!(!engine.is_available());
        let result = engine.perform(&text_sequence(&["x"]));
        assert!(matches!(
            result,
            Err(AutoTypeError::Injection(InjectionError::PermissionDenied(_)))
        ));
        assert_eq!(engine.last_error(), Some("denied".into()));
    }

    #[test]
    fn test_unsupported_platform_injector() {
        let engine = AutoType::new(
            Box::new(UnsupportedInjector::new()),
            AutoTypeOptions::default(),
        );
        assert_eq!(
            engine.perform(&CompiledSequence::new()),
            Err(AutoTypeError::Injection(InjectionError::UnsupportedPlatform))
        );
    }
}
