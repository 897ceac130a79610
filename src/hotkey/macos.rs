//! Global hotkey listener using macOS CGEventTap
//!
//! Runs on a dedicated thread with its own CFRunLoop. The tap is active
//! (not listen-only) so a matching key-down can be swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{debug, error, info, warn};

use super::backend::{ActiveListener, HotkeyBackend, HotkeySignal};
use super::spec::{Modifiers, NativeHotkey};
use super::HotkeyError;
use crate::keys::{KeyCodeTable, NativeKeyCode, MAC_ANSI};
use crate::permissions;

/// How long the run loop sleeps before checking for stop/re-enable requests
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

pub struct MacHotkeyBackend {
    _private: (),
}

impl MacHotkeyBackend {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl HotkeyBackend for MacHotkeyBackend {
    fn key_table(&self) -> &'static KeyCodeTable {
        &MAC_ANSI
    }

    fn is_permitted(&self) -> bool {
        permissions::input_access_granted()
    }

    fn install(
        &mut self,
        target: NativeHotkey,
        signal: HotkeySignal,
    ) -> Result<Box<dyn ActiveListener>, HotkeyError> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");
                run_event_loop(target, signal, thread_running, ready_tx);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        // Tap creation happens on the listener thread; wait for its verdict
        let setup = ready_rx.recv().unwrap_or_else(|_| {
            Err(HotkeyError::TapCreationFailed(
                "listener thread exited during setup".to_string(),
            ))
        });

        match setup {
            Ok(()) => Ok(Box::new(MacListener {
                running,
                thread: Some(handle),
            })),
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }
}

struct MacListener {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ActiveListener for MacListener {
    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // The run loop notices within one slice
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MacListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Held modifiers, ignoring caps lock, fn and the numeric-pad flag
fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    if flags.contains(CGEventFlags::CGEventFlagShift) {
        modifiers |= Modifiers::SHIFT;
    }
    if flags.contains(CGEventFlags::CGEventFlagControl) {
        modifiers |= Modifiers::CONTROL;
    }
    if flags.contains(CGEventFlags::CGEventFlagAlternate) {
        modifiers |= Modifiers::ALT;
    }
    if flags.contains(CGEventFlags::CGEventFlagCommand) {
        modifiers |= Modifiers::COMMAND;
    }
    modifiers
}

/// What the tap does with one key-down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapVerdict {
    /// Not ours, deliver unchanged
    Pass,
    /// First press of the chord: notify, then drop
    Trigger,
    /// Auto-repeat of the chord: drop without notifying
    Swallow,
}

fn classify_key_down(
    target: &NativeHotkey,
    code: NativeKeyCode,
    held: Modifiers,
    from_self: bool,
    autorepeat: bool,
) -> TapVerdict {
    if from_self || !target.matches(code, held) {
        TapVerdict::Pass
    } else if autorepeat {
        TapVerdict::Swallow
    } else {
        TapVerdict::Trigger
    }
}

/// Drain pending disable notices; true if the tap needs re-enabling
fn take_reenable_request(rx: &std_mpsc::Receiver<()>) -> bool {
    let mut pending = false;
    while rx.try_recv().is_ok() {
        pending = true;
    }
    pending
}

/// Create the tap, report setup success, then pump the run loop until stopped
fn run_event_loop(
    target: NativeHotkey,
    signal: HotkeySignal,
    running: Arc<AtomicBool>,
    ready_tx: std_mpsc::Sender<Result<(), HotkeyError>>,
) {
    let (reenable_tx, reenable_rx) = std_mpsc::channel::<()>();
    let own_pid = i64::from(std::process::id());
    let callback_signal = signal.clone();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown => {
                let code =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as NativeKeyCode;
                let held = modifiers_from_flags(event.get_flags());
                let from_self =
                    event.get_integer_value_field(EventField::EVENT_SOURCE_UNIX_PROCESS_ID) == own_pid;
                let autorepeat =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0;

                match classify_key_down(&target, code, held, from_self, autorepeat) {
                    TapVerdict::Pass => return Some(event.clone()),
                    TapVerdict::Trigger => {
                        debug!(code, "hotkey matched");
                        callback_signal.triggered();
                    }
                    TapVerdict::Swallow => {}
                }
                // Returning None passes the original event through; a Null
                // event is what the window server discards
                event.set_type(CGEventType::Null);
                Some(event.clone())
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = reenable_tx.send(());
                Some(event.clone())
            }
            _ => Some(event.clone()),
        }
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![CGEventType::KeyDown],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready_tx.send(Err(HotkeyError::TapCreationFailed(
                "CGEventTapCreate returned null".to_string(),
            )));
            return;
        }
    };

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready_tx.send(Err(HotkeyError::TapCreationFailed(
                "failed to create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!(code = target.code, "event tap created and enabled");
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, RUN_LOOP_SLICE, true);
        }

        // The OS disables slow taps; turn it back on so the hotkey stays alive
        if take_reenable_request(&reenable_rx) {
            warn!("event tap disabled by the system, re-enabling");
            tap.enable();
            signal.listener_restarted();
        }
    }

    unsafe {
        run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    debug!("event tap released");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_ignore_caps_lock() {
        let flags = CGEventFlags::CGEventFlagControl | CGEventFlags::CGEventFlagAlphaShift;
        assert_eq!(modifiers_from_flags(flags), Modifiers::CONTROL);
    }

    fn ctrl_alt_a() -> NativeHotkey {
        NativeHotkey::new(0x00, Modifiers::CONTROL | Modifiers::ALT)
    }

    #[test]
    fn test_chord_press_triggers_and_repeat_is_swallowed() {
        let target = ctrl_alt_a();
        let held = Modifiers::CONTROL | Modifiers::ALT;
        assert_eq!(
            classify_key_down(&target, 0x00, held, false, false),
            TapVerdict::Trigger
        );
        assert_eq!(
            classify_key_down(&target, 0x00, held, false, true),
            TapVerdict::Swallow
        );
    }

    #[test]
    fn test_other_keys_and_own_events_pass() {
        let target = ctrl_alt_a();
        let held = Modifiers::CONTROL | Modifiers::ALT;
        assert_eq!(
            classify_key_down(&target, 0x0B, held, false, false),
            TapVerdict::Pass
        );
        assert_eq!(
            classify_key_down(&target, 0x00, Modifiers::CONTROL, false, false),
            TapVerdict::Pass
        );
        assert_eq!(
            classify_key_down(&target, 0x00, held, true, false),
            TapVerdict::Pass
        );
    }

    #[test]
    fn test_reenable_requests_coalesce() {
        let (tx, rx) = std_mpsc::channel();
        assert!(!take_reenable_request(&rx));
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        assert!(take_reenable_request(&rx));
        assert!(!take_reenable_request(&rx));
    }

    #[test]
    fn test_modifiers_all() {
        let flags = CGEventFlags::CGEventFlagShift
            | CGEventFlags::CGEventFlagControl
            | CGEventFlags::CGEventFlagAlternate
            | CGEventFlags::CGEventFlagCommand;
        assert_eq!(modifiers_from_flags(flags), Modifiers::all());
    }
}
