//! Global hotkey listener using a Windows low-level keyboard hook
//!
//! The hook is installed on a dedicated thread that pumps messages; the
//! hook procedure runs on that same thread, so its state lives in a
//! thread-local.

use std::cell::RefCell;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PeekMessageW, PostThreadMessageW, SetWindowsHookExW,
    UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG, PM_NOREMOVE,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WM_USER,
};

use super::backend::{ActiveListener, HotkeyBackend, HotkeySignal};
use super::spec::{Modifiers, NativeHotkey};
use super::HotkeyError;
use crate::keys::{KeyCodeTable, NativeKeyCode, WINDOWS_US};
use crate::permissions;

struct HookContext {
    target: NativeHotkey,
    signal: HotkeySignal,
    /// Set between the matching key-down and its key-up
    target_down: bool,
}

thread_local! {
    static HOOK_CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

pub struct WindowsHotkeyBackend {
    _private: (),
}

impl WindowsHotkeyBackend {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl HotkeyBackend for WindowsHotkeyBackend {
    fn key_table(&self) -> &'static KeyCodeTable {
        &WINDOWS_US
    }

    fn is_permitted(&self) -> bool {
        permissions::input_access_granted()
    }

    fn install(
        &mut self,
        target: NativeHotkey,
        signal: HotkeySignal,
    ) -> Result<Box<dyn ActiveListener>, HotkeyError> {
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let handle = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");
                run_hook_loop(target, signal, ready_tx);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        let setup = ready_rx.recv().unwrap_or_else(|_| {
            Err(HotkeyError::TapCreationFailed(
                "listener thread exited during setup".to_string(),
            ))
        });

        match setup {
            Ok(thread_id) => Ok(Box::new(WindowsListener {
                thread_id,
                thread: Some(handle),
            })),
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }
}

struct WindowsListener {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl ActiveListener for WindowsListener {
    fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        let posted = unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            // Without WM_QUIT the thread never leaves GetMessageW
            error!(error = %e, "failed to stop hotkey listener thread");
            return;
        }
        let _ = handle.join();
    }
}

impl Drop for WindowsListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn key_held(vk: VIRTUAL_KEY) -> bool {
    (unsafe { GetAsyncKeyState(i32::from(vk.0)) } as u16 & 0x8000) != 0
}

fn held_modifiers() -> Modifiers {
    let mut modifiers = Modifiers::empty();
    if key_held(VK_SHIFT) {
        modifiers |= Modifiers::SHIFT;
    }
    if key_held(VK_CONTROL) {
        modifiers |= Modifiers::CONTROL;
    }
    if key_held(VK_MENU) {
        modifiers |= Modifiers::ALT;
    }
    if key_held(VK_LWIN) || key_held(VK_RWIN) {
        modifiers |= Modifiers::COMMAND;
    }
    modifiers
}

/// Hook procedure - must be fast and non-blocking
unsafe extern "system" fn keyboard_hook(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let message = wparam.0 as u32;
        let injected = (info.flags.0 & LLKHF_INJECTED.0) != 0;
        let vk = info.vkCode as NativeKeyCode;

        let swallow = !injected
            && HOOK_CONTEXT.with(|cell| {
                let mut slot = cell.borrow_mut();
                let Some(ctx) = slot.as_mut() else {
                    return false;
                };
                match message {
                    WM_KEYDOWN | WM_SYSKEYDOWN if ctx.target.matches(vk, held_modifiers()) => {
                        // Held keys repeat key-downs without a key-up in between
                        if !ctx.target_down {
                            ctx.target_down = true;
                            debug!(code = vk, "hotkey matched");
                            ctx.signal.triggered();
                        }
                        true
                    }
                    WM_KEYUP | WM_SYSKEYUP if vk == ctx.target.code && ctx.target_down => {
                        ctx.target_down = false;
                        true
                    }
                    _ => false,
                }
            });

        if swallow {
            return LRESULT(1);
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

/// Install the hook, report the thread id, then pump messages until WM_QUIT
fn run_hook_loop(
    target: NativeHotkey,
    signal: HotkeySignal,
    ready_tx: std_mpsc::Sender<Result<u32, HotkeyError>>,
) {
    HOOK_CONTEXT.with(|cell| {
        *cell.borrow_mut() = Some(HookContext {
            target,
            signal,
            target_down: false,
        });
    });

    let hook = unsafe {
        GetModuleHandleW(None).and_then(|module| {
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook), HINSTANCE(module.0), 0)
        })
    };
    let hook = match hook {
        Ok(hook) => hook,
        Err(e) => {
            error!(error = %e, "failed to install keyboard hook");
            let _ = ready_tx.send(Err(HotkeyError::TapCreationFailed(e.to_string())));
            return;
        }
    };

    let mut msg = MSG::default();
    let thread_id = unsafe {
        // Force creation of the message queue so WM_QUIT can be posted
        let _ = PeekMessageW(&mut msg, HWND::default(), WM_USER, WM_USER, PM_NOREMOVE);
        GetCurrentThreadId()
    };

    info!(code = target.code, "keyboard hook installed");
    let _ = ready_tx.send(Ok(thread_id));

    loop {
        let status = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        // 0 means WM_QUIT, -1 means failure
        if status.0 <= 0 {
            if status.0 < 0 {
                warn!("GetMessageW failed, stopping hotkey listener");
            }
            break;
        }
    }

    if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
        warn!(error = %e, "failed to remove keyboard hook");
    }
    HOOK_CONTEXT.with(|cell| cell.borrow_mut().take());
    debug!("keyboard hook released");
}
