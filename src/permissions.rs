//! OS permission probes for input synthesis and global key observation

/// Remediation text shown when the OS refuses input access
#[cfg(target_os = "macos")]
pub const REMEDIATION: &str = "Auto-Type needs Accessibility permission. Grant it in System Settings > \
     Privacy & Security > Accessibility, then restart autotyped.";

#[cfg(target_os = "windows")]
pub const REMEDIATION: &str = "Auto-Type cannot send input to elevated windows. Run autotyped with the \
     same privileges as the target application.";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const REMEDIATION: &str = "Auto-Type is not available on this platform.";

/// Whether this process may synthesize input and observe global key events
pub fn input_access_granted() -> bool {
    #[cfg(target_os = "macos")]
    {
        unsafe { ffi::AXIsProcessTrusted() }
    }
    #[cfg(target_os = "windows")]
    {
        true
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        false
    }
}

#[cfg(target_os = "macos")]
mod ffi {
    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        pub fn AXIsProcessTrusted() -> bool;
    }
}
