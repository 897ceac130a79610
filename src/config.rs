//! Configuration loading and management
//!
//! Defaults, then `<data_dir>/config.json`, then `AUTOTYPED_*` environment
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::engine::AutoTypeOptions;
use crate::hotkey::HotkeySpec;
use crate::sequence::DEFAULT_TEMPLATE;

const CONFIG_FILE: &str = "config.json";
const DEFAULT_DELAY_MS: u64 = 10;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Hotkey registered at startup, e.g. "Ctrl+Alt+A"
    pub hotkey: Option<String>,

    /// Template used when a request does not carry one
    pub default_template: String,

    /// Pause after every typed action
    pub inter_action_delay: Duration,
}

/// On-disk form; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    socket_path: Option<PathBuf>,
    hotkey: Option<String>,
    default_template: Option<String>,
    inter_action_delay_ms: Option<u64>,
}

impl Config {
    /// Load configuration from the default data directory and the process environment
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("neither HOME nor USERPROFILE is set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("autotyped");

        Self::load_from(&data_dir, |key| std::env::var(key).ok())
    }

    /// Load with an explicit data directory and environment lookup
    pub fn load_from(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self {
            socket_path: data_dir.join("daemon.sock"),
            data_dir: data_dir.to_owned(),
            hotkey: None,
            default_template: DEFAULT_TEMPLATE.to_string(),
            inter_action_delay: Duration::from_millis(DEFAULT_DELAY_MS),
        };

        let path = data_dir.join(CONFIG_FILE);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: FileConfig = serde_json::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            debug!(path = %path.display(), "config file loaded");
            config.apply_file(file);
        }

        if let Some(socket) = env("AUTOTYPED_SOCKET") {
            config.socket_path = PathBuf::from(socket);
        }
        if let Some(hotkey) = env("AUTOTYPED_HOTKEY") {
            config.hotkey = (!hotkey.trim().is_empty()).then_some(hotkey);
        }
        if let Some(delay) = env("AUTOTYPED_DELAY_MS") {
            let ms: u64 = delay
                .trim()
                .parse()
                .with_context(|| format!("AUTOTYPED_DELAY_MS is not a number: {:?}", delay))?;
            config.inter_action_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(socket_path) = file.socket_path {
            // Relative paths are taken from the data directory
            self.socket_path = self.data_dir.join(socket_path);
        }
        if file.hotkey.is_some() {
            self.hotkey = file.hotkey;
        }
        if let Some(template) = file.default_template {
            self.default_template = template;
        }
        if let Some(ms) = file.inter_action_delay_ms {
            self.inter_action_delay = Duration::from_millis(ms);
        }
    }

    /// Ensure data directory exists and only the owner can enter it.
    ///
    /// The socket is created there before it is chmod'ed, so the directory
    /// is what keeps other users out in between.
    pub fn ensure_dirs(&self) -> Result<()> {
        create_private_dir(&self.data_dir)
    }

    /// Parsed startup hotkey, if one is configured
    pub fn hotkey_spec(&self) -> Result<Option<HotkeySpec>> {
        self.hotkey
            .as_deref()
            .map(|raw| {
                HotkeySpec::parse(raw).with_context(|| format!("invalid hotkey {:?}", raw))
            })
            .transpose()
    }

    pub fn auto_type_options(&self) -> AutoTypeOptions {
        AutoTypeOptions {
            inter_action_delay: self.inter_action_delay,
            default_template: self.default_template.clone(),
        }
    }
}

/// `create_dir_all`, with the leaf restricted to mode 0700 on Unix
pub fn create_private_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        // Pre-existing directories keep their old mode otherwise
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to restrict {}", path.display()))?;
    }
    #[cfg(not(unix))]
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok(())
}
