use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::types::PlatformKind;

const DEFAULT_GUI_CLIENT: &str = "/Applications/Tailscale.app/Contents/MacOS/Tailscale";
const DEFAULT_DAEMON_HOME_PATH: &str = ".homebrew/bin/tailscaled";

/// Which operations go straight to the elevator instead of trying unprivileged first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElevationPolicy {
    pub up: bool,
    pub down: bool,
    pub status: bool,
    pub daemon_start: bool,
    pub daemon_stop: bool,
}

impl ElevationPolicy {
    pub fn for_platform(platform: PlatformKind) -> Self {
        let daemon = !matches!(platform, PlatformKind::Windows);
        Self {
            up: false,
            down: false,
            status: false,
            daemon_start: daemon,
            daemon_stop: daemon,
        }
    }
}

/// Settings for every component, loaded once and passed into constructors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Client CLI name (default: "tailscale")
    pub client_binary: String,
    /// Daemon name (default: "tailscaled")
    pub daemon_binary: String,
    /// macOS GUI client fallback (MAC_GUI_TAILSCALE_PATH)
    pub gui_client_path: PathBuf,
    /// Daemon location relative to the home directory (TAILSCALED_PATH)
    pub daemon_home_path: PathBuf,
    /// Arguments for a detached daemon launch
    pub daemon_args: Vec<String>,
    pub poll_interval_ms: u64,
    pub startup_timeout_ms: u64,
    /// Pause after the daemon first reports live
    pub settle_delay_ms: u64,
    pub command_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub resolve_attempts: u32,
    pub resolve_delay_ms: u64,
    /// Kill a standalone daemon after a successful `down`
    pub stop_daemon_on_disconnect: bool,
    pub sudo_prompt: String,
    /// Per-operation override; platform default when absent
    pub elevation: Option<ElevationPolicy>,
}

impl MeshConfig {
    /// Defaults, then the JSON config file, then environment overrides
    pub fn load() -> Result<Self> {
        Self::load_with(dirs::home_dir().as_deref(), |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(home: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = lookup("MESHLINK_CONFIG")
            .map(PathBuf::from)
            .or_else(|| home.map(|home| home.join(".meshlink").join("config.json")));

        let mut config = match file {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MAC_GUI_TAILSCALE_PATH") {
            self.gui_client_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TAILSCALED_PATH") {
            self.daemon_home_path = PathBuf::from(path);
        }
        override_from(lookup, "MESHLINK_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        override_from(lookup, "MESHLINK_STARTUP_TIMEOUT_MS", &mut self.startup_timeout_ms)?;
        override_from(lookup, "MESHLINK_COMMAND_TIMEOUT_SECS", &mut self.command_timeout_secs)?;
        override_from(lookup, "MESHLINK_STATUS_TIMEOUT_SECS", &mut self.status_timeout_secs)?;
        override_from(lookup, "MESHLINK_RESOLVE_ATTEMPTS", &mut self.resolve_attempts)?;
        override_from(lookup, "MESHLINK_RESOLVE_DELAY_MS", &mut self.resolve_delay_ms)?;
        override_from(lookup, "MESHLINK_STOP_DAEMON_ON_DISCONNECT", &mut self.stop_daemon_on_disconnect)?;
        Ok(())
    }

    pub fn elevation_for(&self, platform: PlatformKind) -> ElevationPolicy {
        self.elevation
            .unwrap_or_else(|| ElevationPolicy::for_platform(platform))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.resolve_delay_ms)
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            client_binary: "tailscale".to_string(),
            daemon_binary: "tailscaled".to_string(),
            gui_client_path: PathBuf::from(DEFAULT_GUI_CLIENT),
            daemon_home_path: PathBuf::from(DEFAULT_DAEMON_HOME_PATH),
            daemon_args: vec!["--state=mem:".to_string()],
            poll_interval_ms: 1500,
            startup_timeout_ms: 15_000,
            settle_delay_ms: 3000,
            command_timeout_secs: 60,
            status_timeout_secs: 5,
            resolve_attempts: 5,
            resolve_delay_ms: 1000,
            stop_daemon_on_disconnect: true,
            sudo_prompt: "Please enter your password to run Tailscale: ".to_string(),
            elevation: None,
        }
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}"))?;
    }
    Ok(())
}
