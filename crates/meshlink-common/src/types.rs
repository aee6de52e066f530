use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConnectError;

/// Flag prefix whose value must never reach a log line.
const AUTH_KEY_FLAG: &str = "--authkey=";
const REDACTED: &str = "[redacted]";

/// Operating system family, resolved once at startup
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Linux,
    #[serde(rename = "macos")]
    MacOS,
    Windows,
}

impl PlatformKind {
    /// Platform of the running process. Other unix targets behave like Linux.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            PlatformKind::MacOS
        } else if cfg!(target_os = "windows") {
            PlatformKind::Windows
        } else {
            PlatformKind::Linux
        }
    }

    /// File name of an executable on this platform
    pub fn executable_name(&self, base: &str) -> String {
        match self {
            PlatformKind::Windows if !base.ends_with(".exe") => format!("{base}.exe"),
            _ => base.to_string(),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Linux => write!(f, "linux"),
            PlatformKind::MacOS => write!(f, "macos"),
            PlatformKind::Windows => write!(f, "windows"),
        }
    }
}

/// Where the client binary came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstallFlavor {
    /// Package-manager or manual install exposing both binaries
    #[default]
    Standalone,
    /// macOS app bundle; the app runs its own daemon
    GuiBundle,
    /// Windows install; the daemon is a system service
    WindowsService,
}

impl InstallFlavor {
    /// Whether the daemon lifecycle belongs to the vendor app or service
    pub fn manages_daemon(&self) -> bool {
        !matches!(self, InstallFlavor::Standalone)
    }
}

impl fmt::Display for InstallFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallFlavor::Standalone => write!(f, "standalone"),
            InstallFlavor::GuiBundle => write!(f, "gui bundle"),
            InstallFlavor::WindowsService => write!(f, "windows service"),
        }
    }
}

/// Resolved locations of the client CLI and the daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryPaths {
    pub client: Option<PathBuf>,
    pub daemon: Option<PathBuf>,
    pub flavor: InstallFlavor,
}

impl BinaryPaths {
    /// Nothing found
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Option<&Path> {
        self.client.as_deref()
    }

    pub fn daemon(&self) -> Option<&Path> {
        self.daemon.as_deref()
    }

    /// True when everything needed to drive this install was found
    pub fn is_complete(&self) -> bool {
        self.client.is_some() && (self.daemon.is_some() || self.flavor.manages_daemon())
    }
}

/// Pre-shared key that authenticates a node. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(String);

impl AuthKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building the command line only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({REDACTED})")
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Identity used to join the mesh
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub hostname: String,
    pub auth_key: AuthKey,
}

impl SessionConfig {
    pub fn new(hostname: impl Into<String>, auth_key: impl Into<String>) -> Result<Self, ConnectError> {
        let hostname = hostname.into();
        let auth_key = AuthKey::new(auth_key);
        if hostname.trim().is_empty() {
            return Err(ConnectError::InvalidConfig("hostname is empty".to_string()));
        }
        if auth_key.is_empty() {
            return Err(ConnectError::InvalidConfig("auth key is empty".to_string()));
        }
        Ok(Self { hostname, auth_key })
    }
}

/// An external command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Inherit stdin so a password prompt can be answered
    pub interactive: bool,
    /// Pipe stdout/stderr back; when false they go to the null device
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            interactive: false,
            capture: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn discard_output(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Program name without its directory, for messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.starts_with(AUTH_KEY_FLAG) {
                write!(f, " {AUTH_KEY_FLAG}{REDACTED}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured outcome of one external invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Process exit code, -1 when terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Case-insensitive search of stderr for any of `patterns`
    pub fn stderr_matches<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        let stderr = self.stderr.to_lowercase();
        patterns
            .iter()
            .any(|pattern| stderr.contains(&pattern.as_ref().to_lowercase()))
    }

    /// First non-empty stderr line, for short diagnostics
    pub fn stderr_summary(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

/// Mesh IPv4 address of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    pub hostname: String,
    pub ip: Ipv4Addr,
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}
