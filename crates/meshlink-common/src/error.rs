use std::time::Duration;
use thiserror::Error;

use crate::types::InstallFlavor;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ErrorCode {
    #[error("M001: Required binary not found")]
    M001,
    #[error("M002: Privilege elevation denied")]
    M002,
    #[error("M003: Daemon did not start within timeout")]
    M003,
    #[error("M004: Authentication failed")]
    M004,
    #[error("M005: Disconnect failed")]
    M005,
    #[error("M006: Peer not found")]
    M006,
    #[error("M007: Daemon unreachable")]
    M007,
    #[error("M008: External command failed to run")]
    M008,
    #[error("M009: Invalid configuration")]
    M009,
    #[error("M010: Managed daemon not running")]
    M010,
    #[error("M011: Daemon stop failed")]
    M011,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::M001 => "M001",
            ErrorCode::M002 => "M002",
            ErrorCode::M003 => "M003",
            ErrorCode::M004 => "M004",
            ErrorCode::M005 => "M005",
            ErrorCode::M006 => "M006",
            ErrorCode::M007 => "M007",
            ErrorCode::M008 => "M008",
            ErrorCode::M009 => "M009",
            ErrorCode::M010 => "M010",
            ErrorCode::M011 => "M011",
        }
    }
}

/// Failure running a single external command.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("elevation denied for {program}: {reason}")]
    ElevationDenied { program: String, reason: String },
}

impl RunError {
    /// Classify an I/O error from spawning or waiting on `program`.
    pub fn from_io(program: impl Into<String>, timeout: Option<Duration>, err: std::io::Error) -> Self {
        let program = program.into();
        match (err.kind(), timeout) {
            (std::io::ErrorKind::TimedOut, Some(timeout)) => RunError::Timeout { program, timeout },
            _ => RunError::Spawn { program, source: err },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RunError::Spawn { .. } | RunError::Timeout { .. } => ErrorCode::M008,
            RunError::ElevationDenied { .. } => ErrorCode::M002,
        }
    }
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("tailscaled binary not found; install the standalone package or set TAILSCALED_PATH")]
    BinaryNotFound,
    #[error("daemon did not become live within {waited:?}")]
    StartupTimeout { waited: Duration },
    #[error("daemon managed by the {flavor} install is not running; start the Tailscale app or service")]
    NotRunning { flavor: InstallFlavor },
    #[error("failed to stop daemon process {pid}: {stderr}")]
    StopFailed { pid: u32, stderr: String },
    #[error("daemon command failed: {0}")]
    Command(#[from] RunError),
}

impl DaemonError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DaemonError::BinaryNotFound => ErrorCode::M001,
            DaemonError::StartupTimeout { .. } => ErrorCode::M003,
            DaemonError::NotRunning { .. } => ErrorCode::M010,
            DaemonError::StopFailed { .. } => ErrorCode::M011,
            DaemonError::Command(err) => err.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{binary} binary not found on this system")]
    BinaryNotFound { binary: String },
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Daemon(#[from] DaemonError),
    #[error("elevation denied: {reason}")]
    ElevationDenied { reason: String },
    #[error("authentication failed (exit code {exit_code}): {stderr}")]
    AuthenticationFailed { exit_code: i32, stderr: String },
    #[error(transparent)]
    Command(RunError),
}

impl From<RunError> for ConnectError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::ElevationDenied { reason, .. } => ConnectError::ElevationDenied { reason },
            other => ConnectError::Command(other),
        }
    }
}

impl ConnectError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectError::BinaryNotFound { .. } => ErrorCode::M001,
            ConnectError::InvalidConfig(_) => ErrorCode::M009,
            ConnectError::Daemon(err) => err.code(),
            ConnectError::ElevationDenied { .. } => ErrorCode::M002,
            ConnectError::AuthenticationFailed { .. } => ErrorCode::M004,
            ConnectError::Command(err) => err.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("{binary} binary not found on this system")]
    BinaryNotFound { binary: String },
    #[error("elevation denied: {reason}")]
    ElevationDenied { reason: String },
    #[error("disconnect failed (exit code {exit_code}): {stderr}")]
    DisconnectFailed { exit_code: i32, stderr: String },
    #[error(transparent)]
    Command(RunError),
}

impl From<RunError> for DisconnectError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::ElevationDenied { reason, .. } => DisconnectError::ElevationDenied { reason },
            other => DisconnectError::Command(other),
        }
    }
}

impl DisconnectError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DisconnectError::BinaryNotFound { .. } => ErrorCode::M001,
            DisconnectError::ElevationDenied { .. } => ErrorCode::M002,
            DisconnectError::DisconnectFailed { .. } => ErrorCode::M005,
            DisconnectError::Command(err) => err.code(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{binary} binary not found on this system")]
    BinaryNotFound { binary: String },
    #[error("no node named {hostname} after {attempts} attempts")]
    PeerNotFound { hostname: String, attempts: u32 },
    #[error("node {hostname} has no IPv4 address")]
    NoIpv4Address { hostname: String },
    #[error("daemon unreachable after {attempts} attempts: {detail}")]
    DaemonUnreachable { attempts: u32, detail: String },
    #[error(transparent)]
    Command(RunError),
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::BinaryNotFound { .. } => ErrorCode::M001,
            ResolveError::PeerNotFound { .. } | ResolveError::NoIpv4Address { .. } => ErrorCode::M006,
            ResolveError::DaemonUnreachable { .. } => ErrorCode::M007,
            ResolveError::Command(err) => err.code(),
        }
    }
}
