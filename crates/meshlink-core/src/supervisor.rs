// meshlink-core/src/supervisor.rs
// Keeps the daemon process alive for standalone installs
use meshlink_common::{
    BinaryPaths, CommandSpec, DaemonError, ElevationPolicy, InstallFlavor, MeshConfig, StatusReport,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::runner::PrivilegedRunner;

/// stderr fragments from the client when it cannot reach the daemon
pub const UNREACHABLE_PATTERNS: &[&str] = &[
    "failed to connect to local tailscaled",
    "tailscaled not running",
    "is tailscaled running",
    "connection refused",
];

/// Positions in the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotChecked,
    Running,
    NotRunning,
    Starting { since: Instant },
    StartupFailed { waited: Duration },
}

/// Timing and privilege settings for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub daemon_process: String,
    pub daemon_args: Vec<String>,
    pub poll_interval: Duration,
    pub startup_timeout: Duration,
    pub settle_delay: Duration,
    pub status_timeout: Duration,
    pub command_timeout: Duration,
    pub start_elevated: bool,
    pub stop_elevated: bool,
}

impl SupervisorSettings {
    pub fn from_config(config: &MeshConfig, elevation: ElevationPolicy) -> Self {
        Self {
            daemon_process: config.daemon_binary.clone(),
            daemon_args: config.daemon_args.clone(),
            poll_interval: config.poll_interval(),
            startup_timeout: config.startup_timeout(),
            settle_delay: config.settle_delay(),
            status_timeout: config.status_timeout(),
            command_timeout: config.command_timeout(),
            start_elevated: elevation.daemon_start,
            stop_elevated: elevation.daemon_stop,
        }
    }
}

pub struct DaemonSupervisor {
    runner: Arc<PrivilegedRunner>,
    settings: SupervisorSettings,
}

impl DaemonSupervisor {
    pub fn new(runner: Arc<PrivilegedRunner>, settings: SupervisorSettings) -> Self {
        Self { runner, settings }
    }

    /// Make sure the daemon is live, launching it when this layer owns it
    pub fn ensure_running(&self, paths: &BinaryPaths) -> Result<(), DaemonError> {
        let mut state = DaemonState::NotChecked;
        loop {
            debug!(?state, "daemon supervisor");
            state = match state {
                DaemonState::NotChecked => {
                    if self.is_live(paths) {
                        DaemonState::Running
                    } else {
                        DaemonState::NotRunning
                    }
                }
                DaemonState::Running => return Ok(()),
                DaemonState::NotRunning => {
                    if paths.flavor.manages_daemon() {
                        return Err(DaemonError::NotRunning { flavor: paths.flavor });
                    }
                    self.launch(paths)?;
                    DaemonState::Starting { since: Instant::now() }
                }
                DaemonState::Starting { since } => {
                    thread::sleep(self.settings.poll_interval);
                    if self.is_live(paths) {
                        info!(elapsed = ?since.elapsed(), "daemon is now running");
                        thread::sleep(self.settings.settle_delay);
                        DaemonState::Running
                    } else if since.elapsed() >= self.settings.startup_timeout {
                        DaemonState::StartupFailed { waited: since.elapsed() }
                    } else {
                        DaemonState::Starting { since }
                    }
                }
                DaemonState::StartupFailed { waited } => {
                    warn!(?waited, "daemon did not start within timeout");
                    return Err(DaemonError::StartupTimeout { waited });
                }
            };
        }
    }

    /// Liveness check without side effects
    pub fn is_live(&self, paths: &BinaryPaths) -> bool {
        match paths.flavor {
            InstallFlavor::Standalone => match self.daemon_pids() {
                Ok(pids) => !pids.is_empty(),
                Err(err) => {
                    debug!(error = %err, "pgrep unavailable, probing status instead");
                    self.status_probe(paths)
                }
            },
            InstallFlavor::GuiBundle | InstallFlavor::WindowsService => self.status_probe(paths),
        }
    }

    /// Kill a standalone daemon; returns how many processes were signalled
    pub fn stop(&self, paths: &BinaryPaths) -> Result<usize, DaemonError> {
        if paths.flavor.manages_daemon() {
            debug!(flavor = %paths.flavor, "daemon is managed externally, not stopping");
            return Ok(0);
        }
        let pids = match self.daemon_pids() {
            Ok(pids) => pids,
            Err(err) => {
                warn!(error = %err, "cannot list daemon processes");
                return Ok(0);
            }
        };

        for pid in &pids {
            let spec = CommandSpec::new("kill")
                .arg(pid.to_string())
                .timeout(self.settings.command_timeout);
            let result = self.runner.run(&spec, self.settings.stop_elevated)?;
            if !result.success() {
                return Err(DaemonError::StopFailed {
                    pid: *pid,
                    stderr: result.stderr_summary(),
                });
            }
            info!(pid, "daemon process stopped");
        }
        Ok(pids.len())
    }

    fn launch(&self, paths: &BinaryPaths) -> Result<(), DaemonError> {
        let daemon = paths.daemon().ok_or(DaemonError::BinaryNotFound)?;
        let spec = CommandSpec::new(daemon).args(self.settings.daemon_args.iter().cloned());
        info!(command = %spec, "starting daemon");
        self.runner
            .launch_detached(&spec, self.settings.start_elevated)?;
        Ok(())
    }

    fn daemon_pids(&self) -> std::io::Result<Vec<u32>> {
        let spec = CommandSpec::new("pgrep")
            .args(["-x", self.settings.daemon_process.as_str()])
            .timeout(self.settings.status_timeout);
        let result = self
            .runner
            .run_unprivileged(&spec)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
        // pgrep exits 1 when nothing matched and >1 on its own errors
        if result.exit_code > 1 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("pgrep failed: {}", result.stderr_summary()),
            ));
        }
        Ok(parse_pids(&result.stdout))
    }

    fn status_probe(&self, paths: &BinaryPaths) -> bool {
        let Some(client) = paths.client() else {
            return false;
        };
        let spec = CommandSpec::new(client)
            .args(["status", "--json"])
            .timeout(self.settings.status_timeout);
        match self.runner.run_unprivileged(&spec) {
            Ok(result) => {
                !result.stderr_matches(UNREACHABLE_PATTERNS) && StatusReport::parse(&result.stdout).is_ok()
            }
            Err(err) => {
                debug!(error = %err, "status probe failed");
                false
            }
        }
    }
}

fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .split_whitespace()
        .filter_map(|pid| pid.parse().ok())
        .collect()
}
