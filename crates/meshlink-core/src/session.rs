// meshlink-core/src/session.rs
// Connect and disconnect the local node
use meshlink_common::{
    CommandSpec, ConnectError, DisconnectError, ElevationPolicy, InstallFlavor, SessionConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::locator::BinaryLocator;
use crate::runner::PrivilegedRunner;
use crate::supervisor::{DaemonSupervisor, UNREACHABLE_PATTERNS};

/// stderr from `down` that means there was nothing to disconnect
const NOT_CONNECTED_PATTERNS: &[&str] = &["not connected", "logged out", "needslogin", "is stopped"];

pub struct SessionController {
    locator: Arc<BinaryLocator>,
    supervisor: Arc<DaemonSupervisor>,
    runner: Arc<PrivilegedRunner>,
    elevation: ElevationPolicy,
    command_timeout: Duration,
    stop_daemon_on_disconnect: bool,
}

impl SessionController {
    pub fn new(
        locator: Arc<BinaryLocator>,
        supervisor: Arc<DaemonSupervisor>,
        runner: Arc<PrivilegedRunner>,
        elevation: ElevationPolicy,
        command_timeout: Duration,
        stop_daemon_on_disconnect: bool,
    ) -> Self {
        Self {
            locator,
            supervisor,
            runner,
            elevation,
            command_timeout,
            stop_daemon_on_disconnect,
        }
    }

    /// Join the mesh as `config.hostname`; safe to repeat with the same identity
    pub fn connect(&self, config: SessionConfig) -> Result<(), ConnectError> {
        let paths = self.locator.locate();
        let client = paths.client().ok_or_else(|| ConnectError::BinaryNotFound {
            binary: self.locator.client_name().to_string(),
        })?;

        self.supervisor.ensure_running(&paths)?;

        let spec = CommandSpec::new(client)
            .arg("up")
            .arg(format!("--authkey={}", config.auth_key.expose()))
            .arg(format!("--hostname={}", config.hostname))
            .timeout(self.command_timeout);

        info!(hostname = %config.hostname, "connecting to tailnet");
        let result = self.runner.run(&spec, self.elevation.up)?;
        if !result.success() {
            warn!(hostname = %config.hostname, exit_code = result.exit_code, "tailscale up failed");
            return Err(ConnectError::AuthenticationFailed {
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        info!(hostname = %config.hostname, flavor = %paths.flavor, "connected to tailnet");
        Ok(())
    }

    /// Leave the mesh; already disconnected counts as success
    pub fn disconnect(&self) -> Result<(), DisconnectError> {
        let paths = self.locator.locate();
        let client = paths.client().ok_or_else(|| DisconnectError::BinaryNotFound {
            binary: self.locator.client_name().to_string(),
        })?;

        let spec = CommandSpec::new(client)
            .arg("down")
            .timeout(self.command_timeout);
        let result = self.runner.run(&spec, self.elevation.down)?;

        if result.success() {
            info!("disconnected from tailnet");
        } else if result.stderr_matches(NOT_CONNECTED_PATTERNS) || result.stderr_matches(UNREACHABLE_PATTERNS) {
            info!(reason = %result.stderr_summary(), "already disconnected");
        } else {
            return Err(DisconnectError::DisconnectFailed {
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            });
        }

        if self.stop_daemon_on_disconnect && paths.flavor == InstallFlavor::Standalone {
            match self.supervisor.stop(&paths) {
                Ok(0) => info!("daemon was not running"),
                Ok(count) => info!(count, "daemon stopped"),
                Err(err) => warn!(error = %err, "could not stop daemon"),
            }
        }
        Ok(())
    }
}
