// meshlink-core/src/client.rs
// Wiring of all components plus the boolean boundary API for host applications
use meshlink_common::{
    BinaryPaths, ConnectError, DaemonError, DisconnectError, MeshConfig, PeerAddress, PlatformKind,
    ResolveError, SessionConfig,
};
use std::sync::Arc;
use tracing::error;

use crate::elevate::{self, Elevator};
use crate::exec::{CommandExecutor, SystemExecutor};
use crate::locator::BinaryLocator;
use crate::resolver::{PeerResolver, ResolverSettings};
use crate::runner::PrivilegedRunner;
use crate::session::SessionController;
use crate::supervisor::{DaemonSupervisor, SupervisorSettings};

/// Entry point exposing the structured error kinds
pub struct MeshClient {
    platform: PlatformKind,
    locator: Arc<BinaryLocator>,
    supervisor: Arc<DaemonSupervisor>,
    session: SessionController,
    resolver: PeerResolver,
}

impl MeshClient {
    /// Load configuration from the environment and target the current platform
    pub fn from_env() -> anyhow::Result<Self> {
        let config = MeshConfig::load()?;
        Ok(Self::new(&config, PlatformKind::current()))
    }

    pub fn new(config: &MeshConfig, platform: PlatformKind) -> Self {
        let executor: Arc<dyn CommandExecutor> = Arc::new(SystemExecutor);
        let elevator = elevate::for_platform(platform, executor.clone(), &config.sudo_prompt);
        let locator = BinaryLocator::new(platform, config, executor.clone());
        Self::assemble(config, platform, executor, elevator, locator)
    }

    /// Build from explicit parts; the locator decides where binaries are searched
    pub fn assemble(
        config: &MeshConfig,
        platform: PlatformKind,
        executor: Arc<dyn CommandExecutor>,
        elevator: Arc<dyn Elevator>,
        locator: BinaryLocator,
    ) -> Self {
        let elevation = config.elevation_for(platform);
        let runner = Arc::new(PrivilegedRunner::new(executor, elevator));
        let locator = Arc::new(locator);
        let supervisor = Arc::new(DaemonSupervisor::new(
            runner.clone(),
            SupervisorSettings::from_config(config, elevation),
        ));
        let session = SessionController::new(
            locator.clone(),
            supervisor.clone(),
            runner.clone(),
            elevation,
            config.command_timeout(),
            config.stop_daemon_on_disconnect,
        );
        let resolver = PeerResolver::new(
            locator.clone(),
            runner,
            ResolverSettings {
                attempts: config.resolve_attempts,
                delay: config.resolve_delay(),
                status_timeout: config.status_timeout(),
                elevated: elevation.status,
            },
        );
        Self {
            platform,
            locator,
            supervisor,
            session,
            resolver,
        }
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn locate(&self) -> BinaryPaths {
        self.locator.locate()
    }

    pub fn connect(&self, config: SessionConfig) -> Result<(), ConnectError> {
        self.session.connect(config)
    }

    pub fn disconnect(&self) -> Result<(), DisconnectError> {
        self.session.disconnect()
    }

    pub fn resolve_peer(&self, hostname: &str) -> Result<PeerAddress, ResolveError> {
        self.resolver.resolve_by_hostname(hostname)
    }

    pub fn resolve_self(&self, hostname: &str) -> Result<PeerAddress, ResolveError> {
        self.resolver.resolve_self(hostname)
    }

    pub fn daemon_is_live(&self) -> bool {
        self.supervisor.is_live(&self.locate())
    }

    pub fn ensure_daemon(&self) -> Result<(), DaemonError> {
        self.supervisor.ensure_running(&self.locate())
    }

    pub fn stop_daemon(&self) -> Result<usize, DaemonError> {
        self.supervisor.stop(&self.locate())
    }
}

fn client_or_log() -> Option<MeshClient> {
    match MeshClient::from_env() {
        Ok(client) => Some(client),
        Err(err) => {
            let message = format!("{err:#}");
            error!(error = %message, "failed to load meshlink configuration");
            None
        }
    }
}

/// Start and authenticate Tailscale on this machine
pub fn tailscale_up(hostname: &str, auth_key: &str) -> bool {
    let Some(client) = client_or_log() else {
        return false;
    };
    let result = SessionConfig::new(hostname, auth_key).and_then(|config| client.connect(config));
    match result {
        Ok(()) => true,
        Err(err) => {
            error!(hostname, code = err.code().code(), error = %err, "tailscale up failed");
            false
        }
    }
}

/// Disconnect from the tailnet
pub fn tailscale_down() -> bool {
    let Some(client) = client_or_log() else {
        return false;
    };
    match client.disconnect() {
        Ok(()) => true,
        Err(err) => {
            error!(code = err.code().code(), error = %err, "tailscale down failed");
            false
        }
    }
}

/// Mesh IPv4 address of the peer named `hostname`
pub fn get_tailscale_ip_by_hostname(hostname: &str) -> Option<String> {
    let client = client_or_log()?;
    match client.resolve_peer(hostname) {
        Ok(address) => Some(address.ip.to_string()),
        Err(err) => {
            error!(hostname, code = err.code().code(), error = %err, "peer lookup failed");
            None
        }
    }
}
