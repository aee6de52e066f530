//! Drives a locally installed Tailscale client: binary discovery, daemon
//! lifecycle, privilege escalation, connect/disconnect and peer lookup.

pub mod client;
pub mod elevate;
pub mod exec;
pub mod locator;
pub mod resolver;
pub mod runner;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use client::{get_tailscale_ip_by_hostname, tailscale_down, tailscale_up, MeshClient};
pub use elevate::{Elevator, NoopElevator, SudoElevator};
pub use exec::{CommandExecutor, SystemExecutor};
pub use locator::{BinaryLocator, CandidateSource, LocatorStrategy};
pub use resolver::{PeerResolver, ResolverSettings, Scope};
pub use runner::PrivilegedRunner;
pub use session::SessionController;
pub use supervisor::{DaemonState, DaemonSupervisor, SupervisorSettings};

pub use meshlink_common as common;
