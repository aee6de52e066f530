// meshlink-core/src/resolver.rs
use meshlink_common::{CommandSpec, PeerAddress, ResolveError, RunError, StatusReport};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::locator::BinaryLocator;
use crate::runner::PrivilegedRunner;
use crate::supervisor::UNREACHABLE_PATTERNS;

/// Which node in the status document to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Peers,
    SelfNode,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub attempts: u32,
    pub delay: Duration,
    pub status_timeout: Duration,
    pub elevated: bool,
}

/// Outcome of one status query that may change on the next try
enum Miss {
    Absent,
    NoIpv4,
    Unreachable(String),
}

pub struct PeerResolver {
    locator: Arc<BinaryLocator>,
    runner: Arc<PrivilegedRunner>,
    settings: ResolverSettings,
}

impl PeerResolver {
    pub fn new(locator: Arc<BinaryLocator>, runner: Arc<PrivilegedRunner>, settings: ResolverSettings) -> Self {
        Self {
            locator,
            runner,
            settings,
        }
    }

    pub fn resolve_by_hostname(&self, hostname: &str) -> Result<PeerAddress, ResolveError> {
        self.resolve(hostname, Scope::Peers)
    }

    /// Address of the local node, if it is named `hostname`
    pub fn resolve_self(&self, hostname: &str) -> Result<PeerAddress, ResolveError> {
        self.resolve(hostname, Scope::SelfNode)
    }

    /// Query status until the node shows up or attempts run out
    pub fn resolve(&self, hostname: &str, scope: Scope) -> Result<PeerAddress, ResolveError> {
        let paths = self.locator.locate();
        let client = paths.client().ok_or_else(|| ResolveError::BinaryNotFound {
            binary: self.locator.client_name().to_string(),
        })?;
        let spec = CommandSpec::new(client)
            .args(["status", "--json"])
            .timeout(self.settings.status_timeout);

        let attempts = self.settings.attempts.max(1);
        let mut last = Miss::Absent;
        for attempt in 1..=attempts {
            match self.query(&spec, hostname, scope)? {
                Ok(address) => {
                    info!(hostname, ip = %address.ip, "resolved tailnet address");
                    return Ok(address);
                }
                Err(miss) => last = miss,
            }
            if attempt < attempts {
                debug!(hostname, attempt, attempts, "node not resolved yet, retrying");
                thread::sleep(self.settings.delay);
            }
        }

        Err(match last {
            Miss::Absent => ResolveError::PeerNotFound {
                hostname: hostname.to_string(),
                attempts,
            },
            Miss::NoIpv4 => ResolveError::NoIpv4Address {
                hostname: hostname.to_string(),
            },
            Miss::Unreachable(detail) => ResolveError::DaemonUnreachable { attempts, detail },
        })
    }

    fn query(&self, spec: &CommandSpec, hostname: &str, scope: Scope) -> Result<Result<PeerAddress, Miss>, ResolveError> {
        let result = match self.runner.run(spec, self.settings.elevated) {
            Ok(result) => result,
            Err(RunError::Timeout { timeout, .. }) => {
                return Ok(Err(Miss::Unreachable(format!("status timed out after {timeout:?}"))));
            }
            Err(err) => return Err(ResolveError::Command(err)),
        };

        if !result.success() && result.stderr_matches(UNREACHABLE_PATTERNS) {
            return Ok(Err(Miss::Unreachable(result.stderr_summary())));
        }
        let report = match StatusReport::parse(&result.stdout) {
            Ok(report) => report,
            Err(err) => {
                let detail = if result.stderr.trim().is_empty() {
                    format!("unparseable status output: {err}")
                } else {
                    result.stderr_summary()
                };
                return Ok(Err(Miss::Unreachable(detail)));
            }
        };

        let node = match scope {
            Scope::Peers => report.find_peer(hostname),
            Scope::SelfNode => report.find_self(hostname),
        };
        Ok(match node {
            None => Err(Miss::Absent),
            Some(node) => match node.first_ipv4() {
                Some(ip) => Ok(PeerAddress {
                    hostname: hostname.to_string(),
                    ip,
                }),
                None => Err(Miss::NoIpv4),
            },
        })
    }
}
