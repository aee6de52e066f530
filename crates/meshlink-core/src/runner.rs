// meshlink-core/src/runner.rs
use meshlink_common::{CommandResult, CommandSpec, RunError};
use std::sync::Arc;
use tracing::{debug, info};

use crate::elevate::Elevator;
use crate::exec::CommandExecutor;

/// stderr fragments that mean the unprivileged attempt lacked permission
pub const PERMISSION_PATTERNS: &[&str] = &[
    "permission denied",
    "access denied",
    "operation not permitted",
    "requires root",
    "must be root",
    "can't connect",
];

/// Runs commands unprivileged first and retries once through the elevator
pub struct PrivilegedRunner {
    executor: Arc<dyn CommandExecutor>,
    elevator: Arc<dyn Elevator>,
}

impl PrivilegedRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, elevator: Arc<dyn Elevator>) -> Self {
        Self { executor, elevator }
    }

    /// Run `spec`; `require_elevation` skips the unprivileged attempt
    pub fn run(&self, spec: &CommandSpec, require_elevation: bool) -> Result<CommandResult, RunError> {
        if require_elevation && self.elevator.escalates() {
            debug!(command = %spec, elevator = self.elevator.name(), "elevation required");
            return self.elevator.run(spec);
        }

        let result = self.run_unprivileged(spec)?;
        if result.success() || !self.elevator.escalates() || !is_permission_denied(&result) {
            return Ok(result);
        }

        info!(
            command = %spec,
            elevator = self.elevator.name(),
            "permission denied, retrying elevated"
        );
        self.elevator.run(spec)
    }

    /// Run `spec` without ever escalating
    pub fn run_unprivileged(&self, spec: &CommandSpec) -> Result<CommandResult, RunError> {
        debug!(command = %spec, "running");
        self.executor
            .execute(spec)
            .map_err(|err| RunError::from_io(spec.program_name(), spec.timeout, err))
    }

    /// Start `spec` in the background so it outlives this process
    pub fn launch_detached(&self, spec: &CommandSpec, require_elevation: bool) -> Result<(), RunError> {
        if require_elevation && self.elevator.escalates() {
            return self.elevator.launch_detached(spec);
        }
        self.executor
            .spawn_detached(spec)
            .map_err(|err| RunError::from_io(spec.program_name(), None, err))
    }
}

pub fn is_permission_denied(result: &CommandResult) -> bool {
    !result.success() && result.stderr_matches(PERMISSION_PATTERNS)
}
