// meshlink-core/src/elevate.rs
// Privilege escalation strategies injected into PrivilegedRunner
use meshlink_common::{CommandResult, CommandSpec, PlatformKind, RunError};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::exec::CommandExecutor;

/// sudo messages that mean the user could not or would not authenticate
const SUDO_DENIALS: &[&str] = &[
    "a password is required",
    "a terminal is required",
    "incorrect password",
    "sorry, try again",
    "not in the sudoers file",
    "not allowed to execute",
];

/// Runs commands with escalated operating-system privileges
pub trait Elevator: Send + Sync {
    /// Run `spec` elevated and capture its result
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, RunError>;

    /// Start `spec` elevated in the background
    fn launch_detached(&self, spec: &CommandSpec) -> Result<(), RunError>;

    /// False when this elevator cannot grant more privileges than the caller has
    fn escalates(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

/// Elevator for the given platform
pub fn for_platform(
    platform: PlatformKind,
    executor: Arc<dyn CommandExecutor>,
    prompt: &str,
) -> Arc<dyn Elevator> {
    match platform {
        PlatformKind::Linux | PlatformKind::MacOS => Arc::new(SudoElevator::new(executor, prompt)),
        PlatformKind::Windows => Arc::new(NoopElevator::new(executor)),
    }
}

/// Wraps commands in `sudo`, prompting on the terminal when one is attached
pub struct SudoElevator {
    executor: Arc<dyn CommandExecutor>,
    prompt: String,
    terminal: bool,
    root: bool,
}

impl SudoElevator {
    pub fn new(executor: Arc<dyn CommandExecutor>, prompt: impl Into<String>) -> Self {
        Self {
            executor,
            prompt: prompt.into(),
            terminal: std::io::stdin().is_terminal(),
            root: effective_root(),
        }
    }

    /// Override terminal detection
    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    /// Override the effective-uid check
    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }

    fn wrap(&self, spec: &CommandSpec, background: bool) -> Result<CommandSpec, RunError> {
        let program = spec.program.to_str().ok_or_else(|| RunError::Spawn {
            program: spec.program_name(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path is not valid UTF-8: {}", spec.program.display()),
            ),
        })?;
        let mut wrapped = CommandSpec::new("sudo");
        if self.terminal {
            wrapped = wrapped.args(["-p", self.prompt.as_str()]).interactive(true);
        } else {
            wrapped = wrapped.arg("-n");
        }
        if background {
            wrapped = wrapped.arg("-b");
        }
        wrapped = wrapped
            .arg("--")
            .arg(program)
            .args(spec.args.iter().cloned());
        wrapped.timeout = spec.timeout;
        wrapped.capture = spec.capture;
        Ok(wrapped)
    }

    fn execute_wrapped(&self, spec: &CommandSpec, wrapped: &CommandSpec) -> Result<CommandResult, RunError> {
        debug!(command = %wrapped, "running elevated");
        self.executor.execute(wrapped).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RunError::ElevationDenied {
                    program: spec.program_name(),
                    reason: "sudo is not installed".to_string(),
                }
            } else {
                RunError::from_io(spec.program_name(), wrapped.timeout, err)
            }
        })
    }
}

impl Elevator for SudoElevator {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, RunError> {
        if self.root {
            return self
                .executor
                .execute(spec)
                .map_err(|err| RunError::from_io(spec.program_name(), spec.timeout, err));
        }

        let wrapped = self.wrap(spec, false)?;
        let result = self.execute_wrapped(spec, &wrapped)?;
        if !result.success() && result.stderr_matches(SUDO_DENIALS) {
            warn!(command = %spec, "sudo refused elevation");
            return Err(RunError::ElevationDenied {
                program: spec.program_name(),
                reason: result.stderr_summary(),
            });
        }
        Ok(result)
    }

    fn launch_detached(&self, spec: &CommandSpec) -> Result<(), RunError> {
        if self.root {
            return self
                .executor
                .spawn_detached(spec)
                .map_err(|err| RunError::from_io(spec.program_name(), None, err));
        }

        // The backgrounded child inherits sudo's stdio, so nothing can be piped back
        let wrapped = self.wrap(&spec.clone().discard_output(), true)?;
        let result = self.execute_wrapped(spec, &wrapped)?;
        if !result.success() {
            return Err(RunError::ElevationDenied {
                program: spec.program_name(),
                reason: format!("sudo exited with status {}", result.exit_code),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sudo"
    }
}

/// Runs commands unchanged, for platforms without prompt-based elevation
pub struct NoopElevator {
    executor: Arc<dyn CommandExecutor>,
}

impl NoopElevator {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl Elevator for NoopElevator {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, RunError> {
        self.executor
            .execute(spec)
            .map_err(|err| RunError::from_io(spec.program_name(), spec.timeout, err))
    }

    fn launch_detached(&self, spec: &CommandSpec) -> Result<(), RunError> {
        self.executor
            .spawn_detached(spec)
            .map_err(|err| RunError::from_io(spec.program_name(), None, err))
    }

    fn escalates(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(unix)]
fn effective_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
fn effective_root() -> bool {
    false
}
