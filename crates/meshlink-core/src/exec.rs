// meshlink-core/src/exec.rs
// Process spawning seam: every external command goes through CommandExecutor
use meshlink_common::{CommandResult, CommandSpec};
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WAIT_POLL: Duration = Duration::from_millis(25);

/// Runs external programs. Implementations must be safe to share across components.
pub trait CommandExecutor: Send + Sync {
    /// Run to completion and capture output
    fn execute(&self, spec: &CommandSpec) -> io::Result<CommandResult>;

    /// Start a process that outlives the caller; output is discarded
    fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<()>;
}

/// Executor backed by `std::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        command.stdin(if spec.interactive { Stdio::inherit() } else { Stdio::null() });
        if spec.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        command
    }

    fn wait_with_deadline(child: &mut Child, spec: &CommandSpec, timeout: Duration) -> io::Result<ExitStatus> {
        // A deadline past what Instant can represent is no deadline at all
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return child.wait();
        };
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} exceeded {:?}", spec.program_name(), timeout),
                ));
            }
            thread::sleep(WAIT_POLL);
        }
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, spec: &CommandSpec) -> io::Result<CommandResult> {
        let mut child = Self::command(spec).spawn()?;

        // Drain pipes concurrently so a chatty child never blocks on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match spec.timeout {
            Some(timeout) => Self::wait_with_deadline(&mut child, spec, timeout)?,
            None => child.wait()?,
        };

        Ok(CommandResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<()> {
        let mut command = Self::command(&spec.clone().discard_output());
        detach(&mut command);
        let mut child = command.spawn()?;
        tracing::debug!(pid = child.id(), command = %spec, "spawned detached process");

        // Reap the child when it eventually exits; nobody waits on it otherwise
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
