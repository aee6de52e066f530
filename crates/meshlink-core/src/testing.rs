// Scripted executor for unit tests
use meshlink_common::{CommandResult, CommandSpec};
use std::io;
use std::sync::Mutex;

use crate::exec::CommandExecutor;

type Script = Box<dyn Fn(&CommandSpec) -> io::Result<CommandResult> + Send + Sync>;
type SpawnHook = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// Answers each command through a closure and records everything it saw
pub struct ScriptedExecutor {
    script: Script,
    on_spawn: Option<SpawnHook>,
    executed: Mutex<Vec<CommandSpec>>,
    spawned: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CommandSpec) -> io::Result<CommandResult> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            on_spawn: None,
            executed: Mutex::new(Vec::new()),
            spawned: Mutex::new(Vec::new()),
        }
    }

    pub fn on_spawn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.on_spawn = Some(Box::new(hook));
        self
    }

    pub fn executed(&self) -> Vec<CommandSpec> {
        self.executed.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.lock().unwrap().clone()
    }

    /// Executed commands whose program file name is `name`
    pub fn executed_named(&self, name: &str) -> Vec<CommandSpec> {
        self.executed()
            .into_iter()
            .filter(|spec| spec.program_name() == name)
            .collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> io::Result<CommandResult> {
        self.executed.lock().unwrap().push(spec.clone());
        (self.script)(spec)
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> io::Result<()> {
        self.spawned.lock().unwrap().push(spec.clone());
        if let Some(hook) = &self.on_spawn {
            hook(spec);
        }
        Ok(())
    }
}

pub fn ok(stdout: &str) -> io::Result<CommandResult> {
    Ok(CommandResult::new(0, stdout, ""))
}

pub fn fail(exit_code: i32, stderr: &str) -> io::Result<CommandResult> {
    Ok(CommandResult::new(exit_code, "", stderr))
}

/// Program name plus args, with the `sudo` wrapper peeled off
pub fn unwrap_sudo(spec: &CommandSpec) -> (String, Vec<String>) {
    if spec.program_name() != "sudo" {
        return (spec.program_name(), spec.args.clone());
    }
    let mut args = spec.args.iter();
    for arg in args.by_ref() {
        if arg == "--" {
            break;
        }
    }
    let rest: Vec<String> = args.cloned().collect();
    match rest.split_first() {
        Some((program, tail)) => {
            let name = std::path::Path::new(program)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.clone());
            (name, tail.to_vec())
        }
        None => (String::new(), Vec::new()),
    }
}

pub const STATUS_JSON: &str = r#"{
    "BackendState": "Running",
    "Self": {"HostName": "ground", "TailscaleIPs": ["100.64.0.1"]},
    "Peer": {
        "nodekey:1": {"HostName": "drone", "DNSName": "drone.tail.ts.net.", "TailscaleIPs": ["fd7a::5", "100.64.0.5"]}
    }
}"#;
