//! Subprocess execution for package manager probes.
//!
//! Managers routinely exit nonzero when they find dependency problems, so a
//! run is modelled as an `(exit code, stdout, stderr)` triple and only a
//! missing binary, a timeout or an I/O failure is surfaced as an error.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ProbeError;

/// Captured result of one process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, as one blob.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Capability to run an external program and capture its output.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`. Must not fail on nonzero exit.
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> impl Future<Output = Result<CommandOutput, ProbeError>> + Send;
}

/// Runs real processes through tokio with a per-invocation timeout.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> Result<CommandOutput, ProbeError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %format!("{} {}", program, args.join(" ")), cwd = %cwd.display(), "running command");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::BinaryNotFound(program.to_string())
                } else {
                    ProbeError::IoError(e)
                }
            })?,
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!(program, secs, "command timed out; process killed");
                return Err(ProbeError::Timeout {
                    program: program.to_string(),
                    secs,
                });
            }
        };

        let captured = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !captured.success() {
            debug!(
                exit_code = ?captured.exit_code,
                stdout_len = captured.stdout.len(),
                "command exited nonzero; keeping captured output"
            );
        }
        Ok(captured)
    }
}

/// Scripted runner for unit tests: canned output per command line, and a
/// log of every invocation.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use super::{CommandOutput, CommandRunner};
    use crate::errors::ProbeError;

    pub(crate) enum Scripted {
        Output(CommandOutput),
        Missing,
    }

    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        responses: HashMap<String, Scripted>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn stdout(mut self, cmdline: &str, exit_code: i32, stdout: &str) -> Self {
            self.responses.insert(
                cmdline.to_string(),
                Scripted::Output(CommandOutput {
                    exit_code: Some(exit_code),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            );
            self
        }

        pub(crate) fn output(mut self, cmdline: &str, output: CommandOutput) -> Self {
            self.responses
                .insert(cmdline.to_string(), Scripted::Output(output));
            self
        }

        pub(crate) fn missing(mut self, cmdline: &str) -> Self {
            self.responses.insert(cmdline.to_string(), Scripted::Missing);
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            program: &str,
            args: &[&str],
            _cwd: &Path,
        ) -> Result<CommandOutput, ProbeError> {
            let cmdline = format!("{} {}", program, args.join(" "));
            self.calls.lock().unwrap().push(cmdline.clone());
            match self.responses.get(&cmdline) {
                Some(Scripted::Output(out)) => Ok(out.clone()),
                Some(Scripted::Missing) => Err(ProbeError::BinaryNotFound(program.to_string())),
                None => Ok(CommandOutput {
                    exit_code: Some(0),
                    ..Default::default()
                }),
            }
        }
    }
}
