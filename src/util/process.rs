//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use wait_timeout::ChildExt;

/// Builder for subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set several environment variables.
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (k, v) in vars {
            self.env.insert(k.clone(), v.clone());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment overrides.
    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the working directory.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        // Own process group, so a timeout kills what the child spawned too.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }

    /// Execute the command, capturing output, and kill it if it runs past
    /// `timeout`.
    pub fn exec_with_timeout(&self, timeout: Option<Duration>) -> Result<ProcessOutput> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        // Drain both pipes on their own threads so a chatty child can't
        // block on a full pipe while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = match timeout {
            Some(limit) => match child
                .wait_timeout(limit)
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                Some(status) => (status.code(), false),
                None => {
                    kill(&mut child);
                    (None, true)
                }
            },
            None => {
                let status = child
                    .wait()
                    .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
                (status.code(), false)
            }
        };

        Ok(ProcessOutput {
            status,
            stdout: join(stdout),
            stderr: join(stderr),
            timed_out,
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Kill a timed out child and its whole process group. Grandchildren
/// hold the output pipes open, so they must be gone before draining.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            tracing::debug!("failed to kill process group {}: {}", child.id(), e);
        }
    }
    if let Err(e) = child.kill() {
        tracing::debug!("failed to kill timed out process: {}", e);
    }
    let _ = child.wait();
}

/// Captured result of a finished (or killed) subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if killed by a signal or on timeout
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Whether the process was killed for running past its timeout
    pub timed_out: bool,
}

impl ProcessOutput {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        ProcessOutput {
            status: Some(0),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        ProcessOutput {
            status: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// An output for a process killed on timeout.
    pub fn timeout() -> Self {
        ProcessOutput {
            timed_out: true,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    /// stdout followed by stderr, like a shell's `2>&1`.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let sep = if self.stdout.ends_with('\n') { "" } else { "\n" };
                format!("{}{}{}", self.stdout, sep, self.stderr)
            }
        }
    }
}

/// Runs external processes on behalf of the executor and the harness.
///
/// The one seam between the core and the outside world's processes, so
/// tests can script every invocation.
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion, killing it after `timeout` if given.
    ///
    /// Errors only when the process could not be started at all; non-zero
    /// exits and timeouts are reported through [`ProcessOutput`].
    fn run(&self, cmd: &ProcessBuilder, timeout: Option<Duration>) -> Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &ProcessBuilder, timeout: Option<Duration>) -> Result<ProcessOutput> {
        tracing::debug!("running: {}", cmd.display_command());
        cmd.exec_with_timeout(timeout)
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find a C compiler.
pub fn find_c_compiler() -> Option<PathBuf> {
    if let Ok(cc) = std::env::var("CC") {
        if let Some(path) = find_executable(&cc) {
            return Some(path);
        }
    }

    for compiler in &["cc", "gcc", "clang"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}
