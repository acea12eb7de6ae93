//! Test utilities and mocks for slipway unit tests.
//!
//! The two seams to the outside world, [`CommandRunner`] and [`Fetcher`],
//! get scripted implementations here so the executor and the harness can
//! be tested without spawning processes or touching the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use slipway::test_support::{MockRunner, MockFetcher};
//!
//! let runner = MockRunner::new()
//!     .on_contains("qemu-system-", ProcessOutput::ok("QEMU emulator version 9.0.2"));
//! let fetcher = MockFetcher::new().with("https://example.com/disk.img", b"...".to_vec());
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::ops::verify::Fetcher;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput};

pub use fixtures::*;

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s.as_str()),
            CommandPattern::Contains(s) => cmd.contains(s.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
enum Response {
    Output(ProcessOutput),
    SpawnError,
}

/// Scripted [`CommandRunner`].
///
/// Commands are matched against expectations in the order they were added;
/// the first match wins. Unmatched commands succeed with empty output.
/// Every call is recorded.
#[derive(Debug)]
pub struct MockRunner {
    expectations: Vec<(CommandPattern, Response)>,
    default_output: ProcessOutput,
    calls: Mutex<Vec<ProcessBuilder>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            expectations: Vec::new(),
            default_output: ProcessOutput::ok(""),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond to an exact command line.
    pub fn on(self, cmd: &str, output: ProcessOutput) -> Self {
        self.expect(CommandPattern::Exact(cmd.to_string()), Response::Output(output))
    }

    /// Respond to command lines starting with `prefix`.
    pub fn on_prefix(self, prefix: &str, output: ProcessOutput) -> Self {
        self.expect(
            CommandPattern::StartsWith(prefix.to_string()),
            Response::Output(output),
        )
    }

    /// Respond to command lines containing `substring`.
    pub fn on_contains(self, substring: &str, output: ProcessOutput) -> Self {
        self.expect(
            CommandPattern::Contains(substring.to_string()),
            Response::Output(output),
        )
    }

    /// Fail to start command lines starting with `prefix`.
    pub fn spawn_error_on(self, prefix: &str) -> Self {
        self.expect(CommandPattern::StartsWith(prefix.to_string()), Response::SpawnError)
    }

    /// Output for commands no expectation matches.
    pub fn with_default(mut self, output: ProcessOutput) -> Self {
        self.default_output = output;
        self
    }

    fn expect(mut self, pattern: CommandPattern, response: Response) -> Self {
        self.expectations.push((pattern, response));
        self
    }

    /// Every command run so far, in call order.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines run so far, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(ProcessBuilder::display_command).collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder, _timeout: Option<Duration>) -> Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }

        let line = cmd.display_command();
        let response = self
            .expectations
            .iter()
            .find(|(pattern, _)| pattern.matches(&line))
            .map(|(_, response)| response.clone());

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnError) => bail!("failed to spawn `{}`", line),
            None => Ok(self.default_output.clone()),
        }
    }
}

/// In-memory [`Fetcher`]. Unknown URLs fail like a 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    /// URLs requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        match self.responses.get(url) {
            Some(body) => Ok(body.clone()),
            None => bail!("failed to download {}: HTTP 404 Not Found", url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_expectation_wins() {
        let runner = MockRunner::new()
            .on_contains("sparc ", ProcessOutput::failed(1, "bad"))
            .on_prefix("qemu", ProcessOutput::ok("good"));

        let sparc = runner
            .run(&ProcessBuilder::new("qemu-system-sparc").arg("--version"), None)
            .unwrap();
        let sparc64 = runner
            .run(&ProcessBuilder::new("qemu-system-sparc64").arg("--version"), None)
            .unwrap();
        let other = runner.run(&ProcessBuilder::new("make"), None).unwrap();

        assert_eq!(sparc.status, Some(1));
        assert_eq!(sparc64.stdout, "good");
        assert!(other.success());
        assert_eq!(
            runner.commands(),
            ["qemu-system-sparc --version", "qemu-system-sparc64 --version", "make"]
        );
    }

    #[test]
    fn test_spawn_error() {
        let runner = MockRunner::new().spawn_error_on("./configure");
        assert!(runner.run(&ProcessBuilder::new("./configure"), None).is_err());
    }

    #[test]
    fn test_mock_fetcher() {
        let fetcher = MockFetcher::new().with("https://example.com/a", b"a".to_vec());
        assert_eq!(fetcher.fetch("https://example.com/a").unwrap(), b"a");
        assert!(fetcher.fetch("https://example.com/b").is_err());
        assert_eq!(fetcher.requests().len(), 2);
    }
}
