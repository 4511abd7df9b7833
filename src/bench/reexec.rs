//! Re-exec isolation
//!
//! Runs the measurement in a fresh copy of the binary through the hidden
//! `bench-algo` subcommand and reads the rate from the child's stdout. Works
//! wherever processes can be spawned, at the cost of only measuring kernels
//! the child can rebuild from its own registry.

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;

use super::isolation::{BenchJob, IsolatedChild, Isolation};
use super::{measure_rate_guarded, read_rate_from, sample_work, send_rate};
use crate::error::{BackendError, Result};
use crate::registry::{AlgorithmFamily, Registry};

/// Name of the hidden subcommand the child runs
pub const BENCH_SUBCOMMAND: &str = "bench-algo";

#[derive(Debug, Default, Clone)]
pub struct ReexecIsolation {
    program: Option<PathBuf>,
}

impl ReexecIsolation {
    /// Re-execute the currently running binary
    pub fn new() -> Self {
        Self { program: None }
    }

    /// Re-execute `program` instead of the current binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> io::Result<PathBuf> {
        match &self.program {
            Some(path) => Ok(path.clone()),
            None => env::current_exe(),
        }
    }
}

impl Isolation for ReexecIsolation {
    fn name(&self) -> &'static str {
        "re-exec"
    }

    fn spawn(&self, job: &BenchJob) -> io::Result<Box<dyn IsolatedChild>> {
        let mut child = Command::new(self.program()?)
            .arg(BENCH_SUBCOMMAND)
            .arg("--family")
            .arg(job.family.as_str())
            .arg("--max-nonce")
            .arg(job.max_nonce.to_string())
            .arg("--write-retries")
            .arg(job.write_retries.to_string())
            .arg("--retry-delay-ms")
            .arg(job.retry_delay.as_millis().to_string())
            .arg(job.entry.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take();
        Ok(Box::new(ReexecChild {
            child,
            stdout,
            reaped: false,
        }))
    }
}

struct ReexecChild {
    child: Child,
    stdout: Option<ChildStdout>,
    reaped: bool,
}

impl IsolatedChild for ReexecChild {
    fn try_wait(&mut self) -> io::Result<Option<bool>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status.map(|s| s.success()))
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }
        // Fails only when the child already exited; wait() reaps either way
        let _ = self.child.kill();
        self.child.wait()?;
        self.reaped = true;
        Ok(())
    }

    fn read_rate(&mut self) -> io::Result<Option<f64>> {
        match self.stdout.as_mut() {
            Some(stdout) => read_rate_from(stdout),
            None => Ok(None),
        }
    }
}

impl Drop for ReexecChild {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

/// Body of the `bench-algo` subcommand
///
/// Measures `name` from the `family` registry and writes the rate to stdout.
/// An unknown name is an error and nothing is written, which the supervisor
/// sees as a short read.
pub fn run_isolated_child(
    family: AlgorithmFamily,
    name: &str,
    max_nonce: Option<u32>,
    write_retries: u32,
    retry_delay: Duration,
) -> Result<()> {
    let registry = Registry::for_family(family)?;
    let id = registry.parse(name)?;
    let kernel = registry
        .kernel(id)
        .ok_or_else(|| BackendError::UnknownAlgorithm(name.to_string()))?;

    let mut work = sample_work()?;
    let max_nonce = max_nonce.unwrap_or_else(|| family.bench_nonce_ceiling());
    let rate = measure_rate_guarded(kernel.as_ref(), &mut work, max_nonce);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    send_rate(&mut out, rate, write_retries, retry_delay)?;
    Ok(())
}
