//! Isolation backend abstraction and the supervisor loop

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use cpuhash_core::WorkItem;

use crate::logging::prelude::*;
use crate::registry::{AlgorithmEntry, AlgorithmFamily};

/// Everything an isolated context needs to take one measurement
#[derive(Debug, Clone)]
pub struct BenchJob {
    pub family: AlgorithmFamily,
    pub entry: AlgorithmEntry,
    /// Prepared sample work, so the child does no parsing
    pub work: WorkItem,
    pub max_nonce: u32,
    pub write_retries: u32,
    pub retry_delay: Duration,
}

/// A way of running a kernel measurement away from the supervisor
pub trait Isolation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start the measurement. Errors here mean the isolation primitives
    /// themselves are unavailable.
    fn spawn(&self, job: &BenchJob) -> io::Result<Box<dyn IsolatedChild>>;
}

/// Supervisor's handle on a running measurement
pub trait IsolatedChild {
    /// `Some(clean_exit)` once the child has terminated, `None` while running
    fn try_wait(&mut self) -> io::Result<Option<bool>>;

    /// Force-terminate and reap. Harmless on an already reaped child.
    fn kill(&mut self) -> io::Result<()>;

    /// Read the reported rate; `None` when the child wrote a short result
    fn read_rate(&mut self) -> io::Result<Option<f64>>;
}

/// Poll `child` until it terminates or `timeout` elapses
///
/// Returns the rate the child reported, or `None` if it wrote nothing
/// usable or had to be killed. A timeout too large to represent as an
/// instant means no deadline.
pub fn supervise(
    child: &mut dyn IsolatedChild,
    timeout: Duration,
    poll_interval: Duration,
) -> io::Result<Option<f64>> {
    let deadline = Instant::now().checked_add(timeout);

    loop {
        if let Some(clean_exit) = child.try_wait()? {
            if !clean_exit {
                debug!("Benchmark child terminated abnormally");
            }
            return child.read_rate();
        }

        let sleep = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    warn!(timeout_secs = timeout.as_secs(), "Benchmark child timed out, killing it");
                    child.kill()?;
                    return Ok(None);
                }
                poll_interval.min(deadline - now)
            }
            None => poll_interval,
        };

        thread::sleep(sleep);
    }
}
