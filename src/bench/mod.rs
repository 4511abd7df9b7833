//! Crash-isolated kernel benchmarking
//!
//! Each kernel is measured once over a fixed sample block in an isolated
//! execution context (a forked child or a re-executed copy of the binary).
//! The child reports a single little-endian `f64` rate over a one-way
//! channel; a child that crashes, hangs past the deadline or writes a short
//! result is reported as failed instead of taking the miner down.

mod inprocess;
mod isolation;
mod reexec;

#[cfg(unix)]
mod fork;

use std::io::{self, ErrorKind, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

use cpuhash_core::{ScanKernel, WorkItem};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::logging::prelude::*;
use crate::registry::{AlgorithmEntry, AlgorithmFamily, AlgorithmId};

#[cfg(unix)]
pub use fork::ForkIsolation;
pub use inprocess::InProcessIsolation;
pub use isolation::{supervise, BenchJob, IsolatedChild, Isolation};
pub use reexec::{run_isolated_child, ReexecIsolation, BENCH_SUBCOMMAND};

/// Bitcoin genesis block header, the embedded sample block
pub const SAMPLE_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

/// Size of the encoded rate on the wire
pub const RATE_LEN: usize = 8;

/// Rate reported when a measurement could not be taken
pub const FAILED_RATE: f64 = -1.0;

/// Tunables for the benchmark harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    /// Wall-clock ceiling for one isolated measurement
    pub timeout_secs: u64,
    /// How often the supervisor polls the child
    pub poll_interval_ms: u64,
    /// Override the per-family nonce ceiling
    pub max_nonce: Option<u32>,
    /// Retries for a result write that would block
    pub write_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            poll_interval_ms: 1000,
            max_nonce: None,
            write_retries: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl BenchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn nonce_ceiling(&self, family: AlgorithmFamily) -> u32 {
        self.max_nonce
            .unwrap_or_else(|| family.bench_nonce_ceiling())
    }
}

/// Outcome of benchmarking one algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub algorithm: AlgorithmId,
    /// Hashes per microsecond (MH/s); [`FAILED_RATE`] when not ok
    pub rate: f64,
    pub ok: bool,
}

impl BenchmarkResult {
    pub fn success(algorithm: AlgorithmId, rate: f64) -> Self {
        Self {
            algorithm,
            rate,
            ok: true,
        }
    }

    pub fn failed(algorithm: AlgorithmId) -> Self {
        Self {
            algorithm,
            rate: FAILED_RATE,
            ok: false,
        }
    }

    /// Classify a rate read back from an isolated child
    ///
    /// Missing, non-positive or non-finite rates are failures. A kernel that
    /// tried no nonces at all reports zero and is never viable.
    pub fn from_rate(algorithm: AlgorithmId, rate: Option<f64>) -> Self {
        match rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => Self::success(algorithm, rate),
            _ => Self::failed(algorithm),
        }
    }
}

/// Work item for benchmarking: the sample header with an unreachable target
///
/// The all-zero target means no nonce qualifies, so the kernel scans the
/// whole range it is given.
pub fn sample_work() -> Result<WorkItem> {
    Ok(WorkItem::from_header_hex(SAMPLE_HEADER, [0u8; 32])?)
}

/// Run `kernel` once over `[0, max_nonce)` of `work` and return its rate
///
/// Returns [`FAILED_RATE`] when the kernel tried no nonces or the elapsed
/// time rounds to zero microseconds.
pub fn measure_rate(kernel: &dyn ScanKernel, work: &mut WorkItem, max_nonce: u32) -> f64 {
    let cancel = AtomicBool::new(false);

    let started = Instant::now();
    let outcome = kernel.scan(work, 0, max_nonce, &cancel);
    let elapsed_us = started.elapsed().as_micros();

    let tried = outcome.tried_from(0);
    if tried == 0 || elapsed_us == 0 {
        return FAILED_RATE;
    }
    tried as f64 / elapsed_us as f64
}

/// [`measure_rate`] with panics turned into [`FAILED_RATE`]
pub fn measure_rate_guarded(kernel: &dyn ScanKernel, work: &mut WorkItem, max_nonce: u32) -> f64 {
    panic::catch_unwind(AssertUnwindSafe(|| measure_rate(kernel, work, max_nonce)))
        .unwrap_or(FAILED_RATE)
}

/// Write the encoded rate, retrying a bounded number of times
///
/// A write that would block, is interrupted or makes no progress is retried
/// after `delay`, at most `retries` times.
pub fn send_rate<W: Write>(out: &mut W, rate: f64, retries: u32, delay: Duration) -> io::Result<()> {
    let bytes = rate.to_le_bytes();
    let mut written = 0;
    let mut attempts_left = retries;

    while written < RATE_LEN {
        let stalled = match out.write(&bytes[written..]) {
            Ok(0) => true,
            Ok(n) => {
                written += n;
                false
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => true,
            Err(e) => return Err(e),
        };

        if stalled {
            if attempts_left == 0 {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "benchmark result channel stayed full",
                ));
            }
            attempts_left -= 1;
            thread::sleep(delay);
        }
    }

    out.flush()
}

/// Read an encoded rate from a finished child
///
/// Returns `None` on a short read; the child wrote nothing or died mid-write.
pub fn read_rate_from<R: Read>(input: &mut R) -> io::Result<Option<f64>> {
    let mut buf = [0u8; RATE_LEN];
    let mut filled = 0;

    while filled < RATE_LEN {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }

    if filled < RATE_LEN {
        return Ok(None);
    }
    Ok(Some(f64::from_le_bytes(buf)))
}

/// Isolation backend plus settings: measures one registry entry at a time
pub struct Harness {
    isolation: Box<dyn Isolation>,
    settings: BenchSettings,
}

impl Harness {
    pub fn new(isolation: Box<dyn Isolation>, settings: BenchSettings) -> Self {
        Self {
            isolation,
            settings,
        }
    }

    /// Harness over the platform's preferred isolation backend
    pub fn with_default_isolation(settings: BenchSettings) -> Self {
        Self::new(default_isolation(), settings)
    }

    pub fn settings(&self) -> &BenchSettings {
        &self.settings
    }

    pub fn isolation_name(&self) -> &'static str {
        self.isolation.name()
    }

    /// Benchmark one algorithm in isolation
    ///
    /// Failing to set up the isolated context is an error. Anything that goes
    /// wrong inside it only yields a failed result.
    pub fn measure(&self, family: AlgorithmFamily, entry: &AlgorithmEntry) -> Result<BenchmarkResult> {
        let job = BenchJob {
            family,
            entry: entry.clone(),
            work: sample_work()?,
            max_nonce: self.settings.nonce_ceiling(family),
            write_retries: self.settings.write_retries,
            retry_delay: self.settings.retry_delay(),
        };

        let mut child = self.isolation.spawn(&job)?;

        let rate = match supervise(
            child.as_mut(),
            self.settings.timeout(),
            self.settings.poll_interval(),
        ) {
            Ok(rate) => rate,
            Err(err) => {
                warn!(algorithm = entry.name, error = %err, "Lost track of benchmark child");
                None
            }
        };

        Ok(BenchmarkResult::from_rate(entry.id, rate))
    }
}

/// Fork where available, re-exec of the current binary elsewhere
pub fn default_isolation() -> Box<dyn Isolation> {
    #[cfg(unix)]
    {
        Box::new(ForkIsolation)
    }
    #[cfg(not(unix))]
    {
        Box::new(ReexecIsolation::new())
    }
}
