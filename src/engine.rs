//! Nonce-scanning worker loop
//!
//! Drives the selected kernel over a worker's range, submitting every
//! solution and resuming right after it on the same work item until the
//! range is exhausted or the worker's restart flag is raised.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpuhash_core::{ScanKernel, WorkItem};

use crate::device::WorkerState;
use crate::logging::prelude::*;
use crate::submit::SubmitSink;

/// Back-off when there is no kernel to run
pub const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Worker scan state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    /// Stopped right after a solution at the end of the range
    Found,
    Exhausted,
    Cancelled,
}

/// Summary of one [`ScanEngine::scan`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Nonces tried, `last - first + 1`
    pub tried: u64,
    /// Solutions submitted
    pub solutions: u32,
    pub end: ScanState,
}

impl ScanReport {
    fn idle() -> Self {
        Self {
            tried: 0,
            solutions: 0,
            end: ScanState::Idle,
        }
    }
}

pub struct ScanEngine {
    kernel: Option<Arc<dyn ScanKernel>>,
    sink: Arc<dyn SubmitSink>,
}

impl fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanEngine")
            .field("has_kernel", &self.kernel.is_some())
            .finish_non_exhaustive()
    }
}

impl ScanEngine {
    /// `kernel = None` makes every scan an idle no-op
    pub fn new(kernel: Option<Arc<dyn ScanKernel>>, sink: Arc<dyn SubmitSink>) -> Self {
        Self { kernel, sink }
    }

    pub fn is_idle(&self) -> bool {
        self.kernel.is_none()
    }

    /// Set up the kernel's per-thread state on the calling worker thread
    pub fn prepare_thread(&self) {
        if let Some(kernel) = &self.kernel {
            kernel.prepare();
        }
    }

    /// Scan `work` from its current nonce up to, not including, `max_nonce`
    ///
    /// On return the nonce field sits just past the last nonce tried (it is
    /// left alone when nothing was tried), and `worker.hashes_done` has been
    /// advanced by `tried`.
    pub fn scan(&self, worker: &mut WorkerState, work: &mut WorkItem, max_nonce: u32) -> ScanReport {
        let Some(kernel) = self.kernel.as_ref() else {
            thread::sleep(IDLE_SLEEP);
            return ScanReport::idle();
        };

        let restart = Arc::clone(&worker.work_restart);
        let first = work.nonce();
        let mut cursor = first;
        let mut last = None;
        let mut solutions = 0;
        worker.state = ScanState::Scanning;

        let end = loop {
            if restart.load(Ordering::Relaxed) {
                break ScanState::Cancelled;
            }
            if cursor >= max_nonce {
                break ScanState::Exhausted;
            }

            let outcome = kernel.scan(work, cursor, max_nonce, &restart);
            if outcome.last_nonce.is_some() {
                last = outcome.last_nonce;
            }

            match (outcome.found, outcome.last_nonce) {
                (true, Some(nonce)) => {
                    worker.state = ScanState::Found;
                    solutions += 1;
                    debug!(worker = worker.id, nonce, "Found solution");
                    self.sink.submit(work.clone());

                    match nonce.checked_add(1) {
                        Some(next) if next < max_nonce => {
                            cursor = next;
                            worker.state = ScanState::Scanning;
                        }
                        _ => break ScanState::Found,
                    }
                }
                _ if restart.load(Ordering::Relaxed) => break ScanState::Cancelled,
                _ => break ScanState::Exhausted,
            }
        };

        let tried = match last {
            Some(last) => {
                work.set_nonce(last.saturating_add(1));
                u64::from(last - first) + 1
            }
            None => 0,
        };

        worker.hashes_done += tried;
        worker.state = ScanState::Idle;

        ScanReport {
            tried,
            solutions,
            end,
        }
    }
}
