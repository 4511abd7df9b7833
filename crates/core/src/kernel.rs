//! Hash kernel contract
//!
//! A kernel searches `[start, max_nonce)` over a [`WorkItem`], writing each
//! tried nonce into the work's nonce field. It stops on the first qualifying
//! nonce, on exhausting the range, or when the cancellation flag is observed
//! set. Kernels never allocate inside the loop and never block; callers bound
//! every call with `max_nonce` and/or the flag.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::params::CANCEL_POLL_INTERVAL;
use crate::work::WorkItem;

/// Result of one kernel invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// A nonce passing both difficulty tests was found
    pub found: bool,
    /// Found nonce, or the last nonce tried; `None` when nothing was tried
    pub last_nonce: Option<u32>,
}

impl ScanOutcome {
    pub const fn empty() -> Self {
        Self {
            found: false,
            last_nonce: None,
        }
    }

    /// Number of nonces this call went through, starting at `start`
    pub fn tried_from(&self, start: u32) -> u64 {
        match self.last_nonce {
            Some(last) if last >= start => u64::from(last - start) + 1,
            _ => 0,
        }
    }
}

/// The uniform calling contract every hash-search implementation satisfies
pub trait ScanKernel: Send + Sync {
    /// Set up per-thread state ahead of the first scan on the calling thread
    fn prepare(&self) {}

    fn scan(
        &self,
        work: &mut WorkItem,
        start: u32,
        max_nonce: u32,
        cancel: &AtomicBool,
    ) -> ScanOutcome;
}

/// Drive `try_nonce` over `[start, max_nonce)` with periodic cancellation polls
///
/// `try_nonce` hashes the work with its current nonce field and returns
/// whether it qualifies; it is responsible for writing `work.hash` on success.
#[inline(always)]
pub fn scan_range<F>(
    work: &mut WorkItem,
    start: u32,
    max_nonce: u32,
    cancel: &AtomicBool,
    mut try_nonce: F,
) -> ScanOutcome
where
    F: FnMut(&mut WorkItem, u32) -> bool,
{
    let mut last = None;
    let mut nonce = start;
    let mut until_poll = 0u32;

    while nonce < max_nonce {
        if until_poll == 0 {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            until_poll = CANCEL_POLL_INTERVAL;
        }
        until_poll -= 1;

        work.set_nonce(nonce);
        last = Some(nonce);
        if try_nonce(work, nonce) {
            return ScanOutcome {
                found: true,
                last_nonce: last,
            };
        }
        nonce += 1;
    }

    ScanOutcome {
        found: false,
        last_nonce: last,
    }
}
