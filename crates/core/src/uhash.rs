//! Memory-hard UniversalHash kernel
//!
//! Hashes the 80-byte header with UniversalHash v4 (2 MB of scratchpads per
//! hasher). The nonce sits inside the last 8 header bytes, which the
//! algorithm uses as its effective nonce. Output bytes are compared against
//! the target as a little-endian integer, like the SHA-256 family.

use core::cell::RefCell;
use core::sync::atomic::AtomicBool;

use uhash_core::UniversalHash;

use crate::difficulty::meets_target;
use crate::kernel::{ScanKernel, ScanOutcome, scan_range};
use crate::work::WorkItem;

thread_local! {
    // Scratchpads are allocated once per worker thread, not per call
    static HASHER: RefCell<UniversalHash> = RefCell::new(UniversalHash::new());
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UHashKernel;

impl ScanKernel for UHashKernel {
    fn prepare(&self) {
        HASHER.with(|_| {});
    }

    fn scan(
        &self,
        work: &mut WorkItem,
        start: u32,
        max_nonce: u32,
        cancel: &AtomicBool,
    ) -> ScanOutcome {
        let target = work.target;
        HASHER.with(|cell| {
            let mut hasher = cell.borrow_mut();
            scan_range(work, start, max_nonce, cancel, |work, _| {
                let hash = hasher.hash(work.header());
                if meets_target(&hash, &target) {
                    work.hash = hash;
                    return true;
                }
                false
            })
        })
    }
}
