//! Double SHA-256 kernels
//!
//! Three implementations of the same search:
//!
//! - [`PortableKernel`] reuses the midstate and runs the software
//!   compression function
//! - [`Sha2Kernel`] reuses the midstate and runs `sha2::compress256`
//! - [`DigestKernel`] hashes the full header twice with `Sha256::digest`
//!
//! They must agree bit for bit on every work item.

use core::sync::atomic::AtomicBool;

use sha2::{Digest, Sha256};

use crate::difficulty::{full_test, meets_target};
use crate::kernel::{ScanKernel, ScanOutcome, scan_range};
use crate::params::{BLOCK_SIZE, NONCE_OFFSET, SHA256_IV};
use crate::primitives::{
    CompressFn, digest_block, sha256_compress, sha256_compress_soft, state_to_digest,
};
use crate::work::{WorkItem, le_word};

/// Nonce position inside the second data block
const TAIL_NONCE_OFFSET: usize = NONCE_OFFSET - BLOCK_SIZE;

/// Midstate kernel over the portable compression function
#[derive(Debug, Default, Clone, Copy)]
pub struct PortableKernel;

/// Midstate kernel over the `sha2` crate backend
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha2Kernel;

/// Reference kernel: no midstate reuse
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestKernel;

impl ScanKernel for PortableKernel {
    fn scan(
        &self,
        work: &mut WorkItem,
        start: u32,
        max_nonce: u32,
        cancel: &AtomicBool,
    ) -> ScanOutcome {
        scan_midstate(sha256_compress_soft, work, start, max_nonce, cancel)
    }
}

impl ScanKernel for Sha2Kernel {
    fn scan(
        &self,
        work: &mut WorkItem,
        start: u32,
        max_nonce: u32,
        cancel: &AtomicBool,
    ) -> ScanOutcome {
        scan_midstate(sha256_compress, work, start, max_nonce, cancel)
    }
}

impl ScanKernel for DigestKernel {
    fn scan(
        &self,
        work: &mut WorkItem,
        start: u32,
        max_nonce: u32,
        cancel: &AtomicBool,
    ) -> ScanOutcome {
        let target = work.target;
        scan_range(work, start, max_nonce, cancel, |work, _| {
            let first = Sha256::digest(work.header());
            let hash: [u8; 32] = Sha256::digest(first).into();
            if meets_target(&hash, &target) {
                work.hash = hash;
                return true;
            }
            false
        })
    }
}

/// Shared midstate search loop
///
/// Only the second data block changes between nonces, so the first
/// compression is taken from the work's midstate.
#[inline(always)]
fn scan_midstate(
    compress: CompressFn,
    work: &mut WorkItem,
    start: u32,
    max_nonce: u32,
    cancel: &AtomicBool,
) -> ScanOutcome {
    let midstate = work.midstate_words();
    let target = work.target;
    let target_top = le_word(&target, 7);
    let mut tail = work.tail_block();

    scan_range(work, start, max_nonce, cancel, |work, nonce| {
        tail[TAIL_NONCE_OFFSET..TAIL_NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());

        let mut first = midstate;
        compress(&mut first, &tail);

        let mut second = SHA256_IV;
        compress(&mut second, &digest_block(&first));

        // Quick test: digest bytes 28..32 read little-endian
        if second[7].swap_bytes() > target_top {
            return false;
        }

        let hash = state_to_digest(&second);
        if full_test(&hash, &target) {
            work.hash = hash;
            return true;
        }
        false
    })
}
