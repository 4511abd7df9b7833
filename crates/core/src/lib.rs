//! # cpuhash core
//!
//! Work layout, difficulty tests and the hash kernels driven by the
//! `cpuhash` CPU mining backend.
//!
//! ## Kernel contract
//!
//! Every kernel implements [`ScanKernel`]: it searches `[start, max_nonce)`
//! over a [`WorkItem`], writes each tried nonce into the work, stops on the
//! first nonce meeting the target and polls a cancellation flag at least
//! every [`CANCEL_POLL_INTERVAL`] nonces.
//!
//! ## Families
//!
//! - Double SHA-256: [`PortableKernel`], [`Sha2Kernel`], [`DigestKernel`]
//! - Memory-hard UniversalHash: [`UHashKernel`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::AtomicBool;
//! use cpuhash_core::{ScanKernel, Sha2Kernel, WorkItem, target_from_difficulty_bits};
//!
//! let header = [0u8; 80];
//! let mut work = WorkItem::from_header(&header, target_from_difficulty_bits(4));
//! let cancel = AtomicBool::new(false);
//!
//! let outcome = Sha2Kernel.scan(&mut work, 0, 1 << 12, &cancel);
//! if outcome.found {
//!     println!("nonce {:#010x}", work.nonce());
//! }
//! ```

mod difficulty;
mod kernel;
mod params;
mod primitives;
mod sha256d;
mod uhash;
mod work;

pub use difficulty::{full_test, meets_target, quick_test};
pub use kernel::{ScanKernel, ScanOutcome, scan_range};
pub use params::*;
pub use primitives::{sha256_compress, sha256_compress_soft};
pub use sha256d::{DigestKernel, PortableKernel, Sha2Kernel};
pub use uhash::UHashKernel;
pub use work::{WorkError, WorkItem, le_word, target_from_difficulty_bits};

#[cfg(test)]
mod tests;
