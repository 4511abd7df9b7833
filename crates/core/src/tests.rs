//! Tests for the work layout and the scanning kernels

use core::sync::atomic::AtomicBool;

use crate::{
    DigestKernel, HEADER_LEN, PortableKernel, ScanKernel, Sha2Kernel, UHashKernel, WorkItem,
    meets_target, target_from_difficulty_bits,
};

/// Bitcoin genesis block header
const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c";

/// Genesis double-SHA-256 in digest byte order
const GENESIS_DIGEST: &str = "6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000";

const GENESIS_NONCE: u32 = 0x7c2bac1d;

/// Compact bits 0x1d00ffff as a little-endian target
fn genesis_target() -> [u8; 32] {
    let mut target = [0u8; 32];
    target[26] = 0xFF;
    target[27] = 0xFF;
    target
}

fn genesis_work() -> WorkItem {
    WorkItem::from_header_hex(GENESIS_HEADER, genesis_target()).unwrap()
}

fn sha256d_kernels() -> Vec<(&'static str, Box<dyn ScanKernel>)> {
    vec![
        ("c", Box::new(PortableKernel)),
        ("sha2", Box::new(Sha2Kernel)),
        ("digest", Box::new(DigestKernel)),
    ]
}

#[test]
fn test_work_layout() {
    let work = genesis_work();

    assert_eq!(work.nonce(), GENESIS_NONCE);
    assert_eq!(work.header().len(), HEADER_LEN);
    assert_eq!(work.data[80], 0x80);
    assert_eq!(&work.data[120..], &640u64.to_be_bytes());
    assert!(work.data[81..120].iter().all(|b| *b == 0));
}

#[test]
fn test_nonce_roundtrip_bytes() {
    let mut work = genesis_work();
    work.set_nonce(0x11223344);

    assert_eq!(work.nonce(), 0x11223344);
    assert_eq!(&work.data[76..80], &[0x44, 0x33, 0x22, 0x11]);
}

#[test]
fn test_midstate_only_depends_on_first_block() {
    let mut work = genesis_work();
    let before = work.midstate;

    work.set_nonce(1);
    work.refresh_midstate();

    assert_eq!(work.midstate, before);
}

#[test]
fn test_header_hex_errors() {
    assert!(WorkItem::from_header_hex("abcd", [0u8; 32]).is_err());

    let bad = "zz".repeat(80);
    assert!(WorkItem::from_header_hex(&bad, [0u8; 32]).is_err());
}

#[test]
fn test_genesis_found_by_every_kernel() {
    let cancel = AtomicBool::new(false);

    for (name, kernel) in sha256d_kernels() {
        let mut work = genesis_work();
        let start = GENESIS_NONCE - 5;
        let outcome = kernel.scan(&mut work, start, GENESIS_NONCE + 1, &cancel);

        assert!(outcome.found, "{name} missed the genesis nonce");
        assert_eq!(outcome.last_nonce, Some(GENESIS_NONCE), "{name}");
        assert_eq!(outcome.tried_from(start), 6, "{name}");
        assert_eq!(work.nonce(), GENESIS_NONCE, "{name}");
        assert_eq!(hex::encode(work.hash), GENESIS_DIGEST, "{name}");
        assert!(meets_target(&work.hash, &work.target));
    }
}

#[test]
fn test_exhausted_range_reports_last_nonce() {
    let cancel = AtomicBool::new(false);

    for (name, kernel) in sha256d_kernels() {
        let mut work = genesis_work();
        let outcome = kernel.scan(&mut work, 1000, 1100, &cancel);

        assert!(!outcome.found, "{name}");
        assert_eq!(outcome.last_nonce, Some(1099), "{name}");
        assert_eq!(outcome.tried_from(1000), 100, "{name}");
        assert_eq!(work.nonce(), 1099, "{name}");
    }
}

#[test]
fn test_empty_range_tries_nothing() {
    let cancel = AtomicBool::new(false);

    for (name, kernel) in sha256d_kernels() {
        let mut work = genesis_work();
        let outcome = kernel.scan(&mut work, 500, 500, &cancel);

        assert!(!outcome.found, "{name}");
        assert_eq!(outcome.last_nonce, None, "{name}");
        assert_eq!(outcome.tried_from(500), 0, "{name}");
        assert_eq!(work.nonce(), GENESIS_NONCE, "{name}");
    }
}

#[test]
fn test_cancelled_before_start() {
    let cancel = AtomicBool::new(true);

    for (name, kernel) in sha256d_kernels() {
        let mut work = genesis_work();
        let outcome = kernel.scan(&mut work, GENESIS_NONCE, GENESIS_NONCE + 1, &cancel);

        assert!(!outcome.found, "{name} reported a solution after cancellation");
        assert_eq!(outcome.last_nonce, None, "{name}");
    }
}

#[test]
fn test_easiest_target_hits_first_nonce() {
    let cancel = AtomicBool::new(false);
    let target = target_from_difficulty_bits(0);

    for (name, kernel) in sha256d_kernels() {
        let mut work = WorkItem::from_header(&[7u8; HEADER_LEN], target);
        let outcome = kernel.scan(&mut work, 42, 1000, &cancel);

        assert!(outcome.found, "{name}");
        assert_eq!(outcome.last_nonce, Some(42), "{name}");
    }
}

#[test]
fn test_kernels_agree_on_arbitrary_work() {
    let cancel = AtomicBool::new(false);
    let mut header = [0u8; HEADER_LEN];
    for (i, byte) in header.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(13).wrapping_add(1);
    }
    let target = target_from_difficulty_bits(6);

    let results: Vec<_> = sha256d_kernels()
        .into_iter()
        .map(|(_, kernel)| {
            let mut work = WorkItem::from_header(&header, target);
            let outcome = kernel.scan(&mut work, 0, 4096, &cancel);
            (outcome, work.hash)
        })
        .collect();

    assert!(results[0].0.found, "6 bits over 4096 nonces should hit");
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_uhash_kernel_honours_range_and_target() {
    let cancel = AtomicBool::new(false);

    let mut work = WorkItem::from_header(&[3u8; HEADER_LEN], target_from_difficulty_bits(0));
    let outcome = UHashKernel.scan(&mut work, 9, 20, &cancel);
    assert!(outcome.found);
    assert_eq!(outcome.last_nonce, Some(9));
    assert!(meets_target(&work.hash, &work.target));

    let mut work = WorkItem::from_header(&[3u8; HEADER_LEN], [0u8; 32]);
    let outcome = UHashKernel.scan(&mut work, 0, 2, &cancel);
    assert!(!outcome.found);
    assert_eq!(outcome.tried_from(0), 2);
}

#[test]
fn test_prepare_is_idempotent() {
    let cancel = AtomicBool::new(false);
    UHashKernel.prepare();
    UHashKernel.prepare();
    Sha2Kernel.prepare();

    let mut work = WorkItem::from_header(&[3u8; HEADER_LEN], [0u8; 32]);
    let outcome = UHashKernel.scan(&mut work, 0, 1, &cancel);
    assert_eq!(outcome.tried_from(0), 1);
}
