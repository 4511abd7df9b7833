//! Difficulty tests against a little-endian 256-bit target
//!
//! Kernels run [`quick_test`] on every candidate and only pay for
//! [`full_test`] when the most significant word already passes. A solution
//! is reported only when both agree.

use crate::work::le_word;

/// Compare only the most significant 32-bit word of hash and target
#[inline(always)]
pub fn quick_test(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    le_word(hash, 7) <= le_word(target, 7)
}

/// Full comparison, most significant word first. Equality qualifies.
#[inline(always)]
pub fn full_test(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    for i in (0..8).rev() {
        let h = le_word(hash, i);
        let t = le_word(target, i);
        if h != t {
            return h < t;
        }
    }
    true
}

/// Quick test followed by the full test
#[inline(always)]
pub fn meets_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    quick_test(hash, target) && full_test(hash, target)
}
