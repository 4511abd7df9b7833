//! Raw SHA-256 compression functions for the double-SHA-256 kernels
//!
//! Two interchangeable implementations of the same compression function:
//! a portable software round loop and the `sha2` crate backend, which picks
//! SHA-NI / ARMv8 / assembly at runtime.

use crate::params::{BLOCK_SIZE, SHA256_IV};

/// Signature shared by both compression implementations
pub type CompressFn = fn(&mut [u32; 8], &[u8; BLOCK_SIZE]);

/// SHA-256 round constants
const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4,
    0xab1c5ed5, 0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe,
    0x9bdc06a7, 0xc19bf174, 0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f,
    0x4a7484aa, 0x5cb0a9dc, 0x76f988da, 0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7,
    0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967, 0x27b70a85, 0x2e1b2138, 0x4d2c6dfc,
    0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85, 0xa2bfe8a1, 0xa81a664b,
    0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070, 0x19a4c116,
    0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7,
    0xc67178f2,
];

/// Portable SHA-256 compression (no intrinsics, no runtime dispatch)
#[inline(always)]
pub fn sha256_compress_soft(state: &mut [u32; 8], block: &[u8; BLOCK_SIZE]) {
    let mut w = [0u32; 64];
    for (i, chunk) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    for i in 16..64 {
        let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
        let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
        w[i] = w[i - 16]
            .wrapping_add(s0)
            .wrapping_add(w[i - 7])
            .wrapping_add(s1);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for i in 0..64 {
        let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
        let ch = (e & f) ^ (!e & g);
        let t1 = h
            .wrapping_add(s1)
            .wrapping_add(ch)
            .wrapping_add(K[i])
            .wrapping_add(w[i]);
        let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
        let maj = (a & b) ^ (a & c) ^ (b & c);
        let t2 = s0.wrapping_add(maj);

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (word, v) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *word = word.wrapping_add(v);
    }
}

/// SHA-256 compression through the `sha2` crate backend
#[inline(always)]
pub fn sha256_compress(state: &mut [u32; 8], block: &[u8; BLOCK_SIZE]) {
    sha2::compress256(state, &[(*block).into()]);
}

/// Build the padded single block hashed by the second SHA-256 pass
///
/// The first pass digest (32 bytes) is followed by `0x80` and the 256-bit
/// message length.
#[inline(always)]
pub fn digest_block(first_pass: &[u32; 8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    for (chunk, word) in block[..32].chunks_exact_mut(4).zip(first_pass) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    block[32] = 0x80;
    block[56..].copy_from_slice(&256u64.to_be_bytes());
    block
}

/// Serialize a SHA-256 state into digest byte order
#[inline(always)]
pub fn state_to_digest(state: &[u32; 8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// SHA-256 state after compressing the first block of `data`
pub fn midstate(first_block: &[u8; BLOCK_SIZE]) -> [u32; 8] {
    let mut state = SHA256_IV;
    sha256_compress(&mut state, first_block);
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_matches_sha2_backend() {
        let mut block = [0u8; BLOCK_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
        }

        let mut soft = SHA256_IV;
        let mut accel = SHA256_IV;
        sha256_compress_soft(&mut soft, &block);
        sha256_compress(&mut accel, &block);

        assert_eq!(soft, accel);
        assert_ne!(soft, SHA256_IV);
    }

    #[test]
    fn test_empty_message_digest() {
        // SHA-256("") is a single padded block: 0x80 followed by zeros
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0x80;

        let mut state = SHA256_IV;
        sha256_compress_soft(&mut state, &block);

        assert_eq!(
            hex::encode(state_to_digest(&state)),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_block_padding() {
        let block = digest_block(&[0x01020304; 8]);

        assert_eq!(&block[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(block[32], 0x80);
        assert_eq!(&block[56..], &[0, 0, 0, 0, 0, 0, 0x01, 0x00]);
    }
}
