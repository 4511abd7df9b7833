//! Fixed-layout mining work item
//!
//! ```text
//! data     = header (80 B) || 0x80 || zeros || 640 (u64 BE)     128 B
//! midstate = SHA-256 state after data[0..64], words little-endian 32 B
//! hash     = digest of the last solution, digest byte order      32 B
//! target   = little-endian 256-bit integer (byte 31 = MSB)       32 B
//! ```
//!
//! The nonce is header word 19 (bytes 76..80), little-endian, exactly as it
//! appears in the serialized block header.

use thiserror::Error;

use crate::params::*;
use crate::primitives;

/// Errors building a work item from external input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkError {
    #[error("header must be 80 bytes, got {0}")]
    BadHeaderLength(usize),

    #[error("header is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

/// A unit of mining work, exclusively owned by one worker during a scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub data: [u8; DATA_LEN],
    pub midstate: [u8; MIDSTATE_LEN],
    pub hash: [u8; HASH_LEN],
    pub target: [u8; TARGET_LEN],
}

impl WorkItem {
    /// Build a work item from a serialized header, padding the data and
    /// precomputing the midstate.
    pub fn from_header(header: &[u8; HEADER_LEN], target: [u8; TARGET_LEN]) -> Self {
        let mut data = [0u8; DATA_LEN];
        data[..HEADER_LEN].copy_from_slice(header);
        data[HEADER_LEN] = 0x80;
        data[DATA_LEN - 8..].copy_from_slice(&HEADER_BITS.to_be_bytes());

        let mut work = Self {
            data,
            midstate: [0u8; MIDSTATE_LEN],
            hash: [0u8; HASH_LEN],
            target,
        };
        work.refresh_midstate();
        work
    }

    /// Decode a hex-encoded 80-byte header
    pub fn from_header_hex(header_hex: &str, target: [u8; TARGET_LEN]) -> Result<Self, WorkError> {
        let header_hex = header_hex.trim();
        if header_hex.len() != HEADER_LEN * 2 {
            return Err(WorkError::BadHeaderLength(header_hex.len() / 2));
        }
        let mut header = [0u8; HEADER_LEN];
        hex::decode_to_slice(header_hex, &mut header)?;
        Ok(Self::from_header(&header, target))
    }

    /// Recompute the midstate from the first data block
    pub fn refresh_midstate(&mut self) {
        let mut first = [0u8; BLOCK_SIZE];
        first.copy_from_slice(&self.data[..BLOCK_SIZE]);
        let state = primitives::midstate(&first);
        for (chunk, word) in self.midstate.chunks_exact_mut(4).zip(state) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    /// The serialized 80-byte header
    pub fn header(&self) -> &[u8] {
        &self.data[..HEADER_LEN]
    }

    /// Current value of the nonce field
    #[inline(always)]
    pub fn nonce(&self) -> u32 {
        u32::from_le_bytes([
            self.data[NONCE_OFFSET],
            self.data[NONCE_OFFSET + 1],
            self.data[NONCE_OFFSET + 2],
            self.data[NONCE_OFFSET + 3],
        ])
    }

    #[inline(always)]
    pub fn set_nonce(&mut self, nonce: u32) {
        self.data[NONCE_OFFSET..NONCE_OFFSET + 4].copy_from_slice(&nonce.to_le_bytes());
    }

    /// Midstate as SHA-256 state words
    #[inline(always)]
    pub fn midstate_words(&self) -> [u32; 8] {
        let mut words = [0u32; 8];
        for (word, chunk) in words.iter_mut().zip(self.midstate.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        words
    }

    /// Second SHA-256 block of the data (holds the nonce at offset 12)
    #[inline(always)]
    pub fn tail_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&self.data[BLOCK_SIZE..]);
        block
    }
}

/// Read little-endian 32-bit word `index` of a 32-byte hash or target
#[inline(always)]
pub fn le_word(bytes: &[u8; 32], index: usize) -> u32 {
    let i = index * 4;
    u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
}

/// Target requiring `bits` leading zero bits in the little-endian hash value
///
/// `bits = 0` accepts every hash; `bits >= 256` accepts only the zero hash.
pub fn target_from_difficulty_bits(bits: u32) -> [u8; TARGET_LEN] {
    let mut target = [0xFFu8; TARGET_LEN];
    let mut remaining = bits.min(256);
    // Most significant byte is the last one
    for byte in target.iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(8);
        *byte = if take == 8 { 0 } else { 0xFF >> take };
        remaining -= take;
    }
    target
}
