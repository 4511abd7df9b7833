//! Work layout and scanning parameters
//!
//! Byte offsets shared by the work supplier, the kernels and the submission
//! side. Changing any of these breaks the wire layout of [`crate::WorkItem`].

/// Serialized block header length in bytes
pub const HEADER_LEN: usize = 80;

/// Padded SHA-256 message length of the header (two 64-byte blocks)
pub const DATA_LEN: usize = 128;

/// SHA-256 block size
pub const BLOCK_SIZE: usize = 64;

/// Precomputed SHA-256 state after the first block
pub const MIDSTATE_LEN: usize = 32;

/// Hash output size
pub const HASH_LEN: usize = 32;

/// Difficulty target size (little-endian 256-bit integer)
pub const TARGET_LEN: usize = 32;

/// Header word holding the 32-bit nonce
pub const NONCE_WORD: usize = 19;

/// Byte offset of the nonce inside the header
pub const NONCE_OFFSET: usize = NONCE_WORD * 4;

/// Header length in bits, written big-endian at the end of the padded data
pub const HEADER_BITS: u64 = (HEADER_LEN as u64) * 8;

/// Kernels poll the cancellation flag at least this often (in nonces)
pub const CANCEL_POLL_INTERVAL: u32 = 256;

/// SHA-256 initial hash value
pub const SHA256_IV: [u32; 8] = [
    0x6A09E667, 0xBB67AE85, 0x3C6EF372, 0xA54FF53A, 0x510E527F, 0x9B05688C, 0x1F83D9AB,
    0x5BE0CD19,
];
