//! Backend error types

use thiserror::Error;

use crate::registry::AlgorithmId;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unknown algorithm \"{0}\"")]
    UnknownAlgorithm(String),

    #[error("unknown algorithm family \"{0}\"")]
    InvalidFamily(String),

    #[error("no algorithm survived benchmarking on this platform")]
    NoViableAlgorithm,

    #[error("algorithm {0:?} registered twice")]
    DuplicateAlgorithm(AlgorithmId),

    #[error("thread count {0} out of range (0..=9999)")]
    InvalidThreadCount(usize),

    #[error("invalid work: {0}")]
    InvalidWork(#[from] cpuhash_core::WorkError),

    #[error("benchmark isolation failed: {0}")]
    Isolation(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
