//! Solution submission
//!
//! Workers hand every qualifying work item to a [`SubmitSink`] and move on
//! without waiting for the result. Sinks must never block the scan loop.

use std::time::{SystemTime, UNIX_EPOCH};

use cpuhash_core::WorkItem;
use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::logging::prelude::*;

/// Where workers send solved work items
pub trait SubmitSink: Send + Sync {
    fn submit(&self, work: WorkItem);
}

/// Solution record, ready for the network layer or JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Winning nonce
    pub nonce: u32,
    /// Digest of the solution, digest byte order, hex
    pub hash: String,
    /// Serialized 80-byte header with the nonce in place, hex
    pub header: String,
    /// Little-endian target the solution met, hex
    pub target: String,
    /// Seconds since the Unix epoch when the solution was found
    pub timestamp: u64,
}

impl Submission {
    pub fn from_work(work: &WorkItem) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            nonce: work.nonce(),
            hash: hex::encode(work.hash),
            header: hex::encode(work.header()),
            target: hex::encode(work.target),
            timestamp,
        }
    }
}

/// Forwards submissions over a channel without blocking
///
/// A full or disconnected channel drops the submission with a warning.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Submission>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Submission>) -> Self {
        Self { tx }
    }
}

impl SubmitSink for ChannelSink {
    fn submit(&self, work: WorkItem) {
        let submission = Submission::from_work(&work);
        match self.tx.try_send(submission) {
            Ok(()) => {}
            Err(TrySendError::Full(s)) => {
                warn!(nonce = s.nonce, "Submission queue full, dropping solution");
            }
            Err(TrySendError::Disconnected(s)) => {
                warn!(nonce = s.nonce, "Submission queue closed, dropping solution");
            }
        }
    }
}

/// Discards everything; used where solutions are irrelevant
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SubmitSink for NullSink {
    fn submit(&self, _work: WorkItem) {}
}
