//! Algorithm registry
//!
//! Maps algorithm identifiers to kernel implementations for one algorithm
//! family. Built once at startup and never mutated afterwards, so it is shared
//! between worker threads behind an `Arc` without locking.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cpuhash_core::{DigestKernel, PortableKernel, ScanKernel, Sha2Kernel, UHashKernel};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, Result};

/// Mutually exclusive algorithm families, chosen at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmFamily {
    /// Double SHA-256 proof of work
    #[default]
    Sha256d,
    /// Memory-hard UniversalHash
    UHash,
    /// CPU hashing disabled
    None,
}

impl AlgorithmFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmFamily::Sha256d => "sha256d",
            AlgorithmFamily::UHash => "uhash",
            AlgorithmFamily::None => "none",
        }
    }

    /// Nonce ceiling for a single benchmark measurement
    pub fn bench_nonce_ceiling(self) -> u32 {
        match self {
            AlgorithmFamily::Sha256d => 1 << 22,
            AlgorithmFamily::UHash => 1 << 6,
            AlgorithmFamily::None => 0,
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmFamily {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256d" | "sha256" => Ok(AlgorithmFamily::Sha256d),
            "uhash" => Ok(AlgorithmFamily::UHash),
            "none" | "off" => Ok(AlgorithmFamily::None),
            other => Err(BackendError::InvalidFamily(other.to_string())),
        }
    }
}

/// Identifies one hash-search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmId {
    Portable,
    Sha2,
    Digest,
    UHash,
    Void,
}

impl AlgorithmId {
    pub const COUNT: usize = 5;

    /// Canonical name, as accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::Portable => "c",
            AlgorithmId::Sha2 => "sha2",
            AlgorithmId::Digest => "digest",
            AlgorithmId::UHash => "uhash",
            AlgorithmId::Void => "void",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One registered kernel
#[derive(Clone)]
pub struct AlgorithmEntry {
    pub id: AlgorithmId,
    pub name: &'static str,
    pub kernel: Arc<dyn ScanKernel>,
}

impl AlgorithmEntry {
    pub fn new(id: AlgorithmId, kernel: Arc<dyn ScanKernel>) -> Self {
        Self {
            id,
            name: id.name(),
            kernel,
        }
    }
}

impl fmt::Debug for AlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Immutable table of the kernels available for one family
#[derive(Debug, Clone)]
pub struct Registry {
    family: AlgorithmFamily,
    entries: Vec<AlgorithmEntry>,
    index: [Option<usize>; AlgorithmId::COUNT],
    max_name_len: usize,
}

impl Registry {
    /// Registry of every kernel compiled in for `family`, in benchmark order
    pub fn for_family(family: AlgorithmFamily) -> Result<Self> {
        let entries = match family {
            AlgorithmFamily::Sha256d => vec![
                AlgorithmEntry::new(AlgorithmId::Portable, Arc::new(PortableKernel)),
                AlgorithmEntry::new(AlgorithmId::Sha2, Arc::new(Sha2Kernel)),
                AlgorithmEntry::new(AlgorithmId::Digest, Arc::new(DigestKernel)),
            ],
            AlgorithmFamily::UHash => {
                vec![AlgorithmEntry::new(AlgorithmId::UHash, Arc::new(UHashKernel))]
            }
            AlgorithmFamily::None => Vec::new(),
        };
        Self::from_entries(family, entries)
    }

    /// Build from explicit entries, rejecting duplicate ids
    pub fn from_entries(family: AlgorithmFamily, entries: Vec<AlgorithmEntry>) -> Result<Self> {
        let mut index = [None; AlgorithmId::COUNT];
        for (pos, entry) in entries.iter().enumerate() {
            let slot = &mut index[entry.id.index()];
            if slot.is_some() {
                return Err(BackendError::DuplicateAlgorithm(entry.id));
            }
            *slot = Some(pos);
        }

        let max_name_len = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);

        Ok(Self {
            family,
            entries,
            index,
            max_name_len,
        })
    }

    pub fn family(&self) -> AlgorithmFamily {
        self.family
    }

    pub fn entries(&self) -> &[AlgorithmEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: AlgorithmId) -> Option<&AlgorithmEntry> {
        self.index[id.index()].map(|pos| &self.entries[pos])
    }

    pub fn kernel(&self, id: AlgorithmId) -> Option<Arc<dyn ScanKernel>> {
        self.get(id).map(|entry| Arc::clone(&entry.kernel))
    }

    /// Resolve a user-supplied name
    pub fn parse(&self, name: &str) -> Result<AlgorithmId> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
            .ok_or_else(|| BackendError::UnknownAlgorithm(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Widest registered name, for aligned log output
    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Spaces that pad `name` to the widest registered name
    pub fn pad(&self, name: &str) -> String {
        " ".repeat(self.max_name_len.saturating_sub(name.len()))
    }
}
