//! CPU mining backend
//!
//! Selects, benchmarks and runs nonce-scanning hash kernels on worker
//! threads pinned to CPU cores.
//!
//! # Overview
//!
//! - **Registry**: immutable table of the kernels compiled in for one
//!   algorithm family
//! - **Benchmark harness**: measures each kernel in a crash-isolated child,
//!   so a kernel that faults or hangs on this CPU is ruled out instead of
//!   killing the miner
//! - **Selector**: picks the fastest surviving kernel, or the one named in
//!   the configuration
//! - **Engine**: the per-worker scan loop with cooperative cancellation and
//!   fire-and-forget submission
//! - **Device lifecycle**: [`DeviceDriver`] is what a device manager calls
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cpuhash::{BackendConfig, CpuBackend, CpuDevice, DeviceDriver, NullSink};
//!
//! let mut cpu = CpuBackend::new(BackendConfig::default(), Arc::new(NullSink))?;
//! let mut devices: Vec<CpuDevice> = Vec::new();
//! cpu.detect(&mut devices);
//!
//! println!("{} workers running {}", devices.len(), cpu.algorithm_name());
//! # Ok::<(), cpuhash::BackendError>(())
//! ```

// Re-export the kernel crate
pub use cpuhash_core as kernels;

pub mod bench;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;
pub mod selector;
pub mod submit;
pub mod topology;

// Convenience re-exports
pub use bench::{BenchSettings, BenchmarkResult, Harness};
pub use config::{AlgorithmChoice, BackendConfig};
pub use device::{CpuBackend, CpuDevice, DeviceDriver, DeviceRegistrar, RestartHandle, WorkerState};
pub use engine::{ScanEngine, ScanReport, ScanState};
pub use error::{BackendError, Result};
pub use registry::{AlgorithmEntry, AlgorithmFamily, AlgorithmId, Registry};
pub use selector::{resolve_algorithm, select_best, Selection};
pub use submit::{ChannelSink, NullSink, SubmitSink, Submission};
pub use cpuhash_core::{ScanKernel, ScanOutcome, WorkItem};
