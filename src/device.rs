//! Device worker lifecycle
//!
//! The external device manager owns the threads. It calls, in order:
//!
//! 1. [`DeviceDriver::detect`] once, to register one logical device per worker
//! 2. [`DeviceDriver::thread_prepare`] and [`DeviceDriver::thread_init`] on
//!    each worker thread
//! 3. [`DeviceDriver::scan`] repeatedly, with ranges no larger than
//!    [`DeviceDriver::can_limit_work`]
//!
//! Work is abandoned by raising the worker's restart flag through a
//! [`RestartHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpuhash_core::WorkItem;
use serde::Serialize;

use crate::bench::Harness;
use crate::config::BackendConfig;
use crate::engine::{ScanEngine, ScanState};
use crate::error::Result;
use crate::logging::prelude::*;
use crate::registry::{AlgorithmId, Registry};
use crate::selector::resolve_algorithm;
use crate::submit::SubmitSink;
use crate::topology;

/// Largest nonce range handed to a CPU worker in one scan call
pub const CPU_WORK_LIMIT: u32 = 0xffff;

/// Per-worker bookkeeping, exclusively owned by the worker's thread
#[derive(Debug)]
pub struct WorkerState {
    pub id: usize,
    /// Core the thread is pinned to
    pub cpu: Option<usize>,
    /// Raised by controllers to abandon the current work
    pub work_restart: Arc<AtomicBool>,
    pub hashes_done: u64,
    pub checked_in: bool,
    pub state: ScanState,
}

impl WorkerState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            cpu: None,
            work_restart: Arc::new(AtomicBool::new(false)),
            hashes_done: 0,
            checked_in: false,
            state: ScanState::Idle,
        }
    }

    pub fn restart_handle(&self) -> RestartHandle {
        RestartHandle(Arc::clone(&self.work_restart))
    }

    /// Acknowledge a restart before starting on new work
    pub fn clear_restart(&self) {
        self.work_restart.store(false, Ordering::Relaxed);
    }

    pub fn restart_requested(&self) -> bool {
        self.work_restart.load(Ordering::Relaxed)
    }
}

/// Controller side of a worker's restart flag
#[derive(Debug, Clone)]
pub struct RestartHandle(Arc<AtomicBool>);

impl RestartHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Logical device record registered with the device manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuDevice {
    pub index: usize,
    pub kind: &'static str,
    pub enabled: bool,
    pub threads: usize,
    pub kernel_name: &'static str,
}

/// Accepts devices found during detection
pub trait DeviceRegistrar {
    fn add_device(&mut self, device: CpuDevice);
}

impl DeviceRegistrar for Vec<CpuDevice> {
    fn add_device(&mut self, device: CpuDevice) {
        self.push(device);
    }
}

/// The calls a device manager makes into a hashing backend
pub trait DeviceDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Register devices; returns how many were added
    fn detect(&mut self, registrar: &mut dyn DeviceRegistrar) -> usize;

    fn thread_prepare(&self, worker: &mut WorkerState) -> bool;

    fn thread_init(&self, worker: &mut WorkerState) -> bool;

    /// Upper bound on the nonce range of a single [`DeviceDriver::scan`]
    fn can_limit_work(&self, worker: &WorkerState) -> u32;

    /// Scan `work` from its nonce to `max_nonce`; returns nonces tried
    fn scan(&self, worker: &mut WorkerState, work: &mut WorkItem, max_nonce: u32) -> u64;
}

/// CPU implementation of [`DeviceDriver`]
#[derive(Debug)]
pub struct CpuBackend {
    config: BackendConfig,
    registry: Arc<Registry>,
    algorithm: AlgorithmId,
    engine: ScanEngine,
    cores: usize,
    workers: usize,
}

impl CpuBackend {
    /// Build the registry for the configured family and resolve the
    /// algorithm, benchmarking with the platform's default isolation in auto
    /// mode.
    pub fn new(config: BackendConfig, sink: Arc<dyn SubmitSink>) -> Result<Self> {
        let harness = Harness::with_default_isolation(config.bench.clone());
        Self::with_harness(config, &harness, sink)
    }

    pub fn with_harness(
        config: BackendConfig,
        harness: &Harness,
        sink: Arc<dyn SubmitSink>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(Registry::for_family(config.family)?);
        let algorithm = resolve_algorithm(&config, &registry, harness)?;
        Ok(Self::from_parts(config, registry, algorithm, sink))
    }

    /// Assemble a backend around an already resolved algorithm
    pub fn from_parts(
        config: BackendConfig,
        registry: Arc<Registry>,
        algorithm: AlgorithmId,
        sink: Arc<dyn SubmitSink>,
    ) -> Self {
        let engine = ScanEngine::new(registry.kernel(algorithm), sink);
        Self {
            config,
            registry,
            algorithm,
            engine,
            cores: topology::detect_cores(),
            workers: 0,
        }
    }

    /// Pretend the machine has `cores` logical processors
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores.max(1);
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Names of every algorithm available for the configured family
    pub fn algorithms(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Worker count decided by the last [`DeviceDriver::detect`]
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn new_worker(&self, id: usize) -> WorkerState {
        WorkerState::new(id)
    }
}

impl DeviceDriver for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, registrar: &mut dyn DeviceRegistrar) -> usize {
        self.workers = topology::worker_count(
            self.cores,
            self.config.threads,
            self.config.other_backends_active,
            self.config.use_cpu,
        );

        for index in 0..self.workers {
            registrar.add_device(CpuDevice {
                index,
                kind: "CPU",
                enabled: true,
                threads: 1,
                kernel_name: self.algorithm_name(),
            });
        }

        info!(
            workers = self.workers,
            cores = self.cores,
            algorithm = self.algorithm_name(),
            "Detected CPU workers"
        );
        self.workers
    }

    fn thread_prepare(&self, worker: &mut WorkerState) -> bool {
        worker.checked_in = true;
        true
    }

    fn thread_init(&self, worker: &mut WorkerState) -> bool {
        topology::lower_priority();

        if let Some(core) = topology::affinity_for(worker.id, self.workers, self.cores) {
            info!(worker = worker.id, core, "Binding worker to CPU");
            if topology::pin_current_thread(core) {
                worker.cpu = Some(core);
            }
        }
        self.engine.prepare_thread();
        true
    }

    fn can_limit_work(&self, _worker: &WorkerState) -> u32 {
        CPU_WORK_LIMIT
    }

    fn scan(&self, worker: &mut WorkerState, work: &mut WorkItem, max_nonce: u32) -> u64 {
        self.engine.scan(worker, work, max_nonce).tried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::InProcessIsolation;
    use crate::config::AlgorithmChoice;
    use crate::registry::AlgorithmFamily;
    use crate::submit::NullSink;

    fn backend(config: BackendConfig) -> CpuBackend {
        let harness = Harness::new(Box::new(InProcessIsolation), config.bench.clone());
        CpuBackend::with_harness(config, &harness, Arc::new(NullSink)).unwrap()
    }

    fn named(name: &str) -> BackendConfig {
        BackendConfig {
            algorithm: AlgorithmChoice::Named(name.into()),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn test_detect_registers_one_device_per_core() {
        let mut cpu = backend(named("sha2")).with_cores(4);
        let mut devices: Vec<CpuDevice> = Vec::new();

        assert_eq!(cpu.detect(&mut devices), 4);
        assert_eq!(devices.len(), 4);
        for (i, device) in devices.iter().enumerate() {
            assert_eq!(device.index, i);
            assert_eq!(device.kind, "CPU");
            assert_eq!(device.threads, 1);
            assert_eq!(device.kernel_name, "sha2");
            assert!(device.enabled);
        }
    }

    #[test]
    fn test_detect_respects_other_backends() {
        let config = BackendConfig {
            other_backends_active: true,
            ..named("c")
        };
        let mut cpu = backend(config).with_cores(8);
        let mut devices: Vec<CpuDevice> = Vec::new();
        assert_eq!(cpu.detect(&mut devices), 0);

        let config = BackendConfig {
            other_backends_active: true,
            threads: Some(2),
            ..named("c")
        };
        let mut cpu = backend(config).with_cores(8);
        let mut devices: Vec<CpuDevice> = Vec::new();
        assert_eq!(cpu.detect(&mut devices), 2);
    }

    #[test]
    fn test_lifecycle_and_scan() {
        let mut cpu = backend(named("digest")).with_cores(1);
        let mut devices: Vec<CpuDevice> = Vec::new();
        cpu.detect(&mut devices);

        let mut worker = cpu.new_worker(0);
        assert!(cpu.thread_prepare(&mut worker));
        assert!(worker.checked_in);
        assert!(cpu.thread_init(&mut worker));
        assert_eq!(cpu.can_limit_work(&worker), 0xffff);

        let mut work = WorkItem::from_header(&[5u8; 80], [0u8; 32]);
        work.set_nonce(0);
        assert_eq!(cpu.scan(&mut worker, &mut work, 300), 300);
        assert_eq!(worker.hashes_done, 300);
    }

    #[test]
    fn test_restart_handle_cancels_scan() {
        let cpu = backend(named("sha2"));
        let mut worker = cpu.new_worker(3);
        worker.restart_handle().request();
        assert!(worker.restart_requested());

        let mut work = WorkItem::from_header(&[5u8; 80], [0u8; 32]);
        work.set_nonce(0);
        assert_eq!(cpu.scan(&mut worker, &mut work, 1000), 0);

        worker.clear_restart();
        assert_eq!(cpu.scan(&mut worker, &mut work, 1000), 1000);
    }

    #[test]
    fn test_family_none_idles() {
        let config = BackendConfig {
            family: AlgorithmFamily::None,
            ..BackendConfig::default()
        };
        let cpu = backend(config);
        assert_eq!(cpu.algorithm(), AlgorithmId::Void);
        assert!(cpu.algorithms().is_empty());

        let mut worker = cpu.new_worker(0);
        let mut work = WorkItem::from_header(&[5u8; 80], [0u8; 32]);
        assert_eq!(cpu.scan(&mut worker, &mut work, u32::MAX), 0);
    }

    #[test]
    fn test_unknown_algorithm_is_fatal() {
        let harness = Harness::new(Box::new(InProcessIsolation), Default::default());
        let err = CpuBackend::with_harness(named("neoscrypt"), &harness, Arc::new(NullSink))
            .unwrap_err();
        assert!(matches!(err, crate::error::BackendError::UnknownAlgorithm(_)));
    }
}
