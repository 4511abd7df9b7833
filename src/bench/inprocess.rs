//! In-process "isolation"
//!
//! Runs the measurement on the calling thread. Panics are caught, but a
//! kernel that faults or hangs takes the whole process with it. Meant for
//! environments that can neither fork nor spawn processes.

use std::io;

use super::isolation::{BenchJob, IsolatedChild, Isolation};
use super::measure_rate_guarded;

#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessIsolation;

impl Isolation for InProcessIsolation {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn spawn(&self, job: &BenchJob) -> io::Result<Box<dyn IsolatedChild>> {
        let mut work = job.work.clone();
        let rate = measure_rate_guarded(job.entry.kernel.as_ref(), &mut work, job.max_nonce);
        Ok(Box::new(Finished { rate }))
    }
}

/// A measurement that completed before the supervisor started polling
struct Finished {
    rate: f64,
}

impl IsolatedChild for Finished {
    fn try_wait(&mut self) -> io::Result<Option<bool>> {
        Ok(Some(true))
    }

    fn kill(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_rate(&mut self) -> io::Result<Option<f64>> {
        Ok(Some(self.rate))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cpuhash_core::Sha2Kernel;

    use crate::bench::{BenchSettings, Harness};
    use crate::registry::{AlgorithmEntry, AlgorithmFamily, AlgorithmId};

    use super::*;

    #[test]
    fn test_in_process_measurement() {
        let settings = BenchSettings {
            max_nonce: Some(1 << 14),
            ..BenchSettings::default()
        };
        let harness = Harness::new(Box::new(InProcessIsolation), settings);
        let entry = AlgorithmEntry::new(AlgorithmId::Sha2, Arc::new(Sha2Kernel));

        let result = harness.measure(AlgorithmFamily::Sha256d, &entry).unwrap();
        assert_eq!(result.algorithm, AlgorithmId::Sha2);
        assert!(result.ok);
        assert!(result.rate > 0.0);
    }
}
