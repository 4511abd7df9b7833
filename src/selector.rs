//! Algorithm selection
//!
//! In auto mode every registered kernel is benchmarked in isolation and the
//! fastest one that survived wins. An explicit name skips benchmarking.

use crate::bench::{BenchmarkResult, Harness};
use crate::config::{AlgorithmChoice, BackendConfig};
use crate::error::{BackendError, Result};
use crate::logging::prelude::*;
use crate::registry::{AlgorithmEntry, AlgorithmFamily, AlgorithmId, Registry};

/// Ranking produced by auto-selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub winner: AlgorithmId,
    /// One result per registry entry, in registry order
    pub results: Vec<BenchmarkResult>,
}

impl Selection {
    pub fn winner_result(&self) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.algorithm == self.winner)
    }
}

/// Highest rate among successful results; the earliest entry wins ties
pub fn pick_best(results: &[BenchmarkResult]) -> Option<AlgorithmId> {
    let mut best: Option<&BenchmarkResult> = None;
    for result in results.iter().filter(|r| r.ok) {
        match best {
            Some(current) if result.rate <= current.rate => {}
            _ => best = Some(result),
        }
    }
    best.map(|r| r.algorithm)
}

/// Benchmark every entry of `registry` with `measure` and pick the winner
///
/// `measure` normally wraps [`Harness::measure`]; an error from it aborts
/// selection. Having no successful result at all is
/// [`BackendError::NoViableAlgorithm`].
pub fn select_best<F>(registry: &Registry, mut measure: F) -> Result<Selection>
where
    F: FnMut(&AlgorithmEntry) -> Result<BenchmarkResult>,
{
    let mut results = Vec::with_capacity(registry.len());

    for entry in registry.entries() {
        let pad = registry.pad(entry.name);
        info!("{}{}: benchmarking", entry.name, pad);

        let result = measure(entry)?;
        if result.ok {
            info!("{}{}: runs at {:.3} MH/s", entry.name, pad, result.rate);
        } else {
            warn!("{}{}: fails on this platform", entry.name, pad);
        }
        results.push(result);
    }

    let winner = pick_best(&results).ok_or(BackendError::NoViableAlgorithm)?;
    if let Some(best) = results.iter().find(|r| r.algorithm == winner) {
        info!(
            "Using {} ({:.3} MH/s) for {} hashing",
            winner,
            best.rate,
            registry.family()
        );
    }

    Ok(Selection { winner, results })
}

/// Turn the configured choice into a concrete algorithm
///
/// Family `None` always resolves to [`AlgorithmId::Void`] without touching
/// the harness.
pub fn resolve_algorithm(
    config: &BackendConfig,
    registry: &Registry,
    harness: &Harness,
) -> Result<AlgorithmId> {
    if registry.family() == AlgorithmFamily::None {
        return Ok(AlgorithmId::Void);
    }

    match &config.algorithm {
        AlgorithmChoice::Named(name) => {
            let id = registry.parse(name)?;
            info!("Using {} for {} hashing", id, registry.family());
            Ok(id)
        }
        AlgorithmChoice::Auto => {
            info!(
                isolation = harness.isolation_name(),
                "Benchmarking {} kernels",
                registry.len()
            );
            let family = registry.family();
            let selection = select_best(registry, |entry| harness.measure(family, entry))?;
            Ok(selection.winner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256d() -> Registry {
        Registry::for_family(AlgorithmFamily::Sha256d).unwrap()
    }

    /// Looks up a canned rate per algorithm; `None` means the kernel failed
    fn canned(rates: &[(AlgorithmId, Option<f64>)]) -> impl FnMut(&AlgorithmEntry) -> Result<BenchmarkResult> + '_ {
        move |entry| {
            let rate = rates
                .iter()
                .find(|(id, _)| *id == entry.id)
                .and_then(|(_, rate)| *rate);
            Ok(BenchmarkResult::from_rate(entry.id, rate))
        }
    }

    #[test]
    fn test_fastest_surviving_kernel_wins() {
        let rates = [
            (AlgorithmId::Portable, Some(2.0)),
            (AlgorithmId::Sha2, Some(5.0)),
            (AlgorithmId::Digest, None),
        ];

        let selection = select_best(&sha256d(), canned(&rates)).unwrap();

        assert_eq!(selection.winner, AlgorithmId::Sha2);
        assert_eq!(selection.results.len(), 3);
        assert!(!selection.results[2].ok);
        assert_eq!(selection.winner_result().unwrap().rate, 5.0);
    }

    /// Shared buffer the fmt subscriber writes formatted events into
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_selection_logs_every_candidate() {
        let rates = [
            (AlgorithmId::Portable, Some(2.0)),
            (AlgorithmId::Sha2, Some(5.0)),
            (AlgorithmId::Digest, None),
        ];
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .finish();

        let selection = tracing::subscriber::with_default(subscriber, || {
            select_best(&sha256d(), canned(&rates)).unwrap()
        });
        assert_eq!(selection.winner, AlgorithmId::Sha2);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("c     : runs at 2.000 MH/s"), "{output}");
        assert!(output.contains("sha2  : runs at 5.000 MH/s"), "{output}");
        assert!(output.contains("digest: fails on this platform"), "{output}");
        assert!(output.contains("Using sha2 (5.000 MH/s) for sha256d hashing"), "{output}");
    }

    #[test]
    fn test_failed_kernel_never_selected() {
        // A failed result carries a sentinel rate; it must not beat anything
        let results = [
            BenchmarkResult::success(AlgorithmId::Portable, 0.001),
            BenchmarkResult::failed(AlgorithmId::Sha2),
        ];
        assert_eq!(pick_best(&results), Some(AlgorithmId::Portable));
    }

    #[test]
    fn test_ties_keep_earliest() {
        let rates = [
            (AlgorithmId::Portable, Some(3.0)),
            (AlgorithmId::Sha2, Some(3.0)),
            (AlgorithmId::Digest, Some(3.0)),
        ];

        let selection = select_best(&sha256d(), canned(&rates)).unwrap();
        assert_eq!(selection.winner, AlgorithmId::Portable);
    }

    #[test]
    fn test_all_failed_is_an_error() {
        let rates = [
            (AlgorithmId::Portable, None),
            (AlgorithmId::Sha2, None),
            (AlgorithmId::Digest, None),
        ];

        let err = select_best(&sha256d(), canned(&rates)).unwrap_err();
        assert!(matches!(err, BackendError::NoViableAlgorithm));
    }

    #[test]
    fn test_measure_error_aborts() {
        let err = select_best(&sha256d(), |_| {
            Err(BackendError::Isolation(std::io::Error::other("no pipes")))
        })
        .unwrap_err();
        assert!(matches!(err, BackendError::Isolation(_)));
    }

    #[test]
    fn test_every_entry_measured_in_order() {
        let mut seen = Vec::new();
        let _ = select_best(&sha256d(), |entry| {
            seen.push(entry.id);
            Ok(BenchmarkResult::success(entry.id, 1.0))
        });
        assert_eq!(
            seen,
            vec![AlgorithmId::Portable, AlgorithmId::Sha2, AlgorithmId::Digest]
        );
    }

    #[test]
    fn test_resolve_named_and_void() {
        let harness = Harness::new(
            Box::new(crate::bench::InProcessIsolation),
            Default::default(),
        );

        let config = BackendConfig {
            algorithm: AlgorithmChoice::Named("digest".into()),
            ..BackendConfig::default()
        };
        let id = resolve_algorithm(&config, &sha256d(), &harness).unwrap();
        assert_eq!(id, AlgorithmId::Digest);

        let config = BackendConfig {
            algorithm: AlgorithmChoice::Named("altivec_4way".into()),
            ..BackendConfig::default()
        };
        let err = resolve_algorithm(&config, &sha256d(), &harness).unwrap_err();
        assert!(matches!(err, BackendError::UnknownAlgorithm(_)));

        let none = Registry::for_family(AlgorithmFamily::None).unwrap();
        let id = resolve_algorithm(&BackendConfig::default(), &none, &harness).unwrap();
        assert_eq!(id, AlgorithmId::Void);
    }

    #[test]
    fn test_resolve_auto_in_process() {
        let harness = Harness::new(
            Box::new(crate::bench::InProcessIsolation),
            crate::bench::BenchSettings {
                max_nonce: Some(1 << 12),
                ..Default::default()
            },
        );
        let config = BackendConfig::default();

        let id = resolve_algorithm(&config, &sha256d(), &harness).unwrap();
        assert!(matches!(
            id,
            AlgorithmId::Portable | AlgorithmId::Sha2 | AlgorithmId::Digest
        ));
    }
}
