//! Backend configuration
//!
//! Built once at startup from, in increasing precedence: defaults, an
//! optional JSON file, environment variables, command-line flags. Immutable
//! afterwards; workers only ever see it through the [`CpuBackend`].
//!
//! [`CpuBackend`]: crate::device::CpuBackend

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bench::BenchSettings;
use crate::error::{BackendError, Result};
use crate::registry::AlgorithmFamily;

/// Largest accepted worker-thread override
pub const MAX_THREADS: usize = 9999;

pub const ENV_THREADS: &str = "CPUHASH_THREADS";
pub const ENV_ALGO: &str = "CPUHASH_ALGO";
pub const ENV_FAMILY: &str = "CPUHASH_FAMILY";

/// Benchmark every kernel, or use the named one
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlgorithmChoice {
    #[default]
    Auto,
    Named(String),
}

impl AlgorithmChoice {
    /// `"auto"` (any case) or an empty string selects auto mode
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            AlgorithmChoice::Auto
        } else {
            AlgorithmChoice::Named(value.to_string())
        }
    }
}

impl From<String> for AlgorithmChoice {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AlgorithmChoice> for String {
    fn from(choice: AlgorithmChoice) -> Self {
        choice.to_string()
    }
}

impl fmt::Display for AlgorithmChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmChoice::Auto => f.write_str("auto"),
            AlgorithmChoice::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub family: AlgorithmFamily,
    pub algorithm: AlgorithmChoice,
    /// Worker count override; `None` sizes from the detected cores
    pub threads: Option<usize>,
    /// Mine on the CPU even when other hardware backends are active
    pub use_cpu: bool,
    /// Set by the device manager when GPUs or ASICs were detected
    pub other_backends_active: bool,
    pub bench: BenchSettings,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            family: AlgorithmFamily::Sha256d,
            algorithm: AlgorithmChoice::Auto,
            threads: None,
            use_cpu: false,
            other_backends_active: false,
            bench: BenchSettings::default(),
        }
    }
}

impl BackendConfig {
    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BackendError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| BackendError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CPUHASH_THREADS`, `CPUHASH_ALGO` and `CPUHASH_FAMILY`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var(ENV_THREADS) {
            let threads = value.trim().parse::<usize>().map_err(|_| {
                BackendError::Config(format!("{ENV_THREADS}: not a thread count: {value:?}"))
            })?;
            self.set_threads(threads)?;
        }
        if let Ok(value) = env::var(ENV_ALGO) {
            self.algorithm = AlgorithmChoice::parse(&value);
        }
        if let Ok(value) = env::var(ENV_FAMILY) {
            self.family = value.parse()?;
        }
        Ok(())
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        if threads > MAX_THREADS {
            return Err(BackendError::InvalidThreadCount(threads));
        }
        self.threads = Some(threads);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        match self.threads {
            Some(threads) if threads > MAX_THREADS => Err(BackendError::InvalidThreadCount(threads)),
            _ => Ok(()),
        }
    }
}
