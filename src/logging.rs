//! Logging setup
//!
//! Library code only emits `tracing` events. The binary calls [`init`] once
//! at startup to install a subscriber.

use std::io;

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
};

/// Convenient access to the logging macros
pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

/// Install a stderr subscriber filtered by `RUST_LOG`, defaulting to INFO.
///
/// Stdout stays reserved for machine-readable output (submissions, the
/// benchmark child's rate). Calling this twice is harmless.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .try_init();
}
