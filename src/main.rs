//! cpuhash CLI
//!
//! Command-line front end for the CPU mining backend.
//!
//! # Commands
//!
//! - `list` - Show the algorithms available for a family
//! - `benchmark` - Benchmark kernels in isolation and rank them
//! - `mine` - Mine a block header on every core for a fixed time

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;

use cpuhash::bench::{run_isolated_child, Harness};
use cpuhash::kernels::{target_from_difficulty_bits, HEADER_LEN};
use cpuhash::logging::{self, prelude::*};
use cpuhash::{
    select_best, AlgorithmChoice, AlgorithmFamily, BackendConfig, ChannelSink, CpuBackend,
    CpuDevice, DeviceDriver, Registry, Submission, WorkItem,
};

#[derive(Parser)]
#[command(name = "cpuhash")]
#[command(author = "Cyberia")]
#[command(version = "0.1.0")]
#[command(about = "CPU proof-of-work mining backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Algorithm family: sha256d, uhash or none
    #[arg(long, global = true)]
    family: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the algorithms available for the family
    List,

    /// Benchmark kernels in isolation and pick the fastest
    Benchmark {
        /// Benchmark only this algorithm
        #[arg(short, long)]
        algo: Option<String>,

        /// Nonces per measurement (default depends on the family)
        #[arg(long)]
        max_nonce: Option<u32>,
    },

    /// Mine a block header on every worker for a fixed time
    Mine {
        /// Number of worker threads (default: number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Algorithm name, or "auto" to benchmark and pick the fastest
        #[arg(short, long)]
        algo: Option<String>,

        /// Target difficulty (number of leading zero bits)
        #[arg(short, long, default_value = "16")]
        difficulty: u32,

        /// 80-byte block header as hex (default: random)
        #[arg(long)]
        header: Option<String>,

        /// Stop after this many seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },

    /// Isolated benchmark child (internal)
    #[command(name = "bench-algo", hide = true)]
    BenchAlgo {
        #[arg(long)]
        family: String,

        #[arg(long)]
        max_nonce: Option<u32>,

        #[arg(long, default_value = "5")]
        write_retries: u32,

        #[arg(long, default_value = "1000")]
        retry_delay_ms: u64,

        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Commands::BenchAlgo {
            ref family,
            max_nonce,
            write_retries,
            retry_delay_ms,
            ref name,
        } => cmd_bench_algo(family, name, max_nonce, write_retries, retry_delay_ms),
        ref command => load_config(&cli).and_then(|config| match command {
            Commands::List => cmd_list(&config),
            Commands::Benchmark { algo, max_nonce } => {
                cmd_benchmark(config, algo.as_deref(), *max_nonce)
            }
            Commands::Mine {
                threads,
                algo,
                difficulty,
                header,
                seconds,
            } => cmd_mine(
                config,
                *threads,
                algo.as_deref(),
                *difficulty,
                header.as_deref(),
                *seconds,
            ),
            Commands::BenchAlgo { .. } => Ok(()),
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Defaults, then the config file, then the environment, then global flags
fn load_config(cli: &Cli) -> anyhow::Result<BackendConfig> {
    let mut config = match &cli.config {
        Some(path) => BackendConfig::load(path)?,
        None => BackendConfig::default(),
    };
    config.apply_env()?;

    if let Some(family) = &cli.family {
        config.family = family.parse()?;
    }
    Ok(config)
}

fn cmd_list(config: &BackendConfig) -> anyhow::Result<()> {
    let registry = Registry::for_family(config.family)?;

    println!("Algorithms for {}:", config.family);
    if registry.is_empty() {
        println!("  (none, CPU hashing disabled)");
    }
    for name in registry.names() {
        println!("  {}", name);
    }
    println!("Default: {}", config.algorithm);

    Ok(())
}

fn cmd_benchmark(
    mut config: BackendConfig,
    algo: Option<&str>,
    max_nonce: Option<u32>,
) -> anyhow::Result<()> {
    if max_nonce.is_some() {
        config.bench.max_nonce = max_nonce;
    }

    let registry = Registry::for_family(config.family)?;
    let harness = Harness::with_default_isolation(config.bench.clone());
    let family = registry.family();

    println!(
        "Benchmarking {} kernels ({} isolation, {} nonces each)...",
        family,
        harness.isolation_name(),
        config.bench.nonce_ceiling(family)
    );

    if let Some(name) = algo {
        let id = registry.parse(name)?;
        let entry = registry
            .get(id)
            .with_context(|| format!("algorithm {} not registered", id))?;
        let result = harness.measure(family, entry)?;

        if result.ok {
            println!("  {}: {:.3} MH/s", entry.name, result.rate);
        } else {
            anyhow::bail!("{} fails on this platform", entry.name);
        }
        return Ok(());
    }

    let selection = select_best(&registry, |entry| harness.measure(family, entry))?;

    println!("\nResults:");
    for result in &selection.results {
        let name = result.algorithm.name();
        if result.ok {
            println!("  {}{}  {:.3} MH/s", name, registry.pad(name), result.rate);
        } else {
            println!("  {}{}  failed", name, registry.pad(name));
        }
    }
    println!("\nSelected: {}", selection.winner);

    Ok(())
}

fn cmd_mine(
    mut config: BackendConfig,
    threads: Option<usize>,
    algo: Option<&str>,
    difficulty: u32,
    header: Option<&str>,
    seconds: u64,
) -> anyhow::Result<()> {
    if let Some(threads) = threads {
        config.set_threads(threads)?;
    }
    if let Some(algo) = algo {
        config.algorithm = AlgorithmChoice::parse(algo);
    }
    config.use_cpu = true;

    let template = match header {
        Some(hex) => WorkItem::from_header_hex(hex, target_from_difficulty_bits(difficulty))?,
        None => {
            let mut header = [0u8; HEADER_LEN];
            getrandom::getrandom(&mut header)
                .map_err(|e| anyhow::anyhow!("failed to generate a random header: {}", e))?;
            WorkItem::from_header(&header, target_from_difficulty_bits(difficulty))
        }
    };

    let (tx, rx) = crossbeam_channel::bounded::<Submission>(1024);
    let mut cpu = CpuBackend::new(config, Arc::new(ChannelSink::new(tx)))?;

    let mut devices: Vec<CpuDevice> = Vec::new();
    let workers = cpu.detect(&mut devices);
    if workers == 0 {
        anyhow::bail!("No CPU workers to start. Use --threads to request some.");
    }

    info!(
        workers,
        algorithm = cpu.algorithm_name(),
        difficulty,
        seconds,
        "Starting mining"
    );

    let cpu = Arc::new(cpu);
    let slice = (u64::from(u32::MAX) + 1) / workers as u64;
    let mut restarts = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);

    for id in 0..workers {
        let mut worker = cpu.new_worker(id);
        restarts.push(worker.restart_handle());

        let first = (id as u64 * slice) as u32;
        let end = if id + 1 == workers {
            u32::MAX
        } else {
            ((id as u64 + 1) * slice) as u32
        };

        let mut work = template.clone();
        work.set_nonce(first);

        let cpu = Arc::clone(&cpu);
        let handle = thread::Builder::new()
            .name(format!("cpu-{}", id))
            .spawn(move || {
                cpu.thread_prepare(&mut worker);
                cpu.thread_init(&mut worker);
                let limit = cpu.can_limit_work(&worker);

                while !worker.restart_requested() && work.nonce() < end {
                    let max_nonce = work.nonce().saturating_add(limit).min(end);
                    cpu.scan(&mut worker, &mut work, max_nonce);
                }
                worker.hashes_done
            })
            .context("failed to spawn worker thread")?;
        handles.push(handle);
    }

    let start = Instant::now();
    let deadline = start + Duration::from_secs(seconds);
    let mut found = 0u64;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        match rx.recv_timeout(deadline - now) {
            Ok(submission) => {
                found += 1;
                println!("{}", serde_json::to_string(&submission)?);
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for restart in &restarts {
        restart.request();
    }

    let mut hashes = 0u64;
    for handle in handles {
        hashes += handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
    }

    // Solutions that arrived while workers were stopping
    for submission in rx.try_iter() {
        found += 1;
        println!("{}", serde_json::to_string(&submission)?);
    }

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        hashes,
        solutions = found,
        "Hashrate: {:.3} MH/s over {:.1}s",
        hashes as f64 / elapsed.max(f64::EPSILON) / 1e6,
        elapsed
    );

    Ok(())
}

fn cmd_bench_algo(
    family: &str,
    name: &str,
    max_nonce: Option<u32>,
    write_retries: u32,
    retry_delay_ms: u64,
) -> anyhow::Result<()> {
    let family: AlgorithmFamily = family.parse()?;
    run_isolated_child(
        family,
        name,
        max_nonce,
        write_retries,
        Duration::from_millis(retry_delay_ms),
    )?;
    Ok(())
}
