//! CPU topology, worker sizing and thread placement
//!
//! Everything here that touches the OS is best effort: a failure is logged
//! and mining carries on unpinned or at normal priority.

use crate::logging::prelude::*;

/// Number of logical processors, at least 1
pub fn detect_cores() -> usize {
    num_cpus::get().max(1)
}

/// How many CPU workers to register
///
/// An explicit override always wins. Otherwise the CPU stays idle when other
/// hardware backends are mining, unless CPU mining was explicitly requested.
pub fn worker_count(
    cores: usize,
    thread_override: Option<usize>,
    other_backends_active: bool,
    use_cpu: bool,
) -> usize {
    match thread_override {
        Some(threads) => threads,
        None if other_backends_active && !use_cpu => 0,
        None => cores,
    }
}

/// Core a worker should be pinned to, if any
///
/// Workers are only pinned when they divide the cores evenly, spread with a
/// stride of `cores / workers`: 4 workers on 8 cores land on 0, 2, 4, 6.
pub fn affinity_for(worker: usize, workers: usize, cores: usize) -> Option<usize> {
    if workers == 0 || cores == 0 || worker >= workers || cores % workers != 0 {
        return None;
    }
    Some(worker * (cores / workers))
}

/// Pin the calling thread to `core`
pub fn pin_current_thread(core: usize) -> bool {
    let pinned = core_affinity::set_for_current(core_affinity::CoreId { id: core });
    if pinned {
        debug!(core, "Pinned worker thread");
    } else {
        warn!(core, "Failed to set CPU affinity");
    }
    pinned
}

/// Drop the calling thread to the lowest scheduling priority
pub fn lower_priority() {
    #[cfg(unix)]
    unix::lower_priority();
}

#[cfg(unix)]
mod unix {
    use crate::logging::prelude::*;

    pub(super) fn lower_priority() {
        // SAFETY: adjusts the nice value of the calling thread only
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, 19) };
        if rc != 0 {
            debug!(error = %std::io::Error::last_os_error(), "setpriority failed");
        }

        #[cfg(target_os = "linux")]
        idle_scheduling();
    }

    #[cfg(target_os = "linux")]
    fn idle_scheduling() {
        // SAFETY: sched_param is plain data; priority must be 0 for these policies
        let param: libc::sched_param = unsafe { std::mem::zeroed() };

        if unsafe { libc::sched_setscheduler(0, libc::SCHED_IDLE, &param) } == 0 {
            debug!("Worker scheduled with SCHED_IDLE");
            return;
        }
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_BATCH, &param) } == 0 {
            debug!("Worker scheduled with SCHED_BATCH");
            return;
        }
        debug!(error = %std::io::Error::last_os_error(), "Could not lower scheduling policy");
    }
}
