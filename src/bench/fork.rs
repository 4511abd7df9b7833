//! Fork-based isolation
//!
//! The child is a copy of the supervisor's address space, so any kernel the
//! parent holds (including ones built at runtime) can be measured.
//!
//! Only the forking thread survives in the child. Kernel scratch state is
//! set up through [`ScanKernel::prepare`] before forking so the measurement
//! itself does not allocate. A kernel that panics still allocates on the
//! unwind path; if another parent thread held the allocator lock at fork
//! time the child stalls and is reported as failed by the timeout.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use cpuhash_core::ScanKernel;

use super::isolation::{BenchJob, IsolatedChild, Isolation};
use super::{measure_rate_guarded, read_rate_from, send_rate};

#[derive(Debug, Default, Clone, Copy)]
pub struct ForkIsolation;

impl Isolation for ForkIsolation {
    fn name(&self) -> &'static str {
        "fork"
    }

    fn spawn(&self, job: &BenchJob) -> io::Result<Box<dyn IsolatedChild>> {
        let (read_end, write_end) = nonblocking_pipe()?;
        let kernel: Arc<dyn ScanKernel> = Arc::clone(&job.entry.kernel);
        let mut work = job.work.clone();
        kernel.prepare();

        // SAFETY: the child branch never returns and leaves through `_exit`
        match unsafe { libc::fork() } {
            -1 => Err(io::Error::last_os_error()),
            0 => {
                drop(read_end);
                let rate = measure_rate_guarded(kernel.as_ref(), &mut work, job.max_nonce);
                let mut out = File::from(write_end);
                let code = match send_rate(&mut out, rate, job.write_retries, job.retry_delay) {
                    Ok(()) => 0,
                    Err(_) => 1,
                };
                // SAFETY: terminates the forked child without running the
                // parent's atexit handlers or destructors
                unsafe { libc::_exit(code) }
            }
            pid => {
                drop(write_end);
                Ok(Box::new(ForkChild {
                    pid,
                    reader: File::from(read_end),
                    reaped: false,
                }))
            }
        }
    }
}

struct ForkChild {
    pid: libc::pid_t,
    reader: File,
    reaped: bool,
}

impl IsolatedChild for ForkChild {
    fn try_wait(&mut self) -> io::Result<Option<bool>> {
        if self.reaped {
            return Ok(Some(false));
        }

        let mut status: libc::c_int = 0;
        // SAFETY: plain syscall on a pid we own
        let rc = unsafe { libc::waitpid(self.pid, &mut status, libc::WNOHANG) };
        match rc {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(None);
                }
                Err(err)
            }
            0 => Ok(None),
            _ => {
                self.reaped = true;
                Ok(Some(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0))
            }
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.reaped {
            return Ok(());
        }

        // SAFETY: plain syscalls on a pid we own and have not reaped
        unsafe {
            libc::kill(self.pid, libc::SIGKILL);
        }
        loop {
            let mut status: libc::c_int = 0;
            let rc = unsafe { libc::waitpid(self.pid, &mut status, 0) };
            if rc != -1 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                self.reaped = true;
                return Err(err);
            }
        }
        self.reaped = true;
        Ok(())
    }

    fn read_rate(&mut self) -> io::Result<Option<f64>> {
        read_rate_from(&mut self.reader)
    }
}

impl Drop for ForkChild {
    fn drop(&mut self) {
        let _ = self.kill();
    }
}

/// One-way pipe with both ends non-blocking
fn nonblocking_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    // SAFETY: `fds` has room for the two descriptors pipe(2) writes
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe(2) succeeded, both descriptors are open and ours
    let (read_end, write_end) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    set_nonblocking(read_end.as_raw_fd())?;
    set_nonblocking(write_end.as_raw_fd())?;
    Ok((read_end, write_end))
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor owned by the caller
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
