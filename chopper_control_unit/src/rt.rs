//! Real-time thread placement.
//!
//! A [`ThreadPlacement`] says where a thread should run: which CPU core and
//! at what `SCHED_FIFO` priority. It is applied by the thread itself, so the
//! control loop and the `motor-safety` watchdog each place themselves.
//!
//! Only builds with the `rt` feature touch the OS. Otherwise placement is
//! recorded and logged but nothing is changed, so the same binary runs
//! unprivileged on a desktop.

use tracing::debug;

use crate::error::ControlError;

/// CPU placement for a thread; `None` leaves the OS defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadPlacement {
    pub cpu_core: Option<usize>,
    pub priority: Option<i32>,
}

impl ThreadPlacement {
    /// Nothing to change for this thread.
    pub const fn is_default(&self) -> bool {
        self.cpu_core.is_none() && self.priority.is_none()
    }

    /// Pin the calling thread, then raise its scheduling class.
    pub fn apply(&self) -> Result<(), ControlError> {
        if let Some(cpu) = self.cpu_core {
            pin_to_core(cpu)?;
        }
        if let Some(priority) = self.priority {
            run_fifo(priority)?;
        }
        if !self.is_default() {
            debug!(placement = ?self, "thread placed");
        }
        Ok(())
    }

    /// Control loop setup: lock every page in memory, then [`apply`](Self::apply).
    pub fn apply_locked(&self) -> Result<(), ControlError> {
        lock_memory()?;
        self.apply()
    }
}

// ─── OS calls (`rt` feature) ────────────────────────────────────────

#[cfg(feature = "rt")]
fn lock_memory() -> Result<(), ControlError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| ControlError::RtSetup(format!("cannot lock memory: {e}")))
}

#[cfg(feature = "rt")]
fn pin_to_core(cpu: usize) -> Result<(), ControlError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cores = CpuSet::new();
    cores
        .set(cpu)
        .map_err(|e| ControlError::RtSetup(format!("no CPU core {cpu}: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cores)
        .map_err(|e| ControlError::RtSetup(format!("cannot pin to core {cpu}: {e}")))
}

#[cfg(feature = "rt")]
fn run_fifo(priority: i32) -> Result<(), ControlError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: pid 0 is the calling thread and `param` outlives the call.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(ControlError::RtSetup(format!(
            "cannot switch to SCHED_FIFO at {priority}: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn lock_memory() -> Result<(), ControlError> {
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn pin_to_core(_cpu: usize) -> Result<(), ControlError> {
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn run_fifo(_priority: i32) -> Result<(), ControlError> {
    Ok(())
}
