//! Background watchdog over all safety-tracked actuators.
//!
//! The monitor is an ordinary value owned by the application. Registering
//! the first actuator starts one named thread that wakes every
//! `wake_interval` and runs [`SafetyMonitor::check_motors`] on every
//! `wakes_per_check`-th wake. The registry holds weak references only, so
//! dropping an actuator removes it without affecting the others. The thread
//! stops when the monitor is shut down or dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chopper_common::consts::{WATCHDOG_WAKE_INTERVAL_MS, WATCHDOG_WAKES_PER_CHECK};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::ControlError;
use crate::rt::ThreadPlacement;
use crate::safety::record::SafetyTrackedActuator;

const WATCHDOG_THREAD_NAME: &str = "motor-safety";

/// How often the watchdog wakes and how many wakes make one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogCadence {
    pub wake_interval: Duration,
    pub wakes_per_check: u32,
}

impl Default for WatchdogCadence {
    fn default() -> Self {
        Self {
            wake_interval: Duration::from_millis(WATCHDOG_WAKE_INTERVAL_MS),
            wakes_per_check: WATCHDOG_WAKES_PER_CHECK,
        }
    }
}

impl WatchdogCadence {
    /// Worst-case time between two checks.
    pub fn check_period(&self) -> Duration {
        self.wake_interval * self.wakes_per_check.max(1)
    }
}

struct Shared {
    actuators: Mutex<Vec<Weak<dyn SafetyTrackedActuator>>>,
    shutdown: Mutex<bool>,
    wake: Condvar,
    stops_issued: AtomicU64,
}

impl Shared {
    fn check_motors(&self) -> usize {
        // Snapshot under the lock; stop outside it.
        let live: Vec<Arc<dyn SafetyTrackedActuator>> = {
            let mut actuators = self.actuators.lock();
            actuators.retain(|weak| weak.strong_count() > 0);
            actuators.iter().filter_map(Weak::upgrade).collect()
        };

        let stopped = live.iter().filter(|actuator| actuator.check()).count();
        if stopped > 0 {
            self.stops_issued
                .fetch_add(stopped as u64, Ordering::Relaxed);
        }
        stopped
    }

    /// Sleep one wake interval. Returns `false` once shutdown is requested.
    fn sleep(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut shutdown = self.shutdown.lock();
        while !*shutdown {
            if self.wake.wait_until(&mut shutdown, deadline).timed_out() {
                break;
            }
        }
        !*shutdown
    }
}

pub struct SafetyMonitor {
    shared: Arc<Shared>,
    cadence: WatchdogCadence,
    placement: ThreadPlacement,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SafetyMonitor {
    pub fn new(cadence: WatchdogCadence, placement: ThreadPlacement) -> Self {
        Self {
            shared: Arc::new(Shared {
                actuators: Mutex::new(Vec::new()),
                shutdown: Mutex::new(false),
                wake: Condvar::new(),
                stops_issued: AtomicU64::new(0),
            }),
            cadence,
            placement,
            worker: Mutex::new(None),
        }
    }

    /// Add an actuator to the registry, starting the watchdog if needed.
    pub fn register<A>(&self, actuator: &Arc<A>) -> Result<(), ControlError>
    where
        A: SafetyTrackedActuator + 'static,
    {
        let weak: Weak<dyn SafetyTrackedActuator> = Arc::downgrade(actuator) as Weak<A>;
        self.shared.actuators.lock().push(weak);
        debug!(actuator = actuator.description(), "registered with safety monitor");
        self.ensure_started()
    }

    fn ensure_started(&self) -> Result<(), ControlError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        *self.shared.shutdown.lock() = false;

        let shared = Arc::clone(&self.shared);
        let cadence = self.cadence;
        let placement = self.placement;
        let handle = thread::Builder::new()
            .name(WATCHDOG_THREAD_NAME.to_string())
            .spawn(move || watchdog_loop(&shared, cadence, placement))
            .map_err(ControlError::WatchdogSpawn)?;

        info!(
            wake_ms = cadence.wake_interval.as_millis() as u64,
            wakes_per_check = cadence.wakes_per_check,
            "safety watchdog started"
        );
        *worker = Some(handle);
        Ok(())
    }

    /// Check every live actuator now, stopping those past their deadline.
    /// Returns the number stopped.
    pub fn check_motors(&self) -> usize {
        self.shared.check_motors()
    }

    /// Live actuators currently registered.
    pub fn registered_count(&self) -> usize {
        self.shared
            .actuators
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Total stops issued by checks since construction.
    pub fn stops_issued(&self) -> u64 {
        self.shared.stops_issued.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub const fn cadence(&self) -> WatchdogCadence {
        self.cadence
    }

    /// Stop the watchdog thread and wait for it. Registered actuators stay
    /// registered; the next `register` restarts the thread.
    pub fn shutdown(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        *self.shared.shutdown.lock() = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            warn!("safety watchdog thread panicked");
        }
        info!("safety watchdog stopped");
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(WatchdogCadence::default(), ThreadPlacement::default())
    }
}

impl Drop for SafetyMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watchdog_loop(shared: &Shared, cadence: WatchdogCadence, placement: ThreadPlacement) {
    if let Err(e) = placement.apply() {
        warn!("safety watchdog running without RT placement: {e}");
    }

    let wakes_per_check = cadence.wakes_per_check.max(1);
    let mut wakes = 0u32;
    while shared.sleep(cadence.wake_interval) {
        wakes += 1;
        if wakes >= wakes_per_check {
            wakes = 0;
            shared.check_motors();
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::record::MotorSafety;
    use chopper_common::clock::{Clock, ManualClock, Millis};
    use std::sync::atomic::AtomicU32;

    struct Probe {
        safety: MotorSafety,
        stops: AtomicU32,
    }

    impl Probe {
        fn new(clock: &ManualClock, expiration_ms: Millis) -> Arc<Self> {
            let clock: Arc<dyn Clock> = Arc::new(clock.clone());
            Arc::new(Self {
                safety: MotorSafety::with_expiration(clock, expiration_ms),
                stops: AtomicU32::new(0),
            })
        }
    }

    impl SafetyTrackedActuator for Probe {
        fn safety(&self) -> &MotorSafety {
            &self.safety
        }

        fn stop_motor(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.safety.feed();
        }

        fn description(&self) -> &str {
            "probe"
        }
    }

    fn idle_monitor() -> SafetyMonitor {
        // Long wake interval keeps the background thread out of the way
        SafetyMonitor::new(
            WatchdogCadence {
                wake_interval: Duration::from_secs(3600),
                wakes_per_check: 1,
            },
            ThreadPlacement::default(),
        )
    }

    #[test]
    fn default_cadence_checks_every_400ms() {
        let cadence = WatchdogCadence::default();
        assert_eq!(cadence.check_period(), Duration::from_millis(400));
    }

    #[test]
    fn register_starts_watchdog_once() {
        let clock = ManualClock::new(0);
        let monitor = idle_monitor();
        assert!(!monitor.is_running());

        let a = Probe::new(&clock, 100);
        let b = Probe::new(&clock, 100);
        monitor.register(&a).unwrap();
        monitor.register(&b).unwrap();
        assert!(monitor.is_running());
        assert_eq!(monitor.registered_count(), 2);
    }

    #[test]
    fn check_motors_stops_only_expired() {
        let clock = ManualClock::new(0);
        let monitor = idle_monitor();
        let stale = Probe::new(&clock, 100);
        let fresh = Probe::new(&clock, 1000);
        monitor.register(&stale).unwrap();
        monitor.register(&fresh).unwrap();
        stale.safety().feed();
        fresh.safety().feed();

        clock.set(500);
        assert_eq!(monitor.check_motors(), 1);
        assert_eq!(stale.stops.load(Ordering::SeqCst), 1);
        assert_eq!(fresh.stops.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.stops_issued(), 1);
    }

    #[test]
    fn dropped_actuator_leaves_others_supervised() {
        let clock = ManualClock::new(0);
        let monitor = idle_monitor();
        let keep = Probe::new(&clock, 100);
        let gone = Probe::new(&clock, 100);
        monitor.register(&keep).unwrap();
        monitor.register(&gone).unwrap();
        drop(gone);

        assert_eq!(monitor.registered_count(), 1);
        assert!(monitor.is_running());
        clock.set(1000);
        assert_eq!(monitor.check_motors(), 1);
        assert_eq!(keep.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_joins_promptly() {
        let clock = ManualClock::new(0);
        let monitor = idle_monitor();
        let probe = Probe::new(&clock, 100);
        monitor.register(&probe).unwrap();

        let started = Instant::now();
        monitor.shutdown();
        assert!(!monitor.is_running());
        assert!(started.elapsed() < Duration::from_secs(5));
        // Registry survives a shutdown
        assert_eq!(monitor.registered_count(), 1);
    }
}
