//! Per-actuator expiration record and the actuator-side safety contract.

use std::fmt;
use std::sync::Arc;

use chopper_common::clock::{Clock, Millis};
use chopper_common::consts::DEFAULT_SAFETY_EXPIRATION_MS;
use parking_lot::Mutex;
use tracing::warn;

/// Snapshot of one actuator's watchdog state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyRecord {
    /// How long a feed keeps the actuator alive [ms].
    pub expiration_ms: Millis,
    /// Time after which the actuator is considered dead [ms].
    pub deadline_ms: Millis,
    pub enabled: bool,
}

/// Expiration tracking shared between the control loop (feeds) and the
/// safety watchdog (checks).
///
/// Each method holds the internal lock only for the read or write of the
/// record itself.
pub struct MotorSafety {
    record: Mutex<SafetyRecord>,
    clock: Arc<dyn Clock>,
}

impl MotorSafety {
    /// Enabled, default expiration, deadline at construction time.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_expiration(clock, DEFAULT_SAFETY_EXPIRATION_MS)
    }

    pub fn with_expiration(clock: Arc<dyn Clock>, expiration_ms: Millis) -> Self {
        let now = clock.now_ms();
        Self {
            record: Mutex::new(SafetyRecord {
                expiration_ms,
                deadline_ms: now,
                enabled: true,
            }),
            clock,
        }
    }

    /// Push the deadline to `now + expiration`.
    #[inline]
    pub fn feed(&self) {
        let now = self.clock.now_ms();
        let mut record = self.record.lock();
        record.deadline_ms = now.saturating_add(record.expiration_ms);
    }

    /// Change the expiration window. Zero is rejected.
    ///
    /// Takes effect at the next feed; the current deadline is untouched.
    pub fn set_expiration(&self, expiration_ms: Millis) -> bool {
        if expiration_ms == 0 {
            warn!("rejected safety expiration of 0 ms");
            return false;
        }
        self.record.lock().expiration_ms = expiration_ms;
        true
    }

    pub fn expiration(&self) -> Millis {
        self.record.lock().expiration_ms
    }

    /// `true` while disabled or before the deadline.
    pub fn is_alive(&self) -> bool {
        let record = self.snapshot();
        !record.enabled || record.deadline_ms > self.clock.now_ms()
    }

    /// Toggle supervision without moving the deadline.
    pub fn set_safety_enabled(&self, enabled: bool) {
        self.record.lock().enabled = enabled;
    }

    pub fn is_safety_enabled(&self) -> bool {
        self.record.lock().enabled
    }

    /// Enabled and past the deadline.
    pub fn is_expired(&self) -> bool {
        let record = self.snapshot();
        record.enabled && self.clock.now_ms() > record.deadline_ms
    }

    #[inline]
    pub fn snapshot(&self) -> SafetyRecord {
        *self.record.lock()
    }

    #[inline]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl fmt::Debug for MotorSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorSafety")
            .field("record", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// An actuator the safety watchdog may force to stop.
///
/// Implementors are shared with the watchdog thread, so `stop_motor` must be
/// callable concurrently with the control loop's own commands.
pub trait SafetyTrackedActuator: Send + Sync {
    fn safety(&self) -> &MotorSafety;

    /// Command zero output on every motor and feed the record.
    fn stop_motor(&self);

    /// Human-readable name used in log lines.
    fn description(&self) -> &str;

    /// Stop the actuator if its deadline has passed. Returns whether a stop
    /// was issued.
    ///
    /// The record lock is released before `stop_motor` runs.
    fn check(&self) -> bool {
        if !self.safety().is_expired() {
            return false;
        }
        warn!(
            actuator = self.description(),
            expiration_ms = self.safety().expiration(),
            "safety expiration, stopping motor"
        );
        self.stop_motor();
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chopper_common::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingActuator {
        safety: MotorSafety,
        stops: AtomicU32,
    }

    impl CountingActuator {
        fn new(clock: &ManualClock, expiration_ms: Millis) -> Self {
            Self {
                safety: MotorSafety::with_expiration(Arc::new(clock.clone()), expiration_ms),
                stops: AtomicU32::new(0),
            }
        }
    }

    impl SafetyTrackedActuator for CountingActuator {
        fn safety(&self) -> &MotorSafety {
            &self.safety
        }

        fn stop_motor(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.safety.feed();
        }

        fn description(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn new_record_defaults() {
        let clock = ManualClock::new(1000);
        let safety = MotorSafety::new(Arc::new(clock));
        let record = safety.snapshot();
        assert!(record.enabled);
        assert_eq!(record.expiration_ms, DEFAULT_SAFETY_EXPIRATION_MS);
        assert_eq!(record.deadline_ms, 1000);
    }

    #[test]
    fn feed_extends_deadline() {
        let clock = ManualClock::new(0);
        let safety = MotorSafety::with_expiration(Arc::new(clock.clone()), 200);
        safety.feed();
        assert_eq!(safety.snapshot().deadline_ms, 200);
        clock.set(199);
        assert!(safety.is_alive());
        clock.set(201);
        assert!(!safety.is_alive());
        assert!(safety.is_expired());
    }

    #[test]
    fn disabled_is_always_alive() {
        let clock = ManualClock::new(0);
        let safety = MotorSafety::with_expiration(Arc::new(clock.clone()), 100);
        safety.set_safety_enabled(false);
        clock.set(10_000);
        assert!(safety.is_alive());
        assert!(!safety.is_expired());
        // Re-enabling does not touch the stale deadline
        safety.set_safety_enabled(true);
        assert!(safety.is_expired());
    }

    #[test]
    fn zero_expiration_rejected() {
        let clock = ManualClock::new(0);
        let safety = MotorSafety::with_expiration(Arc::new(clock), 300);
        assert!(!safety.set_expiration(0));
        assert_eq!(safety.expiration(), 300);
        assert!(safety.set_expiration(1500));
        assert_eq!(safety.expiration(), 1500);
    }

    #[test]
    fn check_stops_exactly_once() {
        let clock = ManualClock::new(0);
        let actuator = CountingActuator::new(&clock, 200);
        actuator.safety().feed();

        clock.set(250);
        assert!(actuator.check());
        // stop_motor fed the record, so a second check is quiet
        assert!(!actuator.check());
        assert_eq!(actuator.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn check_ignores_live_actuator() {
        let clock = ManualClock::new(0);
        let actuator = CountingActuator::new(&clock, 200);
        actuator.safety().feed();
        clock.set(150);
        assert!(!actuator.check());
        assert_eq!(actuator.stops.load(Ordering::SeqCst), 0);
    }
}
