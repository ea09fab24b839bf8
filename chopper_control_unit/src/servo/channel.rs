//! Per-channel timed motion.
//!
//! A channel interpolates from a start pulse to a finish pulse between two
//! timestamps, shaped by an [`Easing`] curve, then passes the result through
//! a slew limiter so that no single tick can jerk the servo. Positions are
//! in quarter-microseconds; `0` means "no pulse".

use chopper_common::clock::Millis;
use chopper_common::consts::{DEFAULT_SERVO_RATE_LIMIT, SERVO_PULSE_NEUTRAL};
use tracing::{debug, warn};

use super::easing::Easing;
use crate::filter::RateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Emits 0.
    Disabled,
    /// Emits the current position verbatim.
    Manual,
    /// Interpolating toward the finish pulse.
    Moving,
    /// Holding the finish pulse.
    Settled,
}

/// One start → finish move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionSegment {
    pub start_pos: u16,
    pub finish_pos: u16,
    pub start_time: Millis,
    pub finish_time: Millis,
    /// Curve time already elapsed at `start_time`. Non-zero only when a
    /// re-timed segment would have started before the clock's origin.
    pub lead: Millis,
}

impl MotionSegment {
    /// Zero-length segment holding `pulse`.
    pub const fn hold(pulse: u16, at: Millis) -> Self {
        Self {
            start_pos: pulse,
            finish_pos: pulse,
            start_time: at,
            finish_time: at,
            lead: 0,
        }
    }

    #[inline]
    pub const fn duration(&self) -> Millis {
        self.finish_time.saturating_sub(self.start_time) + self.lead
    }

    /// Linear time fraction at `now`; 1.0 for zero-length segments.
    pub fn progress(&self, now: Millis) -> f32 {
        let duration = self.duration();
        if duration == 0 {
            return 1.0;
        }
        (now.saturating_sub(self.start_time) + self.lead) as f32 / duration as f32
    }

    /// Position after `fraction` of the distance.
    #[inline]
    pub fn position_at(&self, fraction: f32) -> f32 {
        let start = f32::from(self.start_pos);
        start + (f32::from(self.finish_pos) - start) * fraction
    }

    /// How far `position` lies along the segment, clamped to `[0, 1]`.
    pub fn fraction_of(&self, position: u16) -> f32 {
        let span = f32::from(self.finish_pos) - f32::from(self.start_pos);
        if span == 0.0 {
            return 0.0;
        }
        ((f32::from(position) - f32::from(self.start_pos)) / span).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ServoChannelState {
    min_pulse: u16,
    max_pulse: u16,
    neutral_pulse: u16,
    current_position: u16,
    motion: MotionSegment,
    easing: Easing,
    enabled: bool,
    manual: bool,
    limiter: RateLimiter,
}

impl Default for ServoChannelState {
    fn default() -> Self {
        Self {
            min_pulse: 0,
            max_pulse: 0,
            neutral_pulse: SERVO_PULSE_NEUTRAL,
            current_position: 0,
            motion: MotionSegment::default(),
            easing: Easing::Linear,
            enabled: false,
            manual: false,
            limiter: RateLimiter::symmetric(DEFAULT_SERVO_RATE_LIMIT, 0.0, 0),
        }
    }
}

impl ServoChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// Set the pulse range. Rejects zero bounds and `min > max`.
    pub fn set_range(&mut self, min_pulse: u16, max_pulse: u16) -> bool {
        if min_pulse == 0 || max_pulse == 0 || min_pulse > max_pulse {
            warn!(min_pulse, max_pulse, "rejected servo range");
            return false;
        }
        self.min_pulse = min_pulse;
        self.max_pulse = max_pulse;
        if !(min_pulse..=max_pulse).contains(&self.neutral_pulse) {
            self.neutral_pulse = min_pulse + (max_pulse - min_pulse) / 2;
        }
        if self.current_position != 0 {
            self.current_position = self.clamp(self.current_position);
        }
        true
    }

    /// Pulse used when enabling a channel that has never been commanded.
    pub fn set_neutral(&mut self, pulse: u16) -> bool {
        if pulse == 0 || (self.has_range() && !(self.min_pulse..=self.max_pulse).contains(&pulse))
        {
            warn!(pulse, "rejected servo neutral outside range");
            return false;
        }
        self.neutral_pulse = pulse;
        true
    }

    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    /// Slew limit in quarter-microseconds per second.
    pub fn set_rate_limit(&mut self, units_per_second: f64) -> bool {
        if !(units_per_second.is_finite() && units_per_second > 0.0) {
            warn!(units_per_second, "rejected servo rate limit");
            return false;
        }
        self.limiter.reset(
            units_per_second,
            -units_per_second,
            self.limiter.last_value(),
            self.limiter.last_timestamp(),
        );
        true
    }

    // ─── State transitions ──────────────────────────────────────────

    /// Enabling restores the last commanded position (or neutral) and
    /// resumes any segment still in flight.
    pub fn set_enabled(&mut self, enabled: bool, now: Millis) {
        if !enabled {
            self.enabled = false;
            self.current_position = 0;
            return;
        }
        if self.enabled {
            return;
        }
        self.enabled = true;

        if self.motion.start_pos != 0 && self.motion.finish_time > now {
            self.current_position = self.motion.start_pos;
        } else {
            let hold = if self.motion.finish_pos != 0 {
                self.motion.finish_pos
            } else {
                self.neutral_pulse
            };
            self.current_position = self.clamp(hold);
            self.motion = MotionSegment::hold(self.current_position, now);
        }
        self.limiter
            .reset_value(f64::from(self.current_position), now);
    }

    /// Manual mode freezes at the current position and emits it verbatim.
    pub fn set_manual(&mut self, manual: bool, now: Millis) {
        if manual == self.manual {
            return;
        }
        self.manual = manual;
        self.motion = MotionSegment::hold(self.current_position, now);
        self.limiter
            .reset_value(f64::from(self.current_position), now);
    }

    /// Go to `pulse`: verbatim in manual mode, slew-limited otherwise.
    pub fn set_position(&mut self, pulse: u16, now: Millis) -> bool {
        if pulse == 0 {
            warn!("rejected servo position 0");
            return false;
        }
        let pulse = self.clamp(pulse);
        self.motion = MotionSegment::hold(pulse, now);
        if self.manual && self.enabled {
            self.current_position = pulse;
        }
        true
    }

    /// Install a new motion segment.
    ///
    /// Ignored when the start/finish pair matches the active one. When the
    /// channel is mid-move and `start_pos` is not where the servo is now,
    /// both times shift back so the eased curve passes through the current
    /// position at `start_time`.
    pub fn set_targets(
        &mut self,
        start_pos: u16,
        finish_pos: u16,
        start_time: Millis,
        finish_time: Millis,
    ) -> bool {
        if start_pos == 0 || finish_pos == 0 {
            warn!(start_pos, finish_pos, "rejected servo target 0");
            return false;
        }
        if start_time > finish_time {
            warn!(start_time, finish_time, "rejected servo move ending before it starts");
            return false;
        }
        let start_pos = self.clamp(start_pos);
        let finish_pos = self.clamp(finish_pos);
        if start_pos == self.motion.start_pos && finish_pos == self.motion.finish_pos {
            debug!(start_pos, finish_pos, "servo target unchanged");
            return false;
        }

        let mut segment = MotionSegment {
            start_pos,
            finish_pos,
            start_time,
            finish_time,
            lead: 0,
        };
        if self.phase(start_time) == ChannelPhase::Moving && start_pos != self.current_position {
            let progress = self.easing.inverse(segment.fraction_of(self.current_position));
            let shift = (progress * segment.duration() as f32).round() as Millis;
            segment.lead = shift.saturating_sub(start_time);
            segment.start_time = start_time.saturating_sub(shift);
            segment.finish_time = finish_time.saturating_sub(shift);
        }
        self.motion = segment;
        true
    }

    /// Head for `finish_pos` over `duration_ms`, starting from wherever the
    /// servo is at `now`. A repeat of the active finish pulse is ignored so
    /// a command resent every frame does not restart the move.
    pub fn move_to(&mut self, finish_pos: u16, duration_ms: Millis, now: Millis) -> bool {
        if finish_pos == 0 {
            warn!("rejected servo target 0");
            return false;
        }
        let finish_pos = self.clamp(finish_pos);
        if finish_pos == self.motion.finish_pos {
            debug!(finish_pos, "servo move already under way");
            return false;
        }
        let start_pos = match self.current_position {
            0 => finish_pos,
            pos => pos,
        };
        self.set_targets(start_pos, finish_pos, now, now.saturating_add(duration_ms))
    }

    // ─── Per tick ───────────────────────────────────────────────────

    /// Pulse to send at `now`, advancing the current position.
    pub fn next_pulse(&mut self, now: Millis) -> u16 {
        if !self.enabled {
            return 0;
        }
        if self.manual {
            return self.current_position;
        }

        let target = if now < self.motion.start_time {
            f32::from(self.current_position)
        } else {
            let progress = self.motion.progress(now);
            if progress < 1.0 {
                self.motion.position_at(self.easing.apply(progress))
            } else {
                f32::from(self.motion.finish_pos)
            }
        };

        let limited = self.limiter.calculate(f64::from(target), now);
        let pulse = limited.round().clamp(1.0, f64::from(u16::MAX)) as u16;
        self.current_position = self.clamp(pulse);
        self.current_position
    }

    /// Past the finish time and actually at the finish pulse.
    pub fn is_finished_moving(&self, now: Millis) -> bool {
        now > self.motion.finish_time && self.current_position == self.motion.finish_pos
    }

    pub fn phase(&self, now: Millis) -> ChannelPhase {
        if !self.enabled {
            ChannelPhase::Disabled
        } else if self.manual {
            ChannelPhase::Manual
        } else if self.is_finished_moving(now) {
            ChannelPhase::Settled
        } else {
            ChannelPhase::Moving
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub const fn current_position(&self) -> u16 {
        self.current_position
    }

    #[inline]
    pub const fn motion(&self) -> &MotionSegment {
        &self.motion
    }

    #[inline]
    pub const fn range(&self) -> (u16, u16) {
        (self.min_pulse, self.max_pulse)
    }

    #[inline]
    pub const fn neutral(&self) -> u16 {
        self.neutral_pulse
    }

    #[inline]
    pub const fn easing(&self) -> Easing {
        self.easing
    }

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub const fn is_manual(&self) -> bool {
        self.manual
    }

    #[inline]
    pub const fn rate_limit(&self) -> f64 {
        self.limiter.positive_limit()
    }

    #[inline]
    const fn has_range(&self) -> bool {
        self.min_pulse != 0 && self.max_pulse != 0
    }

    #[inline]
    fn clamp(&self, pulse: u16) -> u16 {
        if self.has_range() {
            pulse.clamp(self.min_pulse, self.max_pulse)
        } else {
            pulse
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
