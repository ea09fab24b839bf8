//! Multi-channel servo table and batched peripheral writes.

use std::sync::Arc;

use chopper_common::clock::{Clock, Millis};
use chopper_common::consts::{MAX_SERVO_CHANNELS, QUARTER_US_PER_US};
use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::channel::{ChannelPhase, ServoChannelState};
use super::easing::Easing;
use crate::error::ControlError;

type PulseBuffer = FixedVec<u16, MAX_SERVO_CHANNELS>;

/// Destination for a batch of pulse targets, starting at `first_channel`.
pub trait PulseSink: Send {
    fn write_batch(&mut self, first_channel: u8, pulses: &[u16]);
}

impl<F> PulseSink for F
where
    F: FnMut(u8, &[u16]) + Send,
{
    fn write_batch(&mut self, first_channel: u8, pulses: &[u16]) {
        (self)(first_channel, pulses)
    }
}

/// Pulse-width unit the servo controller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseUnit {
    #[default]
    QuarterMicroseconds,
    Microseconds,
}

impl PulseUnit {
    /// Convert from the channels' quarter-microsecond positions.
    #[inline]
    pub const fn convert(self, quarter_us: u16) -> u16 {
        match self {
            Self::QuarterMicroseconds => quarter_us,
            Self::Microseconds => quarter_us / QUARTER_US_PER_US,
        }
    }
}

/// Fixed set of servo channels animated together.
///
/// [`animate`](Self::animate) runs once per control tick and writes the full
/// batch to the sink only when it differs from the last batch sent.
pub struct ServoDispatchTable {
    channels: FixedVec<ServoChannelState, MAX_SERVO_CHANNELS>,
    targets: PulseBuffer,
    sent: Option<PulseBuffer>,
    unit: PulseUnit,
    sink: Box<dyn PulseSink>,
    clock: Arc<dyn Clock>,
    batches_written: u64,
}

impl ServoDispatchTable {
    pub fn new(
        channel_count: usize,
        unit: PulseUnit,
        sink: Box<dyn PulseSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ControlError> {
        if channel_count == 0 || channel_count > MAX_SERVO_CHANNELS {
            return Err(ControlError::InvalidChannelCount {
                requested: channel_count,
                max: MAX_SERVO_CHANNELS,
            });
        }
        Ok(Self {
            channels: (0..channel_count).map(|_| ServoChannelState::new()).collect(),
            targets: (0..channel_count).map(|_| 0).collect(),
            sent: None,
            unit,
            sink,
            clock,
            batches_written: 0,
        })
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, channel: u8) -> Option<&ServoChannelState> {
        self.channels.get(usize::from(channel))
    }

    fn channel_mut(&mut self, channel: u8) -> Option<&mut ServoChannelState> {
        let count = self.channels.len();
        let slot = self.channels.get_mut(usize::from(channel));
        if slot.is_none() {
            warn!(channel, count, "rejected servo command for unknown channel");
        }
        slot
    }

    #[inline]
    fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    // ─── Channel configuration ──────────────────────────────────────

    pub fn set_range(&mut self, channel: u8, min_pulse: u16, max_pulse: u16) -> bool {
        self.channel_mut(channel)
            .is_some_and(|ch| ch.set_range(min_pulse, max_pulse))
    }

    pub fn set_neutral(&mut self, channel: u8, pulse: u16) -> bool {
        self.channel_mut(channel)
            .is_some_and(|ch| ch.set_neutral(pulse))
    }

    pub fn set_easing(&mut self, channel: u8, easing: Easing) -> bool {
        self.channel_mut(channel)
            .map(|ch| ch.set_easing(easing))
            .is_some()
    }

    pub fn set_rate_limit(&mut self, channel: u8, units_per_second: f64) -> bool {
        self.channel_mut(channel)
            .is_some_and(|ch| ch.set_rate_limit(units_per_second))
    }

    // ─── Motion commands ────────────────────────────────────────────

    /// Move from `start_pos` to `finish_pos` over `duration_ms` beginning at
    /// `start_time`.
    pub fn set_targets(
        &mut self,
        channel: u8,
        start_pos: u16,
        finish_pos: u16,
        start_time: Millis,
        duration_ms: Millis,
    ) -> bool {
        self.channel_mut(channel).is_some_and(|ch| {
            ch.set_targets(
                start_pos,
                finish_pos,
                start_time,
                start_time.saturating_add(duration_ms),
            )
        })
    }

    /// Move from wherever the channel is now to `finish_pos`. Repeating the
    /// active move is a no-op.
    pub fn move_to(&mut self, channel: u8, finish_pos: u16, duration_ms: Millis) -> bool {
        let now = self.now();
        self.channel_mut(channel)
            .is_some_and(|ch| ch.move_to(finish_pos, duration_ms, now))
    }

    pub fn set_position(&mut self, channel: u8, pulse: u16) -> bool {
        let now = self.now();
        self.channel_mut(channel)
            .is_some_and(|ch| ch.set_position(pulse, now))
    }

    pub fn set_manual(&mut self, channel: u8, manual: bool) -> bool {
        let now = self.now();
        self.channel_mut(channel)
            .map(|ch| ch.set_manual(manual, now))
            .is_some()
    }

    pub fn enable(&mut self, channel: u8) -> bool {
        let now = self.now();
        self.channel_mut(channel)
            .map(|ch| ch.set_enabled(true, now))
            .is_some()
    }

    /// Disable one channel and flush the batch immediately.
    pub fn disable(&mut self, channel: u8) -> bool {
        let now = self.now();
        let Some(ch) = self.channel_mut(channel) else {
            return false;
        };
        ch.set_enabled(false, now);
        self.targets[usize::from(channel)] = 0;
        self.flush();
        true
    }

    /// Disable every channel and flush one all-zero batch.
    pub fn disable_all(&mut self) {
        let now = self.now();
        for ch in self.channels.iter_mut() {
            ch.set_enabled(false, now);
        }
        self.targets.iter_mut().for_each(|t| *t = 0);
        self.flush();
    }

    pub fn is_finished_moving(&self, channel: u8) -> bool {
        let now = self.now();
        self.channel(channel)
            .is_some_and(|ch| ch.is_finished_moving(now))
    }

    pub fn phase(&self, channel: u8) -> Option<ChannelPhase> {
        let now = self.now();
        self.channel(channel).map(|ch| ch.phase(now))
    }

    // ─── Per tick ───────────────────────────────────────────────────

    /// Advance every channel to now and write the batch if it changed.
    /// Returns whether a write happened.
    pub fn animate(&mut self) -> bool {
        let now = self.now();
        let unit = self.unit;
        for (target, ch) in self.targets.iter_mut().zip(self.channels.iter_mut()) {
            *target = unit.convert(ch.next_pulse(now));
        }

        let changed = self
            .sent
            .as_ref()
            .is_none_or(|sent| sent.as_slice() != self.targets.as_slice());
        if changed {
            self.flush();
        }
        changed
    }

    fn flush(&mut self) {
        self.sink.write_batch(0, &self.targets);
        self.sent = Some(self.targets.clone());
        self.batches_written += 1;
        debug!(batch = ?self.targets.as_slice(), "servo batch written");
    }

    /// Targets computed by the last `animate`, in peripheral units.
    pub fn targets(&self) -> &[u16] {
        &self.targets
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    pub const fn unit(&self) -> PulseUnit {
        self.unit
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
