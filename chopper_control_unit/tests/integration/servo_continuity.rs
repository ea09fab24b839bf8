//! Integration test: servo retargeting mid-motion.
//!
//! A channel heading from 4000 toward 6000 is redirected to 8000 halfway
//! through. The new segment is re-timed so the curve passes through the
//! servo's current position, so no tick jumps further than the curve itself
//! moves in one tick, and never further than the slew limit allows.

use chopper_common::clock::Millis;
use chopper_control_unit::servo::{ChannelPhase, Easing, ServoChannelState};

const TICK_MS: Millis = 20;

fn channel_at_4000(easing: Easing, rate_limit: f64) -> ServoChannelState {
    let mut ch = ServoChannelState::new();
    assert!(ch.set_range(4000, 8000));
    assert!(ch.set_rate_limit(rate_limit));
    ch.set_easing(easing);
    assert!(ch.set_position(4000, 0));
    ch.set_enabled(true, 0);
    ch
}

/// Tick from `from` to `to` inclusive; returns the largest per-tick jump.
fn run(ch: &mut ServoChannelState, from: Millis, to: Millis, last: &mut u16) -> u16 {
    let mut worst = 0;
    let mut now = from;
    while now <= to {
        let pulse = ch.next_pulse(now);
        worst = worst.max(pulse.abs_diff(*last));
        *last = pulse;
        now += TICK_MS;
    }
    worst
}

#[test]
fn linear_retarget_follows_the_curve_without_a_jump() {
    // Slew limit far above the curve speed so only the re-timing matters.
    let mut ch = channel_at_4000(Easing::Linear, 1.0e9);
    let mut last = ch.next_pulse(0);
    assert_eq!(last, 4000);

    assert!(ch.set_targets(4000, 6000, 0, 1000));
    let before = run(&mut ch, TICK_MS, 500, &mut last);
    assert_eq!(last, 5000);

    assert!(ch.set_targets(4000, 8000, 500, 1500));
    let after = run(&mut ch, 500 + TICK_MS, 1400, &mut last);

    // 2000 over 1000 ms, then 4000 over 1000 ms: 40 and 80 per tick.
    assert!(before <= 41, "before retarget: {before}");
    assert!(after <= 81, "after retarget: {after}");
    assert_eq!(last, 8000);
    assert_eq!(ch.phase(1400), ChannelPhase::Settled);
}

#[test]
fn retarget_never_exceeds_one_slew_step() {
    let rate = 16_000.0;
    let step = (rate * TICK_MS as f64 / 1000.0) as u16 + 1;
    for easing in [Easing::Linear, Easing::SineInOut, Easing::CubicIn, Easing::QuadraticOut] {
        let mut ch = channel_at_4000(easing, rate);
        let mut last = ch.next_pulse(0);

        assert!(ch.set_targets(4000, 6000, 0, 1000));
        let before = run(&mut ch, TICK_MS, 500, &mut last);
        assert!(ch.set_targets(4000, 8000, 500, 1500));
        let after = run(&mut ch, 500 + TICK_MS, 2000, &mut last);

        assert!(before <= step, "{easing:?} before: {before}");
        assert!(after <= step, "{easing:?} after: {after}");
        assert_eq!(last, 8000, "{easing:?}");
    }
}

#[test]
fn disable_mid_move_then_resume() {
    let mut ch = channel_at_4000(Easing::Linear, 1.0e9);
    ch.next_pulse(0);
    assert!(ch.set_targets(4000, 6000, 0, 1000));
    let mut last = 4000;
    run(&mut ch, TICK_MS, 300, &mut last);

    ch.set_enabled(false, 300);
    assert_eq!(ch.next_pulse(320), 0);
    assert_eq!(ch.phase(320), ChannelPhase::Disabled);

    // Re-enabled while the segment is still in flight: restart from its start.
    ch.set_enabled(true, 400);
    assert_eq!(ch.current_position(), 4000);
    assert_eq!(ch.next_pulse(400), 4000);
    assert_eq!(ch.next_pulse(420), 4840);
    let mut last = 4840;
    run(&mut ch, 440, 1100, &mut last);
    assert_eq!(last, 6000);
}
