//! Servo animation benchmark.
//!
//! One `animate()` call per tick for tables of 1 to 24 channels, every
//! channel enabled and mid-move on an eased segment. A new segment is
//! issued whenever the previous one finishes so the table never settles.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use chopper_common::clock::{Clock, ManualClock};
use chopper_control_unit::servo::{Easing, PulseUnit, ServoDispatchTable};

const TICK_MS: u64 = 20;
const SEGMENT_MS: u64 = 1000;

fn moving_table(channels: usize, clock: &ManualClock) -> ServoDispatchTable {
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let sink = |_: u8, _: &[u16]| {};
    let mut table =
        ServoDispatchTable::new(channels, PulseUnit::QuarterMicroseconds, Box::new(sink), shared)
            .expect("servo table");
    for ch in 0..channels as u8 {
        table.set_range(ch, 4000, 8000);
        table.set_easing(ch, Easing::SineInOut);
        table.set_rate_limit(ch, 16_000.0);
        table.set_position(ch, 4000);
        table.enable(ch);
    }
    table
}

fn bench_animate(c: &mut Criterion) {
    let mut group = c.benchmark_group("servo_animate");
    for channels in [1usize, 8, 16, 24] {
        let clock = ManualClock::new(0);
        let mut table = moving_table(channels, &clock);
        let mut cycle = 0u64;

        group.bench_with_input(BenchmarkId::from_parameter(channels), &channels, |b, &n| {
            b.iter(|| {
                cycle += 1;
                clock.advance(TICK_MS);
                if cycle % (SEGMENT_MS / TICK_MS) == 1 {
                    let finish = if (cycle / (SEGMENT_MS / TICK_MS)) % 2 == 0 { 8000 } else { 4000 };
                    for ch in 0..n as u8 {
                        table.move_to(ch, finish, SEGMENT_MS);
                    }
                }
                table.animate()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_animate);
criterion_main!(benches);
