use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use mindbridge::control::bridge::ControlBridge;
use mindbridge::sim::hysteresis::Hysteresis;
use mindbridge::SampleQueue;

// The consumer tick is O(batch): push-then-drain must stay far below the
// 100 ms drain period even for a kHz-rate connection.
fn queue_drain_bench(c: &mut Criterion) {
    let queue = SampleQueue::new();

    c.bench_function("queue_push_drain_1024", |b| {
        b.iter(|| {
            for i in 0..1024 {
                queue.push(i as f64);
            }
            black_box(queue.drain())
        })
    });
}

fn bridge_publish_bench(c: &mut Criterion) {
    let path = std::env::temp_dir().join(format!("mindbridge_bench_{}.cell", std::process::id()));
    let bridge = ControlBridge::create(&path).expect("bridge");

    c.bench_function("bridge_publish_read", |b| {
        b.iter(|| {
            bridge.publish(black_box(87));
            black_box(bridge.read())
        })
    });
}

fn hysteresis_bench(c: &mut Criterion) {
    let h = Hysteresis {
        lower: 25,
        upper: 35,
        step: 1,
        min: 0,
        max: 200,
    };

    c.bench_function("hysteresis_apply", |b| {
        let mut level = 50;
        let mut signal = 0;
        b.iter(|| {
            signal = (signal + 7) % 101;
            level = h.apply(black_box(level), black_box(signal));
            black_box(level)
        })
    });
}

criterion_group!(benches, queue_drain_bench, bridge_publish_bench, hysteresis_bench);
criterion_main!(benches);
