use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use tokio::time::{Duration, Instant};

use kiln_host::config::{PidConfig, SafetyConfig};
use kiln_host::control::PidController;
use kiln_host::safety::SafetyMonitor;

fn bench_pid_update(c: &mut Criterion) {
    c.bench_function("pid_update", |b| {
        let mut pid = PidController::new(&PidConfig::default());
        let t0 = Instant::now();
        let mut tick = 0u64;
        b.iter(|| {
            tick += 1;
            let now = t0 + Duration::from_millis(250 * tick);
            let measured = 25.0 + (tick % 400) as f64 * 0.2;
            black_box(pid.update(100.0, measured, now))
        })
    });
}

fn bench_safety_evaluate(c: &mut Criterion) {
    c.bench_function("safety_evaluate", |b| {
        let t0 = Instant::now();
        let mut monitor = SafetyMonitor::new(&SafetyConfig::default(), t0, 25.0);
        let mut tick = 0u64;
        b.iter(|| {
            tick += 1;
            let now = t0 + Duration::from_millis(250 * tick);
            let temp = 25.0 + (tick % 400) as f64 * 0.2;
            black_box(monitor.evaluate(temp, 0.8, now))
        })
    });
}

criterion_group!(benches, bench_pid_update, bench_safety_evaluate);
criterion_main!(benches);
