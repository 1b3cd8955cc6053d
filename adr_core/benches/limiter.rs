use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use adr_core::{Limits, LimiterCtx, clamp_delta};

// Generate a synthetic run: supply state walking up the ramp with noisy EMF
fn synth_cycle_states(n: usize, seed: u32) -> Vec<LimiterCtx> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f64) / (u32::MAX as f64 + 1.0)
    };
    let mut v = Vec::with_capacity(n);
    for i in 0..n {
        let frac = i as f64 / n as f64;
        let noise = (next_f64() * 2.0 - 1.0) * 0.02;
        v.push(LimiterCtx {
            supply_voltage_v: 3.0 * frac,
            supply_current_a: 9.0 * frac,
            back_emf_v: (0.08 + noise).max(0.0),
            di_a: 0.004 + noise / 10.0,
            dt_s: 1.0 + noise,
        });
    }
    v
}

pub fn bench_clamp_chain(c: &mut Criterion) {
    let mut g = c.benchmark_group("clamp_chain");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p adr_core --bench limiter
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let limits = Limits::default();
    let states = synth_cycle_states(50_000, 0xC0FFEE);

    for &dv in &[0.003f64, 0.05, -0.05] {
        g.bench_function(format!("clamp_dv_{dv}"), |b| {
            b.iter_batched(
                || states.clone(),
                |s| {
                    let mut acc = 0.0f64;
                    for ctx in &s {
                        let out = clamp_delta(
                            black_box(dv),
                            black_box(ctx),
                            &limits,
                            limits.didt_regulate_a_per_s,
                        );
                        acc += out.dv;
                    }
                    black_box(acc);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(limiter, bench_clamp_chain);
criterion_main!(limiter);
