use criterion::{criterion_group, criterion_main, Criterion};
use qmc_core::SingleProcess;

use qmc_meas::{fix, normalize, var, Measurements, Mode, WeightTable};

fn sample_measurements() -> Measurements {
    let mut measurements = Measurements::new();
    for step in 0..64 {
        let sign = if step % 7 == 0 { -1.0 } else { 1.0 };
        measurements.add_sign(sign, 1).unwrap();
        measurements
            .add("partition", &["energy"], fix(vec![step as f64; 16], 1))
            .unwrap();
    }
    measurements.add_steps("partition", 64).unwrap();
    for worm in ["two_point", "four_point"] {
        for site in 0..32 {
            let name = format!("site{site}");
            measurements
                .add(worm, &["greens", name.as_str()], var(vec![0.5; 1 + site % 5], 1))
                .unwrap();
        }
        measurements.add_steps(worm, 32).unwrap();
    }
    measurements
}

fn bench_reduce(c: &mut Criterion) {
    let measurements = sample_measurements();
    let document = measurements.document().unwrap();
    let weights = WeightTable::new()
        .with("partition", 1.0)
        .with("two_point", 0.5)
        .with("four_point", 0.25);

    c.bench_function("normalize_all", |b| {
        b.iter(|| {
            let _ = normalize(&SingleProcess, &document, &weights, Mode::All, false).unwrap();
        })
    });
    c.bench_function("normalize_all_binary", |b| {
        b.iter(|| {
            let _ = normalize(&SingleProcess, &document, &weights, Mode::All, true).unwrap();
        })
    });
}

criterion_group!(benches, bench_reduce);
criterion_main!(benches);
