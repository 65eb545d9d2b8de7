use benchkv::stats::{render_report, SeriesSet, Summary, Unit};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

fn bench_stats(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut samples: Vec<u64> = (0..100_000).map(|_| rng.gen_range(1..10_000)).collect();
    samples.sort_unstable();

    c.bench_function("summary_100k", |b| {
        b.iter(|| Summary::of(black_box(&samples)));
    });

    let mut set = SeriesSet::new();
    for name in ["set", "get", "del", "itr_next"] {
        let series = set.series_mut(name);
        for _ in 0..10_000 {
            series.record(Some(rng.gen_range(1..10_000)));
        }
    }
    c.bench_function("render_report_4x10k", |b| {
        b.iter(|| render_report(black_box("bench"), Unit::Millis, &set));
    });
}

criterion_group!(benches, bench_stats);
criterion_main!(benches);
