//! Benchmarks for turning queued meters into socket payloads.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use tsdb_client::{Meter, encode_batch};

fn queue(len: usize) -> Vec<Meter> {
    (0..len)
        .map(|i| {
            Meter::new(
                "sys.cpu.user",
                1_700_000_000 + i as i64,
                i as f64 * 0.5,
                [("host", "web01"), ("cpu", "0"), ("dc", "lga")],
            )
            .expect("valid meter")
        })
        .collect()
}

fn bench_encode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_batch");
    for len in [1, 100, 1000] {
        let meters = queue(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &meters, |b, meters| {
            b.iter(|| encode_batch(black_box(meters)));
        });
    }
    group.finish();
}

fn bench_from_json(c: &mut Criterion) {
    let records: Value = (0..1000)
        .map(|i| {
            json!({
                "metric": "sys.cpu.user",
                "timestamp": 1_700_000_000 + i,
                "value": i,
                "tags": {"host": "web01", "cpu": "0"},
            })
        })
        .collect();
    c.bench_function("from_json_1000", |b| {
        b.iter(|| Meter::from_json(black_box(&records)).expect("valid records"));
    });
}

criterion_group!(benches, bench_encode_batch, bench_from_json);
criterion_main!(benches);
