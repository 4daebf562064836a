//! Benchmarks for remapping retry lineages.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nodeflow::core::InterruptType;
use nodeflow::execution::{InterruptConfig, InterruptEffect};
use nodeflow::retry::{get_new_retry_ids_from_original_retry_ids, get_updated_interrupt_history};
use std::collections::HashMap;

fn history(len: usize) -> (Vec<InterruptEffect>, HashMap<String, String>) {
    let mut effects = Vec::with_capacity(len);
    let mut map = HashMap::with_capacity(len);
    for i in 0..len {
        if i % 3 == 0 {
            effects.push(InterruptEffect::new(
                format!("int-{i}"),
                InterruptType::Abort,
                i as i64,
                InterruptConfig::Issued {
                    issued_by: "bench".into(),
                },
            ));
        } else {
            effects.push(InterruptEffect::retry(format!("int-{i}"), format!("old-{i}"), i as i64));
            map.insert(format!("old-{i}"), format!("new-{i}"));
        }
    }
    (effects, map)
}

fn interrupt_history_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_updated_interrupt_history");
    for len in [8, 64, 512] {
        let (effects, map) = history(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| get_updated_interrupt_history(black_box(&effects), black_box(&map)));
        });
    }
    group.finish();
}

fn retry_ids_benchmark(c: &mut Criterion) {
    let (_, map) = history(256);
    let retry_ids: Vec<String> = map.keys().cloned().collect();
    c.bench_function("get_new_retry_ids_from_original_retry_ids", |b| {
        b.iter(|| get_new_retry_ids_from_original_retry_ids(black_box(&retry_ids), black_box(&map)));
    });
}

criterion_group!(benches, interrupt_history_benchmark, retry_ids_benchmark);
criterion_main!(benches);
