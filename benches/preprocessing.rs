//! Benchmarks for feature preprocessing and routing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sluice::compute::{ConditionRouter, ConditionRule, RoutingConfig};
use sluice::features::{
    preprocess_batch, CategoricalFeatureParam, FeatureSchema, NumericFeatureParam, Record,
};

const NUMERIC: usize = 13;
const CATEGORICAL: usize = 26;

fn criteo_schema() -> FeatureSchema {
    let mut builder = FeatureSchema::builder();
    for i in 1..=NUMERIC {
        builder = builder.numeric(&format!("I{}", i), NumericFeatureParam::new(2.0, 1.0, 0.8));
    }
    for i in 1..=CATEGORICAL {
        let param = CategoricalFeatureParam {
            high_freq_values: (0..100).map(|v| format!("v{}", v)).collect(),
            code_map: (0..100).map(|v| (format!("v{}", v), v as i64)).collect(),
            default_code: -1,
        };
        builder = builder.categorical(&format!("C{}", i), param);
    }
    builder.build().unwrap()
}

fn records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|n| {
            let mut record = Record::new();
            for i in 1..=NUMERIC {
                let value = if (n + i) % 7 == 0 { String::new() } else { (n % 50).to_string() };
                record.insert(format!("I{}", i), value);
            }
            for i in 1..=CATEGORICAL {
                record.insert(format!("C{}", i), format!("v{}", (n * i) % 150));
            }
            record.insert("country".to_string(), if n % 3 == 0 { "US" } else { "DE" }.to_string());
            record
        })
        .collect()
}

fn bench_preprocess(c: &mut Criterion) {
    let schema = criteo_schema();
    let mut group = c.benchmark_group("preprocess_batch");

    for size in [1, 20, 256, 1024].iter() {
        let batch = records(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| preprocess_batch(black_box(&batch), black_box(&schema)))
        });
    }
    group.finish();
}

fn bench_route(c: &mut Criterion) {
    let router = ConditionRouter::new(RoutingConfig {
        enabled: true,
        default_model: "ctr_v1".to_string(),
        rules: vec![
            ConditionRule::new("us-mobile", "ctr_v2")
                .when("country", "US")
                .when("device", "mobile"),
            ConditionRule::new("us", "ctr_v3").when("country", "US"),
        ],
    });
    let mut group = c.benchmark_group("route_group");

    for size in [20, 1024].iter() {
        let batch = records(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| router.group(black_box(&batch)).len())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_route);
criterion_main!(benches);
