use boostflow::data::{DatasetSchemas, Table};
use boostflow::stages::{fit_model, predict_labels, split_table, SplitConfig};
use boostflow::training::BoosterConfig;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;

fn create_pima_table(n_rows: usize) -> Table {
    let mut rng = rand::thread_rng();
    let schemas = DatasetSchemas::pima();

    let int_col = |rng: &mut ThreadRng, lo: i64, hi: i64| -> Vec<i64> {
        (0..n_rows).map(|_| rng.gen_range(lo..hi)).collect()
    };
    let preg = int_col(&mut rng, 0, 15);
    let glucose = int_col(&mut rng, 60, 200);
    let bp = int_col(&mut rng, 40, 110);
    let skin = int_col(&mut rng, 0, 60);
    let insulin = int_col(&mut rng, 0, 300);
    let bmi: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(18.0..50.0)).collect();
    let pedigree: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0.08..2.4)).collect();
    let age = int_col(&mut rng, 21, 80);
    let class: Vec<i64> = glucose
        .iter()
        .zip(&bmi)
        .map(|(g, b)| i64::from((*g as f64 - 120.0) / 40.0 + (b - 32.0) / 10.0 > 0.0))
        .collect();

    let df = df!(
        "#preg" => preg,
        "pgc_2h" => glucose,
        "diastolic_bp" => bp,
        "tricep_skin_fold_mm" => skin,
        "serum_insulin_2h" => insulin,
        "bmi" => bmi,
        "diabetes_pedigree" => pedigree,
        "age" => age,
        "class" => class
    )
    .unwrap();
    Table::new(schemas.full, df).unwrap()
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    let schemas = DatasetSchemas::pima();
    let config = SplitConfig::new(7, 0.33).unwrap();

    for n_rows in [768, 10_000].iter() {
        let full = create_pima_table(*n_rows);
        group.bench_with_input(BenchmarkId::new("split_table", n_rows), &full, |b, full| {
            b.iter(|| split_table(black_box(full), &schemas, &config).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks
    let schemas = DatasetSchemas::pima();
    let config = BoosterConfig::default().with_n_estimators(50);

    for n_rows in [768, 5000].iter() {
        let split = split_table(
            &create_pima_table(*n_rows),
            &schemas,
            &SplitConfig::new(7, 0.33).unwrap(),
        )
        .unwrap();

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &split, |b, split| {
            b.iter(|| fit_model(black_box(&split.x_train), &split.y_train, &config).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");
    let schemas = DatasetSchemas::pima();

    // Train model once
    let split = split_table(&create_pima_table(5000), &schemas, &SplitConfig::new(7, 0.33).unwrap())
        .unwrap();
    let model = fit_model(&split.x_train, &split.y_train, &BoosterConfig::default()).unwrap();

    group.bench_function("predict_labels", |b| {
        b.iter(|| predict_labels(&model, black_box(&split.x_test), &schemas.labels).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_split, bench_training, bench_prediction);
criterion_main!(benches);
