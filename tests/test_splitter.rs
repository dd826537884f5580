//! Integration tests for the seeded train/test split

mod common;

use boostflow::data::{DatasetSchemas, TableLoader};
use boostflow::error::FlowError;
use boostflow::stages::{split_dataset, split_table, test_size, SplitConfig};

#[test]
fn test_partition_sizes_over_ratios_and_seeds() {
    let dir = tempfile::tempdir().unwrap();
    let csv = common::write_pima_csv(dir.path(), "pima.csv", 101);
    let schemas = DatasetSchemas::pima();
    let full = TableLoader::new().load_csv(&csv, &schemas.full).unwrap();

    for ratio in [0.01, 0.2, 0.33, 0.5, 0.75, 0.99] {
        for seed in [0u64, 7, 123_456] {
            let split = split_table(&full, &schemas, &SplitConfig::new(seed, ratio).unwrap()).unwrap();
            let expected_test = (ratio * 101.0_f64).round() as usize;
            assert_eq!(split.x_test.height(), expected_test);
            assert_eq!(split.x_test.height(), test_size(101, ratio));
            assert_eq!(split.x_train.height() + split.x_test.height(), 101);
            assert_eq!(split.y_train.height(), split.x_train.height());
        }
    }
}

#[test]
fn test_split_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let csv = common::write_pima_csv(dir.path(), "pima.csv", 60);
    let schemas = DatasetSchemas::pima();
    let config = SplitConfig::new(7, 0.33).unwrap();

    let a = split_dataset(&csv, &schemas, &config).unwrap();
    let b = split_dataset(&csv, &schemas, &config).unwrap();
    assert!(a.x_train.frame().equals(b.x_train.frame()));
    assert!(a.y_test.frame().equals(b.y_test.frame()));

    let other = split_dataset(&csv, &schemas, &SplitConfig::new(8, 0.33).unwrap()).unwrap();
    assert!(!a.x_train.frame().equals(other.x_train.frame()));
}

#[test]
fn test_partitions_cover_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let csv = common::write_pima_csv(dir.path(), "pima.csv", 80);
    let schemas = DatasetSchemas::pima();
    let full = TableLoader::new().load_csv(&csv, &schemas.full).unwrap();
    let split = split_table(&full, &schemas, &SplitConfig::new(3, 0.4).unwrap()).unwrap();

    let total: f64 = full.project(schemas.labels.clone()).unwrap().label_values().unwrap().iter().sum();
    let train: f64 = split.y_train.label_values().unwrap().iter().sum();
    let test: f64 = split.y_test.label_values().unwrap().iter().sum();
    assert_eq!(train + test, total);
}

#[test]
fn test_empty_file_gives_empty_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("empty.csv");
    std::fs::write(&csv, "").unwrap();
    let schemas = DatasetSchemas::pima();

    let split = split_dataset(&csv, &schemas, &SplitConfig::new(7, 0.33).unwrap()).unwrap();
    assert_eq!(split.x_train.height(), 0);
    assert_eq!(split.x_test.height(), 0);
    assert_eq!(split.x_train.width(), 8);
    assert_eq!(split.y_test.width(), 1);
}

#[test]
fn test_blank_lines_do_not_count_as_rows() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("gappy.csv");
    let mut text = common::pima_csv(30, 4);
    text.insert(text.find('\n').unwrap() + 1, '\n');
    text.push('\n');
    std::fs::write(&csv, text).unwrap();

    let split = split_dataset(&csv, &DatasetSchemas::pima(), &SplitConfig::new(7, 0.33).unwrap())
        .unwrap();
    assert_eq!(split.x_train.height() + split.x_test.height(), 30);
    assert_eq!(split.x_test.height(), test_size(30, 0.33));
}

#[test]
fn test_unparseable_value_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("bad.csv");
    std::fs::write(&csv, "6,148,72,35,0,33.6,0.627,50,1\n1,abc,66,29,0,26.6,0.351,31,0\n").unwrap();

    let err = split_dataset(&csv, &DatasetSchemas::pima(), &SplitConfig::new(7, 0.33).unwrap())
        .unwrap_err();
    assert!(matches!(err, FlowError::SchemaMismatch(_)));
}

#[test]
fn test_missing_file_is_fetch_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = split_dataset(
        &dir.path().join("nope.csv"),
        &DatasetSchemas::pima(),
        &SplitConfig::new(7, 0.33).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, FlowError::DataFetch(_)));
}

#[test]
fn test_ratio_outside_unit_interval() {
    for ratio in [0.0, 1.0, -0.1, 1.5] {
        assert!(matches!(
            SplitConfig::new(7, ratio),
            Err(FlowError::InvalidParameter { .. })
        ));
    }
}
