//! Seeded train/test split

use crate::artifact::ArtifactRef;
use crate::data::{DatasetSchemas, Table, TableLoader};
use crate::error::{FlowError, Result};
use crate::workflow::stage::{Stage, StageContext, StageInterface};
use crate::workflow::value::{PortType, PortValues, Value};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;
use tracing::info;

/// Parameters of one split
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    pub seed: u64,
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_split_ratio: f64,
}

impl SplitConfig {
    pub fn new(seed: u64, test_split_ratio: f64) -> Result<Self> {
        let config = Self {
            seed,
            test_split_ratio,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_split_ratio > 0.0 && self.test_split_ratio < 1.0) {
            return Err(FlowError::invalid_parameter(
                "test_split_ratio",
                self.test_split_ratio,
                "must be in the open interval (0, 1)",
            ));
        }
        Ok(())
    }
}

/// The four tables produced by a split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Table,
    pub x_test: Table,
    pub y_train: Table,
    pub y_test: Table,
}

/// Number of held-out rows: `round(ratio * n_rows)`, clamped to `n_rows`
pub fn test_size(n_rows: usize, ratio: f64) -> usize {
    let n = (ratio * n_rows as f64).round();
    (n.max(0.0) as usize).min(n_rows)
}

/// A seeded permutation of `0..n`
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Partition a full table into train/test features and labels
///
/// The first `test_size` entries of the seeded permutation form the test
/// partition; the remainder is the train partition.
pub fn split_table(
    full: &Table,
    schemas: &DatasetSchemas,
    config: &SplitConfig,
) -> Result<TrainTestSplit> {
    config.validate()?;
    if full.schema().as_ref() != schemas.full.as_ref() {
        return Err(FlowError::SchemaMismatch(format!(
            "splitter expects {}, got {}",
            schemas.full,
            full.schema()
        )));
    }

    let n_rows = full.height();
    let n_test = test_size(n_rows, config.test_split_ratio);
    let permutation = shuffled_indices(n_rows, config.seed);
    let (test_idx, train_idx) = permutation.split_at(n_test);

    let train = full.take(train_idx)?;
    let test = full.take(test_idx)?;

    Ok(TrainTestSplit {
        x_train: train.project(schemas.features.clone())?,
        x_test: test.project(schemas.features.clone())?,
        y_train: train.project(schemas.labels.clone())?,
        y_test: test.project(schemas.labels.clone())?,
    })
}

/// Load a headerless dataset CSV and split it
pub fn split_dataset(
    path: &Path,
    schemas: &DatasetSchemas,
    config: &SplitConfig,
) -> Result<TrainTestSplit> {
    let full = TableLoader::new().load_csv(path, &schemas.full)?;
    split_table(&full, schemas, config)
}

/// Stage form of the splitter
#[derive(Debug, Clone)]
pub struct Splitter {
    schemas: DatasetSchemas,
}

impl Splitter {
    pub fn new(schemas: DatasetSchemas) -> Self {
        Self { schemas }
    }
}

impl Stage for Splitter {
    fn name(&self) -> &str {
        "split"
    }

    /// The schema decides how the raw file is parsed
    fn cache_params(&self) -> Result<String> {
        Ok(self.schemas.full.fingerprint())
    }

    fn interface(&self) -> StageInterface {
        let features = PortType::Table(self.schemas.features.clone());
        let labels = PortType::Table(self.schemas.labels.clone());
        StageInterface::new()
            .input("dataset", PortType::Csv)
            .input("seed", PortType::Integer)
            .input("test_split_ratio", PortType::Float)
            .output("x_train", features.clone())
            .output("x_test", features)
            .output("y_train", labels.clone())
            .output("y_test", labels)
    }

    fn execute(&self, ctx: &StageContext, inputs: &PortValues) -> Result<PortValues> {
        let dataset: &ArtifactRef = inputs.artifact("dataset")?;
        let seed = inputs.integer("seed")?;
        let seed = u64::try_from(seed)
            .map_err(|_| FlowError::invalid_parameter("seed", seed, "must be non-negative"))?;
        let config = SplitConfig::new(seed, inputs.float("test_split_ratio")?)?;

        let path = ctx.store.resolve(dataset)?;
        let split = split_dataset(&path, &self.schemas, &config)?;

        info!(
            node = %ctx.node,
            dataset = %dataset.uri,
            seed = config.seed,
            ratio = config.test_split_ratio,
            train_rows = split.x_train.height(),
            test_rows = split.x_test.height(),
            "Split dataset"
        );

        Ok(PortValues::new()
            .with("x_train", Value::Table(split.x_train))
            .with("x_test", Value::Table(split.x_test))
            .with("y_train", Value::Table(split.y_train))
            .with("y_test", Value::Table(split.y_test)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, DataFrame, NamedFrom};

    fn pima_table(n: usize) -> Table {
        let schemas = DatasetSchemas::pima();
        let columns: Vec<Column> = schemas
            .full
            .columns()
            .iter()
            .enumerate()
            .map(|(j, c)| match c.dtype {
                crate::data::ColumnType::Integer => Column::new(
                    c.name.as_str().into(),
                    (0..n).map(|i| ((i * (j + 1)) % 2) as i64).collect::<Vec<i64>>(),
                ),
                crate::data::ColumnType::Float => Column::new(
                    c.name.as_str().into(),
                    (0..n).map(|i| i as f64 * 0.5).collect::<Vec<f64>>(),
                ),
            })
            .collect();
        Table::new(schemas.full.clone(), DataFrame::new(columns).unwrap()).unwrap()
    }

    #[test]
    fn test_test_size_rounding() {
        assert_eq!(test_size(768, 0.33), 253);
        assert_eq!(test_size(10, 0.25), 3);
        assert_eq!(test_size(10, 0.35), 4);
        assert_eq!(test_size(0, 0.5), 0);
        assert_eq!(test_size(1, 0.4), 0);
        assert_eq!(test_size(1, 0.6), 1);
    }

    #[test]
    fn test_counts_sum_to_total() {
        let schemas = DatasetSchemas::pima();
        let full = pima_table(97);
        for (seed, ratio) in [(0u64, 0.1), (7, 0.33), (42, 0.5), (1234, 0.9)] {
            let split = split_table(&full, &schemas, &SplitConfig::new(seed, ratio).unwrap()).unwrap();
            assert_eq!(split.x_train.height() + split.x_test.height(), 97);
            assert_eq!(split.x_test.height(), test_size(97, ratio));
            assert_eq!(split.y_train.height(), split.x_train.height());
            assert_eq!(split.y_test.height(), split.x_test.height());
            assert_eq!(split.x_train.width(), 8);
            assert_eq!(split.y_test.width(), 1);
        }
    }

    #[test]
    fn test_same_seed_same_partition() {
        let schemas = DatasetSchemas::pima();
        let full = pima_table(50);
        let config = SplitConfig::new(7, 0.33).unwrap();
        let a = split_table(&full, &schemas, &config).unwrap();
        let b = split_table(&full, &schemas, &config).unwrap();
        assert_eq!(a.x_test.content_hash().unwrap(), b.x_test.content_hash().unwrap());
        assert_eq!(a.y_train.content_hash().unwrap(), b.y_train.content_hash().unwrap());
    }

    #[test]
    fn test_different_seed_different_permutation() {
        assert_ne!(shuffled_indices(100, 1), shuffled_indices(100, 2));
        assert_eq!(shuffled_indices(100, 1), shuffled_indices(100, 1));
    }

    #[test]
    fn test_empty_dataset_keeps_schemas() {
        let schemas = DatasetSchemas::pima();
        let full = Table::empty(schemas.full.clone()).unwrap();
        let split = split_table(&full, &schemas, &SplitConfig::new(7, 0.33).unwrap()).unwrap();
        assert_eq!(split.x_train.height(), 0);
        assert_eq!(split.x_test.width(), 8);
        assert_eq!(split.y_train.width(), 1);
        assert!(schemas.labels.validate(split.y_test.frame()).is_ok());
    }

    #[test]
    fn test_cache_params_follow_schema() {
        let pima = Splitter::new(DatasetSchemas::pima());
        let renamed = DatasetSchemas::from_columns(
            "renamed",
            (0..9).map(|i| crate::data::ColumnSpec::integer(format!("c{}", i))).collect(),
        )
        .unwrap();
        assert_eq!(
            pima.cache_params().unwrap(),
            Splitter::new(DatasetSchemas::pima()).cache_params().unwrap()
        );
        assert_ne!(pima.cache_params().unwrap(), Splitter::new(renamed).cache_params().unwrap());
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(SplitConfig::new(7, 0.0).is_err());
        assert!(SplitConfig::new(7, 1.0).is_err());
        assert!(SplitConfig::new(7, f64::NAN).is_err());
        assert!(SplitConfig::new(7, 0.5).is_ok());
    }
}
