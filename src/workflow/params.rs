//! Parameters of one diabetes workflow run

use super::value::{PortValues, Value};
use crate::artifact::ArtifactRef;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/jbrownlee/Datasets/master/pima-indians-diabetes.data.csv";
pub const DEFAULT_SEED: u64 = 7;
pub const DEFAULT_TEST_SPLIT_RATIO: f64 = 0.33;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowParams {
    /// URL or local path of the headerless CSV
    pub dataset: String,
    pub seed: u64,
    pub test_split_ratio: f64,
}

impl Default for WorkflowParams {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET_URL.to_string(),
            seed: DEFAULT_SEED,
            test_split_ratio: DEFAULT_TEST_SPLIT_RATIO,
        }
    }
}

impl WorkflowParams {
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_test_split_ratio(mut self, ratio: f64) -> Self {
        self.test_split_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(FlowError::invalid_parameter("dataset", "", "must not be empty"));
        }
        if !(self.test_split_ratio > 0.0 && self.test_split_ratio < 1.0) {
            return Err(FlowError::invalid_parameter(
                "test_split_ratio",
                self.test_split_ratio,
                "must be in the open interval (0, 1)",
            ));
        }
        if i64::try_from(self.seed).is_err() {
            return Err(FlowError::invalid_parameter("seed", self.seed, "must fit in 63 bits"));
        }
        Ok(())
    }

    /// Workflow input values for these parameters
    pub fn into_inputs(self) -> Result<PortValues> {
        self.validate()?;
        let seed = i64::try_from(self.seed)
            .map_err(|_| FlowError::invalid_parameter("seed", self.seed, "must fit in 63 bits"))?;
        Ok(PortValues::new()
            .with("dataset", Value::Csv(ArtifactRef::dataset(self.dataset)))
            .with("seed", Value::Integer(seed))
            .with("test_split_ratio", Value::Float(self.test_split_ratio)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = WorkflowParams::default();
        assert_eq!(p.seed, 7);
        assert_eq!(p.test_split_ratio, 0.33);
        assert!(p.dataset.ends_with("pima-indians-diabetes.data.csv"));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_into_inputs() {
        let inputs = WorkflowParams::default()
            .with_dataset("/tmp/pima.csv")
            .with_seed(42)
            .into_inputs()
            .unwrap();
        assert_eq!(inputs.integer("seed").unwrap(), 42);
        assert_eq!(inputs.artifact("dataset").unwrap().uri, "/tmp/pima.csv");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(WorkflowParams::default().with_test_split_ratio(1.5).validate().is_err());
        assert!(WorkflowParams::default().with_dataset(" ").validate().is_err());
        assert!(WorkflowParams::default().with_seed(u64::MAX).into_inputs().is_err());
    }
}
