//! The diabetes XGBoost workflow: split, fit, predict, score

use super::graph::{Binding, WorkflowBuilder, WorkflowGraph};
use super::params::{DEFAULT_DATASET_URL, DEFAULT_SEED, DEFAULT_TEST_SPLIT_RATIO};
use super::stage::Stage;
use super::value::{PortType, Value};
use crate::artifact::ArtifactRef;
use crate::data::DatasetSchemas;
use crate::error::Result;
use crate::stages::{Evaluator, Predictor, Splitter, Trainer};
use crate::training::BoosterConfig;
use std::sync::Arc;

pub const WORKFLOW_NAME: &str = "diabetes_xgboost";

/// Build the four-stage workflow for the given dataset layout
///
/// Inputs: `dataset`, `seed`, `test_split_ratio`. Outputs: `model` (the
/// serialized model artifact) and `accuracy` on the test partition.
pub fn diabetes_xgboost_workflow(
    schemas: &DatasetSchemas,
    booster: BoosterConfig,
) -> Result<WorkflowGraph> {
    booster.validate()?;

    let split: Arc<dyn Stage> = Arc::new(Splitter::new(schemas.clone()));
    let fit: Arc<dyn Stage> = Arc::new(Trainer::new(schemas.clone(), booster));
    let predict: Arc<dyn Stage> = Arc::new(Predictor::new(schemas.clone()));
    let metrics: Arc<dyn Stage> = Arc::new(Evaluator::new(schemas.clone()));

    WorkflowBuilder::new(WORKFLOW_NAME)
        .input(
            "dataset",
            PortType::Csv,
            Some(Value::Csv(ArtifactRef::dataset(DEFAULT_DATASET_URL))),
            "headerless CSV, URL or local path",
        )
        .input(
            "seed",
            PortType::Integer,
            Some(Value::Integer(DEFAULT_SEED as i64)),
            "seed of the train/test permutation",
        )
        .input(
            "test_split_ratio",
            PortType::Float,
            Some(Value::Float(DEFAULT_TEST_SPLIT_RATIO)),
            "fraction of rows held out for testing",
        )
        .node(
            "split",
            split,
            [
                ("dataset", Binding::input("dataset")),
                ("seed", Binding::input("seed")),
                ("test_split_ratio", Binding::input("test_split_ratio")),
            ],
        )
        .node(
            "fit",
            fit,
            [
                ("x", Binding::output("split", "x_train")),
                ("y", Binding::output("split", "y_train")),
            ],
        )
        .node(
            "predict",
            predict,
            [
                ("x", Binding::output("split", "x_test")),
                ("model_ser", Binding::output("fit", "model")),
            ],
        )
        .node(
            "metrics",
            metrics,
            [
                ("predictions", Binding::output("predict", "predictions")),
                ("y", Binding::output("split", "y_test")),
            ],
        )
        .output("model", "fit", "model")
        .output("accuracy", "metrics", "accuracy")
        .build()
}
