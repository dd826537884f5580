//! Apply a trained model to a feature table

use crate::data::{DatasetSchemas, Schema, Table};
use crate::error::{FlowError, Result};
use crate::training::ModelArtifact;
use crate::workflow::stage::{Stage, StageContext, StageInterface};
use crate::workflow::value::{PortType, PortValues, Value};
use std::sync::Arc;
use tracing::info;

/// Predict rounded class labels for every row of `x`
///
/// The result has one row per input row, in input order, and conforms to
/// `labels`.
pub fn predict_labels(model: &ModelArtifact, x: &Table, labels: &Arc<Schema>) -> Result<Table> {
    model.check_features(x.schema())?;
    if labels.columns() != std::slice::from_ref(&model.label_column) {
        return Err(FlowError::SchemaMismatch(format!(
            "model predicts `{}`, output schema is {}",
            model.label_column.name, labels
        )));
    }
    if x.is_empty() {
        return Table::empty(labels.clone());
    }

    let matrix = x.to_feature_matrix()?;
    let predictions: Vec<f64> = model
        .booster
        .predict(&matrix)?
        .iter()
        .map(|p| p.round())
        .collect();
    Table::from_label_values(labels.clone(), &predictions)
}

#[derive(Debug, Clone)]
pub struct Predictor {
    schemas: DatasetSchemas,
}

impl Predictor {
    pub fn new(schemas: DatasetSchemas) -> Self {
        Self { schemas }
    }
}

impl Stage for Predictor {
    fn name(&self) -> &str {
        "predict"
    }

    fn cache_params(&self) -> Result<String> {
        Ok(self.schemas.labels.fingerprint())
    }

    fn interface(&self) -> StageInterface {
        StageInterface::new()
            .input("x", PortType::Table(self.schemas.features.clone()))
            .input("model_ser", PortType::Blob)
            .output("predictions", PortType::Table(self.schemas.labels.clone()))
    }

    fn execute(&self, ctx: &StageContext, inputs: &PortValues) -> Result<PortValues> {
        let x = inputs.table("x")?;
        let artifact = inputs.artifact("model_ser")?;

        let bytes = ctx.store.read(artifact)?;
        let model = ModelArtifact::from_bytes(&bytes)?;
        let predictions = predict_labels(&model, x, &self.schemas.labels)?;

        info!(node = %ctx.node, rows = predictions.height(), "Predicted labels");
        Ok(PortValues::new().with("predictions", Value::Table(predictions)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::trainer::fit_model;
    use crate::training::BoosterConfig;
    use polars::df;

    fn fixture() -> (DatasetSchemas, Table, Table) {
        let schemas = DatasetSchemas::from_columns(
            "toy",
            vec![
                crate::data::ColumnSpec::float("a"),
                crate::data::ColumnSpec::integer("label"),
            ],
        )
        .unwrap();
        let a: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let label: Vec<i64> = (0..20).map(|i| if i >= 10 { 1 } else { 0 }).collect();
        let x = Table::new(schemas.features.clone(), df!("a" => a).unwrap()).unwrap();
        let y = Table::new(schemas.labels.clone(), df!("label" => label).unwrap()).unwrap();
        (schemas, x, y)
    }

    #[test]
    fn test_one_prediction_per_row() {
        let (schemas, x, y) = fixture();
        let model = fit_model(&x, &y, &BoosterConfig::default().with_n_estimators(20)).unwrap();
        let preds = predict_labels(&model, &x, &schemas.labels).unwrap();
        assert_eq!(preds.height(), x.height());
        let values = preds.label_values().unwrap();
        assert!(values.iter().all(|v| *v == 0.0 || *v == 1.0));
        // Separable on `a`
        assert_eq!(values, y.label_values().unwrap());
    }

    #[test]
    fn test_empty_features_give_empty_predictions() {
        let (schemas, x, y) = fixture();
        let model = fit_model(&x, &y, &BoosterConfig::default().with_n_estimators(3)).unwrap();
        let preds = predict_labels(&model, &Table::empty(schemas.features.clone()).unwrap(), &schemas.labels)
            .unwrap();
        assert_eq!(preds.height(), 0);
        assert_eq!(preds.schema().as_ref(), schemas.labels.as_ref());
    }

    #[test]
    fn test_wrong_feature_layout() {
        let (_, x, y) = fixture();
        let model = fit_model(&x, &y, &BoosterConfig::default().with_n_estimators(3)).unwrap();
        let pima = DatasetSchemas::pima();
        let err = predict_labels(&model, &Table::empty(pima.features.clone()).unwrap(), &pima.labels)
            .unwrap_err();
        assert!(matches!(err, FlowError::SchemaMismatch(_)));
    }
}
