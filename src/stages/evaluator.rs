//! Score predictions against the held-out labels

use crate::data::{DatasetSchemas, Table};
use crate::error::{FlowError, Result};
use crate::workflow::stage::{Stage, StageContext, StageInterface};
use crate::workflow::value::{PortType, PortValues, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Binary classification metrics for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ClassificationReport {
    pub fn n_samples(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Fraction of rows whose predicted label equals the actual label
pub fn accuracy_score(predictions: &Table, actual: &Table) -> Result<f64> {
    let (predicted, expected) = paired_labels(predictions, actual)?;
    let correct = predicted
        .iter()
        .zip(&expected)
        .filter(|(p, a)| p == a)
        .count();
    Ok(correct as f64 / expected.len() as f64)
}

/// Accuracy plus the confusion counts behind it, class 1 taken as positive
pub fn classification_report(predictions: &Table, actual: &Table) -> Result<ClassificationReport> {
    let (predicted, expected) = paired_labels(predictions, actual)?;

    let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
    for (p, a) in predicted.iter().zip(&expected) {
        match (*a > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    let correct = predicted
        .iter()
        .zip(&expected)
        .filter(|(p, a)| p == a)
        .count();
    let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
    let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(ClassificationReport {
        accuracy: correct as f64 / expected.len() as f64,
        precision,
        recall,
        f1_score,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
    })
}

/// `0.7312` -> `"73.12%"`
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn paired_labels(predictions: &Table, actual: &Table) -> Result<(Vec<f64>, Vec<f64>)> {
    if predictions.height() != actual.height() {
        return Err(FlowError::SizeMismatch {
            context: "evaluator predictions".to_string(),
            expected: actual.height(),
            actual: predictions.height(),
        });
    }
    if actual.is_empty() {
        return Err(FlowError::InvalidInput(
            "cannot score an empty test partition".to_string(),
        ));
    }
    Ok((predictions.label_values()?, actual.label_values()?))
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    schemas: DatasetSchemas,
}

impl Evaluator {
    pub fn new(schemas: DatasetSchemas) -> Self {
        Self { schemas }
    }
}

impl Stage for Evaluator {
    fn name(&self) -> &str {
        "metrics"
    }

    fn interface(&self) -> StageInterface {
        let labels = PortType::Table(self.schemas.labels.clone());
        StageInterface::new()
            .input("predictions", labels.clone())
            .input("y", labels)
            .output("accuracy", PortType::Float)
    }

    fn execute(&self, ctx: &StageContext, inputs: &PortValues) -> Result<PortValues> {
        let report = classification_report(inputs.table("predictions")?, inputs.table("y")?)?;

        info!(node = %ctx.node, "Accuracy: {}", format_percentage(report.accuracy));
        debug!(
            precision = report.precision,
            recall = report.recall,
            f1 = report.f1_score,
            samples = report.n_samples(),
            "Classification report"
        );

        Ok(PortValues::new().with("accuracy", Value::Float(report.accuracy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn labels(values: &[i64]) -> Table {
        let schemas = DatasetSchemas::pima();
        Table::new(schemas.labels.clone(), df!("class" => values.to_vec()).unwrap()).unwrap()
    }

    #[test]
    fn test_accuracy_fraction() {
        let acc = accuracy_score(&labels(&[1, 0, 1, 1]), &labels(&[1, 0, 0, 1])).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
        let perfect = accuracy_score(&labels(&[0, 1]), &labels(&[0, 1])).unwrap();
        assert_eq!(perfect, 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = accuracy_score(&labels(&[1, 0]), &labels(&[1, 0, 1])).unwrap_err();
        assert!(matches!(err, FlowError::SizeMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn test_empty_is_rejected() {
        let empty = Table::empty(DatasetSchemas::pima().labels).unwrap();
        assert!(matches!(
            accuracy_score(&empty, &empty),
            Err(FlowError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_report_counts() {
        let report = classification_report(&labels(&[1, 1, 0, 0]), &labels(&[1, 0, 0, 1])).unwrap();
        assert_eq!(report.true_positives, 1);
        assert_eq!(report.false_positives, 1);
        assert_eq!(report.true_negatives, 1);
        assert_eq!(report.false_negatives, 1);
        assert_eq!(report.n_samples(), 4);
        assert!((report.accuracy - 0.5).abs() < 1e-12);
        assert!((report.f1_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.7312), "73.12%");
        assert_eq!(format_percentage(1.0), "100.00%");
    }
}
