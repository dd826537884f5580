//! Serialized model envelope
//!
//! The booster is wrapped together with the feature columns it was trained on,
//! so the predictor can reject feature tables with a different layout before
//! touching the trees.

use super::xgboost::GradientBoostedClassifier;
use crate::data::schema::{ColumnSpec, Schema};
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

/// Format tag written into every artifact
pub const MODEL_FORMAT: &str = "boostflow.gbt.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub feature_columns: Vec<ColumnSpec>,
    pub label_column: ColumnSpec,
    pub trained_rows: usize,
    pub booster: GradientBoostedClassifier,
}

impl ModelArtifact {
    pub fn new(
        features: &Schema,
        label_column: ColumnSpec,
        trained_rows: usize,
        booster: GradientBoostedClassifier,
    ) -> Self {
        Self {
            format: MODEL_FORMAT.to_string(),
            feature_columns: features.columns().to_vec(),
            label_column,
            trained_rows,
            booster,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self = serde_json::from_slice(bytes)
            .map_err(|e| FlowError::Deserialization(format!("invalid model artifact: {}", e)))?;
        if artifact.format != MODEL_FORMAT {
            return Err(FlowError::Deserialization(format!(
                "unsupported model format `{}` (expected `{}`)",
                artifact.format, MODEL_FORMAT
            )));
        }
        Ok(artifact)
    }

    /// Check a feature schema against the columns seen at training time
    pub fn check_features(&self, schema: &Schema) -> Result<()> {
        if schema.columns() != self.feature_columns.as_slice() {
            let expected: Vec<&str> = self.feature_columns.iter().map(|c| c.name.as_str()).collect();
            return Err(FlowError::SchemaMismatch(format!(
                "model expects features [{}], got {}",
                expected.join(", "),
                schema
            )));
        }
        Ok(())
    }
}
