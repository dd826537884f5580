//! Fit a gradient-boosted classifier on the train partition

use crate::artifact::ArtifactKind;
use crate::data::{DatasetSchemas, Table};
use crate::error::{FlowError, Result};
use crate::training::{BoosterConfig, GradientBoostedClassifier, ModelArtifact};
use crate::workflow::stage::{Stage, StageContext, StageInterface};
use crate::workflow::value::{PortType, PortValues, Value};
use ndarray::Array1;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Train a booster on `x`/`y` and wrap it with the feature layout
pub fn fit_model(x: &Table, y: &Table, config: &BoosterConfig) -> Result<ModelArtifact> {
    if x.is_empty() || y.is_empty() {
        return Err(FlowError::InvalidInput(format!(
            "cannot train on an empty table ({} feature rows, {} label rows)",
            x.height(),
            y.height()
        )));
    }
    if x.height() != y.height() {
        return Err(FlowError::SizeMismatch {
            context: "trainer labels".to_string(),
            expected: x.height(),
            actual: y.height(),
        });
    }

    let matrix = x.to_feature_matrix()?;
    let labels = Array1::from_vec(y.label_values()?);

    let mut booster = GradientBoostedClassifier::new(config.clone());
    booster.fit(&matrix, &labels)?;

    let label_column = y.schema().columns()[0].clone();
    Ok(ModelArtifact::new(x.schema(), label_column, x.height(), booster))
}

#[derive(Debug, Clone)]
pub struct Trainer {
    schemas: DatasetSchemas,
    config: BoosterConfig,
}

impl Trainer {
    pub fn new(schemas: DatasetSchemas, config: BoosterConfig) -> Self {
        Self { schemas, config }
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }
}

impl Stage for Trainer {
    fn name(&self) -> &str {
        "fit"
    }

    fn cache_params(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.config)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    fn interface(&self) -> StageInterface {
        StageInterface::new()
            .input("x", PortType::Table(self.schemas.features.clone()))
            .input("y", PortType::Table(self.schemas.labels.clone()))
            .output("model", PortType::Blob)
    }

    fn execute(&self, ctx: &StageContext, inputs: &PortValues) -> Result<PortValues> {
        let x = inputs.table("x")?;
        let y = inputs.table("y")?;

        let model = fit_model(x, y, &self.config)?;
        let bytes = model.to_bytes()?;
        let artifact = ctx.store.put_bytes(ArtifactKind::Model, &bytes)?;

        info!(
            node = %ctx.node,
            rows = model.trained_rows,
            trees = model.booster.n_trees(),
            model = %artifact.uri,
            "Trained model"
        );
        if let Some(importances) = model.booster.feature_importances() {
            for (spec, imp) in x.schema().columns().iter().zip(importances.iter()) {
                debug!(feature = %spec.name, importance = imp, "Feature importance");
            }
        }

        Ok(PortValues::new().with("model", Value::Blob(artifact)))
    }
}
