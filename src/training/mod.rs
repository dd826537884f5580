//! Model training
//!
//! - [`xgboost`] - second-order gradient-boosted tree classifier
//! - [`model`] - the serialized model envelope passed between stages

pub mod model;
pub mod xgboost;

pub use model::{ModelArtifact, MODEL_FORMAT};
pub use xgboost::{BoosterConfig, GradientBoostedClassifier};
