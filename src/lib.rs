//! boostflow - a cached, typed workflow for gradient-boosted classification
//!
//! A four-stage batch pipeline over tabular data: split a labeled dataset,
//! fit a gradient-boosted tree classifier, predict the held-out rows, and
//! score the predictions. Stages exchange schema-checked tables and artifact
//! references, run in dependency order, and are skipped when their inputs
//! have been seen before.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - schemas, schema-checked tables, CSV/Parquet I/O
//! - [`artifact`] - artifact references and the content-addressed store
//!
//! ## Pipeline
//! - [`training`] - gradient-boosted tree classifier and the model artifact
//! - [`stages`] - splitter, trainer, predictor, evaluator
//! - [`workflow`] - DAG, fingerprints, task cache, executor
//!
//! ## Services
//! - [`config`] - engine configuration
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;

pub mod artifact;
pub mod data;

pub mod stages;
pub mod training;
pub mod workflow;

pub mod cli;
pub mod config;

pub use error::{FlowError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{FlowError, Result};

    // Data
    pub use crate::artifact::{ArtifactKind, ArtifactRef, ArtifactStore};
    pub use crate::data::{ColumnSpec, ColumnType, DatasetSchemas, Schema, Table, TableLoader, TableWriter};

    // Training
    pub use crate::training::{BoosterConfig, GradientBoostedClassifier, ModelArtifact};

    // Stages
    pub use crate::stages::{
        accuracy_score, fit_model, predict_labels, split_table, Evaluator, Predictor, SplitConfig,
        Splitter, Trainer, TrainTestSplit,
    };

    // Workflow
    pub use crate::config::EngineConfig;
    pub use crate::workflow::{
        diabetes_xgboost_workflow, Binding, Executor, PortType, PortValues, RunReport, Stage,
        StageStatus, Value, WorkflowBuilder, WorkflowGraph, WorkflowParams,
    };
}
