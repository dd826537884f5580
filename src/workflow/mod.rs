//! Workflow engine: typed stages, a validated DAG, a task cache and an executor
//!
//! - [`value`] - port types and the values that flow along edges
//! - [`stage`] - the [`Stage`] trait and its static interface
//! - [`graph`] - DAG declaration, validation and topological order
//! - [`fingerprint`] - content-addressed task keys
//! - [`cache`] - disk-backed task cache
//! - [`executor`] - runs a graph, consulting the cache
//! - [`params`] / [`diabetes`] - the diabetes workflow and its parameters

pub mod cache;
pub mod diabetes;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod params;
pub mod stage;
pub mod value;

pub use cache::{CacheEntry, CachedValue, TaskCache};
pub use diabetes::{diabetes_xgboost_workflow, WORKFLOW_NAME};
pub use executor::{Executor, RunReport, StageRecord, StageStatus};
pub use fingerprint::Fingerprint;
pub use graph::{Binding, Edge, WorkflowBuilder, WorkflowGraph, WorkflowInput, WorkflowNode, WorkflowOutput};
pub use params::{WorkflowParams, DEFAULT_DATASET_URL};
pub use stage::{PortSpec, Stage, StageContext, StageInterface};
pub use value::{PortType, PortValues, Value};
