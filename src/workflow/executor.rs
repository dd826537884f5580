//! Local workflow executor
//!
//! Runs the nodes of a [`WorkflowGraph`] one at a time in topological order.
//! For every node the executor:
//!
//! 1. collects its inputs from workflow inputs and upstream outputs,
//! 2. type-checks them against the stage interface,
//! 3. fingerprints them and consults the task cache,
//! 4. on a miss runs the stage,
//! 5. type-checks the outputs and records them in the cache.
//!
//! Anything that touches files or burns CPU runs on tokio's blocking pool.
//!
//! The first failure aborts the run. Nothing from a failed stage is cached or
//! published.

use super::cache::TaskCache;
use super::fingerprint::Fingerprint;
use super::graph::{Binding, WorkflowGraph};
use super::stage::{StageContext, StageInterface};
use super::value::{PortValues, Value};
use crate::artifact::ArtifactStore;
use crate::config::EngineConfig;
use crate::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of one node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Cached,
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Cached => "cached",
            StageStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub node: String,
    pub stage: String,
    pub status: StageStatus,
    pub fingerprint: Option<Fingerprint>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl StageRecord {
    fn pending(node: &str, stage: &str) -> Self {
        Self {
            node: node.to_string(),
            stage: stage.to_string(),
            status: StageStatus::Pending,
            fingerprint: None,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub outputs: PortValues,
}

impl RunReport {
    pub fn output(&self, name: &str) -> Result<&Value> {
        self.outputs.get(name)
    }

    pub fn status_of(&self, node: &str) -> Option<StageStatus> {
        self.stages.iter().find(|r| r.node == node).map(|r| r.status)
    }

    pub fn cached_count(&self) -> usize {
        self.count(StageStatus::Cached)
    }

    pub fn executed_count(&self) -> usize {
        self.count(StageStatus::Succeeded)
    }

    fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|r| r.status == status).count()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Machine-readable summary
    pub fn to_json(&self) -> serde_json::Value {
        let outputs: serde_json::Map<String, serde_json::Value> = self
            .outputs
            .iter()
            .map(|(name, value)| {
                let v = match value {
                    Value::Float(f) => serde_json::json!(f),
                    Value::Integer(i) => serde_json::json!(i),
                    Value::Csv(a) | Value::Blob(a) => serde_json::json!(a.uri),
                    Value::Table(t) => serde_json::json!({ "rows": t.height(), "cols": t.width() }),
                };
                (name.clone(), v)
            })
            .collect();
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "workflow": self.workflow,
            "started_at": self.started_at.to_rfc3339(),
            "duration_ms": self.duration_ms(),
            "stages": self.stages,
            "outputs": outputs,
        })
    }
}

pub struct Executor {
    store: Arc<ArtifactStore>,
    cache: Option<TaskCache>,
}

impl Executor {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let store = Arc::new(ArtifactStore::open(
            &config.store_dir,
            config.download_timeout_secs,
        )?);
        Ok(Self::with_store(store, config.cache_enabled))
    }

    pub fn with_store(store: Arc<ArtifactStore>, cache_enabled: bool) -> Self {
        let cache = cache_enabled.then(|| TaskCache::new(store.clone()));
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn cache(&self) -> Option<&TaskCache> {
        self.cache.as_ref()
    }

    /// Execute `graph` with the given workflow inputs; absent inputs take their defaults
    pub async fn run(&self, graph: &WorkflowGraph, inputs: PortValues) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let workflow_inputs = resolve_inputs(graph, inputs)?;

        info!(
            run_id = %run_id,
            workflow = graph.name(),
            nodes = graph.nodes().len(),
            cache = self.cache.is_some(),
            "Starting workflow run"
        );
        for (name, value) in workflow_inputs.iter() {
            debug!(input = %name, value = %value.summary(), "Workflow input");
        }

        let mut records: Vec<StageRecord> = graph
            .topological_order()
            .map(|n| StageRecord::pending(&n.id, n.stage.name()))
            .collect();
        let mut staged: HashMap<String, Value> = HashMap::new();
        let mut produced: HashMap<String, PortValues> = HashMap::new();

        for (idx, node) in graph.topological_order().enumerate() {
            let stage = node.stage.clone();
            let timer = Instant::now();

            let prepared = async {
                self.stage_inputs(node.bindings.values(), &workflow_inputs, &mut staged)
                    .await?;
                let values = collect_inputs(node.bindings.iter(), &staged, &produced)?;
                StageInterface::check(&node.interface.inputs, &values, "input")?;
                let fp = Fingerprint::compute(
                    stage.name(),
                    stage.cache_version(),
                    &stage.cache_params()?,
                    &values,
                )?;
                Ok::<_, FlowError>((values, fp))
            }
            .await;
            let (node_inputs, fingerprint) = match prepared {
                Ok(p) => p,
                Err(e) => {
                    records[idx].status = StageStatus::Failed;
                    records[idx].error = Some(e.to_string());
                    error!(node = %node.id, error = %e, "Stage inputs rejected");
                    return Err(e.in_stage(&node.id));
                }
            };
            records[idx].fingerprint = Some(fingerprint.clone());

            if let Some(cache) = self.cache.as_ref().filter(|_| stage.cacheable()) {
                let (cache, fp, iface) = (cache.clone(), fingerprint.clone(), node.interface.clone());
                if let Some(outputs) = blocking(move || cache.lookup(&fp, &iface)).await? {
                    records[idx].status = StageStatus::Cached;
                    records[idx].duration_ms = timer.elapsed().as_millis() as u64;
                    info!(node = %node.id, fingerprint = %fingerprint.short(), "Cache hit, skipping stage");
                    produced.insert(node.id.clone(), outputs);
                    continue;
                }
            }

            records[idx].status = StageStatus::Running;
            info!(node = %node.id, stage = stage.name(), fingerprint = %fingerprint.short(), "Running stage");

            let ctx = StageContext {
                store: self.store.clone(),
                node: node.id.clone(),
            };
            let result = blocking(move || stage.execute(&ctx, &node_inputs))
                .await
                .and_then(|outputs| {
                    StageInterface::check(&node.interface.outputs, &outputs, "output")?;
                    Ok(outputs)
                });

            records[idx].duration_ms = timer.elapsed().as_millis() as u64;
            let outputs = match result {
                Ok(outputs) => outputs,
                Err(e) => {
                    records[idx].status = StageStatus::Failed;
                    records[idx].error = Some(e.to_string());
                    error!(node = %node.id, error = %e, "Stage failed, aborting run");
                    return Err(e.in_stage(&node.id));
                }
            };

            if let Some(cache) = self.cache.as_ref().filter(|_| node.stage.cacheable()) {
                let cache = cache.clone();
                let fp = fingerprint.clone();
                let id = node.id.clone();
                let name = node.stage.name().to_string();
                let version = node.stage.cache_version().to_string();
                let to_cache = outputs.clone();
                let stored =
                    blocking(move || cache.store(&fp, &id, &name, &version, &to_cache)).await;
                if let Err(e) = stored {
                    warn!(node = %node.id, error = %e, "Could not cache stage outputs");
                }
            }

            records[idx].status = StageStatus::Succeeded;
            info!(node = %node.id, duration_ms = records[idx].duration_ms, "Stage succeeded");
            produced.insert(node.id.clone(), outputs);
        }

        let mut outputs = PortValues::new();
        for output in graph.outputs() {
            let value = produced
                .get(&output.node)
                .ok_or_else(|| {
                    FlowError::ExecutionError(format!("node `{}` produced nothing", output.node))
                })?
                .get(&output.port)?
                .clone();
            info!(output = %output.name, value = %value.summary(), "Workflow output");
            outputs.insert(output.name.clone(), value);
        }

        let report = RunReport {
            run_id,
            workflow: graph.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            stages: records,
            outputs,
        };
        info!(
            run_id = %run_id,
            executed = report.executed_count(),
            cached = report.cached_count(),
            duration_ms = report.duration_ms(),
            "Workflow run finished"
        );
        Ok(report)
    }

    /// Bring the workflow inputs a node reads into the store, once per run.
    /// Artifact staging copies files, so it runs on the blocking pool.
    async fn stage_inputs<'a>(
        &self,
        bindings: impl Iterator<Item = &'a Binding>,
        workflow_inputs: &PortValues,
        staged: &mut HashMap<String, Value>,
    ) -> Result<()> {
        for binding in bindings {
            let Binding::Input(name) = binding else {
                continue;
            };
            if staged.contains_key(name) {
                continue;
            }
            let raw = workflow_inputs.get(name)?.clone();
            let store = self.store.clone();
            let value = blocking(move || stage_value(&store, &raw)).await?;
            staged.insert(name.clone(), value);
        }
        Ok(())
    }
}

fn collect_inputs<'a>(
    bindings: impl Iterator<Item = (&'a String, &'a Binding)>,
    staged: &HashMap<String, Value>,
    produced: &HashMap<String, PortValues>,
) -> Result<PortValues> {
    let mut values = PortValues::new();
    for (port, binding) in bindings {
        let value = match binding {
            Binding::Input(name) => staged.get(name).ok_or_else(|| {
                FlowError::ExecutionError(format!("workflow input `{}` was not staged", name))
            })?,
            Binding::Output { node, port } => produced
                .get(node)
                .ok_or_else(|| {
                    FlowError::ExecutionError(format!("upstream node `{}` has not run", node))
                })?
                .get(port)?,
        };
        values.insert(port.clone(), value.clone());
    }
    Ok(values)
}

/// Bring artifact inputs into the store before fingerprinting
fn stage_value(store: &ArtifactStore, value: &Value) -> Result<Value> {
    Ok(match value {
        Value::Csv(a) => Value::Csv(store.stage(a)?),
        Value::Blob(a) => Value::Blob(store.stage(a)?),
        other => other.clone(),
    })
}

/// Run file or CPU bound work on tokio's blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        FlowError::ExecutionError(format!("blocking task panicked or was cancelled: {}", e))
    })?
}


/// Apply defaults and reject unknown, missing or mistyped workflow inputs
fn resolve_inputs(graph: &WorkflowGraph, mut provided: PortValues) -> Result<PortValues> {
    let mut resolved = PortValues::new();
    for input in graph.inputs() {
        let value = match provided.remove(&input.name) {
            Some(v) => v,
            None => input.default.clone().ok_or_else(|| {
                FlowError::InvalidInput(format!(
                    "workflow input `{}` has no value and no default",
                    input.name
                ))
            })?,
        };
        if !value.matches(&input.ty) {
            return Err(FlowError::SchemaMismatch(format!(
                "workflow input `{}` expects {}, got {}",
                input.name,
                input.ty,
                value.type_name()
            )));
        }
        resolved.insert(input.name.clone(), value);
    }
    if let Some(extra) = provided.names().next() {
        return Err(FlowError::InvalidInput(format!(
            "`{}` is not an input of workflow `{}`",
            extra,
            graph.name()
        )));
    }
    Ok(resolved)
}
