//! Workflow DAG construction and validation
//!
//! A workflow is declared with [`WorkflowBuilder`]: typed workflow inputs,
//! nodes wrapping a [`Stage`], and bindings from each stage input port to
//! either a workflow input or an upstream node's output port. `build()`
//! rejects anything that would fail at run time for structural reasons and
//! fixes a topological order once.

use super::stage::{Stage, StageInterface};
use super::value::{PortType, Value};
use crate::error::{FlowError, Result};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;

/// Where a stage input port takes its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A workflow-level input
    Input(String),
    /// An output port of another node
    Output { node: String, port: String },
}

impl Binding {
    pub fn input(name: impl Into<String>) -> Self {
        Binding::Input(name.into())
    }

    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        Binding::Output {
            node: node.into(),
            port: port.into(),
        }
    }
}

/// A declared workflow input
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    pub name: String,
    pub ty: PortType,
    pub default: Option<Value>,
    pub help: String,
}

/// A node of the graph: one stage plus its input bindings
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: String,
    pub stage: Arc<dyn Stage>,
    pub interface: StageInterface,
    /// Stage input port -> source
    pub bindings: BTreeMap<String, Binding>,
}

impl WorkflowNode {
    /// Ids of the nodes this node reads from, deduplicated
    pub fn upstream(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for binding in self.bindings.values() {
            if let Binding::Output { node, .. } = binding {
                if !seen.contains(&node.as_str()) {
                    seen.push(node.as_str());
                }
            }
        }
        seen
    }
}

/// A declared workflow output, published from a node's output port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowOutput {
    pub name: String,
    pub node: String,
    pub port: String,
}

/// A data dependency between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

/// Fluent builder for [`WorkflowGraph`]
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    name: String,
    inputs: Vec<WorkflowInput>,
    nodes: Vec<(String, Arc<dyn Stage>, Vec<(String, Binding)>)>,
    outputs: Vec<WorkflowOutput>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a workflow input, optionally with a default
    pub fn input(
        mut self,
        name: impl Into<String>,
        ty: PortType,
        default: Option<Value>,
        help: impl Into<String>,
    ) -> Self {
        self.inputs.push(WorkflowInput {
            name: name.into(),
            ty,
            default,
            help: help.into(),
        });
        self
    }

    /// Add a node running `stage`, binding its input ports
    pub fn node<I, S>(mut self, id: impl Into<String>, stage: Arc<dyn Stage>, bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, Binding)>,
        S: Into<String>,
    {
        let bindings = bindings.into_iter().map(|(p, b)| (p.into(), b)).collect();
        self.nodes.push((id.into(), stage, bindings));
        self
    }

    /// Publish a node output as a workflow output
    pub fn output(
        mut self,
        name: impl Into<String>,
        node: impl Into<String>,
        port: impl Into<String>,
    ) -> Self {
        self.outputs.push(WorkflowOutput {
            name: name.into(),
            node: node.into(),
            port: port.into(),
        });
        self
    }

    /// Validate the declaration and fix the execution order
    pub fn build(self) -> Result<WorkflowGraph> {
        let WorkflowBuilder {
            name,
            inputs,
            nodes: raw_nodes,
            outputs,
        } = self;

        if raw_nodes.is_empty() {
            return Err(FlowError::GraphError(format!("workflow `{}` has no nodes", name)));
        }
        ensure_unique(inputs.iter().map(|i| i.name.as_str()), "workflow input")?;
        ensure_unique(raw_nodes.iter().map(|n| n.0.as_str()), "node id")?;
        ensure_unique(outputs.iter().map(|o| o.name.as_str()), "workflow output")?;

        for input in &inputs {
            if let Some(default) = &input.default {
                if !default.matches(&input.ty) {
                    return Err(FlowError::GraphError(format!(
                        "default for input `{}` is {}, declared {}",
                        input.name,
                        default.type_name(),
                        input.ty
                    )));
                }
            }
        }

        let mut nodes = Vec::with_capacity(raw_nodes.len());
        for (id, stage, raw_bindings) in raw_nodes {
            let interface = stage.interface();
            let mut bindings = BTreeMap::new();
            for (port, binding) in raw_bindings {
                if interface.find_input(&port).is_none() {
                    return Err(FlowError::GraphError(format!(
                        "node `{}` ({}) has no input port `{}`",
                        id,
                        stage.name(),
                        port
                    )));
                }
                if bindings.insert(port.clone(), binding).is_some() {
                    return Err(FlowError::GraphError(format!(
                        "input `{}.{}` is bound more than once",
                        id, port
                    )));
                }
            }
            if let Some(unbound) = interface.inputs.iter().find(|p| !bindings.contains_key(&p.name)) {
                return Err(FlowError::GraphError(format!(
                    "input `{}.{}` is not bound",
                    id, unbound.name
                )));
            }
            nodes.push(WorkflowNode {
                id,
                stage,
                interface,
                bindings,
            });
        }

        let index: HashMap<&str, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();

        for node in &nodes {
            for (port, binding) in &node.bindings {
                let expected = node
                    .interface
                    .find_input(port)
                    .map(|p| &p.ty)
                    .ok_or_else(|| FlowError::GraphError(format!("unknown port `{}`", port)))?;
                let (source, actual) = match binding {
                    Binding::Input(name) => {
                        let input = inputs.iter().find(|i| &i.name == name).ok_or_else(|| {
                            FlowError::GraphError(format!(
                                "`{}.{}` is bound to unknown workflow input `{}`",
                                node.id, port, name
                            ))
                        })?;
                        (format!("input `{}`", name), &input.ty)
                    }
                    Binding::Output { node: from, port: from_port } => {
                        let upstream = index.get(from.as_str()).map(|&i| &nodes[i]).ok_or_else(|| {
                            FlowError::GraphError(format!(
                                "`{}.{}` is bound to unknown node `{}`",
                                node.id, port, from
                            ))
                        })?;
                        let spec = upstream.interface.find_output(from_port).ok_or_else(|| {
                            FlowError::GraphError(format!(
                                "node `{}` has no output port `{}`",
                                from, from_port
                            ))
                        })?;
                        (format!("`{}.{}`", from, from_port), &spec.ty)
                    }
                };
                if actual != expected {
                    return Err(FlowError::GraphError(format!(
                        "type mismatch: {} is {}, `{}.{}` expects {}",
                        source, actual, node.id, port, expected
                    )));
                }
            }
        }

        for output in &outputs {
            let node = index.get(output.node.as_str()).map(|&i| &nodes[i]).ok_or_else(|| {
                FlowError::GraphError(format!(
                    "output `{}` refers to unknown node `{}`",
                    output.name, output.node
                ))
            })?;
            if node.interface.find_output(&output.port).is_none() {
                return Err(FlowError::GraphError(format!(
                    "output `{}` refers to unknown port `{}.{}`",
                    output.name, output.node, output.port
                )));
            }
        }

        let order = topological_order(&nodes, &index)?;

        Ok(WorkflowGraph {
            name,
            inputs,
            nodes,
            outputs,
            order,
        })
    }
}

fn ensure_unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(FlowError::GraphError(format!("duplicate {} `{}`", what, name)));
        }
    }
    Ok(())
}

/// Kahn's algorithm; ties are broken by declaration order
fn topological_order(nodes: &[WorkflowNode], index: &HashMap<&str, usize>) -> Result<Vec<usize>> {
    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, node) in nodes.iter().enumerate() {
        for upstream in node.upstream() {
            if let Some(&j) = index.get(upstream) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                queue.push_back(d);
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<&str> = (0..n)
            .filter(|i| in_degree[*i] > 0)
            .map(|i| nodes[i].id.as_str())
            .collect();
        return Err(FlowError::GraphError(format!(
            "cycle detected among nodes [{}]",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

/// A validated, topologically ordered workflow
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    name: String,
    inputs: Vec<WorkflowInput>,
    nodes: Vec<WorkflowNode>,
    outputs: Vec<WorkflowOutput>,
    order: Vec<usize>,
}

impl WorkflowGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[WorkflowInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[WorkflowOutput] {
        &self.outputs
    }

    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn input(&self, name: &str) -> Option<&WorkflowInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Nodes in execution order
    pub fn topological_order(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.order.iter().map(move |&i| &self.nodes[i])
    }

    /// Node-to-node data edges, in execution order of the consumer
    pub fn edges(&self) -> Vec<Edge> {
        self.topological_order()
            .flat_map(|node| {
                node.bindings.iter().filter_map(move |(port, binding)| match binding {
                    Binding::Output { node: from, port: from_port } => Some(Edge {
                        from_node: from.clone(),
                        from_port: from_port.clone(),
                        to_node: node.id.clone(),
                        to_port: port.clone(),
                    }),
                    Binding::Input(_) => None,
                })
            })
            .collect()
    }

    /// Graphviz rendering of inputs, nodes, edges and outputs
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", self.name);
        let _ = writeln!(dot, "  rankdir=LR;");
        for input in &self.inputs {
            let _ = writeln!(
                dot,
                "  \"in:{}\" [shape=ellipse, label=\"{}\\n{}\"];",
                input.name, input.name, input.ty
            );
        }
        for node in self.topological_order() {
            let _ = writeln!(
                dot,
                "  \"{}\" [shape=box, label=\"{}\\n({})\"];",
                node.id,
                node.id,
                node.stage.name()
            );
            for (port, binding) in &node.bindings {
                match binding {
                    Binding::Input(name) => {
                        let _ = writeln!(
                            dot,
                            "  \"in:{}\" -> \"{}\" [label=\"{}\"];",
                            name, node.id, port
                        );
                    }
                    Binding::Output { node: from, port: from_port } => {
                        let _ = writeln!(
                            dot,
                            "  \"{}\" -> \"{}\" [label=\"{} -> {}\"];",
                            from, node.id, from_port, port
                        );
                    }
                }
            }
        }
        for output in &self.outputs {
            let _ = writeln!(dot, "  \"out:{}\" [shape=ellipse];", output.name);
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"out:{}\" [label=\"{}\"];",
                output.node, output.name, output.port
            );
        }
        dot.push_str("}\n");
        dot
    }
}
