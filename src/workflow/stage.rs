//! The stage contract between the engine and the four pipeline units

use super::value::{PortType, PortValues};
use crate::artifact::ArtifactStore;
use crate::error::{FlowError, Result};
use std::fmt;
use std::sync::Arc;

/// A named, typed input or output
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub ty: PortType,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Statically declared ports of a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageInterface {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
}

impl StageInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, name: impl Into<String>, ty: PortType) -> Self {
        self.inputs.push(PortSpec::new(name, ty));
        self
    }

    pub fn output(mut self, name: impl Into<String>, ty: PortType) -> Self {
        self.outputs.push(PortSpec::new(name, ty));
        self
    }

    pub fn find_input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Check a value set against a port list: every port present, typed right, nothing extra
    pub fn check(ports: &[PortSpec], values: &PortValues, direction: &str) -> Result<()> {
        for port in ports {
            let value = values.get(&port.name).map_err(|_| {
                FlowError::SchemaMismatch(format!("{} port `{}` has no value", direction, port.name))
            })?;
            if !value.matches(&port.ty) {
                return Err(FlowError::SchemaMismatch(format!(
                    "{} port `{}` expects {}, got {}",
                    direction,
                    port.name,
                    port.ty,
                    value.type_name()
                )));
            }
        }
        if let Some(extra) = values.names().find(|n| !ports.iter().any(|p| p.name == *n)) {
            return Err(FlowError::SchemaMismatch(format!(
                "undeclared {} port `{}`",
                direction, extra
            )));
        }
        Ok(())
    }
}

/// What a running stage can reach besides its inputs
#[derive(Debug, Clone)]
pub struct StageContext {
    pub store: Arc<ArtifactStore>,
    /// Id of the graph node being executed
    pub node: String,
}

/// One schedulable, cacheable unit of work
///
/// A stage is a pure function of its inputs. The engine owns caching,
/// artifact staging and ordering; the stage only declares its interface and
/// computes outputs.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Stable stage name, part of the cache key
    fn name(&self) -> &str;

    /// Bump to invalidate cached results of this stage
    fn cache_version(&self) -> &str {
        "1.0"
    }

    /// Digest of construction-time settings that change the outputs.
    /// Mixed into the cache key next to the inputs.
    fn cache_params(&self) -> Result<String> {
        Ok(String::new())
    }

    fn cacheable(&self) -> bool {
        true
    }

    fn interface(&self) -> StageInterface;

    fn execute(&self, ctx: &StageContext, inputs: &PortValues) -> Result<PortValues>;
}
