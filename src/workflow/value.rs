//! Values flowing along workflow edges

use crate::artifact::ArtifactRef;
use crate::data::{Schema, Table};
use crate::error::{FlowError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Static type of a port
#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    /// CSV file artifact
    Csv,
    /// Opaque blob artifact (serialized model)
    Blob,
    Integer,
    Float,
    /// Table conforming to the given schema
    Table(Arc<Schema>),
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::Csv => f.write_str("csv"),
            PortType::Blob => f.write_str("blob"),
            PortType::Integer => f.write_str("integer"),
            PortType::Float => f.write_str("float"),
            PortType::Table(schema) => write!(f, "table<{}>", schema.name()),
        }
    }
}

/// A concrete value bound to a port
#[derive(Debug, Clone)]
pub enum Value {
    Csv(ArtifactRef),
    Blob(ArtifactRef),
    Integer(i64),
    Float(f64),
    Table(Table),
}

impl Value {
    /// Whether this value may be bound to a port of type `ty`
    pub fn matches(&self, ty: &PortType) -> bool {
        match (self, ty) {
            (Value::Csv(_), PortType::Csv) => true,
            (Value::Blob(_), PortType::Blob) => true,
            (Value::Integer(_), PortType::Integer) => true,
            (Value::Float(_), PortType::Float) => true,
            (Value::Table(t), PortType::Table(schema)) => t.schema().as_ref() == schema.as_ref(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Csv(_) => "csv".to_string(),
            Value::Blob(_) => "blob".to_string(),
            Value::Integer(_) => "integer".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Table(t) => format!("table<{}>", t.schema().name()),
        }
    }

    /// One-line human description, used in logs and the CLI
    pub fn summary(&self) -> String {
        match self {
            Value::Csv(a) | Value::Blob(a) => a.uri.clone(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => format!("{:.6}", v),
            Value::Table(t) => format!("{} rows x {} cols", t.height(), t.width()),
        }
    }
}

/// Named port values, ordered by name
#[derive(Debug, Clone, Default)]
pub struct PortValues(BTreeMap<String, Value>);

impl PortValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.0
            .get(name)
            .ok_or_else(|| FlowError::InvalidInput(format!("missing port value `{}`", name)))
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        match self.get(name)? {
            Value::Table(t) => Ok(t),
            other => Err(type_error(name, "table", other)),
        }
    }

    /// Artifact of either a CSV or a blob port
    pub fn artifact(&self, name: &str) -> Result<&ArtifactRef> {
        match self.get(name)? {
            Value::Csv(a) | Value::Blob(a) => Ok(a),
            other => Err(type_error(name, "artifact", other)),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Integer(v) => Ok(*v),
            other => Err(type_error(name, "integer", other)),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            Value::Float(v) => Ok(*v),
            other => Err(type_error(name, "float", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

impl IntoIterator for PortValues {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, Value)> for PortValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn type_error(name: &str, expected: &str, got: &Value) -> FlowError {
    FlowError::SchemaMismatch(format!(
        "port `{}` expects {}, got {}",
        name,
        expected,
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetSchemas;

    #[test]
    fn test_matches_checks_table_schema() {
        let schemas = DatasetSchemas::pima();
        let features = Value::Table(Table::empty(schemas.features.clone()).unwrap());
        assert!(features.matches(&PortType::Table(schemas.features.clone())));
        assert!(!features.matches(&PortType::Table(schemas.labels.clone())));
        assert!(!features.matches(&PortType::Blob));
        assert!(Value::Integer(7).matches(&PortType::Integer));
        assert!(!Value::Integer(7).matches(&PortType::Float));
    }

    #[test]
    fn test_typed_accessors() {
        let values = PortValues::new()
            .with("seed", Value::Integer(7))
            .with("ratio", Value::Float(0.33));
        assert_eq!(values.integer("seed").unwrap(), 7);
        assert_eq!(values.float("ratio").unwrap(), 0.33);
        assert!(matches!(values.float("seed"), Err(FlowError::SchemaMismatch(_))));
        assert!(matches!(values.table("missing"), Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn test_port_type_display() {
        let schemas = DatasetSchemas::pima();
        assert_eq!(PortType::Table(schemas.labels).to_string(), "table<pima_labels>");
        assert_eq!(PortType::Csv.to_string(), "csv");
    }
}
