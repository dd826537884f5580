//! Column schemas shared by every stage
//!
//! A [`Schema`] is a fixed, ordered list of named and typed columns. The three
//! schemas a dataset is seen through (full, features, labels) are bundled in
//! [`DatasetSchemas`] and passed explicitly to the stages.

use crate::error::{FlowError, Result};
use polars::prelude::{DataFrame, DataType, Field, Schema as PolarsSchema};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
}

impl ColumnType {
    /// Physical polars dtype backing this column type
    pub fn dtype(&self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float)
    }
}

/// An ordered list of typed columns a table must conform to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Create a schema, rejecting empty or duplicated column lists
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(FlowError::SchemaMismatch(format!(
                "schema `{}` must have at least one column",
                name
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(FlowError::SchemaMismatch(format!(
                    "schema `{}` has duplicate column `{}`",
                    name, col.name
                )));
            }
        }
        Ok(Self { name, columns })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Equivalent polars schema, used to type CSV and Parquet reads
    pub fn to_polars(&self) -> PolarsSchema {
        self.columns
            .iter()
            .map(|c| Field::new(c.name.as_str().into(), c.dtype.dtype()))
            .collect()
    }

    /// Stable digest of the column layout (names and types, in order)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for col in &self.columns {
            hasher.update(col.name.as_bytes());
            hasher.update(b":");
            hasher.update(col.dtype.as_str().as_bytes());
            hasher.update(b";");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Check that a dataframe has exactly these columns, in order, with these dtypes
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        if df.width() != self.columns.len() {
            return Err(FlowError::SchemaMismatch(format!(
                "schema `{}` expects {} columns, got {}",
                self.name,
                self.columns.len(),
                df.width()
            )));
        }

        for (spec, column) in self.columns.iter().zip(df.get_columns()) {
            if column.name().as_str() != spec.name {
                return Err(FlowError::SchemaMismatch(format!(
                    "schema `{}` expects column `{}`, got `{}`",
                    self.name,
                    spec.name,
                    column.name()
                )));
            }
            if column.dtype() != &spec.dtype.dtype() {
                return Err(FlowError::SchemaMismatch(format!(
                    "column `{}` should be {}, got {}",
                    spec.name,
                    spec.dtype,
                    column.dtype()
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", col.name, col.dtype)?;
        }
        f.write_str(")")
    }
}

/// The three views of one dataset: every column, the features, the label
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchemas {
    pub full: Arc<Schema>,
    pub features: Arc<Schema>,
    pub labels: Arc<Schema>,
}

impl DatasetSchemas {
    /// Pima Indians diabetes layout: 8 numeric features and a 0/1 class column.
    ///
    /// Example row: `6,148,72,35,0,33.6,0.627,50,1`
    pub fn pima() -> Self {
        let columns = vec![
            ColumnSpec::integer("#preg"),
            ColumnSpec::integer("pgc_2h"),
            ColumnSpec::integer("diastolic_bp"),
            ColumnSpec::integer("tricep_skin_fold_mm"),
            ColumnSpec::integer("serum_insulin_2h"),
            ColumnSpec::float("bmi"),
            ColumnSpec::float("diabetes_pedigree"),
            ColumnSpec::integer("age"),
            ColumnSpec::integer("class"),
        ];
        Self::build("pima", columns)
    }

    /// Treat the last column as the label and every other column as a feature
    pub fn from_columns(name: &str, columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.len() < 2 {
            return Err(FlowError::SchemaMismatch(format!(
                "dataset `{}` needs at least one feature and one label column, got {}",
                name,
                columns.len()
            )));
        }
        // Validates names before splitting.
        Schema::new(name, columns.clone())?;
        Ok(Self::build(name, columns))
    }

    fn build(name: &str, columns: Vec<ColumnSpec>) -> Self {
        let n = columns.len();
        let features = columns[..n - 1].to_vec();
        let labels = columns[n - 1..].to_vec();
        Self {
            full: Arc::new(Schema {
                name: name.to_string(),
                columns,
            }),
            features: Arc::new(Schema {
                name: format!("{}_features", name),
                columns: features,
            }),
            labels: Arc::new(Schema {
                name: format!("{}_labels", name),
                columns: labels,
            }),
        }
    }

    /// The single label column
    pub fn label_column(&self) -> &ColumnSpec {
        &self.labels.columns()[0]
    }
}

impl Default for DatasetSchemas {
    fn default() -> Self {
        Self::pima()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn test_pima_layout() {
        let schemas = DatasetSchemas::pima();
        assert_eq!(schemas.full.len(), 9);
        assert_eq!(schemas.features.len(), 8);
        assert_eq!(schemas.labels.len(), 1);
        assert_eq!(schemas.label_column().name, "class");
        assert_eq!(schemas.features.columns()[5], ColumnSpec::float("bmi"));
        assert_eq!(&schemas.full.columns()[..8], schemas.features.columns());
    }

    #[test]
    fn test_from_columns_requires_two() {
        let err = DatasetSchemas::from_columns("tiny", vec![ColumnSpec::integer("y")]);
        assert!(matches!(err, Err(FlowError::SchemaMismatch(_))));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = Schema::new(
            "dup",
            vec![ColumnSpec::integer("a"), ColumnSpec::float("a")],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_dataframe() {
        let schema = Schema::new(
            "s",
            vec![ColumnSpec::integer("a"), ColumnSpec::float("b")],
        )
        .unwrap();

        let ok = df!("a" => &[1i64, 2], "b" => &[0.5f64, 1.5]).unwrap();
        assert!(schema.validate(&ok).is_ok());

        let wrong_type = df!("a" => &[1.0f64, 2.0], "b" => &[0.5f64, 1.5]).unwrap();
        assert!(schema.validate(&wrong_type).is_err());

        let wrong_name = df!("x" => &[1i64, 2], "b" => &[0.5f64, 1.5]).unwrap();
        assert!(schema.validate(&wrong_name).is_err());

        let wrong_width = df!("a" => &[1i64, 2]).unwrap();
        assert!(schema.validate(&wrong_width).is_err());
    }

    #[test]
    fn test_fingerprint_depends_on_types() {
        let a = Schema::new("s", vec![ColumnSpec::integer("a")]).unwrap();
        let b = Schema::new("s", vec![ColumnSpec::float("a")]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn test_to_polars() {
        let schemas = DatasetSchemas::pima();
        let pl = schemas.full.to_polars();
        assert_eq!(pl.len(), 9);
        assert_eq!(pl.get("bmi"), Some(&DataType::Float64));
        assert_eq!(pl.get("age"), Some(&DataType::Int64));
    }
}
