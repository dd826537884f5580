//! Schema-checked tables
//!
//! [`Table`] pairs a polars [`DataFrame`] with the [`Schema`] it was validated
//! against. Every table that crosses a stage boundary is a `Table`, so a stage
//! never sees columns it did not declare.

use crate::data::schema::{ColumnType, Schema};
use crate::error::{FlowError, Result};
use ndarray::Array2;
use polars::prelude::{Column, DataFrame, DataType, IdxCa, IdxSize, NamedFrom, Series};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A dataframe that conforms to a known schema
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<Schema>,
    frame: DataFrame,
}

impl Table {
    /// Wrap a dataframe, validating it against the schema
    pub fn new(schema: Arc<Schema>, frame: DataFrame) -> Result<Self> {
        schema.validate(&frame)?;
        Ok(Self { schema, frame })
    }

    /// A zero-row table that still carries every column of the schema
    pub fn empty(schema: Arc<Schema>) -> Result<Self> {
        let columns: Vec<Column> = schema
            .columns()
            .iter()
            .map(|c| Series::new_empty(c.name.as_str().into(), &c.dtype.dtype()).into())
            .collect();
        let frame = DataFrame::new(columns)?;
        Self::new(schema, frame)
    }

    /// Build a single-column label table from raw values, cast to the label type
    pub fn from_label_values(schema: Arc<Schema>, values: &[f64]) -> Result<Self> {
        if schema.len() != 1 {
            return Err(FlowError::SchemaMismatch(format!(
                "label schema `{}` must have exactly one column, has {}",
                schema.name(),
                schema.len()
            )));
        }
        let spec = &schema.columns()[0];
        let series = Series::new(spec.name.as_str().into(), values.to_vec())
            .cast(&spec.dtype.dtype())?;
        let frame = DataFrame::new(vec![series.into()])?;
        Self::new(schema, frame)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Gather rows by index, in the given order
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Self::empty(self.schema.clone());
        }
        let n = self.height();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(FlowError::InvalidInput(format!(
                "row index {} out of bounds for table with {} rows",
                bad, n
            )));
        }
        let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
        let idx = IdxCa::from_vec("idx".into(), idx);
        let frame = self.frame.take(&idx)?;
        Ok(Self {
            schema: self.schema.clone(),
            frame,
        })
    }

    /// Select the columns of a sub-schema, in the sub-schema's order
    pub fn project(&self, schema: Arc<Schema>) -> Result<Self> {
        for spec in schema.columns() {
            if !self.schema.columns().contains(spec) {
                return Err(FlowError::SchemaMismatch(format!(
                    "column `{}` ({}) is not part of schema `{}`",
                    spec.name,
                    spec.dtype,
                    self.schema.name()
                )));
            }
        }
        let frame = self.frame.select(schema.column_names())?;
        Self::new(schema, frame)
    }

    /// Row-major `f64` matrix of every column, for the booster
    pub fn to_feature_matrix(&self) -> Result<Array2<f64>> {
        let n_rows = self.height();
        let n_cols = self.width();

        let col_data: Vec<Vec<f64>> = self
            .frame
            .get_columns()
            .iter()
            .map(column_as_f64)
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
    }

    /// Values of a single-column label table as `f64`
    pub fn label_values(&self) -> Result<Vec<f64>> {
        if self.width() != 1 {
            return Err(FlowError::SchemaMismatch(format!(
                "label table must have exactly one column, has {}",
                self.width()
            )));
        }
        column_as_f64(&self.frame.get_columns()[0])
    }

    /// SHA-256 over the schema layout and every cell, in row order
    pub fn content_hash(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.schema.fingerprint().as_bytes());
        hasher.update((self.height() as u64).to_le_bytes());

        for (spec, column) in self.schema.columns().iter().zip(self.frame.get_columns()) {
            let series = column.as_materialized_series();
            match spec.dtype {
                ColumnType::Integer => {
                    for v in series.i64()?.into_iter() {
                        match v {
                            Some(v) => hasher.update(v.to_le_bytes()),
                            None => hasher.update(b"\0null"),
                        }
                    }
                }
                ColumnType::Float => {
                    for v in series.f64()?.into_iter() {
                        match v {
                            Some(v) => hasher.update(v.to_bits().to_le_bytes()),
                            None => hasher.update(b"\0null"),
                        }
                    }
                }
            }
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

fn column_as_f64(column: &Column) -> Result<Vec<f64>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                FlowError::SchemaMismatch(format!(
                    "column `{}` has a missing value at row {}",
                    column.name(),
                    row
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{ColumnSpec, DatasetSchemas};
    use polars::df;

    fn small_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "small",
                vec![
                    ColumnSpec::integer("a"),
                    ColumnSpec::float("b"),
                    ColumnSpec::integer("y"),
                ],
            )
            .unwrap(),
        )
    }

    fn small_table() -> Table {
        let df = df!(
            "a" => &[1i64, 2, 3, 4],
            "b" => &[0.1f64, 0.2, 0.3, 0.4],
            "y" => &[0i64, 1, 0, 1]
        )
        .unwrap();
        Table::new(small_schema(), df).unwrap()
    }

    #[test]
    fn test_new_rejects_non_conforming() {
        let df = df!("a" => &[1i64], "b" => &[0.1f64]).unwrap();
        assert!(Table::new(small_schema(), df).is_err());
    }

    #[test]
    fn test_empty_keeps_schema() {
        let schemas = DatasetSchemas::pima();
        let t = Table::empty(schemas.features.clone()).unwrap();
        assert_eq!(t.height(), 0);
        assert_eq!(t.width(), 8);
        assert!(schemas.features.validate(t.frame()).is_ok());
    }

    #[test]
    fn test_take_and_project() {
        let t = small_table();
        let taken = t.take(&[3, 1]).unwrap();
        assert_eq!(taken.height(), 2);
        assert!(taken.label_values().is_err());

        let label_schema = Arc::new(Schema::new("labels", vec![ColumnSpec::integer("y")]).unwrap());
        let y = taken.project(label_schema).unwrap();
        assert_eq!(y.label_values().unwrap(), vec![1.0, 1.0]);

        assert!(t.take(&[10]).is_err());
        assert_eq!(t.take(&[]).unwrap().width(), 3);
    }

    #[test]
    fn test_project_unknown_column() {
        let t = small_table();
        let other = Arc::new(Schema::new("other", vec![ColumnSpec::float("a")]).unwrap());
        assert!(matches!(t.project(other), Err(FlowError::SchemaMismatch(_))));
    }

    #[test]
    fn test_feature_matrix_row_major() {
        let t = small_table();
        let x = t.to_feature_matrix().unwrap();
        assert_eq!(x.dim(), (4, 3));
        assert_eq!(x[[2, 0]], 3.0);
        assert_eq!(x[[2, 1]], 0.3);
    }

    #[test]
    fn test_from_label_values_casts() {
        let schema = Arc::new(Schema::new("labels", vec![ColumnSpec::integer("class")]).unwrap());
        let t = Table::from_label_values(schema, &[1.0, 0.0, 1.0]).unwrap();
        assert_eq!(t.frame().get_columns()[0].dtype(), &DataType::Int64);
        assert_eq!(t.label_values().unwrap(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_content_hash_is_order_sensitive() {
        let t = small_table();
        let same = small_table();
        let reordered = t.take(&[1, 0, 2, 3]).unwrap();
        assert_eq!(t.content_hash().unwrap(), same.content_hash().unwrap());
        assert_ne!(t.content_hash().unwrap(), reordered.content_hash().unwrap());
    }
}
