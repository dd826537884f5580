//! Typed tabular data
//!
//! - [`schema`] - column schemas and the per-dataset schema bundle
//! - [`table`] - dataframes validated against a schema
//! - [`loader`] - CSV and Parquet I/O

pub mod loader;
pub mod schema;
pub mod table;

pub use loader::{TableLoader, TableWriter};
pub use schema::{ColumnSpec, ColumnType, DatasetSchemas, Schema};
pub use table::Table;
