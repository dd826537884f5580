//! Reading and writing tables
//!
//! CSV input is read with the schema's dtypes forced, so a value that does not
//! parse, or a short row, surfaces as a schema mismatch instead of a silently
//! widened column.

use crate::data::schema::Schema;
use crate::data::table::Table;
use crate::error::{FlowError, Result};
use polars::prelude::{
    BooleanChunked, CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame,
    ParquetReader, ParquetWriter, SerReader, SerWriter,
};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Schema-driven table loader
#[derive(Debug, Clone)]
pub struct TableLoader {
    has_header: bool,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader {
    /// Loader for headerless, comma-separated files (the raw dataset format)
    pub fn new() -> Self {
        Self { has_header: false }
    }

    /// Loader for files written by [`TableWriter::save_csv`]
    pub fn headered() -> Self {
        Self::new().with_header(true)
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Load a CSV file and check every row against the schema
    pub fn load_csv(&self, path: &Path, schema: &Arc<Schema>) -> Result<Table> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            FlowError::DataFetch(format!("cannot open {}: {}", path.display(), e))
        })?;
        if metadata.len() == 0 {
            return Table::empty(schema.clone());
        }

        let parse_opts = CsvParseOptions::default()
            .with_separator(b',')
            .with_missing_is_null(true);

        let frame = CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_schema(Some(Arc::new(schema.to_polars())))
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| {
                FlowError::SchemaMismatch(format!(
                    "{} does not match schema `{}`: {}",
                    path.display(),
                    schema.name(),
                    e
                ))
            })?;

        let frame = drop_blank_rows(frame)?;
        check_complete_rows(&frame, schema)?;
        debug!(path = %path.display(), rows = frame.height(), schema = schema.name(), "Loaded CSV");

        Table::new(schema.clone(), frame)
    }

    /// Load a Parquet file written by [`TableWriter::save_parquet`]
    pub fn load_parquet(&self, path: &Path, schema: &Arc<Schema>) -> Result<Table> {
        let file = File::open(path).map_err(|e| {
            FlowError::DataFetch(format!("cannot open {}: {}", path.display(), e))
        })?;
        let frame = ParquetReader::new(file).finish()?;
        Table::new(schema.clone(), frame)
    }
}

/// Remove rows where every field is null, which is how blank lines parse
fn drop_blank_rows(frame: DataFrame) -> Result<DataFrame> {
    let mut keep: Option<BooleanChunked> = None;
    for column in frame.get_columns() {
        let present = column.as_materialized_series().is_not_null();
        keep = Some(match keep {
            Some(mask) => &mask | &present,
            None => present,
        });
    }
    match keep {
        Some(mask) if !mask.all() => {
            let kept = frame.filter(&mask)?;
            debug!(rows = frame.height() - kept.height(), "Skipping blank lines");
            Ok(kept)
        }
        _ => Ok(frame),
    }
}

/// Fail on the first row with a missing field
fn check_complete_rows(frame: &DataFrame, schema: &Schema) -> Result<()> {
    for column in frame.get_columns() {
        if column.null_count() == 0 {
            continue;
        }
        let row = column
            .as_materialized_series()
            .is_null()
            .into_iter()
            .position(|v| v == Some(true))
            .unwrap_or(0);
        return Err(FlowError::SchemaMismatch(format!(
            "row {} has fewer than {} parseable fields (column `{}` is missing)",
            row + 1,
            schema.len(),
            column.name()
        )));
    }
    Ok(())
}

/// Persist tables
pub struct TableWriter;

impl TableWriter {
    /// Save as CSV with a header row
    pub fn save_csv(table: &Table, path: &Path) -> Result<()> {
        let mut frame = table.frame().clone();
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    }

    pub fn save_parquet(table: &Table, path: &Path) -> Result<()> {
        let mut frame = table.frame().clone();
        let file = File::create(path)?;
        ParquetWriter::new(file).finish(&mut frame)?;
        Ok(())
    }
}
