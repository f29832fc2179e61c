//! Single-source row pipeline: filter, number, then rename/drop columns.
//!
//! A [`Transform`] only accumulates configuration; [`Transform::save_csv()`]
//! consumes it and performs all I/O in one streaming pass.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    error::Result,
    filter::{BoundFilter, Filter, evaluate_all},
    io_utils,
    reader::CsvSource,
    writer::{ColumnMapper, CsvSink, HeaderRemap},
};

pub const DEFAULT_LINE_NUMBER_COLUMN: &str = "line_number";

#[derive(Clone)]
pub struct Transform {
    source: PathBuf,
    columns: Option<ColumnMapper>,
    filters: Vec<Filter>,
    line_number_column: Option<String>,
    delimiter: Option<u8>,
    output_delimiter: Option<u8>,
    encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows_read: u64,
    pub rows_filtered: u64,
    pub rows_written: u64,
}

impl Transform {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Transform {
            source: source.into(),
            columns: None,
            filters: Vec::new(),
            line_number_column: None,
            delimiter: None,
            output_delimiter: None,
            encoding: None,
        }
    }

    /// Sets the rename/drop function applied to every output column,
    /// including the line-number column.
    pub fn columns(mut self, mapper: ColumnMapper) -> Self {
        self.columns = Some(mapper);
        self
    }

    /// Adds a filter. Rows must satisfy every filter to be written.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Appends a `line_number` column counting written rows from 1.
    pub fn line_numbers(self) -> Self {
        self.line_numbers_as(DEFAULT_LINE_NUMBER_COLUMN)
    }

    pub fn line_numbers_as(mut self, column: impl Into<String>) -> Self {
        self.line_number_column = Some(column.into());
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn output_delimiter(mut self, delimiter: u8) -> Self {
        self.output_delimiter = Some(delimiter);
        self
    }

    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Streams the source through the pipeline into `output`.
    ///
    /// The destination is replaced only when every row was read and written;
    /// on error it is left untouched.
    pub fn save_csv(self, output: impl AsRef<Path>) -> Result<TransformSummary> {
        let output = output.as_ref();
        let encoding = io_utils::resolve_encoding(self.encoding.as_deref())?;
        let delimiter = io_utils::resolve_input_delimiter(&self.source, self.delimiter);
        let output_delimiter =
            io_utils::resolve_output_delimiter(output, self.output_delimiter, delimiter);
        info!(
            "Transforming {:?} -> {:?} ({} filter(s), delimiter '{}', output '{}')",
            self.source,
            output,
            self.filters.len(),
            crate::printable_delimiter(delimiter),
            crate::printable_delimiter(output_delimiter)
        );

        let mut source = CsvSource::open(&self.source, delimiter, encoding)?;
        let filters = self
            .filters
            .iter()
            .map(|filter| filter.bind(source.header()))
            .collect::<Result<Vec<BoundFilter>>>()?;
        for filter in &self.filters {
            debug!(
                "Filter: {} {} '{}' ({:?})",
                filter.column, filter.comparison, filter.value, filter.field_type
            );
        }

        let mut header = source.header().clone();
        if let Some(column) = &self.line_number_column {
            header.push(column.as_str())?;
        }
        let remap = HeaderRemap::build(&header, self.columns.as_ref())?;
        let mut sink = CsvSink::create(output, output_delimiter, remap)?;

        let mut summary = TransformSummary::default();
        while let Some(mut row) = source.next_row()? {
            summary.rows_read += 1;
            if !evaluate_all(&filters, &row, source.path())? {
                summary.rows_filtered += 1;
                continue;
            }
            if self.line_number_column.is_some() {
                row.push((sink.rows_written() + 1).to_string());
            }
            sink.write_row(&row)?;
        }
        drop(source);

        summary.rows_written = sink.commit()?;
        info!(
            "Transform complete: {} of {} row(s) written, {} filtered out",
            summary.rows_written, summary.rows_read, summary.rows_filtered
        );
        Ok(summary)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("source", &self.source)
            .field("columns", &self.columns.as_ref().map(|_| "<fn>"))
            .field("filters", &self.filters)
            .field("line_number_column", &self.line_number_column)
            .field("delimiter", &self.delimiter)
            .field("output_delimiter", &self.output_delimiter)
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{Comparison, FieldType},
        error::ErrorKind,
        writer::column_mapper,
    };
    use std::fs;
    use tempfile::tempdir;

    fn source(dir: &Path) -> PathBuf {
        let path = dir.join("in.csv");
        fs::write(&path, "key,name,score\n1,a,10\n2,b,20\n3,c,30\n4,d,40\n").expect("write");
        path
    }

    #[test]
    fn numbers_only_surviving_rows() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.csv");
        let summary = Transform::new(source(dir.path()))
            .filter(Filter::new("key", "2", FieldType::Number, Comparison::Ne))
            .line_numbers()
            .save_csv(&out)
            .expect("transform");
        assert_eq!(summary.rows_filtered, 1);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "key,name,score,line_number\n1,a,10,1\n3,c,30,2\n4,d,40,3\n"
        );
    }

    #[test]
    fn line_number_column_can_be_renamed_or_dropped() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.csv");
        Transform::new(source(dir.path()))
            .line_numbers()
            .columns(column_mapper(|name| match name {
                "line_number" => Some("n".to_string()),
                "key" => Some(name.to_string()),
                _ => None,
            }))
            .save_csv(&out)
            .expect("transform");
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "key,n\n1,1\n2,2\n3,3\n4,4\n"
        );
    }

    #[test]
    fn line_number_collision_is_config_error() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.csv");
        let err = Transform::new(source(dir.path()))
            .line_numbers_as("score")
            .save_csv(&out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!out.exists());
    }

    #[test]
    fn unknown_filter_column_is_config_error() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.csv");
        let err = Transform::new(source(dir.path()))
            .filter(Filter::equals("missing", "x"))
            .save_csv(&out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!out.exists());
    }

    #[test]
    fn failed_transform_keeps_previous_destination() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("bad.csv");
        fs::write(&input, "key,v\n1,a\nx,b\n").expect("write");
        let out = dir.path().join("out.csv");
        fs::write(&out, "previous\n").expect("write previous");

        let err = Transform::new(&input)
            .filter(Filter::new("key", "5", FieldType::Number, Comparison::Lt))
            .save_csv(&out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(fs::read_to_string(&out).unwrap(), "previous\n");
    }
}
