//! Streaming delimited writer with header remapping and atomic commit.
//!
//! Rows are written to a temporary file next to the destination. Only
//! [`CsvSink::commit()`] moves it into place; dropping an uncommitted sink
//! deletes the temporary file, so an aborted operation never leaves a
//! destination that looks complete.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use tempfile::NamedTempFile;

use crate::{
    error::{Error, Result},
    io_utils,
    row::{Header, Row},
};

/// Rename-or-drop decision for one output column: `None` drops the column,
/// `Some(name)` keeps it under `name`.
pub type ColumnMapper = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Wraps a closure as a [`ColumnMapper`].
pub fn column_mapper<F>(f: F) -> ColumnMapper
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The per-column outcome of applying a [`ColumnMapper`] to a header.
///
/// The mapper runs once per column when the remap is built; every row is
/// then projected with the same decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRemap {
    kept: Vec<usize>,
    header: Header,
}

impl HeaderRemap {
    pub fn identity(header: &Header) -> Self {
        HeaderRemap {
            kept: (0..header.len()).collect(),
            header: header.clone(),
        }
    }

    pub fn build(source: &Header, mapper: Option<&ColumnMapper>) -> Result<Self> {
        let Some(mapper) = mapper else {
            return Ok(Self::identity(source));
        };
        let mut kept = Vec::with_capacity(source.len());
        let mut names = Vec::with_capacity(source.len());
        for (idx, name) in source.names().iter().enumerate() {
            match mapper(name) {
                Some(renamed) => {
                    if renamed != *name {
                        debug!("Renaming column '{name}' to '{renamed}'");
                    }
                    kept.push(idx);
                    names.push(renamed);
                }
                None => debug!("Dropping column '{name}'"),
            }
        }
        if names.is_empty() {
            return Err(Error::config("Column mapping removed every output column"));
        }
        let header = Header::new(names).map_err(|err| {
            Error::config(format!("Column mapping produced an invalid header: {err}"))
        })?;
        Ok(HeaderRemap { kept, header })
    }

    /// The header as it will be written.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Projects `row` onto the kept columns, in output order.
    pub fn project<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a str> + 'a {
        self.kept
            .iter()
            .map(move |idx| row.get(*idx).unwrap_or_default())
    }
}

/// A delimited output file being written.
pub struct CsvSink {
    destination: PathBuf,
    writer: csv::Writer<NamedTempFile>,
    remap: HeaderRemap,
    rows_written: u64,
}

impl CsvSink {
    /// Creates the staging file and writes the remapped header line.
    pub fn create(destination: &Path, delimiter: u8, remap: HeaderRemap) -> Result<Self> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".csv-merge-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|err| Error::io(destination, err))?;
        debug!(
            "Staging output for {:?} in {:?}",
            destination,
            staging.path()
        );
        let mut writer = io_utils::open_csv_writer(staging, delimiter);
        writer
            .write_record(remap.header().names())
            .map_err(|err| Error::csv(destination, err))?;
        Ok(CsvSink {
            destination: destination.to_path_buf(),
            writer,
            remap,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.writer
            .write_record(self.remap.project(row))
            .map_err(|err| Error::csv(&self.destination, err))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flushes the staged output and moves it over the destination.
    /// Returns the number of data rows written.
    pub fn commit(self) -> Result<u64> {
        let CsvSink {
            destination,
            writer,
            rows_written,
            ..
        } = self;
        let staging = writer
            .into_inner()
            .map_err(|err| Error::io(&destination, err.into_error()))?;
        staging
            .as_file()
            .sync_all()
            .map_err(|err| Error::io(&destination, err))?;
        staging
            .persist(&destination)
            .map_err(|err| Error::io(&destination, err.error))?;
        debug!("Committed {rows_written} row(s) to {destination:?}");
        Ok(rows_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn header(names: &[&str]) -> Header {
        Header::new(names.iter().map(|s| s.to_string()).collect()).expect("header")
    }

    #[test]
    fn remap_applies_same_decision_to_header_and_rows() {
        let source = header(&["key", "secret", "value"]);
        let mapper = column_mapper(|name| match name {
            "secret" => None,
            "value" => Some("amount".to_string()),
            other => Some(other.to_string()),
        });
        let remap = HeaderRemap::build(&source, Some(&mapper)).expect("remap");
        assert_eq!(remap.header().names(), ["key", "amount"]);

        let row = Row::new(vec!["1".into(), "x".into(), "9".into()], 2);
        assert_eq!(remap.project(&row).collect::<Vec<_>>(), ["1", "9"]);
    }

    #[test]
    fn remap_rejects_duplicate_or_empty_output() {
        let source = header(&["a", "b"]);
        let merge_names = column_mapper(|_| Some("same".to_string()));
        let err = HeaderRemap::build(&source, Some(&merge_names)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let drop_all = column_mapper(|_| None);
        let err = HeaderRemap::build(&source, Some(&drop_all)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn mapper_is_called_once_per_column() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mapper = column_mapper(move |name| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(name.to_uppercase())
        });
        let remap = HeaderRemap::build(&header(&["a", "b", "c"]), Some(&mapper)).expect("remap");
        for line in 2..10 {
            let row = Row::new(vec!["1".into(), "2".into(), "3".into()], line);
            assert_eq!(remap.project(&row).count(), 3);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn commit_writes_destination() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.tsv");
        let source = header(&["id", "note"]);
        let mut sink = CsvSink::create(&out, b'\t', HeaderRemap::identity(&source)).expect("sink");
        sink.write_row(&Row::new(vec!["1".into(), "tab\there".into()], 2))
            .expect("write");
        assert_eq!(sink.commit().expect("commit"), 1);

        let contents = fs::read_to_string(&out).expect("read output");
        assert_eq!(contents, "id\tnote\n1\t\"tab\there\"\n");
    }

    #[test]
    fn dropped_sink_leaves_no_destination() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("out.csv");
        {
            let mut sink =
                CsvSink::create(&out, b',', HeaderRemap::identity(&header(&["id"]))).expect("sink");
            sink.write_row(&Row::new(vec!["1".into()], 2)).expect("write");
        }
        assert!(!out.exists());
        assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);
    }
}
