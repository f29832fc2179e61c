//! Forward-only streaming reader producing a [`Header`] and [`Row`]s.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use log::debug;

use crate::{
    error::{Error, Result},
    io_utils,
    row::{Header, Row},
};

/// An open delimited file positioned after its header.
///
/// The file handle is owned by the reader and released when it is dropped,
/// whether iteration finished, stopped early or hit an error.
pub struct CsvSource {
    path: PathBuf,
    reader: csv::Reader<BufReader<File>>,
    header: Header,
    encoding: &'static Encoding,
    record: csv::ByteRecord,
    finished: bool,
}

impl CsvSource {
    pub fn open(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(path, delimiter)?;
        let raw_headers = reader
            .byte_headers()
            .map_err(|err| Error::csv(path, err))?
            .clone();
        let names = io_utils::decode_headers(&raw_headers, encoding)
            .ok_or_else(|| invalid_encoding(path, 1, encoding))?;
        if names.is_empty() {
            return Err(Error::config(format!("Input {path:?} has no header row")));
        }
        let header = Header::new(names)?;
        debug!(
            "Opened {:?} with {} column(s) using delimiter '{}'",
            path,
            header.len(),
            crate::printable_delimiter(delimiter)
        );
        Ok(CsvSource {
            path: path.to_path_buf(),
            reader,
            header,
            encoding,
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next row, or `None` once the source is exhausted. After an
    /// error the source yields nothing further.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.finished {
            return Ok(None);
        }
        let outcome = self.read_one();
        if !matches!(outcome, Ok(Some(_))) {
            self.finished = true;
        }
        outcome
    }

    fn read_one(&mut self) -> Result<Option<Row>> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|err| Error::csv(&self.path, err))?;
        if !more {
            return Ok(None);
        }
        let line = self
            .record
            .position()
            .map(|pos| pos.line())
            .unwrap_or_default();
        if self.record.len() != self.header.len() {
            return Err(Error::MalformedRow {
                path: self.path.clone(),
                line,
                expected: self.header.len(),
                found: self.record.len(),
            });
        }
        let fields = io_utils::decode_record(&self.record, self.encoding)
            .ok_or_else(|| invalid_encoding(&self.path, line, self.encoding))?;
        Ok(Some(Row::new(fields, line)))
    }
}

impl Iterator for CsvSource {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

fn invalid_encoding(path: &Path, line: u64, encoding: &'static Encoding) -> Error {
    Error::Decode {
        path: path.to_path_buf(),
        line,
        encoding: encoding.name(),
    }
}
