//! I/O helpers for delimiter resolution, input decoding and CSV
//! reader/writer construction.
//!
//! - **Delimiter resolution**: extension-based detection (`.tsv` → tab,
//!   `.csv` → comma) with explicit overrides winning.
//! - **Encoding**: inputs are decoded through `encoding_rs`, defaulting to
//!   UTF-8. Output is always UTF-8.
//! - **Quoting**: output uses RFC-4180 quoting, only where a field needs it.

use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{Error, Result};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const BOM: char = '\u{feff}';

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| Error::config(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or(if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    })
}

pub fn resolve_output_delimiter(path: &Path, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else if has_extension(path, "csv") {
        DEFAULT_CSV_DELIMITER
    } else {
        fallback
    }
}

pub fn open_csv_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let mut builder = csv::ReaderBuilder::new();
    // Field counts are checked against the header by the caller so that a
    // short row is reported with its line number.
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(BufReader::new(file)))
}

pub fn open_csv_writer<W: Write>(inner: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(inner)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn decode_headers(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Option<Vec<String>> {
    let mut names = decode_record(record, encoding)?;
    if let Some(first) = names.first_mut() {
        if first.starts_with(BOM) {
            first.remove(0);
        }
    }
    Some(names)
}
