use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{dedup::DeduplicateStrategy, merge::MergeStrategy};

#[derive(Debug, Parser)]
#[command(author, version, about = "Merge and transform key-sorted CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge two CSV files that are sorted by their key columns
    Merge(MergeArgs),
    /// Filter, number and rename the rows of a CSV file
    Transform(TransformArgs),
    /// Execute a merge or transform described by a YAML job file
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Left CSV input, sorted by --left-key
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right CSV input, sorted by --right-key
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Destination file (.tsv writes tab-separated output)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Key column in the left file
    #[arg(long = "left-key")]
    pub left_key: String,
    /// Key column in the right file
    #[arg(long = "right-key")]
    pub right_key: String,
    /// Compare keys as numbers instead of text
    #[arg(long = "number-key")]
    pub number_key: bool,
    /// Which keys survive the merge
    #[arg(long = "strategy", value_enum, default_value = "and")]
    pub strategy: MergeStrategy,
    /// How rows sharing a key on one side are resolved
    #[arg(long = "dedup", value_enum, default_value = "reduce")]
    pub dedup: DeduplicateStrategy,
    #[command(flatten)]
    pub columns: ColumnArgs,
    /// CSV delimiter character for inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults by extension, then input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Input CSV file to transform
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination file (.tsv writes tab-separated output)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Text filter such as `status = shipped` (repeatable, all must hold)
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Numeric filter such as `amount>=100` (repeatable, all must hold)
    #[arg(long = "numeric-filter", action = clap::ArgAction::Append)]
    pub numeric_filters: Vec<String>,
    /// Append a 1-based line number to every written row
    #[arg(long = "line-numbers")]
    pub line_numbers: bool,
    /// Name of the appended line-number column
    #[arg(long = "line-number-column", requires = "line_numbers")]
    pub line_number_column: Option<String>,
    #[command(flatten)]
    pub columns: ColumnArgs,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults by extension, then input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnArgs {
    /// Rename an output column using `old=new` (repeatable)
    #[arg(long = "rename", action = clap::ArgAction::Append)]
    pub renames: Vec<String>,
    /// Drop this comma-separated list of output columns
    #[arg(long = "drop", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub drops: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// YAML job file
    #[arg(short = 'j', long = "job")]
    pub job: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
