pub mod cli;
pub mod columns;
pub mod data;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod io_utils;
pub mod job;
pub mod merge;
pub mod reader;
pub mod row;
pub mod transform;
pub mod writer;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    columns::ColumnRules,
    data::FieldType,
    filter::Filter,
    merge::MergeConfig,
    transform::Transform,
};

pub use crate::{
    data::Comparison,
    dedup::DeduplicateStrategy,
    error::{Error, ErrorKind},
    merge::{MergeStrategy, MergeSummary, merge},
    transform::TransformSummary,
    writer::{ColumnMapper, column_mapper},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Merge(args) => handle_merge(args),
        Commands::Transform(args) => handle_transform(args),
        Commands::Run(args) => handle_run(&args),
    }
}

fn handle_merge(args: cli::MergeArgs) -> Result<()> {
    let columns = ColumnRules::parse(&args.columns.renames, &args.columns.drops)?;
    let mut config = MergeConfig::new(args.left_key, args.right_key, args.output)
        .number_key(args.number_key)
        .strategy(args.strategy)
        .deduplicate(args.dedup);
    config.output_header_callback = columns.into_mapper();
    config.delimiter = args.delimiter;
    config.output_delimiter = args.output_delimiter;
    config.encoding = args.input_encoding;
    debug!("Merge configuration: {config:?}");

    let summary = merge(&args.left, &args.right, &config)
        .with_context(|| format!("Merging {:?} with {:?}", args.left, args.right))?;
    info!(
        "Wrote {} row(s) to {:?} ({} left row(s), {} right row(s) read)",
        summary.rows_written, config.output, summary.left_rows, summary.right_rows
    );
    Ok(())
}

fn handle_transform(args: cli::TransformArgs) -> Result<()> {
    let mut filters = args
        .filters
        .iter()
        .map(|expr| Filter::parse(expr, FieldType::String))
        .collect::<Result<Vec<_>, _>>()?;
    for expr in &args.numeric_filters {
        filters.push(Filter::parse(expr, FieldType::Number)?);
    }
    let columns = ColumnRules::parse(&args.columns.renames, &args.columns.drops)?;

    let mut transform = Transform::new(&args.input).filters(filters);
    if args.line_numbers {
        transform = match args.line_number_column {
            Some(name) => transform.line_numbers_as(name),
            None => transform.line_numbers(),
        };
    }
    if let Some(mapper) = columns.into_mapper() {
        transform = transform.columns(mapper);
    }
    if let Some(delimiter) = args.delimiter {
        transform = transform.delimiter(delimiter);
    }
    if let Some(delimiter) = args.output_delimiter {
        transform = transform.output_delimiter(delimiter);
    }
    if let Some(label) = args.input_encoding {
        transform = transform.encoding(label);
    }
    debug!("Transform configuration: {transform:?}");

    transform
        .save_csv(&args.output)
        .with_context(|| format!("Transforming {:?}", args.input))?;
    Ok(())
}

fn handle_run(args: &cli::RunArgs) -> Result<()> {
    info!("Running job {:?}", args.job);
    let job = job::load(&args.job)?;
    job.execute()
        .with_context(|| format!("Executing job {:?}", args.job))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
