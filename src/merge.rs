//! Sorted two-way merge/join.
//!
//! Both inputs must already be sorted ascending by their key column under the
//! configured [`FieldType`]. The engine walks them in lockstep one
//! duplicate-key run at a time, so memory use is bounded by the longest run
//! rather than by file size. Sort order is not verified; the first key that
//! goes backwards on a side is logged as a warning and the merge continues.

use std::{
    cmp::Ordering,
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{FieldType, NotANumber, TypedValue, parse_typed_value},
    dedup::{DeduplicateStrategy, Pairing, pair_runs},
    error::{Error, Result},
    io_utils,
    reader::CsvSource,
    row::{Header, Row},
    writer::{ColumnMapper, CsvSink, HeaderRemap},
};

const LEFT_SUFFIX: &str = "_left";
const RIGHT_SUFFIX: &str = "_right";

/// Which keys survive a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Keys present on both sides (inner join)
    #[default]
    And,
    /// Keys present on either side (full outer join)
    Or,
    /// Left keys absent from the right side (left anti join)
    AndNot,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 3] = [MergeStrategy::And, MergeStrategy::Or, MergeStrategy::AndNot];

    fn emits_matches(self) -> bool {
        matches!(self, MergeStrategy::And | MergeStrategy::Or)
    }

    fn emits_left_only(self) -> bool {
        matches!(self, MergeStrategy::Or | MergeStrategy::AndNot)
    }

    fn emits_right_only(self) -> bool {
        self == MergeStrategy::Or
    }

    /// An inner merge only writes rows with both sides present, so padded
    /// positional pairing is cut to the shorter run.
    fn pairing(self, dedup: DeduplicateStrategy) -> Pairing {
        match (self, dedup.pairing()) {
            (MergeStrategy::And, Pairing::Positional) => Pairing::Zipped,
            (_, pairing) => pairing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

/// Everything a merge needs besides the two input paths.
#[derive(Clone)]
pub struct MergeConfig {
    pub left_key: String,
    pub right_key: String,
    pub is_number_key: bool,
    pub merge_strategy: MergeStrategy,
    pub deduplicate_strategy: DeduplicateStrategy,
    pub output: PathBuf,
    pub output_header_callback: Option<ColumnMapper>,
    pub delimiter: Option<u8>,
    pub output_delimiter: Option<u8>,
    pub encoding: Option<String>,
}

impl MergeConfig {
    pub fn new(
        left_key: impl Into<String>,
        right_key: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        MergeConfig {
            left_key: left_key.into(),
            right_key: right_key.into(),
            is_number_key: false,
            merge_strategy: MergeStrategy::default(),
            deduplicate_strategy: DeduplicateStrategy::default(),
            output: output.into(),
            output_header_callback: None,
            delimiter: None,
            output_delimiter: None,
            encoding: None,
        }
    }

    pub fn number_key(mut self, is_number_key: bool) -> Self {
        self.is_number_key = is_number_key;
        self
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    pub fn deduplicate(mut self, strategy: DeduplicateStrategy) -> Self {
        self.deduplicate_strategy = strategy;
        self
    }

    pub fn header_callback(mut self, mapper: ColumnMapper) -> Self {
        self.output_header_callback = Some(mapper);
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

    fn field_type(&self) -> FieldType {
        FieldType::from_number_flag(self.is_number_key)
    }
}

impl fmt::Debug for MergeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeConfig")
            .field("left_key", &self.left_key)
            .field("right_key", &self.right_key)
            .field("is_number_key", &self.is_number_key)
            .field("merge_strategy", &self.merge_strategy)
            .field("deduplicate_strategy", &self.deduplicate_strategy)
            .field("output", &self.output)
            .field(
                "output_header_callback",
                &self.output_header_callback.as_ref().map(|_| "<fn>"),
            )
            .field("delimiter", &self.delimiter)
            .field("output_delimiter", &self.output_delimiter)
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub left_rows: u64,
    pub right_rows: u64,
    pub matched_keys: u64,
    pub left_only_keys: u64,
    pub right_only_keys: u64,
    pub rows_written: u64,
}

/// Merges two key-sorted files into `config.output`.
///
/// The output header is the left header followed by the right header; a name
/// present on both sides gets a `_left` / `_right` suffix. The optional
/// header callback then renames or drops output columns. Nothing is written
/// to `config.output` unless the whole merge succeeds.
pub fn merge(left_path: &Path, right_path: &Path, config: &MergeConfig) -> Result<MergeSummary> {
    if config.left_key.trim().is_empty() || config.right_key.trim().is_empty() {
        return Err(Error::config("Merge requires both a left key and a right key"));
    }
    let encoding = io_utils::resolve_encoding(config.encoding.as_deref())?;
    let left_delimiter = io_utils::resolve_input_delimiter(left_path, config.delimiter);
    let right_delimiter = io_utils::resolve_input_delimiter(right_path, config.delimiter);
    let output_delimiter =
        io_utils::resolve_output_delimiter(&config.output, config.output_delimiter, left_delimiter);
    let field_type = config.field_type();

    info!(
        "Merging {:?} and {:?} -> {:?} ({:?}, {:?}, {} keys)",
        left_path,
        right_path,
        config.output,
        config.merge_strategy,
        config.deduplicate_strategy,
        if config.is_number_key { "numeric" } else { "string" }
    );

    let left_source = CsvSource::open(left_path, left_delimiter, encoding)?;
    let right_source = CsvSource::open(right_path, right_delimiter, encoding)?;
    let left_key_index = left_source.header().require(&config.left_key, "left")?;
    let right_key_index = right_source.header().require(&config.right_key, "right")?;
    debug!(
        "Key '{}' at left index {}, key '{}' at right index {}",
        config.left_key, left_key_index, config.right_key, right_key_index
    );

    let joined = output_header(left_source.header(), right_source.header())?;
    let remap = HeaderRemap::build(&joined, config.output_header_callback.as_ref())?;
    debug!("Output columns: {:?}", remap.header().names());

    let mut engine = MergeEngine {
        left: RunCursor::new(left_source, Side::Left, left_key_index, &config.left_key, field_type),
        right: RunCursor::new(
            right_source,
            Side::Right,
            right_key_index,
            &config.right_key,
            field_type,
        ),
        sink: CsvSink::create(&config.output, output_delimiter, remap)?,
        strategy: config.merge_strategy,
        dedup: config.deduplicate_strategy,
        summary: MergeSummary::default(),
    };
    engine.run()?;

    let MergeEngine {
        left,
        right,
        sink,
        mut summary,
        ..
    } = engine;
    summary.left_rows = left.rows_read;
    summary.right_rows = right.rows_read;
    summary.rows_written = sink.commit()?;
    info!(
        "Merge complete: {} output row(s), {} matched key(s), {} left-only, {} right-only",
        summary.rows_written, summary.matched_keys, summary.left_only_keys, summary.right_only_keys
    );
    Ok(summary)
}

fn output_header(left: &Header, right: &Header) -> Result<Header> {
    let tagged = |name: &String, other: &Header, suffix: &str| {
        if other.contains(name) {
            (format!("{name}{suffix}"), true)
        } else {
            (name.clone(), false)
        }
    };
    let candidates: Vec<(String, bool)> = left
        .names()
        .iter()
        .map(|name| tagged(name, right, LEFT_SUFFIX))
        .chain(right.names().iter().map(|name| tagged(name, left, RIGHT_SUFFIX)))
        .collect();

    // Untagged names are unique across both sides; tagged names yield to them.
    let mut taken: HashSet<String> = candidates
        .iter()
        .filter(|(_, suffixed)| !suffixed)
        .map(|(name, _)| name.clone())
        .collect();
    let mut names = Vec::with_capacity(candidates.len());
    for (name, suffixed) in candidates {
        if !suffixed {
            names.push(name);
            continue;
        }
        let mut unique = name.clone();
        let mut counter = 2;
        while taken.contains(&unique) {
            unique = format!("{name}_{counter}");
            counter += 1;
        }
        if unique != name {
            debug!("Output column '{name}' already exists; using '{unique}'");
        }
        taken.insert(unique.clone());
        names.push(unique);
    }
    Header::new(names)
}

struct KeyRun {
    key: TypedValue,
    rows: Vec<Row>,
}

/// Reads one side as a sequence of duplicate-key runs, holding at most one
/// run plus one look-ahead row.
struct RunCursor {
    source: CsvSource,
    side: Side,
    key_index: usize,
    key_column: String,
    field_type: FieldType,
    width: usize,
    pending: Option<(TypedValue, Row)>,
    previous: Option<TypedValue>,
    warned_unsorted: bool,
    rows_read: u64,
}

impl RunCursor {
    fn new(
        source: CsvSource,
        side: Side,
        key_index: usize,
        key_column: &str,
        field_type: FieldType,
    ) -> Self {
        let width = source.header().len();
        RunCursor {
            source,
            side,
            key_index,
            key_column: key_column.to_string(),
            field_type,
            width,
            pending: None,
            previous: None,
            warned_unsorted: false,
            rows_read: 0,
        }
    }

    fn next_run(&mut self) -> Result<Option<KeyRun>> {
        let (key, first) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.read_keyed()? {
                Some(next) => next,
                None => return Ok(None),
            },
        };
        let mut rows = vec![first];
        while let Some((next_key, row)) = self.read_keyed()? {
            if next_key == key {
                rows.push(row);
            } else {
                self.pending = Some((next_key, row));
                break;
            }
        }
        Ok(Some(KeyRun { key, rows }))
    }

    fn read_keyed(&mut self) -> Result<Option<(TypedValue, Row)>> {
        let Some(row) = self.source.next_row()? else {
            return Ok(None);
        };
        self.rows_read += 1;
        let raw = row.get(self.key_index).unwrap_or_default();
        let key = parse_typed_value(raw, self.field_type).map_err(|NotANumber(value)| {
            Error::Parse {
                path: self.source.path().to_path_buf(),
                line: row.line,
                column: self.key_column.clone(),
                value,
            }
        })?;
        self.note_order(&key, row.line);
        Ok(Some((key, row)))
    }

    fn note_order(&mut self, key: &TypedValue, line: u64) {
        if let Some(previous) = &self.previous {
            if key < previous && !self.warned_unsorted {
                warn!(
                    "{} input {:?} is not sorted by '{}' (line {}: '{}' after '{}'); merge results are undefined",
                    self.side,
                    self.source.path(),
                    self.key_column,
                    line,
                    key,
                    previous
                );
                self.warned_unsorted = true;
            }
        }
        self.previous = Some(key.clone());
    }
}

struct MergeEngine {
    left: RunCursor,
    right: RunCursor,
    sink: CsvSink,
    strategy: MergeStrategy,
    dedup: DeduplicateStrategy,
    summary: MergeSummary,
}

impl MergeEngine {
    fn run(&mut self) -> Result<()> {
        let mut left = self.left.next_run()?;
        let mut right = self.right.next_run()?;
        loop {
            match (left.take(), right.take()) {
                (Some(l), Some(r)) => match l.key.cmp(&r.key) {
                    Ordering::Less => {
                        self.unmatched(Side::Left, l)?;
                        left = self.left.next_run()?;
                        right = Some(r);
                    }
                    Ordering::Greater => {
                        self.unmatched(Side::Right, r)?;
                        right = self.right.next_run()?;
                        left = Some(l);
                    }
                    Ordering::Equal => {
                        self.matched(l, r)?;
                        left = self.left.next_run()?;
                        right = self.right.next_run()?;
                    }
                },
                (Some(l), None) => {
                    if !self.strategy.emits_left_only() {
                        break;
                    }
                    self.unmatched(Side::Left, l)?;
                    left = self.left.next_run()?;
                }
                (None, Some(r)) => {
                    if !self.strategy.emits_right_only() {
                        break;
                    }
                    self.unmatched(Side::Right, r)?;
                    right = self.right.next_run()?;
                }
                (None, None) => break,
            }
        }
        Ok(())
    }

    fn matched(&mut self, left: KeyRun, right: KeyRun) -> Result<()> {
        self.summary.matched_keys += 1;
        if !self.strategy.emits_matches() {
            return Ok(());
        }
        let left_rows = self.dedup.resolve(left.rows, self.left.key_index);
        let right_rows = self.dedup.resolve(right.rows, self.right.key_index);
        let pairing = self.strategy.pairing(self.dedup);
        for (l, r) in pair_runs(pairing, &left_rows, &right_rows) {
            let row = self.join(l, r);
            self.sink.write_row(&row)?;
        }
        Ok(())
    }

    fn unmatched(&mut self, side: Side, run: KeyRun) -> Result<()> {
        let emit = match side {
            Side::Left => {
                self.summary.left_only_keys += 1;
                self.strategy.emits_left_only()
            }
            Side::Right => {
                self.summary.right_only_keys += 1;
                self.strategy.emits_right_only()
            }
        };
        if !emit {
            return Ok(());
        }
        let key_index = match side {
            Side::Left => self.left.key_index,
            Side::Right => self.right.key_index,
        };
        for row in self.dedup.resolve(run.rows, key_index) {
            let joined = match side {
                Side::Left => self.join(Some(&row), None),
                Side::Right => self.join(None, Some(&row)),
            };
            self.sink.write_row(&joined)?;
        }
        Ok(())
    }

    /// Left fields then right fields; an absent side contributes blanks.
    fn join(&self, left: Option<&Row>, right: Option<&Row>) -> Row {
        let mut fields = Vec::with_capacity(self.left.width + self.right.width);
        match left {
            Some(row) => fields.extend(row.fields.iter().cloned()),
            None => fields.extend(std::iter::repeat_n(String::new(), self.left.width)),
        }
        match right {
            Some(row) => fields.extend(row.fields.iter().cloned()),
            None => fields.extend(std::iter::repeat_n(String::new(), self.right.width)),
        }
        let line = left.or(right).map(|row| row.line).unwrap_or_default();
        Row::new(fields, line)
    }
}
