//! YAML job files describing a single merge or transform.
//!
//! ```yaml
//! kind: merge
//! left: left.csv
//! right: right.csv
//! left-key: key
//! right-key: key
//! number-key: true
//! strategy: and
//! deduplicate: reduce
//! output: merged.tsv
//! columns:
//!   rename: { key_left: key }
//!   drop: [key_right]
//! ```
//!
//! Relative paths are resolved against the directory holding the job file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::parse_delimiter,
    columns::ColumnRules,
    dedup::DeduplicateStrategy,
    filter::Filter,
    merge::{self, MergeConfig, MergeStrategy},
    transform::{DEFAULT_LINE_NUMBER_COLUMN, Transform},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Job {
    Merge(MergeJob),
    Transform(TransformJob),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MergeJob {
    pub left: PathBuf,
    pub right: PathBuf,
    pub left_key: String,
    pub right_key: String,
    #[serde(default)]
    pub number_key: bool,
    #[serde(default)]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub deduplicate: DeduplicateStrategy,
    pub output: PathBuf,
    #[serde(default)]
    pub columns: ColumnRules,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub output_delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TransformJob {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default)]
    pub line_number_column: Option<String>,
    #[serde(default)]
    pub columns: ColumnRules,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub output_delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

pub fn load(path: &Path) -> Result<Job> {
    let raw = fs::read_to_string(path).with_context(|| format!("Reading job file {path:?}"))?;
    let mut job: Job =
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing job file {path:?}"))?;
    if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        job.resolve_paths(base);
    }
    Ok(job)
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

fn delimiter(value: Option<&str>) -> Result<Option<u8>> {
    value
        .map(|v| parse_delimiter(v).map_err(|err| anyhow!("Invalid delimiter '{v}': {err}")))
        .transpose()
}

impl Job {
    fn resolve_paths(&mut self, base: &Path) {
        match self {
            Job::Merge(job) => {
                rebase(base, &mut job.left);
                rebase(base, &mut job.right);
                rebase(base, &mut job.output);
            }
            Job::Transform(job) => {
                rebase(base, &mut job.input);
                rebase(base, &mut job.output);
            }
        }
    }

    pub fn execute(self) -> Result<()> {
        match self {
            Job::Merge(job) => job.execute(),
            Job::Transform(job) => job.execute(),
        }
    }
}

impl MergeJob {
    pub fn into_config(self) -> Result<(PathBuf, PathBuf, MergeConfig)> {
        let mut config = MergeConfig::new(self.left_key, self.right_key, self.output)
            .number_key(self.number_key)
            .strategy(self.strategy)
            .deduplicate(self.deduplicate);
        config.delimiter = delimiter(self.delimiter.as_deref())?;
        config.output_delimiter = delimiter(self.output_delimiter.as_deref())?;
        config.encoding = self.encoding;
        config.output_header_callback = self.columns.into_mapper();
        Ok((self.left, self.right, config))
    }

    pub fn execute(self) -> Result<()> {
        let (left, right, config) = self.into_config()?;
        let summary = merge::merge(&left, &right, &config)
            .with_context(|| format!("Merging {left:?} with {right:?}"))?;
        info!(
            "Job wrote {} row(s) to {:?}",
            summary.rows_written, config.output
        );
        Ok(())
    }
}

impl TransformJob {
    pub fn into_transform(self) -> Result<(Transform, PathBuf)> {
        let mut transform = Transform::new(self.input).filters(self.filters);
        if self.line_numbers {
            transform = transform.line_numbers_as(
                self.line_number_column
                    .unwrap_or_else(|| DEFAULT_LINE_NUMBER_COLUMN.to_string()),
            );
        } else if self.line_number_column.is_some() {
            return Err(anyhow!("line-number-column requires line-numbers: true"));
        }
        if let Some(mapper) = self.columns.into_mapper() {
            transform = transform.columns(mapper);
        }
        if let Some(d) = delimiter(self.delimiter.as_deref())? {
            transform = transform.delimiter(d);
        }
        if let Some(d) = delimiter(self.output_delimiter.as_deref())? {
            transform = transform.output_delimiter(d);
        }
        if let Some(label) = self.encoding {
            transform = transform.encoding(label);
        }
        Ok((transform, self.output))
    }

    pub fn execute(self) -> Result<()> {
        let (transform, output) = self.into_transform()?;
        let source = transform.source().to_path_buf();
        let summary = transform
            .save_csv(&output)
            .with_context(|| format!("Transforming {source:?}"))?;
        info!(
            "Job wrote {} row(s) to {:?}",
            summary.rows_written, output
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Comparison, FieldType};

    #[test]
    fn parses_merge_job_with_defaults() {
        let job: Job = serde_yaml::from_str(
            "kind: merge\nleft: l.csv\nright: r.csv\nleft-key: id\nright-key: id\noutput: out.tsv\n",
        )
        .expect("parse job");
        let Job::Merge(job) = job else {
            panic!("expected merge job");
        };
        assert_eq!(job.strategy, MergeStrategy::And);
        assert_eq!(job.deduplicate, DeduplicateStrategy::Reduce);
        assert!(!job.number_key);
        assert!(job.columns.is_empty());
    }

    #[test]
    fn parses_transform_job_filters() {
        let yaml = r#"
kind: transform
input: in.csv
output: out.csv
line-numbers: true
filters:
  - column: key
    value: "15"
    field-type: number
    comparison: le
  - column: name
    value: x
columns:
  rename:
    line_number: n
"#;
        let job: Job = serde_yaml::from_str(yaml).expect("parse job");
        let Job::Transform(job) = job else {
            panic!("expected transform job");
        };
        assert_eq!(
            job.filters,
            vec![
                Filter::new("key", "15", FieldType::Number, Comparison::Le),
                Filter::equals("name", "x"),
            ]
        );
        assert_eq!(job.columns.rename.get("line_number").map(String::as_str), Some("n"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result: std::result::Result<Job, _> = serde_yaml::from_str(
            "kind: transform\ninput: a.csv\noutput: b.csv\nline-numbrs: true\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn relative_paths_follow_job_file() {
        let mut job = Job::Transform(TransformJob {
            input: PathBuf::from("in.csv"),
            output: PathBuf::from("/abs/out.csv"),
            filters: Vec::new(),
            line_numbers: false,
            line_number_column: None,
            columns: ColumnRules::default(),
            delimiter: None,
            output_delimiter: None,
            encoding: None,
        });
        job.resolve_paths(Path::new("jobs"));
        let Job::Transform(job) = job else {
            unreachable!()
        };
        assert_eq!(job.input, Path::new("jobs").join("in.csv"));
        assert_eq!(job.output, PathBuf::from("/abs/out.csv"));
    }

    #[test]
    fn merge_job_translates_delimiters() {
        let job = MergeJob {
            left: "l.txt".into(),
            right: "r.txt".into(),
            left_key: "id".into(),
            right_key: "id".into(),
            number_key: true,
            strategy: MergeStrategy::Or,
            deduplicate: DeduplicateStrategy::Reduce,
            output: "out.txt".into(),
            columns: ColumnRules::default(),
            delimiter: Some("tab".into()),
            output_delimiter: Some("pipe".into()),
            encoding: None,
        };
        let (_, _, config) = job.into_config().expect("config");
        assert_eq!(config.delimiter, Some(b'\t'));
        assert_eq!(config.output_delimiter, Some(b'|'));
        assert!(config.is_number_key);
        assert!(config.output_header_callback.is_none());
    }
}
