//! Resolution of duplicate-key runs.
//!
//! A run is the maximal sequence of consecutive rows on one side sharing a
//! key. A [`DeduplicateStrategy`] first resolves each side's run on its own,
//! then decides how two resolved runs with the same key are paired into
//! output rows.

use clap::ValueEnum;
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeduplicateStrategy {
    /// Keep every row; matched runs are paired positionally
    KeepAll,
    /// Keep only the first row of each run
    KeepFirst,
    /// Drop rows identical to an earlier row of the run; pair positionally
    RemoveSimilar,
    /// Collapse each run into one row, later non-empty fields winning
    #[default]
    Reduce,
    /// Every left row of a run combined with every right row
    CrossJoin,
    /// Drop identical rows, then combine every left row with every right row
    CrossJoinAndRemoveSimilar,
}

/// How two resolved runs sharing a key become output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// i-th left row with i-th right row; the shorter side is padded.
    Positional,
    /// i-th left row with i-th right row, stopping at the shorter side.
    Zipped,
    /// Each left row with each right row, left-major.
    Cartesian,
}

impl DeduplicateStrategy {
    pub const ALL: [DeduplicateStrategy; 6] = [
        DeduplicateStrategy::KeepAll,
        DeduplicateStrategy::KeepFirst,
        DeduplicateStrategy::RemoveSimilar,
        DeduplicateStrategy::Reduce,
        DeduplicateStrategy::CrossJoin,
        DeduplicateStrategy::CrossJoinAndRemoveSimilar,
    ];

    /// Resolves one side's run. `key_index` is left untouched by `Reduce`.
    pub fn resolve(self, run: Vec<Row>, key_index: usize) -> Vec<Row> {
        match self {
            DeduplicateStrategy::KeepAll | DeduplicateStrategy::CrossJoin => run,
            DeduplicateStrategy::KeepFirst => run.into_iter().take(1).collect(),
            DeduplicateStrategy::RemoveSimilar
            | DeduplicateStrategy::CrossJoinAndRemoveSimilar => remove_similar(run),
            DeduplicateStrategy::Reduce => reduce(run, key_index).into_iter().collect(),
        }
    }

    pub fn pairing(self) -> Pairing {
        match self {
            DeduplicateStrategy::CrossJoin | DeduplicateStrategy::CrossJoinAndRemoveSimilar => {
                Pairing::Cartesian
            }
            _ => Pairing::Positional,
        }
    }
}

fn remove_similar(run: Vec<Row>) -> Vec<Row> {
    if run.len() < 2 {
        return run;
    }
    run.into_iter()
        .unique_by(|row| row.fields.clone())
        .collect()
}

fn reduce(run: Vec<Row>, key_index: usize) -> Option<Row> {
    let mut rows = run.into_iter();
    let mut reduced = rows.next()?;
    for row in rows {
        for (idx, field) in row.fields.into_iter().enumerate() {
            if idx == key_index || field.is_empty() {
                continue;
            }
            if let Some(slot) = reduced.fields.get_mut(idx) {
                *slot = field;
            }
        }
    }
    Some(reduced)
}

/// Pairs two resolved runs. `None` marks a side that contributes empty
/// fields for that output row.
pub fn pair_runs<'a>(
    pairing: Pairing,
    left: &'a [Row],
    right: &'a [Row],
) -> Vec<(Option<&'a Row>, Option<&'a Row>)> {
    match pairing {
        Pairing::Positional => left
            .iter()
            .zip_longest(right.iter())
            .map(|pair| match pair {
                EitherOrBoth::Both(l, r) => (Some(l), Some(r)),
                EitherOrBoth::Left(l) => (Some(l), None),
                EitherOrBoth::Right(r) => (None, Some(r)),
            })
            .collect(),
        Pairing::Zipped => left
            .iter()
            .zip(right.iter())
            .map(|(l, r)| (Some(l), Some(r)))
            .collect(),
        Pairing::Cartesian => left
            .iter()
            .cartesian_product(right.iter())
            .map(|(l, r)| (Some(l), Some(r)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> Vec<Row> {
        values
            .iter()
            .enumerate()
            .map(|(i, fields)| {
                Row::new(
                    fields.iter().map(|s| s.to_string()).collect(),
                    i as u64 + 2,
                )
            })
            .collect()
    }

    fn fields(rows: &[Row]) -> Vec<Vec<String>> {
        rows.iter().map(|r| r.fields.clone()).collect()
    }

    #[test]
    fn reduce_overlays_non_empty_fields() {
        let run = rows(&[&["3", "", "4"], &["3", "6", ""], &["3", "", "5"]]);
        let resolved = DeduplicateStrategy::Reduce.resolve(run, 0);
        assert_eq!(fields(&resolved), vec![vec!["3", "6", "5"]]);
    }

    #[test]
    fn reduce_keeps_first_key_text() {
        let run = rows(&[&["1", "a"], &["1.0", "b"]]);
        let resolved = DeduplicateStrategy::Reduce.resolve(run, 0);
        assert_eq!(fields(&resolved), vec![vec!["1", "b"]]);
    }

    #[test]
    fn remove_similar_ignores_line_numbers() {
        let run = rows(&[&["1", "a"], &["1", "b"], &["1", "a"]]);
        let resolved = DeduplicateStrategy::RemoveSimilar.resolve(run, 0);
        assert_eq!(fields(&resolved), vec![vec!["1", "a"], vec!["1", "b"]]);
        assert_eq!(resolved[1].line, 3);
    }

    #[test]
    fn keep_first_and_keep_all() {
        let run = rows(&[&["1", "a"], &["1", "b"]]);
        assert_eq!(DeduplicateStrategy::KeepFirst.resolve(run.clone(), 0).len(), 1);
        assert_eq!(DeduplicateStrategy::KeepAll.resolve(run.clone(), 0).len(), 2);
        assert_eq!(DeduplicateStrategy::CrossJoin.resolve(run, 0).len(), 2);
        assert!(DeduplicateStrategy::Reduce.resolve(Vec::new(), 0).is_empty());
    }

    #[test]
    fn positional_pairing_pads_shorter_side() {
        let left = rows(&[&["1", "a"], &["1", "b"], &["1", "c"]]);
        let right = rows(&[&["1", "x"]]);
        let pairs = pair_runs(Pairing::Positional, &left, &right);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].1.is_some());
        assert!(pairs[1].1.is_none() && pairs[2].1.is_none());
    }

    #[test]
    fn zipped_pairing_never_pads() {
        let left = rows(&[&["1", "a"], &["1", "b"], &["1", "c"]]);
        let right = rows(&[&["1", "x"]]);
        let pairs = pair_runs(Pairing::Zipped, &left, &right);
        assert_eq!(pairs.len(), 1);
        assert!(pairs.iter().all(|(l, r)| l.is_some() && r.is_some()));
    }

    #[test]
    fn reduce_is_the_default() {
        assert_eq!(DeduplicateStrategy::default(), DeduplicateStrategy::Reduce);
    }

    #[test]
    fn cartesian_pairing_is_left_major() {
        let left = rows(&[&["1", "a"], &["1", "b"]]);
        let right = rows(&[&["1", "x"], &["1", "y"]]);
        let pairs = pair_runs(Pairing::Cartesian, &left, &right);
        let labels: Vec<(String, String)> = pairs
            .iter()
            .map(|(l, r)| {
                (
                    l.map(|row| row.fields[1].clone()).unwrap_or_default(),
                    r.map(|row| row.fields[1].clone()).unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                ("a".into(), "x".into()),
                ("a".into(), "y".into()),
                ("b".into(), "x".into()),
                ("b".into(), "y".into()),
            ]
        );
    }
}
