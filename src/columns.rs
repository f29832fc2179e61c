//! Declarative rename/drop rules turned into a [`ColumnMapper`].
//!
//! Used by the command line (`--rename old=new`, `--drop col`) and by YAML
//! job files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    writer::{ColumnMapper, column_mapper},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ColumnRules {
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    #[serde(default)]
    pub drop: Vec<String>,
}

impl ColumnRules {
    /// Builds rules from `old=new` rename specs and column names to drop.
    pub fn parse(renames: &[String], drops: &[String]) -> Result<Self> {
        let mut rules = ColumnRules::default();
        for spec in renames {
            let (from, to) = parse_rename(spec)?;
            if rules.rename.insert(from.clone(), to).is_some() {
                return Err(Error::config(format!("Column '{from}' is renamed twice")));
            }
        }
        rules.drop = drops
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        for column in &rules.drop {
            if rules.rename.contains_key(column) {
                return Err(Error::config(format!(
                    "Column '{column}' cannot be both renamed and dropped"
                )));
            }
        }
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rename.is_empty() && self.drop.is_empty()
    }

    /// `None` when there is nothing to rename or drop.
    pub fn into_mapper(self) -> Option<ColumnMapper> {
        if self.is_empty() {
            return None;
        }
        let ColumnRules { rename, drop } = self;
        Some(column_mapper(move |name| {
            if drop.iter().any(|d| d == name) {
                return None;
            }
            Some(rename.get(name).cloned().unwrap_or_else(|| name.to_string()))
        }))
    }
}

fn parse_rename(spec: &str) -> Result<(String, String)> {
    let mut parts = spec.splitn(2, '=');
    let from = parts
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::config(format!("Rename '{spec}' is missing a source column")))?;
    let to = parts
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::config(format!("Rename '{spec}' is missing a new name")))?;
    Ok((from.to_string(), to.to_string()))
}
