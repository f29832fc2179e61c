//! Header and row model shared by readers, writers and both pipelines.

use std::collections::HashSet;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    /// Builds a header, rejecting duplicate column names.
    pub fn new(names: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(Error::config(format!("Duplicate column name '{name}' in header")));
            }
        }
        Ok(Header { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|col| col == name)
    }

    /// Like [`Header::position`] but reports a missing column as a
    /// configuration error tagged with `context` (e.g. "left").
    pub fn require(&self, name: &str, context: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            context: context.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Appends a trailing column, keeping names unique.
    pub fn push(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(Error::config(format!("Column '{name}' already exists in header")));
        }
        self.names.push(name);
        Ok(())
    }
}

/// One data row. `line` is the 1-based line ordinal in the source file
/// (the header is line 1), or 0 for rows that were synthesised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub fields: Vec<String>,
    pub line: u64,
}

impl Row {
    pub fn new(fields: Vec<String>, line: u64) -> Self {
        Row { fields, line }
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.fields.push(value.into());
    }
}
