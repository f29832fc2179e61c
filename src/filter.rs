use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Comparison, FieldType, NotANumber, TypedValue, parse_typed_value},
    error::{Error, Result},
    row::{Header, Row},
};

const OPERATORS: [(&str, Comparison); 7] = [
    ("!=", Comparison::Ne),
    (">=", Comparison::Ge),
    ("<=", Comparison::Le),
    ("==", Comparison::Eq),
    ("=", Comparison::Eq),
    (">", Comparison::Gt),
    ("<", Comparison::Lt),
];

/// A typed predicate `column <comparison> value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Filter {
    pub column: String,
    pub value: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub comparison: Comparison,
}

impl Filter {
    pub fn new(
        column: impl Into<String>,
        value: impl Into<String>,
        field_type: FieldType,
        comparison: Comparison,
    ) -> Self {
        Filter {
            column: column.into(),
            value: value.into(),
            field_type,
            comparison,
        }
    }

    /// Text equality, the default predicate.
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, value, FieldType::String, Comparison::Eq)
    }

    /// Parses `column OP value` where OP is one of `!= >= <= == = > <`.
    /// The value may be wrapped in single or double quotes.
    pub fn parse(expression: &str, field_type: FieldType) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(Error::config("Empty filter expression"));
        }
        let found = OPERATORS
            .iter()
            .filter_map(|(needle, op)| trimmed.find(needle).map(|idx| (idx, *needle, *op)))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())));
        let Some((idx, needle, comparison)) = found else {
            return Err(Error::config(format!(
                "Failed to parse filter expression '{trimmed}'"
            )));
        };
        let column = trimmed[..idx].trim();
        if column.is_empty() {
            return Err(Error::config(format!(
                "Filter expression '{trimmed}' is missing a column"
            )));
        }
        let value = unquote(trimmed[idx + needle.len()..].trim());
        Ok(Filter::new(column, value, field_type, comparison))
    }

    /// Resolves the column against `header` and parses the literal once.
    pub fn bind(&self, header: &Header) -> Result<BoundFilter> {
        let index = header.require(&self.column, "filter")?;
        let literal =
            parse_typed_value(&self.value, self.field_type).map_err(|_| Error::InvalidLiteral {
                column: self.column.clone(),
                value: self.value.clone(),
            })?;
        Ok(BoundFilter {
            index,
            column: self.column.clone(),
            literal,
            field_type: self.field_type,
            comparison: self.comparison,
        })
    }

    /// Evaluates against a single row. A column the header does not have
    /// excludes the row.
    pub fn matches(&self, header: &Header, row: &Row) -> Result<bool> {
        if !header.contains(&self.column) {
            return Ok(false);
        }
        self.bind(header)?.evaluate(row, Path::new(""))
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// A [`Filter`] resolved against a concrete header.
#[derive(Debug, Clone)]
pub struct BoundFilter {
    index: usize,
    column: String,
    literal: TypedValue,
    field_type: FieldType,
    comparison: Comparison,
}

impl BoundFilter {
    pub fn test(&self, row: &Row) -> Result<bool, NotANumber> {
        let raw = row.get(self.index).unwrap_or_default();
        let value = parse_typed_value(raw, self.field_type)?;
        Ok(self.comparison.holds(value.cmp(&self.literal)))
    }

    /// Like [`BoundFilter::test`] but reports a bad numeric field as a parse
    /// error naming `source`, the row's line and the column.
    pub fn evaluate(&self, row: &Row, source: &Path) -> Result<bool> {
        self.test(row).map_err(|NotANumber(value)| Error::Parse {
            path: source.to_path_buf(),
            line: row.line,
            column: self.column.clone(),
            value,
        })
    }
}

/// True when every filter holds; stops at the first failing one.
pub fn evaluate_all(filters: &[BoundFilter], row: &Row, source: &Path) -> Result<bool> {
    for filter in filters {
        if !filter.evaluate(row, source)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn header() -> Header {
        Header::new(vec!["key".into(), "name".into()]).expect("header")
    }

    fn row(key: &str, name: &str) -> Row {
        Row::new(vec![key.into(), name.into()], 2)
    }

    #[test]
    fn parse_picks_leftmost_longest_operator() {
        let f = Filter::parse("key <= 15", FieldType::Number).unwrap();
        assert_eq!(f, Filter::new("key", "15", FieldType::Number, Comparison::Le));

        let f = Filter::parse("name=a<b", FieldType::String).unwrap();
        assert_eq!(f.column, "name");
        assert_eq!(f.value, "a<b");
        assert_eq!(f.comparison, Comparison::Eq);

        let f = Filter::parse("feature2_left == 1", FieldType::Number).unwrap();
        assert_eq!(f.comparison, Comparison::Eq);
        assert_eq!(f.value, "1");

        let f = Filter::parse("name != 'x y'", FieldType::String).unwrap();
        assert_eq!(f.comparison, Comparison::Ne);
        assert_eq!(f.value, "x y");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Filter::parse("", FieldType::String).is_err());
        assert!(Filter::parse("no operator", FieldType::String).is_err());
        assert!(Filter::parse("=5", FieldType::String).is_err());
    }

    #[test]
    fn number_and_string_comparisons_differ() {
        let numeric = Filter::new("key", "15", FieldType::Number, Comparison::Le);
        let textual = Filter::new("key", "15", FieldType::String, Comparison::Le);
        assert!(numeric.matches(&header(), &row("9", "a")).unwrap());
        assert!(!textual.matches(&header(), &row("9", "a")).unwrap());
        assert!(!numeric.matches(&header(), &row("20", "a")).unwrap());
    }

    #[test]
    fn missing_column_fails_closed() {
        let filter = Filter::equals("absent", "x");
        assert!(!filter.matches(&header(), &row("1", "x")).unwrap());
        let err = filter.bind(&header()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn bad_literal_is_config_error_and_bad_field_is_parse_error() {
        let bad_literal = Filter::new("key", "ten", FieldType::Number, Comparison::Eq);
        assert_eq!(bad_literal.bind(&header()).unwrap_err().kind(), ErrorKind::Config);

        let bound = Filter::new("key", "10", FieldType::Number, Comparison::Eq)
            .bind(&header())
            .unwrap();
        let err = bound.evaluate(&row("n/a", "x"), Path::new("in.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn evaluate_all_is_conjunction() {
        let filters = vec![
            Filter::new("key", "2", FieldType::Number, Comparison::Ge)
                .bind(&header())
                .unwrap(),
            Filter::equals("name", "keep").bind(&header()).unwrap(),
        ];
        let src = Path::new("in.csv");
        assert!(evaluate_all(&filters, &row("3", "keep"), src).unwrap());
        assert!(!evaluate_all(&filters, &row("1", "keep"), src).unwrap());
        assert!(!evaluate_all(&filters, &row("3", "drop"), src).unwrap());
        assert!(evaluate_all(&[], &row("1", "x"), src).unwrap());
    }
}
