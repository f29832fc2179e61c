use std::{cmp::Ordering, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a field's text is interpreted when it is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Number,
    #[default]
    String,
}

impl FieldType {
    pub fn from_number_flag(is_number: bool) -> Self {
        if is_number {
            FieldType::Number
        } else {
            FieldType::String
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// Whether `ordering` (field compared to literal) satisfies this operator.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering.is_eq(),
            Comparison::Ne => ordering.is_ne(),
            Comparison::Lt => ordering.is_lt(),
            Comparison::Le => ordering.is_le(),
            Comparison::Gt => ordering.is_gt(),
            Comparison::Ge => ordering.is_ge(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A field value after interpretation under a [`FieldType`].
///
/// Values of the same variant order naturally; numbers compare by exact
/// decimal value, so `1.50` equals `1.5`, and text compares byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypedValue {
    Number(Decimal),
    Text(String),
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Number(n) => write!(f, "{n}"),
            TypedValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a number")]
pub struct NotANumber(pub String);

/// Parses a decimal number. Digit separators and values needing more
/// fractional digits than [`Decimal`] can hold are rejected, not rounded.
pub fn parse_number(raw: &str) -> Result<Decimal, NotANumber> {
    let not_a_number = || NotANumber(raw.to_string());
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if body.is_empty() || body.contains('_') {
        return Err(not_a_number());
    }
    if body.contains(['e', 'E']) {
        return Decimal::from_scientific(body).map_err(|_| not_a_number());
    }
    let value = Decimal::from_str(body).map_err(|_| not_a_number())?;
    let fraction_digits = body.split_once('.').map_or(0, |(_, fraction)| fraction.len());
    if value.scale() as usize != fraction_digits {
        return Err(not_a_number());
    }
    Ok(value)
}

pub fn parse_typed_value(raw: &str, ty: FieldType) -> Result<TypedValue, NotANumber> {
    match ty {
        FieldType::Number => parse_number(raw).map(TypedValue::Number),
        FieldType::String => Ok(TypedValue::Text(raw.to_string())),
    }
}
