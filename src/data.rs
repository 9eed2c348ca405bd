use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::{config::CoercionConfig, header::ScalarType};

/// A typed cell value. Serializes to the JSON shape the process inputs expect:
/// numbers and booleans natively, dates as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Date(NaiveDate),
    Double(f64),
    Float(f32),
    Integer(i32),
    Long(i64),
    String(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Double(f) => f.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Long(i) => i.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("This is not a boolean ({true_literal},{false_literal}): '{value}'")]
    NotABoolean {
        value: String,
        true_literal: String,
        false_literal: String,
    },
    #[error("This is not a date ({pattern}): '{value}'")]
    NotADate { value: String, pattern: String },
    #[error("This is not a {ty}: '{value}'")]
    NotANumber { value: String, ty: ScalarType },
    #[error("This {ty} is not finite: '{value}'")]
    NotFinite { value: String, ty: ScalarType },
}

/// Converts one cell into the value its column type demands.
pub fn coerce(value: &str, ty: ScalarType, config: &CoercionConfig) -> Result<Value, CoercionError> {
    let not_a_number = || CoercionError::NotANumber {
        value: value.to_string(),
        ty,
    };
    let not_finite = || CoercionError::NotFinite {
        value: value.to_string(),
        ty,
    };
    let parsed = match ty {
        ScalarType::Boolean => {
            if value == config.true_literal {
                Value::Boolean(true)
            } else if value == config.false_literal {
                Value::Boolean(false)
            } else {
                return Err(CoercionError::NotABoolean {
                    value: value.to_string(),
                    true_literal: config.true_literal.clone(),
                    false_literal: config.false_literal.clone(),
                });
            }
        }
        ScalarType::Date => {
            let not_a_date = || CoercionError::NotADate {
                value: value.to_string(),
                pattern: config.date_pattern.clone(),
            };
            let parsed = NaiveDate::parse_from_str(value, &config.date_pattern)
                .map_err(|_| not_a_date())?;
            // Rejects the short fields and signed years chrono tolerates.
            if parsed.format(&config.date_pattern).to_string() != value {
                return Err(not_a_date());
            }
            Value::Date(parsed)
        }
        ScalarType::Double => {
            let parsed: f64 = value.trim().parse().map_err(|_| not_a_number())?;
            if !parsed.is_finite() {
                return Err(not_finite());
            }
            Value::Double(parsed)
        }
        ScalarType::Float => {
            let parsed: f32 = value.trim().parse().map_err(|_| not_a_number())?;
            if !parsed.is_finite() {
                return Err(not_finite());
            }
            Value::Float(parsed)
        }
        ScalarType::Integer => Value::Integer(value.parse().map_err(|_| not_a_number())?),
        ScalarType::Long => Value::Long(value.parse().map_err(|_| not_a_number())?),
        ScalarType::String | ScalarType::Text => Value::String(value.to_string()),
    };
    Ok(parsed)
}
