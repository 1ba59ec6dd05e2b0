//! Cell value representation shared by spreadsheets and table rows

use chrono::NaiveDateTime;

/// Text layout used whenever a date/time has to travel as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell of a dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Empty cell / SQL NULL
    #[default]
    Null,
    /// Whole number
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Free text
    Text(String),
    /// Date and time without zone (spreadsheets carry none)
    DateTime(NaiveDateTime),
}

impl Value {
    /// Try to get as float, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Render as text for text-typed storage; `None` for null
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "(null)"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}
