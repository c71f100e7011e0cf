//! Raw claim records as they arrive from a dataset or a scoring request

use serde_json::{Map, Value};

/// One claim row with an arbitrary schema: column name to untyped value.
pub type RawRecord = Map<String, Value>;

/// A batch of raw records sharing one header, as read from a tabular file.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Header names in file order
    pub columns: Vec<String>,
    /// One record per data row
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<RawRecord>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Coerce a value to a finite float.
///
/// Non-numeric text, null, and non-finite numbers all become `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    number.filter(|n| n.is_finite())
}

/// Coerce a value to its text token. Null becomes the empty string.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(5000)), Some(5000.0));
        assert_eq!(coerce_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(coerce_number(&json!("n/a")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&Value::Null), None);
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(coerce_text(&json!("470")), "470");
        assert_eq!(coerce_text(&json!(470)), "470");
        assert_eq!(coerce_text(&Value::Null), "");
    }
}
