use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value;

/// One untyped cell from the event log, as the loader delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    /// Already a date/time (e.g. a typed spreadsheet cell).
    DateTime(NaiveDateTime),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Short name of the underlying representation, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::DateTime(_) => "datetime",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::DateTime(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            Value::String(s) => CellValue::Text(s.clone()),
            Value::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<Option<&Value>> for CellValue {
    fn from(value: Option<&Value>) -> Self {
        value.map_or(CellValue::Empty, CellValue::from)
    }
}

/// Datetimes become text in the same layout `Display` uses.
impl From<&CellValue> for Value {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Empty => Value::Null,
            CellValue::DateTime(_) => Value::String(cell.to_string()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(CellValue::from(&json!(null)), CellValue::Empty);
        assert_eq!(CellValue::from(&json!(45292.5)), CellValue::Number(45292.5));
        assert_eq!(CellValue::from(&json!(7)), CellValue::Number(7.0));
        assert_eq!(
            CellValue::from(&json!("03/04/2024")),
            CellValue::Text("03/04/2024".into())
        );
        assert_eq!(CellValue::from(None), CellValue::Empty);
    }

    #[test]
    fn test_to_json() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 4, 3)
            .unwrap()
            .and_hms_opt(10, 15, 30)
            .unwrap();
        assert_eq!(Value::from(&CellValue::DateTime(dt)), json!("2024-04-03 10:15:30"));
        assert_eq!(Value::from(&CellValue::Number(1.5)), json!(1.5));
        assert_eq!(Value::from(&CellValue::Number(f64::NAN)), Value::Null);
        assert_eq!(Value::from(&CellValue::Empty), Value::Null);
    }

    #[test]
    fn test_blank_text_is_empty() {
        assert!(CellValue::Text("   ".into()).is_empty());
        assert!(CellValue::Number(f64::NAN).is_empty());
        assert!(!CellValue::Number(0.0).is_empty());
    }
}
