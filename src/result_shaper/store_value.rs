//! Values as a store driver hands them back, before shaping.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::spatial::Point;
use super::temporal::IsoDuration;

/// One row of a store result, keyed by returned column.
pub type StoreRecord = HashMap<String, StoreValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<StoreValue>),
    Map(BTreeMap<String, StoreValue>),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime, FixedOffset),
    LocalTime(NaiveTime),
    Duration(IsoDuration),
    Point(Point),
}

impl StoreValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StoreValue>> {
        match self {
            StoreValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StoreValue]> {
        match self {
            StoreValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StoreValue::Integer(i) => Some(*i),
            StoreValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Field of a map value.
    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Short name of the variant for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreValue::Null => "null",
            StoreValue::Boolean(_) => "boolean",
            StoreValue::Integer(_) => "integer",
            StoreValue::Float(_) => "float",
            StoreValue::String(_) => "string",
            StoreValue::List(_) => "list",
            StoreValue::Map(_) => "map",
            StoreValue::DateTime(_) => "datetime",
            StoreValue::LocalDateTime(_) => "localdatetime",
            StoreValue::Date(_) => "date",
            StoreValue::Time(..) => "time",
            StoreValue::LocalTime(_) => "localtime",
            StoreValue::Duration(_) => "duration",
            StoreValue::Point(_) => "point",
        }
    }
}

/// Plain JSON maps onto the structural variants; strings stay strings and
/// are interpreted by the shaper according to the selected field's kind.
impl From<Value> for StoreValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StoreValue::Null,
            Value::Bool(b) => StoreValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StoreValue::Integer(i),
                None => StoreValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => StoreValue::String(s),
            Value::Array(items) => StoreValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                StoreValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value: StoreValue = json!({"title": "Heat", "rating": 8.3, "views": 12, "tags": ["a"]}).into();
        assert_eq!(value.get("title").and_then(|v| v.as_str()), Some("Heat"));
        assert_eq!(value.get("views").and_then(|v| v.as_i64()), Some(12));
        assert_eq!(value.get("rating"), Some(&StoreValue::Float(8.3)));
        assert_eq!(value.get("tags").and_then(|v| v.as_list()).map(|l| l.len()), Some(1));
        assert_eq!(value.get("missing"), None);
    }
}
