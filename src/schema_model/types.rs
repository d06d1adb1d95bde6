//! Small value types shared by every part of the schema model.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Scalar kinds a field can carry.
///
/// Enum-typed fields keep the enum name so filters can report it, but compile
/// exactly like `String` (equality, `in`, ordering).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    BigInt,
    Boolean,
    DateTime,
    LocalDateTime,
    Date,
    Time,
    LocalTime,
    Duration,
    Point,
    CartesianPoint,
    Enum(String),
}

impl ScalarKind {
    /// Resolve a type name from a schema definition document.
    ///
    /// Returns `None` for names that are neither a built-in scalar nor a
    /// declared enum.
    pub fn parse(name: &str, enums: &HashSet<String>) -> Option<Self> {
        let kind = match name {
            "ID" => ScalarKind::Id,
            "String" => ScalarKind::String,
            "Int" => ScalarKind::Int,
            "Float" => ScalarKind::Float,
            "BigInt" => ScalarKind::BigInt,
            "Boolean" => ScalarKind::Boolean,
            "DateTime" => ScalarKind::DateTime,
            "LocalDateTime" => ScalarKind::LocalDateTime,
            "Date" => ScalarKind::Date,
            "Time" => ScalarKind::Time,
            "LocalTime" => ScalarKind::LocalTime,
            "Duration" => ScalarKind::Duration,
            "Point" => ScalarKind::Point,
            "CartesianPoint" => ScalarKind::CartesianPoint,
            other if enums.contains(other) => ScalarKind::Enum(other.to_string()),
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &str {
        match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::BigInt => "BigInt",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::LocalDateTime => "LocalDateTime",
            ScalarKind::Date => "Date",
            ScalarKind::Time => "Time",
            ScalarKind::LocalTime => "LocalTime",
            ScalarKind::Duration => "Duration",
            ScalarKind::Point => "Point",
            ScalarKind::CartesianPoint => "CartesianPoint",
            ScalarKind::Enum(name) => name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float | ScalarKind::BigInt)
    }

    /// Kinds whose values are strings for the purpose of length aggregation
    /// and the substring operators.
    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarKind::Id | ScalarKind::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarKind::DateTime
                | ScalarKind::LocalDateTime
                | ScalarKind::Date
                | ScalarKind::Time
                | ScalarKind::LocalTime
        )
    }

    pub fn is_duration(&self) -> bool {
        matches!(self, ScalarKind::Duration)
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, ScalarKind::Point | ScalarKind::CartesianPoint)
    }

    /// Whether `<`, `<=`, `>`, `>=` are meaningful for the kind.
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || self.is_string_like()
            || self.is_temporal()
            || self.is_duration()
            || matches!(self, ScalarKind::Enum(_))
    }

    /// The Cypher function that turns a JSON parameter into the native
    /// store value for this kind, if the kind needs one.
    pub fn cypher_constructor(&self) -> Option<&'static str> {
        match self {
            ScalarKind::DateTime => Some("datetime"),
            ScalarKind::LocalDateTime => Some("localdatetime"),
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::LocalTime => Some("localtime"),
            ScalarKind::Duration => Some("duration"),
            ScalarKind::Point | ScalarKind::CartesianPoint => Some("point"),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stored direction of a relationship, seen from the declaring entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Out => f.write_str("OUT"),
            Direction::In => f.write_str("IN"),
        }
    }
}

/// How a relationship may be traversed by reads.
///
/// Edges are always stored directed; the `directed` field argument picks
/// between the stored direction and a direction-agnostic match where the
/// mode allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryDirection {
    #[default]
    DefaultDirected,
    DefaultUndirected,
    DirectedOnly,
    UndirectedOnly,
}

impl QueryDirection {
    /// Resolve the `directed` argument against this mode.
    ///
    /// Returns `Err` with a reason when the argument contradicts an
    /// `*_ONLY` mode.
    pub fn resolve(self, directed: Option<bool>) -> Result<bool, &'static str> {
        match (self, directed) {
            (QueryDirection::DefaultDirected, None) => Ok(true),
            (QueryDirection::DefaultUndirected, None) => Ok(false),
            (QueryDirection::DefaultDirected | QueryDirection::DefaultUndirected, Some(d)) => {
                Ok(d)
            }
            (QueryDirection::DirectedOnly, None | Some(true)) => Ok(true),
            (QueryDirection::DirectedOnly, Some(false)) => {
                Err("relationship can only be queried in its stored direction")
            }
            (QueryDirection::UndirectedOnly, None | Some(false)) => Ok(false),
            (QueryDirection::UndirectedOnly, Some(true)) => {
                Err("relationship can only be queried undirected")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    List,
}

impl Cardinality {
    pub fn from_list_flag(is_list: bool) -> Self {
        if is_list {
            Cardinality::List
        } else {
            Cardinality::Single
        }
    }

    pub fn is_list(self) -> bool {
        self == Cardinality::List
    }
}

/// Per-type page size limits (`@limit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaginationLimits {
    #[serde(default)]
    pub default: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

/// Reference to a node-shaped type: a concrete entity or one of the two
/// polymorphic kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Entity(String),
    Interface(String),
    Union(String),
}

impl TypeRef {
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Entity(n) | TypeRef::Interface(n) | TypeRef::Union(n) => n,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, TypeRef::Entity(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtin_and_enum_kinds() {
        let enums: HashSet<String> = ["Genre".to_string()].into_iter().collect();
        assert_eq!(ScalarKind::parse("Int", &enums), Some(ScalarKind::Int));
        assert_eq!(
            ScalarKind::parse("Genre", &enums),
            Some(ScalarKind::Enum("Genre".to_string()))
        );
        assert_eq!(ScalarKind::parse("Nope", &enums), None);
    }

    #[test]
    fn test_string_like_excludes_enums() {
        assert!(ScalarKind::String.is_string_like());
        assert!(!ScalarKind::Enum("Genre".into()).is_string_like());
        assert!(ScalarKind::Enum("Genre".into()).is_ordered());
        assert!(!ScalarKind::Boolean.is_ordered());
    }

    #[test]
    fn test_query_direction_resolution() {
        assert_eq!(QueryDirection::DefaultDirected.resolve(None), Ok(true));
        assert_eq!(QueryDirection::DefaultUndirected.resolve(None), Ok(false));
        assert_eq!(QueryDirection::DefaultDirected.resolve(Some(false)), Ok(false));
        assert!(QueryDirection::DirectedOnly.resolve(Some(false)).is_err());
        assert!(QueryDirection::UndirectedOnly.resolve(Some(true)).is_err());
    }
}
