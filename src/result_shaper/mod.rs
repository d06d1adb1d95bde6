//! Result Shaper: turns store records back into the requested response.
//!
//! The translator emits one [`RootPlan`] next to the statement. The plan
//! mirrors the selection tree and says, for every response key, which
//! projected value to read and how to format it. Hidden projection keys
//! (`__labels`, `__sortN`, `__type`) are read but never copied out.

pub mod errors;
pub mod spatial;
pub mod store_value;
pub mod temporal;

use serde_json::{Map, Number, Value};

use crate::schema_model::ScalarKind;
use crate::translator::pagination::PageWindow;

pub use errors::ShapeError;
pub use spatial::Point;
pub use store_value::{StoreRecord, StoreValue};

/// Labels of a node projected from a polymorphic field.
pub const LABELS_KEY: &str = "__labels";
/// Edge-property-type name projected with edge properties.
pub const PROPERTIES_TYPE_KEY: &str = "__type";
pub const EDGES_KEY: &str = "edges";
pub const TOTAL_COUNT_KEY: &str = "totalCount";
pub const EDGE_NODE_KEY: &str = "node";
pub const EDGE_PROPERTIES_KEY: &str = "properties";

/// How the runtime type of a node is determined.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeResolution {
    Static(String),
    /// First candidate whose labels the node carries, in definition order
    Labels {
        type_name: String,
        candidates: Vec<(String, Vec<String>)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    pub key: String,
    pub shape: FieldShape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Scalar { kind: ScalarKind, is_list: bool },
    /// `__typename` of the enclosing node or edge properties
    Typename,
    Constant(Value),
    Node(NodeShape),
    Connection(ConnectionShape),
    /// A map with a fixed set of keys (aggregate results)
    Object(Vec<FieldPlan>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub is_list: bool,
    pub typename: TypeResolution,
    /// Selected fields per concrete type
    pub branches: Vec<(String, Vec<FieldPlan>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionShape {
    pub window: PageWindow,
    pub selections: Vec<ConnectionField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionField {
    TotalCount(String),
    PageInfo { key: String, fields: Vec<PageInfoField> },
    Edges { key: String, fields: Vec<EdgeField> },
    Constant(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageInfoField {
    HasNextPage(String),
    HasPreviousPage(String),
    StartCursor(String),
    EndCursor(String),
    Constant(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EdgeField {
    Node { key: String, shape: NodeShape },
    /// Selected property fields per edge-property-type
    Properties {
        key: String,
        branches: Vec<(String, Vec<FieldPlan>)>,
    },
    Cursor(String),
    Constant(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCollect {
    /// One response item per record
    Rows,
    /// The value of the first record, or null
    FirstRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootPlan {
    pub response_key: String,
    pub column: String,
    pub collect: RootCollect,
    pub shape: FieldShape,
}

/// Shape store records into `{ <response key>: <value> }`.
pub fn shape(records: &[StoreRecord], plan: &RootPlan) -> Result<Value, ShapeError> {
    fn column<'r>(record: &'r StoreRecord, plan: &RootPlan) -> Result<&'r StoreValue, ShapeError> {
        record
            .get(&plan.column)
            .ok_or_else(|| ShapeError::MissingColumn {
                column: plan.column.clone(),
            })
    }

    let value = match plan.collect {
        RootCollect::Rows => Value::Array(
            records
                .iter()
                .map(|r| shape_field(&plan.response_key, column(r, plan)?, &plan.shape, None))
                .collect::<Result<_, _>>()?,
        ),
        RootCollect::FirstRow => match records.first() {
            Some(record) => shape_field(&plan.response_key, column(record, plan)?, &plan.shape, None)?,
            None => Value::Null,
        },
    };

    let mut out = Map::new();
    out.insert(plan.response_key.clone(), value);
    Ok(Value::Object(out))
}

fn shape_field(
    key: &str,
    value: &StoreValue,
    shape: &FieldShape,
    enclosing_type: Option<&str>,
) -> Result<Value, ShapeError> {
    match shape {
        FieldShape::Scalar { kind, is_list } => shape_scalar(key, value, kind, *is_list),
        FieldShape::Typename => Ok(enclosing_type
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null)),
        FieldShape::Constant(v) => Ok(v.clone()),
        FieldShape::Node(node) => shape_node(key, value, node),
        FieldShape::Connection(connection) => shape_connection(key, value, connection),
        FieldShape::Object(fields) => {
            if value.is_null() {
                return Ok(Value::Null);
            }
            shape_fields(value, fields, enclosing_type)
        }
    }
}

fn shape_fields(
    value: &StoreValue,
    fields: &[FieldPlan],
    enclosing_type: Option<&str>,
) -> Result<Value, ShapeError> {
    let mut out = Map::new();
    for field in fields {
        let v = value.get(&field.key).unwrap_or(&StoreValue::Null);
        out.insert(
            field.key.clone(),
            shape_field(&field.key, v, &field.shape, enclosing_type)?,
        );
    }
    Ok(Value::Object(out))
}

fn shape_node(key: &str, value: &StoreValue, node: &NodeShape) -> Result<Value, ShapeError> {
    if value.is_null() {
        return Ok(if node.is_list {
            Value::Array(Vec::new())
        } else {
            Value::Null
        });
    }
    if node.is_list {
        let items = value
            .as_list()
            .ok_or_else(|| ShapeError::unexpected(key, "a list of nodes", value.type_name()))?;
        return items
            .iter()
            .map(|item| shape_single_node(key, item, node))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    shape_single_node(key, value, node)
}

fn shape_single_node(key: &str, value: &StoreValue, node: &NodeShape) -> Result<Value, ShapeError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if value.as_map().is_none() {
        return Err(ShapeError::unexpected(key, "a node map", value.type_name()));
    }
    let type_name = resolve_type(value, &node.typename)?;
    let fields = node
        .branches
        .iter()
        .find(|(t, _)| *t == type_name)
        .map(|(_, f)| f.as_slice())
        .unwrap_or_default();
    shape_fields(value, fields, Some(&type_name))
}

fn resolve_type(value: &StoreValue, resolution: &TypeResolution) -> Result<String, ShapeError> {
    match resolution {
        TypeResolution::Static(name) => Ok(name.clone()),
        TypeResolution::Labels {
            type_name,
            candidates,
        } => {
            let labels: Vec<&str> = value
                .get(LABELS_KEY)
                .and_then(StoreValue::as_list)
                .map(|l| l.iter().filter_map(StoreValue::as_str).collect())
                .unwrap_or_default();
            candidates
                .iter()
                .find(|(_, required)| required.iter().all(|l| labels.contains(&l.as_str())))
                .map(|(name, _)| name.clone())
                .ok_or_else(|| ShapeError::UnresolvedType {
                    type_name: type_name.clone(),
                    labels: labels.join(", "),
                })
        }
    }
}

fn shape_connection(
    key: &str,
    value: &StoreValue,
    connection: &ConnectionShape,
) -> Result<Value, ShapeError> {
    if value.as_map().is_none() {
        return Err(ShapeError::unexpected(key, "a connection map", value.type_name()));
    }
    let edges = value
        .get(EDGES_KEY)
        .and_then(StoreValue::as_list)
        .unwrap_or_default();
    let returned = edges.len() as u64;
    let total = value
        .get(TOTAL_COUNT_KEY)
        .and_then(StoreValue::as_i64)
        .map(|t| t.max(0) as u64)
        .unwrap_or(connection.window.offset.saturating_add(returned));
    let window = &connection.window;

    let mut out = Map::new();
    for selection in &connection.selections {
        match selection {
            ConnectionField::TotalCount(k) => {
                out.insert(k.clone(), Value::from(total));
            }
            ConnectionField::PageInfo { key, fields } => {
                let mut info = Map::new();
                for field in fields {
                    let (k, v) = match field {
                        PageInfoField::HasNextPage(k) => {
                            (k, Value::Bool(window.has_next_page(returned, total)))
                        }
                        PageInfoField::HasPreviousPage(k) => {
                            (k, Value::Bool(window.has_previous_page(total)))
                        }
                        PageInfoField::StartCursor(k) => (
                            k,
                            if returned > 0 {
                                Value::String(window.cursor_at(0))
                            } else {
                                Value::Null
                            },
                        ),
                        PageInfoField::EndCursor(k) => (
                            k,
                            match returned.checked_sub(1) {
                                Some(last) => Value::String(window.cursor_at(last)),
                                None => Value::Null,
                            },
                        ),
                        PageInfoField::Constant(k, v) => (k, v.clone()),
                    };
                    info.insert(k.clone(), v);
                }
                out.insert(key.clone(), Value::Object(info));
            }
            ConnectionField::Edges { key, fields } => {
                let shaped = edges
                    .iter()
                    .enumerate()
                    .map(|(i, edge)| shape_edge(key, edge, fields, window, i as u64))
                    .collect::<Result<Vec<_>, _>>()?;
                out.insert(key.clone(), Value::Array(shaped));
            }
            ConnectionField::Constant(k, v) => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(Value::Object(out))
}

fn shape_edge(
    key: &str,
    edge: &StoreValue,
    fields: &[EdgeField],
    window: &PageWindow,
    index: u64,
) -> Result<Value, ShapeError> {
    let mut out = Map::new();
    for field in fields {
        match field {
            EdgeField::Node { key: k, shape } => {
                let node = edge.get(EDGE_NODE_KEY).unwrap_or(&StoreValue::Null);
                out.insert(k.clone(), shape_node(k, node, shape)?);
            }
            EdgeField::Properties { key: k, branches } => {
                let properties = edge.get(EDGE_PROPERTIES_KEY).unwrap_or(&StoreValue::Null);
                if properties.is_null() {
                    out.insert(k.clone(), Value::Null);
                    continue;
                }
                let type_name = properties
                    .get(PROPERTIES_TYPE_KEY)
                    .and_then(StoreValue::as_str)
                    .or_else(|| branches.first().map(|(t, _)| t.as_str()))
                    .ok_or_else(|| ShapeError::unexpected(key, "typed edge properties", "untyped map"))?;
                let plans = branches
                    .iter()
                    .find(|(t, _)| t == type_name)
                    .map(|(_, f)| f.as_slice())
                    .unwrap_or_default();
                out.insert(k.clone(), shape_fields(properties, plans, Some(type_name))?);
            }
            EdgeField::Cursor(k) => {
                out.insert(k.clone(), Value::String(window.cursor_at(index)));
            }
            EdgeField::Constant(k, v) => {
                out.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(Value::Object(out))
}

fn shape_scalar(
    key: &str,
    value: &StoreValue,
    kind: &ScalarKind,
    is_list: bool,
) -> Result<Value, ShapeError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if is_list {
        let items = value
            .as_list()
            .ok_or_else(|| ShapeError::unexpected(key, "a list", value.type_name()))?;
        return items
            .iter()
            .map(|item| shape_scalar(key, item, kind, false))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }

    use temporal::*;
    let shaped = match (kind, value) {
        (ScalarKind::BigInt | ScalarKind::Id, StoreValue::Integer(i)) => Value::String(i.to_string()),
        (ScalarKind::DateTime, StoreValue::String(s)) => {
            Value::String(format_datetime(&parse_datetime(s)?))
        }
        (ScalarKind::LocalDateTime, StoreValue::String(s)) => {
            Value::String(format_local_datetime(&parse_local_datetime(s)?))
        }
        (ScalarKind::Date, StoreValue::String(s)) => Value::String(format_date(&parse_date(s)?)),
        (ScalarKind::Time, StoreValue::String(s)) => {
            let (time, offset) = parse_time(s)?;
            Value::String(format_time(&time, &offset))
        }
        (ScalarKind::LocalTime, StoreValue::String(s)) => {
            Value::String(format_local_time(&parse_local_time(s)?))
        }
        (ScalarKind::Duration, StoreValue::String(s)) => {
            Value::String(parse_iso_duration(s)?.to_string())
        }
        (ScalarKind::Point | ScalarKind::CartesianPoint, StoreValue::Map(_)) => {
            Point::from_json(&plain_json(value))?.to_external()
        }
        _ => plain_json(value),
    };
    Ok(shaped)
}

/// External JSON form of a store value with no field kind to guide it.
pub fn plain_json(value: &StoreValue) -> Value {
    use temporal::*;
    match value {
        StoreValue::Null => Value::Null,
        StoreValue::Boolean(b) => Value::Bool(*b),
        StoreValue::Integer(i) => Value::from(*i),
        StoreValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        StoreValue::String(s) => Value::String(s.clone()),
        StoreValue::List(items) => Value::Array(items.iter().map(plain_json).collect()),
        StoreValue::Map(entries) => Value::Object(
            entries
                .iter()
                .filter(|(k, _)| !k.starts_with("__"))
                .map(|(k, v)| (k.clone(), plain_json(v)))
                .collect(),
        ),
        StoreValue::DateTime(dt) => Value::String(format_datetime(dt)),
        StoreValue::LocalDateTime(dt) => Value::String(format_local_datetime(dt)),
        StoreValue::Date(d) => Value::String(format_date(d)),
        StoreValue::Time(t, offset) => Value::String(format_time(t, offset)),
        StoreValue::LocalTime(t) => Value::String(format_local_time(t)),
        StoreValue::Duration(d) => Value::String(d.to_string()),
        StoreValue::Point(p) => p.to_external(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(column: &str, value: StoreValue) -> StoreRecord {
        [(column.to_string(), value)].into_iter().collect()
    }

    fn scalar(key: &str, kind: ScalarKind) -> FieldPlan {
        FieldPlan {
            key: key.to_string(),
            shape: FieldShape::Scalar {
                kind,
                is_list: false,
            },
        }
    }

    fn movie_node(fields: Vec<FieldPlan>) -> NodeShape {
        NodeShape {
            is_list: false,
            typename: TypeResolution::Static("Movie".into()),
            branches: vec![("Movie".into(), fields)],
        }
    }

    #[test]
    fn test_rows_become_a_list() {
        let plan = RootPlan {
            response_key: "movies".into(),
            column: "this".into(),
            collect: RootCollect::Rows,
            shape: FieldShape::Node(movie_node(vec![
                scalar("title", ScalarKind::String),
                scalar("views", ScalarKind::BigInt),
                FieldPlan {
                    key: "__typename".into(),
                    shape: FieldShape::Typename,
                },
            ])),
        };
        let records = vec![
            record("this", json!({"title": "Heat", "views": 9007199254740993_i64}).into()),
            record("this", json!({"title": "Ronin", "views": null}).into()),
        ];
        assert_eq!(
            shape(&records, &plan).unwrap(),
            json!({"movies": [
                {"title": "Heat", "views": "9007199254740993", "__typename": "Movie"},
                {"title": "Ronin", "views": null, "__typename": "Movie"}
            ]})
        );
    }

    #[test]
    fn test_missing_column() {
        let plan = RootPlan {
            response_key: "movies".into(),
            column: "this".into(),
            collect: RootCollect::Rows,
            shape: FieldShape::Node(movie_node(vec![])),
        };
        let records = vec![record("other", StoreValue::Null)];
        assert!(matches!(
            shape(&records, &plan),
            Err(ShapeError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_temporal_spatial_and_duration_round_trip() {
        let plan = RootPlan {
            response_key: "movie".into(),
            column: "this".into(),
            collect: RootCollect::FirstRow,
            shape: FieldShape::Node(movie_node(vec![
                scalar("released", ScalarKind::DateTime),
                scalar("runtime", ScalarKind::Duration),
                scalar("location", ScalarKind::Point),
                scalar("premiere", ScalarKind::Date),
            ])),
        };

        let released = "2020-05-01T12:30:00.000Z";
        let native: BTreeMap<String, StoreValue> = [
            (
                "released".to_string(),
                StoreValue::DateTime(DateTime::parse_from_rfc3339(released).unwrap()),
            ),
            (
                "runtime".to_string(),
                StoreValue::Duration(temporal::parse_iso_duration("PT1H50M").unwrap()),
            ),
            (
                "location".to_string(),
                StoreValue::Point(Point {
                    srid: spatial::WGS84_2D,
                    x: 13.4,
                    y: 52.5,
                    z: None,
                }),
            ),
            (
                "premiere".to_string(),
                StoreValue::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()),
            ),
        ]
        .into_iter()
        .collect();
        let from_native = shape(&[record("this", StoreValue::Map(native))], &plan).unwrap();

        // the same values as a JSON driver would hand them back
        let from_strings = shape(
            &[record(
                "this",
                json!({
                    "released": "2020-05-01T14:30:00+02:00",
                    "runtime": "PT110M",
                    "location": {"longitude": 13.4, "latitude": 52.5},
                    "premiere": "2020-05-01"
                })
                .into(),
            )],
            &plan,
        )
        .unwrap();

        let expected = json!({"movie": {
            "released": released,
            "runtime": "PT1H50M",
            "location": {"longitude": 13.4, "latitude": 52.5, "height": null, "crs": "wgs-84", "srid": 4326},
            "premiere": "2020-05-01"
        }});
        assert_eq!(from_native, expected);
        assert_eq!(from_strings, expected);
    }

    #[test]
    fn test_polymorphic_nodes_resolve_by_labels() {
        let shape_plan = NodeShape {
            is_list: true,
            typename: TypeResolution::Labels {
                type_name: "Production".into(),
                candidates: vec![
                    ("Movie".into(), vec!["Movie".into()]),
                    ("Series".into(), vec!["Series".into(), "Searchable".into()]),
                ],
            },
            branches: vec![
                (
                    "Movie".into(),
                    vec![
                        scalar("title", ScalarKind::String),
                        FieldPlan {
                            key: "__typename".into(),
                            shape: FieldShape::Typename,
                        },
                    ],
                ),
                (
                    "Series".into(),
                    vec![
                        scalar("episodes", ScalarKind::Int),
                        FieldPlan {
                            key: "__typename".into(),
                            shape: FieldShape::Typename,
                        },
                    ],
                ),
            ],
        };
        let value: StoreValue = json!([
            {"__labels": ["Movie"], "title": "Heat"},
            {"__labels": ["Searchable", "Series"], "episodes": 8}
        ])
        .into();
        assert_eq!(
            shape_node("actedIn", &value, &shape_plan).unwrap(),
            json!([
                {"title": "Heat", "__typename": "Movie"},
                {"episodes": 8, "__typename": "Series"}
            ])
        );

        let unknown: StoreValue = json!([{"__labels": ["Person"]}]).into();
        assert!(matches!(
            shape_node("actedIn", &unknown, &shape_plan),
            Err(ShapeError::UnresolvedType { .. })
        ));
    }

    #[test]
    fn test_connection_page_info_and_cursors() {
        let window = PageWindow {
            offset: 5,
            limit: Some(5),
            cursor_rejected: false,
            signature: "abc".into(),
        };
        let connection = ConnectionShape {
            window: window.clone(),
            selections: vec![
                ConnectionField::TotalCount("totalCount".into()),
                ConnectionField::PageInfo {
                    key: "pageInfo".into(),
                    fields: vec![
                        PageInfoField::HasNextPage("hasNextPage".into()),
                        PageInfoField::HasPreviousPage("hasPreviousPage".into()),
                        PageInfoField::EndCursor("endCursor".into()),
                    ],
                },
                ConnectionField::Edges {
                    key: "edges".into(),
                    fields: vec![
                        EdgeField::Cursor("cursor".into()),
                        EdgeField::Properties {
                            key: "properties".into(),
                            branches: vec![(
                                "ActedIn".into(),
                                vec![scalar("role", ScalarKind::String)],
                            )],
                        },
                    ],
                },
            ],
        };
        let edges: Vec<Value> = (0..5)
            .map(|i| json!({"node": {}, "properties": {"__type": "ActedIn", "role": format!("r{}", i)}}))
            .collect();
        let value: StoreValue = json!({"edges": edges, "totalCount": 20}).into();

        let shaped = shape_connection("actorsConnection", &value, &connection).unwrap();
        assert_eq!(shaped["totalCount"], json!(20));
        assert_eq!(shaped["pageInfo"]["hasNextPage"], json!(true));
        assert_eq!(shaped["pageInfo"]["hasPreviousPage"], json!(true));
        assert_eq!(shaped["pageInfo"]["endCursor"], json!(window.cursor_at(4)));
        assert_eq!(shaped["edges"][0]["cursor"], json!(window.cursor_at(0)));
        assert_eq!(shaped["edges"][2]["properties"], json!({"role": "r2"}));
    }

    #[test]
    fn test_aggregate_objects() {
        let plan = RootPlan {
            response_key: "moviesAggregate".into(),
            column: "this".into(),
            collect: RootCollect::FirstRow,
            shape: FieldShape::Object(vec![
                scalar("count", ScalarKind::Int),
                FieldPlan {
                    key: "runtime".into(),
                    shape: FieldShape::Object(vec![scalar("average", ScalarKind::Duration)]),
                },
            ]),
        };
        let records = vec![record(
            "this",
            json!({"count": 2, "runtime": {"average": "P0M0DT5400S"}}).into(),
        )];
        assert_eq!(
            shape(&records, &plan).unwrap(),
            json!({"moviesAggregate": {"count": 2, "runtime": {"average": "PT1H30M"}}})
        );
    }
}
