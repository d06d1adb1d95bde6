use async_trait::async_trait;
use cypherql::cypher::ParamMap;
use cypherql::result_shaper::{StoreRecord, StoreValue};
use cypherql::{AuthPredicates, Executor, GraphStore, SchemaModel, SelectionTree, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MOVIES_SCHEMA: &str = include_str!("../../fixtures/movies_schema.yaml");

/// Replays one canned row under `column` and remembers the statement it saw.
struct CannedStore {
    column: &'static str,
    row: Value,
    seen: Mutex<Vec<String>>,
}

impl CannedStore {
    fn new(column: &'static str, row: Value) -> Arc<Self> {
        Arc::new(CannedStore {
            column,
            row,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GraphStore for CannedStore {
    async fn run(&self, cypher: &str, _params: &ParamMap) -> Result<Vec<StoreRecord>, StoreError> {
        self.seen.lock().unwrap().push(cypher.to_string());
        let mut record = HashMap::new();
        record.insert(self.column.to_string(), StoreValue::from(self.row.clone()));
        Ok(vec![record])
    }
}

async fn execute(store: Arc<CannedStore>, request: Value) -> Value {
    let schema = Arc::new(SchemaModel::from_yaml_str(MOVIES_SCHEMA).unwrap());
    let selection: SelectionTree = serde_json::from_value(request).unwrap();
    Executor::new(schema, store)
        .execute(&selection, &AuthPredicates::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_aliases_nested_lists_and_typenames() {
    let store = CannedStore::new(
        "this",
        json!({
            "name": "Heat",
            "cast": [{"name": "Al Pacino"}, {"name": "Robert De Niro"}]
        }),
    );
    let response = execute(
        store.clone(),
        json!({
            "field": "movies",
            "alias": "films",
            "selections": [
                {"field": "title", "alias": "name"},
                {"field": "__typename"},
                {"field": "actors", "alias": "cast", "selections": [{"field": "name"}]}
            ]
        }),
    )
    .await;

    assert_eq!(
        response,
        json!({"films": [{
            "name": "Heat",
            "__typename": "Movie",
            "cast": [{"name": "Al Pacino"}, {"name": "Robert De Niro"}]
        }]})
    );
    assert_eq!(store.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_values_are_normalised() {
    let store = CannedStore::new(
        "this",
        json!({
            "released": "2020-05-01T14:30:00+02:00",
            "runtime": "PT110M",
            "location": {"longitude": 13.4, "latitude": 52.5},
            "views": 9007199254740993_i64,
            "tags": ["crime", "heist"]
        }),
    );
    let response = execute(
        store,
        json!({
            "field": "movies",
            "selections": [
                {"field": "released"},
                {"field": "runtime"},
                {"field": "location"},
                {"field": "views"},
                {"field": "tags"}
            ]
        }),
    )
    .await;

    assert_eq!(
        response,
        json!({"movies": [{
            "released": "2020-05-01T12:30:00.000Z",
            "runtime": "PT1H50M",
            "location": {"longitude": 13.4, "latitude": 52.5, "height": null, "crs": "wgs-84", "srid": 4326},
            "views": "9007199254740993",
            "tags": ["crime", "heist"]
        }]})
    );
}

#[tokio::test]
async fn test_aggregate_response() {
    let store = CannedStore::new("this", json!({"count": 3}));
    let response = execute(
        store.clone(),
        json!({
            "field": "moviesAggregate",
            "selections": [{"field": "count"}]
        }),
    )
    .await;

    assert_eq!(response, json!({"moviesAggregate": {"count": 3}}));
    assert_eq!(
        store.seen.lock().unwrap()[0],
        "MATCH (this0:Movie)\nRETURN { count: count(this0) } AS this"
    );
}
