use cypherql::result_shaper::{shape, ShapeError, StoreRecord, StoreValue};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::common::compile;

fn row(value: Value) -> StoreRecord {
    let mut record = HashMap::new();
    record.insert("this".to_string(), StoreValue::from(value));
    record
}

#[test]
fn test_union_member_filters_apply_to_their_branch_only() {
    let query = compile(json!({
        "field": "searchResults",
        "arguments": {"where": {"Movie": {"title": {"eq": "Heat"}}}},
        "selections": [
            {"field": "__typename"},
            {"field": "title", "on": "Movie"}
        ]
    }));
    assert!(query
        .cypher
        .contains("MATCH (this0:Movie) WHERE this0.title = $this0_title_eq"));
    assert!(query
        .cypher
        .contains("MATCH (this1:Series:Searchable)\n    RETURN this1 { __labels: labels(this1) } AS this"));
}

#[test]
fn test_union_results_resolve_their_type_from_labels() {
    let query = compile(json!({
        "field": "searchResults",
        "selections": [
            {"field": "__typename"},
            {"field": "title", "on": "Movie"},
            {"field": "episodes", "on": "Series"}
        ]
    }));
    let records = vec![
        row(json!({"title": "Heat", "__labels": ["Movie"]})),
        row(json!({"episodes": 8, "__labels": ["Series", "Searchable"]})),
    ];
    let response = shape(&records, &query.plan).unwrap();
    assert_eq!(
        response,
        json!({"searchResults": [
            {"__typename": "Movie", "title": "Heat"},
            {"__typename": "Series", "episodes": 8}
        ]})
    );

    let unknown = vec![row(json!({"__labels": ["Documentary"]}))];
    assert!(matches!(
        shape(&unknown, &query.plan),
        Err(ShapeError::UnresolvedType { .. })
    ));
}

#[test]
fn test_edge_filters_only_touch_the_declaring_properties_type() {
    let query = compile(json!({
        "field": "productions",
        "arguments": {"where": {"actors": {"some": {"edge": {"screenTime": {"gt": 10}}}}}},
        "selections": [{"field": "title"}]
    }));
    assert!(query.cypher.contains(
        "MATCH (this0:Movie) WHERE EXISTS { MATCH (this0)<-[this2:ACTED_IN]-(this1:Actor) WHERE this2.screenTime > $this2_screenTime_gt }"
    ));
    assert!(query.cypher.contains(
        "MATCH (this3:Series:Searchable) WHERE EXISTS { MATCH (this3)<-[this5:STARRED_IN]-(this4:Actor) }"
    ));
}

#[test]
fn test_edge_properties_project_per_type() {
    let query = compile(json!({
        "field": "productions",
        "selections": [{
            "field": "actorsConnection",
            "selections": [{"field": "edges", "selections": [{"field": "properties", "selections": [
                {"field": "role"},
                {"field": "screenTime", "on": "ActedIn"},
                {"field": "episodeNr", "on": "StarredIn"}
            ]}]}]
        }]
    }));
    assert!(query.cypher.contains(".role, .screenTime, __type: \"ActedIn\" }"));
    assert!(query.cypher.contains(".role, .episodeNr, __type: \"StarredIn\" }"));
    assert!(!query.cypher.contains("episodeNr, __type: \"ActedIn\""));
}
