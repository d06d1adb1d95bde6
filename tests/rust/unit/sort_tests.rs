use cypherql::TranslatorError;
use serde_json::{json, Value};

use crate::common::{compile, try_compile};

fn sorted(field: &str, sort: Value) -> Value {
    json!({
        "field": field,
        "arguments": {"sort": sort},
        "selections": [{"field": "title"}]
    })
}

#[test]
fn test_keys_apply_in_request_order() {
    let query = compile(sorted("movies", json!([{"title": "ASC"}, {"released": "DESC"}])));
    assert!(query
        .cypher
        .contains("WITH * ORDER BY this.title ASC, this.released DESC"));

    let query = compile(sorted("movies", json!([{"released": "DESC"}, {"title": "ASC"}])));
    assert!(query
        .cypher
        .contains("WITH * ORDER BY this.released DESC, this.title ASC"));
}

#[test]
fn test_sort_by_relationship_count() {
    let query = compile(sorted("movies", json!([{"actorsAggregate": {"count": "DESC"}}])));
    assert!(query.cypher.contains(
        "MATCH (this)<-[:ACTED_IN]-(this0:Actor)\n    RETURN count(this0) AS var1\n}\nWITH * ORDER BY var1 DESC"
    ));
}

#[test]
fn test_sort_by_aliased_field_reads_the_stored_property() {
    let query = compile(sorted("movies", json!([{"rating": "DESC"}])));
    assert!(query.cypher.contains("ORDER BY this.imdbRating DESC"));
}

#[test]
fn test_polymorphic_sort_drops_keys_missing_from_a_branch() {
    let query = compile(sorted("productions", json!([{"episodes": "ASC"}])));
    assert!(!query.cypher.contains("ORDER BY"));
    assert!(!query.cypher.contains("__sort"));
}

#[test]
fn test_polymorphic_sort_rejects_per_branch_subqueries() {
    let err = try_compile(
        sorted("productions", json!([{"score": "ASC"}])),
        &Default::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TranslatorError::InvalidSort { .. }));
}

#[test]
fn test_invalid_direction() {
    let err = try_compile(sorted("movies", json!([{"title": "UP"}])), &Default::default())
        .unwrap_err();
    assert!(matches!(err, TranslatorError::InvalidSort { .. }));
}

#[test]
fn test_connection_sorts_by_node_then_edge() {
    let query = compile(json!({
        "field": "movies",
        "selections": [{
            "field": "actorsConnection",
            "arguments": {"sort": [{"node": {"name": "ASC"}}, {"edge": {"screenTime": "DESC"}}]},
            "selections": [{"field": "edges", "selections": [{"field": "node", "selections": [{"field": "name"}]}]}]
        }]
    }));
    assert!(query
        .cypher
        .contains("WITH * ORDER BY this0.name ASC, this1.screenTime DESC"));
}
