use cypherql::result_shaper::{shape, StoreRecord, StoreValue};
use cypherql::{CompiledQuery, TranslatorSettings};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::common::{compile, try_compile};

const TOTAL: u64 = 20;

fn page_request(after: Option<&str>, sort: &str) -> Value {
    let mut arguments = json!({"first": 5, "sort": [{"title": sort}]});
    if let Some(cursor) = after {
        arguments["after"] = json!(cursor);
    }
    json!({
        "field": "moviesConnection",
        "arguments": arguments,
        "selections": [
            {"field": "totalCount"},
            {"field": "edges", "selections": [
                {"field": "cursor"},
                {"field": "node", "selections": [{"field": "title"}]}
            ]},
            {"field": "pageInfo", "selections": [
                {"field": "hasNextPage"},
                {"field": "hasPreviousPage"},
                {"field": "endCursor"}
            ]}
        ]
    })
}

/// Records a store holding `TOTAL` movies would return for the window.
fn store_page(query: &CompiledQuery) -> Vec<StoreRecord> {
    let offset = query.params.get("this0_offset").and_then(Value::as_u64).unwrap_or(0);
    let limit = query.params.get("this0_limit").and_then(Value::as_u64).unwrap_or(TOTAL);
    let edges: Vec<Value> = (offset..(offset + limit).min(TOTAL))
        .map(|i| json!({"node": {"title": format!("Movie {}", i)}}))
        .collect();

    let mut record = HashMap::new();
    record.insert(
        "this".to_string(),
        StoreValue::from(json!({"edges": edges, "totalCount": TOTAL})),
    );
    vec![record]
}

#[test]
fn test_twenty_edges_in_four_windows() {
    let mut after: Option<String> = None;
    let mut titles = Vec::new();
    let mut has_next = Vec::new();

    for _ in 0..4 {
        let query = compile(page_request(after.as_deref(), "ASC"));
        let response = shape(&store_page(&query), &query.plan).unwrap();
        let connection = &response["moviesConnection"];

        assert_eq!(connection["totalCount"], json!(TOTAL));
        for edge in connection["edges"].as_array().unwrap() {
            titles.push(edge["node"]["title"].as_str().unwrap().to_string());
        }
        has_next.push(connection["pageInfo"]["hasNextPage"].as_bool().unwrap());
        after = connection["pageInfo"]["endCursor"].as_str().map(str::to_string);
    }

    let expected: Vec<String> = (0..TOTAL).map(|i| format!("Movie {}", i)).collect();
    assert_eq!(titles, expected);
    assert_eq!(has_next, vec![true, true, true, false]);
}

#[test]
fn test_edge_cursors_continue_the_window() {
    let first = compile(page_request(None, "ASC"));
    let response = shape(&store_page(&first), &first.plan).unwrap();
    let edges = response["moviesConnection"]["edges"].as_array().unwrap();
    let third = edges[2]["cursor"].as_str().unwrap();

    let next = compile(page_request(Some(third), "ASC"));
    assert_eq!(next.params["this0_offset"], json!(3));
    assert_eq!(next.params["this0_limit"], json!(5));
}

#[test]
fn test_cursor_from_another_ordering_gives_an_empty_page() {
    let first = compile(page_request(None, "ASC"));
    let response = shape(&store_page(&first), &first.plan).unwrap();
    let cursor = response["moviesConnection"]["pageInfo"]["endCursor"]
        .as_str()
        .unwrap()
        .to_string();

    let resorted = compile(page_request(Some(&cursor), "DESC"));
    assert_eq!(resorted.params["this0_limit"], json!(0));

    let response = shape(&store_page(&resorted), &resorted.plan).unwrap();
    let connection = &response["moviesConnection"];
    assert_eq!(connection["edges"], json!([]));
    assert_eq!(connection["pageInfo"]["hasNextPage"], json!(false));
    assert_eq!(connection["pageInfo"]["hasPreviousPage"], json!(true));
    assert_eq!(connection["pageInfo"]["endCursor"], Value::Null);
}

#[test]
fn test_max_limit_clamps_requests() {
    let settings = TranslatorSettings {
        max_limit: Some(3),
        ..TranslatorSettings::default()
    };
    let query = try_compile(
        json!({"field": "movies", "arguments": {"limit": 10}, "selections": [{"field": "title"}]}),
        &settings,
    )
    .unwrap();
    assert_eq!(query.params["this_limit"], json!(3));

    // a max without a default still bounds the page
    let query = try_compile(
        json!({"field": "movies", "selections": [{"field": "title"}]}),
        &settings,
    )
    .unwrap();
    assert_eq!(query.params["this_limit"], json!(3));
}

#[test]
fn test_global_max_leaves_nested_lists_whole() {
    let settings = TranslatorSettings {
        max_limit: Some(100),
        ..TranslatorSettings::default()
    };
    let actors = |arguments: Value| {
        json!({
            "field": "movies",
            "selections": [{"field": "actors", "arguments": arguments, "selections": [{"field": "name"}]}]
        })
    };

    let query = try_compile(actors(json!({})), &settings).unwrap();
    assert_eq!(query.params["this_limit"], json!(100));
    assert!(query.params.get("this0_limit").is_none());

    let query = try_compile(actors(json!({"limit": 500})), &settings).unwrap();
    assert_eq!(query.params["this0_limit"], json!(100));
}

#[test]
fn test_negative_limit_is_rejected() {
    let err = try_compile(
        json!({"field": "movies", "arguments": {"limit": -1}, "selections": [{"field": "title"}]}),
        &TranslatorSettings::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("limit"));
}
