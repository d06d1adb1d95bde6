use serde_json::{json, Value};
use test_case::test_case;

use crate::common::{compile, first_where};

fn movies_where(filter: Value) -> Value {
    json!({
        "field": "movies",
        "arguments": {"where": filter},
        "selections": [{"field": "title"}]
    })
}

#[test_case(json!({"title": {"eq": "Heat"}}); "equality")]
#[test_case(json!({"rating": {"gte": 7.5}, "tags": {"includes": "noir"}}); "conjunction")]
#[test_case(json!({"OR": [{"title": {"startsWith": "The"}}, {"views": {"lt": 10}}]}); "disjunction")]
#[test_case(json!({"actors": {"some": {"node": {"name": {"eq": "Keanu"}}}}}); "some quantifier")]
#[test_case(json!({"actors": {"single": {"edge": {"role": {"eq": "Neo"}}}}}); "single quantifier")]
#[test_case(json!({"released": {"lt": "2000-01-01T00:00:00Z"}}); "temporal")]
fn test_not_is_the_complement(filter: Value) {
    let plain = compile(movies_where(filter.clone()));
    let negated = compile(movies_where(json!({"NOT": filter})));

    assert_eq!(
        first_where(&negated.cypher),
        format!("NOT ({})", first_where(&plain.cypher))
    );
    assert_eq!(plain.params, negated.params);
}

#[test]
fn test_quantifier_shapes() {
    let query = |q: &str| {
        compile(movies_where(
            json!({"actors": {q: {"node": {"name": {"eq": "Keanu"}}}}}),
        ))
    };
    let some = query("some");
    assert_eq!(
        first_where(&some.cypher),
        "EXISTS { MATCH (this)<-[this1:ACTED_IN]-(this0:Actor) WHERE this0.name = $this0_name_eq }"
    );
    assert_eq!(
        first_where(&query("none").cypher),
        format!("NOT ({})", first_where(&some.cypher))
    );
    assert_eq!(
        first_where(&query("all").cypher),
        "NOT (EXISTS { MATCH (this)<-[this1:ACTED_IN]-(this0:Actor) WHERE NOT (this0.name = $this0_name_eq) })"
    );
    assert_eq!(
        first_where(&query("single").cypher),
        "COUNT { MATCH (this)<-[this1:ACTED_IN]-(this0:Actor) WHERE this0.name = $this0_name_eq } = 1"
    );
}

// Over a movie with no actors: SOME false, NONE true, ALL true, SINGLE false.
// ALL holds vacuously because it is compiled as "no related node violates P".
#[test]
fn test_all_is_vacuously_true() {
    let all = compile(movies_where(json!({"actors": {"all": {}}})));
    assert!(!all.cypher.contains("WHERE"));

    let all = compile(movies_where(
        json!({"actors": {"all": {"node": {"name": {"eq": "Keanu"}}}}}),
    ));
    assert!(first_where(&all.cypher).starts_with("NOT (EXISTS {"));
}

#[test]
fn test_empty_connectives() {
    assert!(!compile(movies_where(json!({}))).cypher.contains("WHERE"));
    assert_eq!(first_where(&compile(movies_where(json!({"OR": []}))).cypher), "false");
    assert_eq!(first_where(&compile(movies_where(json!({"NOT": {}}))).cypher), "false");
}

#[test_case("shortestLength", "min(size(this1.role))"; "shortest length")]
#[test_case("longestLength", "max(size(this1.role))"; "longest length")]
#[test_case("averageLength", "avg(size(this1.role))"; "average length")]
fn test_string_aggregates_compare_lengths(function: &str, expected: &str) {
    let query = compile(movies_where(
        json!({"actorsAggregate": {"edge": {"role": {function: {"gt": 3}}}}}),
    ));
    assert!(query.cypher.contains(expected), "{}", query.cypher);
    assert_eq!(first_where(&query.cypher), "var2 = true");
}

#[test]
fn test_aggregate_count_runs_before_the_filter() {
    let query = compile(movies_where(json!({"actorsAggregate": {"count": {"gt": 2}}})));
    let lines: Vec<&str> = query.cypher.lines().collect();
    assert_eq!(lines[0], "MATCH (this:Movie)");
    assert_eq!(lines[1], "CALL {");
    assert!(query.cypher.contains("WITH * WHERE var1 = true"));
    assert_eq!(query.params["this_actors_count_gt"], json!(2));
}

#[test]
fn test_filter_values_are_parameters() {
    let injection = "x' OR 1=1 //";
    let query = compile(movies_where(json!({"title": {"eq": injection}})));
    assert!(!query.cypher.contains(injection));
    assert_eq!(query.params["this_title_eq"], json!(injection));
}
