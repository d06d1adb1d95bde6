use cypherql::{
    translate, AuthPredicates, CompiledQuery, SchemaModel, SelectionTree, TranslatorError,
    TranslatorSettings,
};
use serde_json::Value;

pub const MOVIES_SCHEMA: &str = include_str!("../../fixtures/movies_schema.yaml");

pub fn movies_schema() -> SchemaModel {
    SchemaModel::from_yaml_str(MOVIES_SCHEMA).expect("fixture schema should build")
}

pub fn try_compile(request: Value, settings: &TranslatorSettings) -> Result<CompiledQuery, TranslatorError> {
    let selection: SelectionTree = serde_json::from_value(request).expect("valid request");
    translate(&movies_schema(), &selection, &AuthPredicates::default(), settings)
}

pub fn compile(request: Value) -> CompiledQuery {
    try_compile(request, &TranslatorSettings::default()).expect("request should compile")
}

/// Condition of the first `WHERE` in the statement, up to the end of its line.
pub fn first_where(cypher: &str) -> &str {
    let start = cypher.find(" WHERE ").map(|i| i + 7).unwrap_or(cypher.len());
    let rest = &cypher[start..];
    rest.split('\n').next().unwrap_or_default()
}
