use async_trait::async_trait;
use cypherql::cypher::ParamMap;
use cypherql::result_shaper::{StoreRecord, StoreValue};
use cypherql::translator::{AuthMode, AuthRule};
use cypherql::{
    AuthPredicates, Executor, ExecutorError, GraphStore, SchemaModel, SelectionTree, StoreError,
    TranslatorSettings,
};
use mockall::mock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MOVIES_SCHEMA: &str = include_str!("../../fixtures/movies_schema.yaml");

mock! {
    pub Store {}

    #[async_trait]
    impl GraphStore for Store {
        async fn run(&self, cypher: &str, params: &ParamMap) -> Result<Vec<StoreRecord>, StoreError>;
    }
}

fn schema() -> Arc<SchemaModel> {
    Arc::new(SchemaModel::from_yaml_str(MOVIES_SCHEMA).unwrap())
}

fn titles() -> SelectionTree {
    serde_json::from_value(json!({
        "field": "movies",
        "arguments": {"where": {"title": {"contains": "a"}}},
        "selections": [{"field": "title"}]
    }))
    .unwrap()
}

fn released_only() -> AuthPredicates {
    AuthPredicates::new(vec![AuthRule {
        entity: "Production".to_string(),
        mode: AuthMode::Filter,
        predicate: json!({"status": {"eq": "released"}}),
    }])
}

/// Sleeps well past any test timeout; records whether its future was dropped.
struct SlowStore {
    dropped: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphStore for SlowStore {
    async fn run(&self, _cypher: &str, _params: &ParamMap) -> Result<Vec<StoreRecord>, StoreError> {
        let _flag = DropFlag(self.dropped.clone());
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_filter_rules_are_merged_into_the_match() {
    let executor = Executor::new(schema(), Arc::new(MockStore::new()));
    let compiled = executor.translate(&titles(), &released_only()).unwrap();

    assert!(compiled.cypher.starts_with(
        "MATCH (this:Movie) WHERE this.title CONTAINS $this_title_contains AND coalesce(this.status, $this_status_default) = $this_status_eq"
    ));
    assert_eq!(compiled.params["this_status_eq"], json!("released"));
}

#[tokio::test]
async fn test_store_receives_the_compiled_statement() {
    let executor_schema = schema();
    let expected = Executor::new(executor_schema.clone(), Arc::new(MockStore::new()))
        .translate(&titles(), &AuthPredicates::default())
        .unwrap();

    let mut store = MockStore::new();
    let (cypher, params) = (expected.cypher.clone(), expected.params.clone());
    store
        .expect_run()
        .withf(move |c, p| c.to_string() == cypher && *p == params)
        .times(1)
        .returning(|_, _| {
            let mut record = HashMap::new();
            record.insert("this".to_string(), StoreValue::from(json!({"title": "Heat"})));
            Ok(vec![record])
        });

    let response = Executor::new(executor_schema, Arc::new(store))
        .execute(&titles(), &AuthPredicates::default())
        .await
        .unwrap();
    assert_eq!(response, json!({"movies": [{"title": "Heat"}]}));
}

#[tokio::test]
async fn test_validate_rule_failure_is_forbidden() {
    let mut store = MockStore::new();
    store.expect_run().returning(|cypher, _| {
        if cypher.contains("apoc.util.validatePredicate") {
            Err(StoreError::Query {
                message: "Failed to invoke function: Caused by: java.lang.RuntimeException: NOPE"
                    .to_string(),
                code: None,
            })
        } else {
            Ok(Vec::new())
        }
    });

    let settings = TranslatorSettings {
        forbidden_marker: "NOPE".to_string(),
        ..TranslatorSettings::default()
    };
    let auth = AuthPredicates::new(vec![AuthRule {
        entity: "Movie".to_string(),
        mode: AuthMode::Validate,
        predicate: json!({"status": {"eq": "released"}}),
    }]);
    let err = Executor::new(schema(), Arc::new(store))
        .with_settings(settings)
        .execute(&titles(), &auth)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Authorization { .. }));
}

#[tokio::test]
async fn test_other_store_failures_pass_through() {
    let mut store = MockStore::new();
    store
        .expect_run()
        .returning(|_, _| Err(StoreError::Connection("connection reset".to_string())));

    let err = Executor::new(schema(), Arc::new(store))
        .execute(&titles(), &AuthPredicates::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ExecutorError::StoreExecution(StoreError::Connection("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_timeout() {
    let store = SlowStore {
        dropped: Arc::new(AtomicBool::new(false)),
    };
    let err = Executor::new(schema(), Arc::new(store))
        .with_timeout(Some(Duration::from_millis(20)))
        .execute(&titles(), &AuthPredicates::default())
        .await
        .unwrap_err();
    assert_eq!(err, ExecutorError::Timeout { timeout_ms: 20 });
}

#[tokio::test]
async fn test_cancellation_drops_the_store_call() {
    let dropped = Arc::new(AtomicBool::new(false));
    let store = SlowStore {
        dropped: dropped.clone(),
    };
    let executor = Executor::new(schema(), Arc::new(store));

    let err = executor
        .execute_with_cancel(
            &titles(),
            &AuthPredicates::default(),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ExecutorError::Cancelled);
    assert!(dropped.load(Ordering::SeqCst));
}
