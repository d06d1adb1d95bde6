//! Execution seam: compile a selection, run it with one store call and
//! shape the records.
//!
//! The store itself is behind [`GraphStore`]; no driver is bundled.

pub mod errors;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cypher::ParamMap;
use crate::result_shaper::{self, StoreRecord};
use crate::schema_model::SchemaModel;
use crate::selection::SelectionTree;
use crate::translator::{self, AuthPredicates, CompiledQuery, TranslatorSettings};

pub use errors::{ExecutorError, StoreError};

/// A graph store able to run one parameterized Cypher statement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn run(&self, cypher: &str, params: &ParamMap) -> Result<Vec<StoreRecord>, StoreError>;
}

pub struct Executor {
    schema: Arc<SchemaModel>,
    store: Arc<dyn GraphStore>,
    settings: TranslatorSettings,
    timeout: Option<Duration>,
}

impl Executor {
    pub fn new(schema: Arc<SchemaModel>, store: Arc<dyn GraphStore>) -> Self {
        Executor {
            schema,
            store,
            settings: TranslatorSettings::default(),
            timeout: None,
        }
    }

    pub fn with_settings(mut self, settings: TranslatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// Compile without touching the store.
    pub fn translate(
        &self,
        selection: &SelectionTree,
        auth: &AuthPredicates,
    ) -> Result<CompiledQuery, ExecutorError> {
        Ok(translator::translate(
            &self.schema,
            selection,
            auth,
            &self.settings,
        )?)
    }

    pub async fn execute(
        &self,
        selection: &SelectionTree,
        auth: &AuthPredicates,
    ) -> Result<Value, ExecutorError> {
        self.execute_with_cancel(selection, auth, std::future::pending())
            .await
    }

    /// Like [`Executor::execute`], abandoning the store call as soon as
    /// `cancel` resolves. The store future is dropped, which releases
    /// whatever handle it holds.
    pub async fn execute_with_cancel<C>(
        &self,
        selection: &SelectionTree,
        auth: &AuthPredicates,
        cancel: C,
    ) -> Result<Value, ExecutorError>
    where
        C: Future<Output = ()>,
    {
        let compiled = self.translate(selection, auth)?;
        log::info!(
            "running `{}` ({} parameters)",
            selection.response_key(),
            compiled.params.len()
        );

        let records = tokio::select! {
            biased;
            _ = cancel => {
                log::info!("request `{}` cancelled", selection.response_key());
                return Err(ExecutorError::Cancelled);
            }
            result = self.run(&compiled) => result?,
        };
        log::debug!("store returned {} record(s)", records.len());

        Ok(result_shaper::shape(&records, &compiled.plan)?)
    }

    async fn run(&self, compiled: &CompiledQuery) -> Result<Vec<StoreRecord>, ExecutorError> {
        let call = self.store.run(&compiled.cypher, &compiled.params);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                log::warn!("statement timed out after {:?}", limit);
                ExecutorError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => call.await,
        };
        result.map_err(|e| ExecutorError::from_store(e, &self.settings.forbidden_marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_shaper::StoreValue;
    use crate::schema_model::test_fixtures::movies_schema;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn movie_record(title: &str) -> StoreRecord {
        let mut node = BTreeMap::new();
        node.insert("title".to_string(), StoreValue::String(title.to_string()));
        let mut record = HashMap::new();
        record.insert("this".to_string(), StoreValue::Map(node));
        record
    }

    fn titles() -> SelectionTree {
        SelectionTree::new("movies").with_selections(vec![SelectionTree::new("title")])
    }

    #[tokio::test]
    async fn test_execute_makes_one_store_call() {
        let mut store = MockGraphStore::new();
        store
            .expect_run()
            .withf(|cypher, params| {
                cypher.to_string() == "MATCH (this:Movie)\nRETURN this { .title } AS this"
                    && params.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(vec![movie_record("Heat"), movie_record("Ronin")]));

        let executor = Executor::new(Arc::new(movies_schema()), Arc::new(store));
        let response = executor
            .execute(&titles(), &AuthPredicates::default())
            .await
            .unwrap();
        assert_eq!(
            response,
            json!({"movies": [{"title": "Heat"}, {"title": "Ronin"}]})
        );
    }

    #[tokio::test]
    async fn test_compile_errors_never_reach_the_store() {
        let mut store = MockGraphStore::new();
        store.expect_run().times(0);

        let executor = Executor::new(Arc::new(movies_schema()), Arc::new(store));
        let selection = SelectionTree::new("movies")
            .with_selections(vec![SelectionTree::new("budget")]);
        let err = executor
            .execute(&selection, &AuthPredicates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Translate(_)));
    }

    #[tokio::test]
    async fn test_forbidden_store_error_is_authorization() {
        let mut store = MockGraphStore::new();
        store.expect_run().returning(|_, _| {
            Err(StoreError::Query {
                message: "CYPHERQL_FORBIDDEN".to_string(),
                code: None,
            })
        });

        let executor = Executor::new(Arc::new(movies_schema()), Arc::new(store));
        let err = executor
            .execute(&titles(), &AuthPredicates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Authorization { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let mut store = MockGraphStore::new();
        store.expect_run().returning(|_, _| Ok(Vec::new()));

        let executor = Executor::new(Arc::new(movies_schema()), Arc::new(store));
        let err = executor
            .execute_with_cancel(&titles(), &AuthPredicates::default(), async {})
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Cancelled);
    }
}
