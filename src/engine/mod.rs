//! Query engine.
//!
//! A [`QueryEngine`] binds an immutable schema, its graph and the link
//! evaluators. Each call to [`QueryEngine::find`] runs a fresh query over the
//! supplied facts; queries share nothing mutable, so one engine can serve many
//! threads. A schema change means building a new engine.

/// Bounded worker pool executing queries off the caller's thread.
pub mod runtime;

use std::sync::Arc;

use tracing::{debug, info_span};

use crate::config::EngineConfig;
use crate::context::{CancellationToken, FactContext};
use crate::error::WeftResult;
use crate::evaluator::EvaluatorRegistry;
use crate::graph::SchemaGraph;
use crate::instance::{self, TypedInstance};
use crate::invoke::OperationInvoker;
use crate::query::{QueryResult, QuerySpecTypeNode};
use crate::schema::Schema;
use crate::types::Type;

/// Resolves typed instances from facts against a fixed schema.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    schema: Arc<Schema>,
    graph: Arc<SchemaGraph>,
    evaluators: Arc<EvaluatorRegistry>,
    config: Arc<EngineConfig>,
}

impl QueryEngine {
    /// Creates an engine with the standard evaluators, invoking operations
    /// through `invoker`.
    pub fn new(
        schema: Arc<Schema>,
        invoker: Arc<dyn OperationInvoker>,
        config: EngineConfig,
    ) -> WeftResult<Self> {
        Self::with_evaluators(schema, EvaluatorRegistry::standard(invoker), config)
    }

    /// Creates an engine with a caller-supplied evaluator table.
    pub fn with_evaluators(
        schema: Arc<Schema>,
        evaluators: EvaluatorRegistry,
        config: EngineConfig,
    ) -> WeftResult<Self> {
        config.validate()?;
        let graph = SchemaGraph::build(Arc::clone(&schema))?;
        debug!(
            schema_version = %schema.version(),
            links = graph.link_count(),
            "query engine ready"
        );
        Ok(Self {
            schema,
            graph: Arc::new(graph),
            evaluators: Arc::new(evaluators),
            config: Arc::new(config),
        })
    }

    /// The schema this engine was built for.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The graph derived from the schema.
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A query context over `facts`.
    #[must_use]
    pub fn context(&self, facts: Vec<TypedInstance>) -> FactContext {
        self.context_with_cancellation(facts, CancellationToken::new())
    }

    /// A query context whose queries stop when `cancellation` fires.
    #[must_use]
    pub fn context_with_cancellation(
        &self,
        facts: Vec<TypedInstance>,
        cancellation: CancellationToken,
    ) -> FactContext {
        FactContext::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.evaluators),
            Arc::clone(&self.config),
            facts,
            cancellation,
        )
    }

    /// Resolves each of `targets` from `facts`.
    ///
    /// Targets that cannot be reached are absent in the result, not errors.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use weftql::{EngineConfig, InMemoryInvoker, QueryEngine, Schema, Type};
    ///
    /// let schema = Arc::new(
    ///     Schema::builder()
    ///         .add_type(Type::named("acme.Name").inherits("core.String").build().unwrap())
    ///         .add_type(Type::named("acme.FirstName").inherits("acme.Name").build().unwrap())
    ///         .build()
    ///         .unwrap(),
    /// );
    /// let engine = QueryEngine::new(Arc::clone(&schema), Arc::new(InMemoryInvoker::new()), EngineConfig::default()).unwrap();
    /// let fact = engine.parse_fact("acme.FirstName", &serde_json::json!("Jimmy")).unwrap();
    /// let result = engine.find(vec![fact], &[schema.type_by_name("acme.Name").unwrap()]).unwrap();
    /// assert!(result.is_fully_resolved());
    /// ```
    pub fn find(&self, facts: Vec<TypedInstance>, targets: &[Arc<Type>]) -> WeftResult<QueryResult> {
        self.find_with_cancellation(facts, targets, CancellationToken::new())
    }

    /// Like [`QueryEngine::find`], with targets given by name.
    pub fn find_by_name(&self, facts: Vec<TypedInstance>, targets: &[&str]) -> WeftResult<QueryResult> {
        let targets = targets
            .iter()
            .map(|name| self.schema.type_by_name(name))
            .collect::<WeftResult<Vec<_>>>()?;
        self.find(facts, &targets)
    }

    /// Like [`QueryEngine::find`], stopping early once `cancellation` fires.
    pub fn find_with_cancellation(
        &self,
        facts: Vec<TypedInstance>,
        targets: &[Arc<Type>],
        cancellation: CancellationToken,
    ) -> WeftResult<QueryResult> {
        let span = info_span!("query", facts = facts.len(), targets = targets.len());
        let _entered = span.enter();

        let nodes = targets.iter().cloned().map(QuerySpecTypeNode::new).collect();
        let result = self.context_with_cancellation(facts, cancellation).resolve(nodes)?;
        debug!(
            query_id = %result.query_id,
            resolved = result.results.len() - result.unmatched_nodes().len(),
            unmatched = result.unmatched_nodes().len(),
            "query finished"
        );
        Ok(result)
    }

    /// Reads `value` as an instance of the named type.
    pub fn parse_fact(&self, type_name: &str, value: &serde_json::Value) -> WeftResult<TypedInstance> {
        let ty = self.schema.type_by_name(type_name)?;
        instance::from_value(&self.schema, &ty, value)
    }
}
