//! The standard query context.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::{CancellationToken, DiagnosticTrace, QueryContext, TraceEventKind};
use crate::config::EngineConfig;
use crate::error::WeftResult;
use crate::evaluator::EvaluatorRegistry;
use crate::graph::{Path, SchemaGraph};
use crate::instance::TypedInstance;
use crate::name::QualifiedName;
use crate::query::{QueryId, QueryResult, QuerySpecTypeNode};
use crate::resolve::GraphResolutionStrategy;
use crate::schema::{OperationName, Schema};
use crate::types::Type;

/// A query over a fixed set of facts.
///
/// Cloning is cheap: everything but the exclusion set is shared. Nested
/// queries are clones one level deeper with extra exclusions.
#[derive(Debug, Clone)]
pub struct FactContext {
    schema: Arc<Schema>,
    graph: Arc<SchemaGraph>,
    evaluators: Arc<EvaluatorRegistry>,
    config: Arc<EngineConfig>,
    facts: Arc<Vec<TypedInstance>>,
    trace: Arc<DiagnosticTrace>,
    cancellation: CancellationToken,
    excluded_operations: BTreeSet<OperationName>,
    depth: usize,
}

impl FactContext {
    pub(crate) fn new(
        graph: Arc<SchemaGraph>,
        evaluators: Arc<EvaluatorRegistry>,
        config: Arc<EngineConfig>,
        facts: Vec<TypedInstance>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            schema: Arc::clone(graph.schema()),
            graph,
            evaluators,
            config,
            facts: Arc::new(facts),
            trace: Arc::new(DiagnosticTrace::new()),
            cancellation,
            excluded_operations: BTreeSet::new(),
            depth: 0,
        }
    }

    /// Resolves `nodes` against this context's facts.
    pub fn resolve(&self, nodes: Vec<QuerySpecTypeNode>) -> WeftResult<QueryResult> {
        let started_at = Utc::now();
        let mark = self.trace.len();
        let results = GraphResolutionStrategy::new(&self.evaluators).resolve(self, &nodes)?;
        Ok(QueryResult {
            query_id: QueryId::new(),
            schema_version: self.schema.version().clone(),
            results,
            started_at,
            finished_at: Utc::now(),
            diagnostics: self.trace.since(mark),
        })
    }

    /// Operations nested queries from this context may not invoke.
    pub fn excluded_operations(&self) -> &BTreeSet<OperationName> {
        &self.excluded_operations
    }

    fn nested(&self, target: &Arc<Type>, exclude: Option<&OperationName>) -> WeftResult<QueryResult> {
        let mut nested = self.clone();
        nested.depth += 1;
        if let Some(operation) = exclude {
            nested.excluded_operations.insert(operation.clone());
        }
        let node = QuerySpecTypeNode::new(Arc::clone(target));

        if nested.depth > self.config.max_nested_query_depth {
            debug!(target = %target.name(), depth = nested.depth, "nested query depth exceeded");
            self.record(
                TraceEventKind::NestedQuery,
                format!(
                    "nested query for {} skipped: depth {} exceeds {}",
                    target.name(),
                    nested.depth,
                    self.config.max_nested_query_depth
                ),
            );
            let now = Utc::now();
            return Ok(QueryResult {
                query_id: QueryId::new(),
                schema_version: self.schema.version().clone(),
                results: vec![(node, None)],
                started_at: now,
                finished_at: now,
                diagnostics: Vec::new(),
            });
        }

        self.record(
            TraceEventKind::NestedQuery,
            match exclude {
                Some(operation) => format!("nested query for {} excluding {operation}", target.name()),
                None => format!("nested query for {}", target.name()),
            },
        );
        nested.resolve(vec![node])
    }
}

impl QueryContext for FactContext {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn facts(&self) -> &[TypedInstance] {
        &self.facts
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn is_excluded(&self, operation: &OperationName) -> bool {
        self.excluded_operations.contains(operation)
    }

    fn find_path(&self, start: &QualifiedName, target: &QualifiedName) -> Path {
        self.graph.find_path(start, target, &self.excluded_operations)
    }

    fn find(&self, target: &Arc<Type>) -> WeftResult<QueryResult> {
        self.nested(target, None)
    }

    fn find_excluding(&self, target: &Arc<Type>, operation: &OperationName) -> WeftResult<QueryResult> {
        self.nested(target, Some(operation))
    }

    fn trace(&self) -> &DiagnosticTrace {
        &self.trace
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn with_facts(&self, facts: Vec<TypedInstance>) -> Box<dyn QueryContext> {
        let mut scoped = self.clone();
        scoped.facts = Arc::new(facts);
        Box::new(scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FactDiscoveryStrategy, TypeMatchingStrategy};
    use crate::invoke::InMemoryInvoker;
    use crate::schema::Service;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .add_type(Type::named("acme.Name").inherits("core.String").build().unwrap())
                .add_type(Type::named("acme.FirstName").inherits("acme.Name").build().unwrap())
                .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
                .add_type(
                    Type::named("acme.Customer")
                        .attribute("name", "acme.FirstName")
                        .attribute("orderId", "acme.OrderId")
                        .build()
                        .unwrap(),
                )
                .add_type(
                    Type::named("acme.Order")
                        .attribute("id", "acme.OrderId")
                        .attribute("status", "core.String")
                        .build()
                        .unwrap(),
                )
                .add_service(
                    Service::new(QualifiedName::parse("acme.OrderService").unwrap())
                        .operation("getOrder", &["acme.OrderId"], "acme.Order")
                        .unwrap(),
                )
                .build()
                .unwrap(),
        )
    }

    fn context(schema: &Arc<Schema>, facts: Vec<TypedInstance>) -> FactContext {
        let graph = Arc::new(SchemaGraph::build(Arc::clone(schema)).unwrap());
        let evaluators = Arc::new(EvaluatorRegistry::standard(Arc::new(InMemoryInvoker::new())));
        FactContext::new(graph, evaluators, Arc::new(EngineConfig::default()), facts, CancellationToken::new())
    }

    fn customer(schema: &Schema, name: &str, id: i64) -> TypedInstance {
        crate::instance::from_value(
            schema,
            &schema.type_by_name("acme.Customer").unwrap(),
            &serde_json::json!({"name": name, "orderId": id}),
        )
        .unwrap()
    }

    #[test]
    fn top_level_only_ignores_nested_values() {
        let schema = schema();
        let ctx = context(&schema, vec![customer(&schema, "Jimmy", 1)]);
        let id = schema.type_by_name("acme.OrderId").unwrap();
        assert!(ctx
            .get_fact(&id, FactDiscoveryStrategy::TopLevelOnly, TypeMatchingStrategy::Exact)
            .is_none());
        let found = ctx
            .get_fact(&id, FactDiscoveryStrategy::AnyDepthExpectOne, TypeMatchingStrategy::Exact)
            .unwrap();
        assert_eq!(found.value().unwrap().as_int(), Some(1));
    }

    #[test]
    fn any_depth_expect_one_rejects_duplicates() {
        let schema = schema();
        let ctx = context(&schema, vec![customer(&schema, "Jimmy", 1), customer(&schema, "Jimmy", 1)]);
        let id = schema.type_by_name("acme.OrderId").unwrap();
        assert!(ctx
            .get_fact(&id, FactDiscoveryStrategy::AnyDepthExpectOne, TypeMatchingStrategy::Exact)
            .is_none());
        // Equal values count once.
        assert!(ctx
            .get_fact(&id, FactDiscoveryStrategy::AnyDepthExpectOneDistinct, TypeMatchingStrategy::Exact)
            .is_some());
    }

    #[test]
    fn distinct_values_are_ambiguous() {
        let schema = schema();
        let ctx = context(&schema, vec![customer(&schema, "Jimmy", 1), customer(&schema, "Jimmy", 2)]);
        let id = schema.type_by_name("acme.OrderId").unwrap();
        assert!(ctx
            .get_fact(&id, FactDiscoveryStrategy::AnyDepthExpectOneDistinct, TypeMatchingStrategy::Exact)
            .is_none());
    }

    #[test]
    fn exact_match_breaks_assignable_ambiguity() {
        let schema = schema();
        let first = crate::instance::from_value(
            &schema,
            &schema.type_by_name("acme.FirstName").unwrap(),
            &serde_json::json!("Jimmy"),
        )
        .unwrap();
        let name = crate::instance::from_value(&schema, &schema.type_by_name("acme.Name").unwrap(), &serde_json::json!("Smith"))
            .unwrap();
        let ctx = context(&schema, vec![first, name]);
        let name_ty = schema.type_by_name("acme.Name").unwrap();
        let found = ctx
            .get_fact(&name_ty, FactDiscoveryStrategy::AnyDepthExpectOneDistinct, TypeMatchingStrategy::Assignable)
            .unwrap();
        assert_eq!(found.value().unwrap().as_string(), Some("Smith"));
    }

    #[test]
    fn empty_strings_are_absent() {
        let schema = schema();
        let empty = crate::instance::from_value(&schema, &schema.type_by_name("acme.Name").unwrap(), &serde_json::json!(""))
            .unwrap();
        let ctx = context(&schema, vec![empty]);
        let name_ty = schema.type_by_name("acme.Name").unwrap();
        assert!(!ctx.has_fact_of_type(&name_ty, FactDiscoveryStrategy::TopLevelOnly));
    }

    #[test]
    fn nested_queries_stop_at_depth_limit() {
        let schema = schema();
        let graph = Arc::new(SchemaGraph::build(Arc::clone(&schema)).unwrap());
        let evaluators = Arc::new(EvaluatorRegistry::standard(Arc::new(InMemoryInvoker::new())));
        let config = EngineConfig {
            max_nested_query_depth: 0,
            ..EngineConfig::default()
        };
        let ctx = FactContext::new(graph, evaluators, Arc::new(config), vec![], CancellationToken::new());
        let name_ty = schema.type_by_name("acme.Name").unwrap();
        let result = ctx.find(&name_ty).unwrap();
        assert!(!result.is_fully_resolved());
        assert!(ctx
            .trace()
            .snapshot()
            .iter()
            .any(|e| e.kind == TraceEventKind::NestedQuery && e.message.contains("skipped")));
    }

    #[test]
    fn with_facts_swaps_facts_and_shares_trace() {
        let schema = schema();
        let mut ctx = context(&schema, vec![customer(&schema, "Jimmy", 1)]);
        let op = OperationName::parse("acme.OrderService@@getOrder").unwrap();
        ctx.excluded_operations.insert(op.clone());

        let scoped = ctx.with_facts(vec![customer(&schema, "Jimmy", 2)]);
        let id = schema.type_by_name("acme.OrderId").unwrap();
        let found = scoped
            .get_fact(&id, FactDiscoveryStrategy::AnyDepthExpectOne, TypeMatchingStrategy::Exact)
            .unwrap();
        assert_eq!(found.value().unwrap().as_int(), Some(2));
        assert!(scoped.is_excluded(&op));

        scoped.record(TraceEventKind::Construction, "scoped".to_string());
        assert!(ctx.trace().snapshot().iter().any(|e| e.message == "scoped"));
    }

    #[test]
    fn find_excluding_hides_operation() {
        let schema = schema();
        let id = crate::instance::from_value(&schema, &schema.type_by_name("acme.OrderId").unwrap(), &serde_json::json!(42))
            .unwrap();
        let ctx = context(&schema, vec![id]);
        let op = OperationName::parse("acme.OrderService@@getOrder").unwrap();
        let order = QualifiedName::parse("acme.Order").unwrap();
        let id_name = QualifiedName::parse("acme.OrderId").unwrap();
        assert!(ctx.find_path(&id_name, &order).exists);

        let mut nested = ctx.clone();
        nested.excluded_operations.insert(op.clone());
        assert!(nested.is_excluded(&op));
        assert!(!nested.find_path(&id_name, &order).exists);
    }
}
