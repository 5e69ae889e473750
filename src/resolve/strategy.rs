//! Graph search for a target type from the query's facts.

use std::thread;

use tracing::debug;

use super::PathEvaluator;
use crate::context::{QueryContext, TraceEventKind};
use crate::error::{WeftError, WeftResult};
use crate::evaluator::EvaluatorRegistry;
use crate::graph::Path;
use crate::instance::TypedInstance;
use crate::query::QuerySpecTypeNode;

/// Resolves requested nodes by walking schema-graph paths from the facts.
///
/// Candidates are tried in fact order; the first one whose path yields a
/// non-null value assignable to the target wins. There is no backtracking.
#[derive(Debug, Clone, Copy)]
pub struct GraphResolutionStrategy<'a> {
    evaluators: &'a EvaluatorRegistry,
}

impl<'a> GraphResolutionStrategy<'a> {
    /// A strategy dispatching through `evaluators`.
    #[must_use]
    pub const fn new(evaluators: &'a EvaluatorRegistry) -> Self {
        Self { evaluators }
    }

    /// Resolves every node, returning results in request order.
    pub fn resolve(
        &self,
        context: &dyn QueryContext,
        nodes: &[QuerySpecTypeNode],
    ) -> WeftResult<Vec<(QuerySpecTypeNode, Option<TypedInstance>)>> {
        let config = context.config();
        if config.parallel_targets && nodes.len() > 1 {
            return self.resolve_parallel(context, nodes, config.max_parallel_targets.max(1));
        }

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            context.check_cancelled()?;
            results.push((node.clone(), self.resolve_node(context, node)?));
        }
        Ok(results)
    }

    fn resolve_parallel(
        &self,
        context: &dyn QueryContext,
        nodes: &[QuerySpecTypeNode],
        width: usize,
    ) -> WeftResult<Vec<(QuerySpecTypeNode, Option<TypedInstance>)>> {
        let mut results = Vec::with_capacity(nodes.len());
        for batch in nodes.chunks(width) {
            context.check_cancelled()?;
            let resolved: Vec<WeftResult<Option<TypedInstance>>> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|node| scope.spawn(move || self.resolve_node(context, node)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|_| Err(WeftError::internal("target resolution thread panicked")))
                    })
                    .collect()
            });
            for (node, value) in batch.iter().zip(resolved) {
                results.push((node.clone(), value?));
            }
        }
        Ok(results)
    }

    /// Resolves one node, or `None` if no candidate fact reaches it.
    pub fn resolve_node(
        &self,
        context: &dyn QueryContext,
        node: &QuerySpecTypeNode,
    ) -> WeftResult<Option<TypedInstance>> {
        let target = &node.ty;
        let ignore_empty = context.config().ignore_empty_strings;

        let candidates: Vec<(&TypedInstance, Path)> = context
            .facts()
            .iter()
            .filter(|fact| fact.has_value(ignore_empty))
            .map(|fact| (fact, context.find_path(fact.type_name(), target.name())))
            .filter(|(_, path)| path.exists)
            .collect();
        context.record(
            TraceEventKind::PathSearch,
            format!("{} candidate path(s) to {}", candidates.len(), target.name()),
        );
        debug!(target = %target.name(), candidates = candidates.len(), "resolving node");

        let evaluator = PathEvaluator::new(self.evaluators);
        for (fact, path) in candidates {
            context.check_cancelled()?;
            let evaluated = evaluator.evaluate(&path, fact, context)?;
            match evaluated.result() {
                Some(value) if !value.is_null() && context.schema().is_assignable_to(value.ty(), target) => {
                    context.record(
                        TraceEventKind::NodeResolved,
                        format!("{} resolved from {fact} via {}", target.name(), path.description()),
                    );
                    return Ok(Some(value.clone()));
                }
                _ => context.record(
                    TraceEventKind::CandidateRejected,
                    format!("{fact} did not produce {}", target.name()),
                ),
            }
        }

        context.record(TraceEventKind::NodeUnresolved, format!("{} unresolved", target.name()));
        Ok(None)
    }
}
