//! Query context: the facts a query runs against and the services it needs.
//!
//! Evaluators receive the context as `&dyn QueryContext`. Facts are read-only
//! for the lifetime of a query; the diagnostic trace is append-only.

mod facts;
mod trace;

pub use facts::FactContext;
pub use trace::{DiagnosticTrace, TraceEvent, TraceEventKind};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{ResolutionError, WeftResult};
use crate::graph::Path;
use crate::instance::TypedInstance;
use crate::name::QualifiedName;
use crate::query::QueryResult;
use crate::schema::{OperationName, Schema};
use crate::types::Type;

/// How far into the fact trees a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactDiscoveryStrategy {
    /// Only the facts themselves; the first match wins.
    TopLevelOnly,
    /// Facts and everything nested in them; exactly one match is required.
    AnyDepthExpectOne,
    /// Like `AnyDepthExpectOne`, but equal values count once. When several
    /// distinct values match, a single exact-type match still wins.
    AnyDepthExpectOneDistinct,
}

/// How a candidate's type is compared to the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeMatchingStrategy {
    /// Same type name.
    Exact,
    /// Candidate type is assignable to the requested type.
    Assignable,
}

impl TypeMatchingStrategy {
    /// True if `candidate` satisfies `requested` under this strategy.
    #[must_use]
    pub fn matches(self, schema: &Schema, candidate: &Type, requested: &Type) -> bool {
        match self {
            Self::Exact => candidate.name() == requested.name(),
            Self::Assignable => schema.is_assignable_to(candidate, requested),
        }
    }
}

/// Shared cancellation flag for a query and its nested queries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every query holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything an evaluator may ask of the running query.
pub trait QueryContext: Send + Sync {
    /// The schema the query runs against.
    fn schema(&self) -> &Schema;

    /// Engine settings.
    fn config(&self) -> &EngineConfig;

    /// The facts, in the order they were supplied.
    fn facts(&self) -> &[TypedInstance];

    /// Nesting depth; the top-level query is 0.
    fn depth(&self) -> usize;

    /// Operations this query must not route through.
    fn is_excluded(&self, operation: &OperationName) -> bool;

    /// Shortest path between two types, honouring the excluded operations.
    fn find_path(&self, start: &QualifiedName, target: &QualifiedName) -> Path;

    /// Runs a nested query for `target` against the same facts.
    fn find(&self, target: &Arc<Type>) -> WeftResult<QueryResult>;

    /// Runs a nested query for `target` that may not invoke `operation`.
    fn find_excluding(&self, target: &Arc<Type>, operation: &OperationName) -> WeftResult<QueryResult>;

    /// The trace shared with nested queries.
    fn trace(&self) -> &DiagnosticTrace;

    /// The query's cancellation token.
    fn cancellation(&self) -> &CancellationToken;

    /// The same query, over `facts` instead of this context's facts.
    ///
    /// Trace, cancellation, depth and exclusions are shared.
    fn with_facts(&self, facts: Vec<TypedInstance>) -> Box<dyn QueryContext>;

    /// Looks up a fact of type `ty`.
    ///
    /// Nulls never match, and neither do empty strings when the engine is
    /// configured to treat them as absent.
    fn get_fact(
        &self,
        ty: &Type,
        discovery: FactDiscoveryStrategy,
        matching: TypeMatchingStrategy,
    ) -> Option<TypedInstance> {
        select_fact(self.schema(), self.config(), self.facts(), ty, discovery, matching)
    }

    /// True if a fact assignable to `ty` is present.
    fn has_fact_of_type(&self, ty: &Type, discovery: FactDiscoveryStrategy) -> bool {
        self.get_fact(ty, discovery, TypeMatchingStrategy::Assignable).is_some()
    }

    /// Appends a trace event at this context's depth.
    fn record(&self, kind: TraceEventKind, message: String) {
        self.trace().record(self.depth(), kind, message);
    }

    /// True once the query has been cancelled.
    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled()
    }

    /// Returns `Cancelled` once the query has been cancelled.
    fn check_cancelled(&self) -> Result<(), ResolutionError> {
        if self.is_cancelled() {
            Err(ResolutionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Picks the value of type `ty` out of `candidates` the way `discovery`
/// says.
pub(crate) fn select_fact(
    schema: &Schema,
    config: &EngineConfig,
    candidates: &[TypedInstance],
    ty: &Type,
    discovery: FactDiscoveryStrategy,
    matching: TypeMatchingStrategy,
) -> Option<TypedInstance> {
    let ignore_empty = config.ignore_empty_strings;
    let is_match =
        |candidate: &TypedInstance| candidate.has_value(ignore_empty) && matching.matches(schema, candidate.ty(), ty);

    match discovery {
        FactDiscoveryStrategy::TopLevelOnly => candidates.iter().find(|f| is_match(*f)).cloned(),
        FactDiscoveryStrategy::AnyDepthExpectOne => {
            let found: Vec<&TypedInstance> = candidates
                .iter()
                .flat_map(TypedInstance::breadth_first)
                .filter(|c| is_match(*c))
                .collect();
            match found.as_slice() {
                [only] => Some((*only).clone()),
                _ => None,
            }
        }
        FactDiscoveryStrategy::AnyDepthExpectOneDistinct => {
            let mut distinct: Vec<&TypedInstance> = Vec::new();
            for candidate in candidates.iter().flat_map(TypedInstance::breadth_first) {
                if is_match(candidate) && !distinct.contains(&candidate) {
                    distinct.push(candidate);
                }
            }
            if let [only] = distinct.as_slice() {
                return Some((*only).clone());
            }
            let exact: Vec<&TypedInstance> = distinct
                .into_iter()
                .filter(|c| c.type_name() == ty.name())
                .collect();
            match exact.as_slice() {
                [only] => Some((*only).clone()),
                _ => None,
            }
        }
    }
}
