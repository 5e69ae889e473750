//! Query requests and results.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::context::TraceEvent;
use crate::instance::TypedInstance;
use crate::name::QualifiedName;
use crate::schema::SchemaVersion;
use crate::types::Type;

/// Unique identifier for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(uuid::Uuid);

impl QueryId {
    /// Creates a new random query ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requested target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpecTypeNode {
    /// The requested type.
    pub ty: Arc<Type>,
}

impl QuerySpecTypeNode {
    /// A request for `ty`.
    #[must_use]
    pub const fn new(ty: Arc<Type>) -> Self {
        Self { ty }
    }

    /// Name of the requested type.
    pub fn type_name(&self) -> &QualifiedName {
        self.ty.name()
    }
}

/// The outcome of a query: one entry per requested node, in request order.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Identifier of this query.
    pub query_id: QueryId,
    /// Version of the schema the query ran against.
    pub schema_version: SchemaVersion,
    /// Each requested node with its value, if one was found.
    pub results: Vec<(QuerySpecTypeNode, Option<TypedInstance>)>,
    /// When the query started.
    pub started_at: DateTime<Utc>,
    /// When the query finished.
    pub finished_at: DateTime<Utc>,
    /// Trace events recorded while this query ran.
    pub diagnostics: Vec<TraceEvent>,
}

impl QueryResult {
    /// True when every requested node produced a value.
    #[must_use]
    pub fn is_fully_resolved(&self) -> bool {
        self.results.iter().all(|(_, v)| v.is_some())
    }

    /// Requested nodes that produced nothing.
    pub fn unmatched_nodes(&self) -> Vec<&QuerySpecTypeNode> {
        self.results
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(n, _)| n)
            .collect()
    }

    /// The value produced for a requested type.
    pub fn get(&self, type_name: &QualifiedName) -> Option<&TypedInstance> {
        self.results
            .iter()
            .find(|(n, _)| n.type_name() == type_name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// The value produced for the first requested node.
    pub fn first(&self) -> Option<&TypedInstance> {
        self.results.first().and_then(|(_, v)| v.as_ref())
    }

    /// Wall-clock time the query took.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn resolution_summary() {
        let schema = Schema::builder()
            .add_type(Type::named("acme.A").build().unwrap())
            .add_type(Type::named("acme.B").build().unwrap())
            .build()
            .unwrap();
        let a = schema.type_by_name("acme.A").unwrap();
        let b = schema.type_by_name("acme.B").unwrap();
        let now = Utc::now();
        let result = QueryResult {
            query_id: QueryId::new(),
            schema_version: schema.version().clone(),
            results: vec![
                (QuerySpecTypeNode::new(Arc::clone(&a)), Some(TypedInstance::scalar(&schema, Arc::clone(&a), "x").unwrap())),
                (QuerySpecTypeNode::new(Arc::clone(&b)), None),
            ],
            started_at: now,
            finished_at: now,
            diagnostics: Vec::new(),
        };
        assert!(!result.is_fully_resolved());
        assert_eq!(result.unmatched_nodes().len(), 1);
        assert!(result.get(a.name()).is_some());
        assert!(result.get(b.name()).is_none());
        assert!(result.first().is_some());
        assert_eq!(result.duration(), Duration::zero());
    }

    #[test]
    fn query_ids_are_unique() {
        assert_ne!(QueryId::new(), QueryId::new());
    }
}
