//! Links whose value carries over unchanged.

use super::LinkEvaluator;
use crate::context::QueryContext;
use crate::error::WeftResult;
use crate::graph::{EvaluatedLink, Link, Relationship};
use crate::instance::TypedInstance;

/// Succeeds with the starting instance unchanged.
///
/// Used for edges that change the node being looked at but not the value:
/// `IS_ATTRIBUTE_OF`, `IS_TYPE_OF` and `IS_PARAMETER_ON`.
#[derive(Debug, Clone, Copy)]
pub struct PassThroughEvaluator {
    relationship: Relationship,
}

impl PassThroughEvaluator {
    /// A pass-through evaluator for `relationship`.
    #[must_use]
    pub const fn new(relationship: Relationship) -> Self {
        Self { relationship }
    }
}

impl LinkEvaluator for PassThroughEvaluator {
    fn relationship(&self) -> Relationship {
        self.relationship
    }

    fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        _context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink> {
        Ok(EvaluatedLink::success(link.clone(), starting.clone(), starting.clone()))
    }
}
