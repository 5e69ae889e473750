//! Link evaluators.
//!
//! Each [`Relationship`] has exactly one evaluator slot. Evaluating a link
//! whose slot is empty is a schema configuration error, never a silent skip.

mod attribute;
mod invocation;
mod parameter;
mod passthrough;

pub use attribute::HasAttributeEvaluator;
pub use invocation::ProvidesEvaluator;
pub use parameter::{ConstructionGuard, ParameterFactory, RequiresParameterEvaluator};
pub use passthrough::PassThroughEvaluator;

use std::fmt;
use std::sync::Arc;

use crate::context::QueryContext;
use crate::error::{SchemaError, WeftResult};
use crate::graph::{EvaluatedLink, Link, Relationship};
use crate::instance::TypedInstance;
use crate::invoke::OperationInvoker;

/// Evaluates one kind of link.
///
/// Expected failures (a null attribute, a failed invocation) are returned as
/// failed [`EvaluatedLink`]s. `Err` is reserved for conditions that should
/// stop or redirect the caller: schema errors, cancellation and unresolved
/// parameters.
pub trait LinkEvaluator: Send + Sync {
    /// The relationship this evaluator handles.
    fn relationship(&self) -> Relationship;

    /// Evaluates `link` from `starting`.
    ///
    /// Link failures are returned as failed [`EvaluatedLink`]s; errors are
    /// reserved for conditions that stop the whole walk.
    fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink>;
}

type Slot = Option<Arc<dyn LinkEvaluator>>;

/// Dispatch table from relationship to evaluator.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    has_attribute: Slot,
    is_attribute_of: Slot,
    requires_parameter: Slot,
    is_parameter_on: Slot,
    is_type_of: Slot,
    provides: Slot,
}

impl EvaluatorRegistry {
    /// A registry with every slot empty.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in evaluator in every slot.
    #[must_use]
    pub fn standard(invoker: Arc<dyn OperationInvoker>) -> Self {
        Self {
            has_attribute: Some(Arc::new(HasAttributeEvaluator)),
            is_attribute_of: Some(Arc::new(PassThroughEvaluator::new(Relationship::IsAttributeOf))),
            requires_parameter: Some(Arc::new(RequiresParameterEvaluator)),
            is_parameter_on: Some(Arc::new(PassThroughEvaluator::new(Relationship::IsParameterOn))),
            is_type_of: Some(Arc::new(PassThroughEvaluator::new(Relationship::IsTypeOf))),
            provides: Some(Arc::new(ProvidesEvaluator::new(invoker))),
        }
    }

    /// Puts `evaluator` in the slot for `relationship`, replacing any
    /// previous occupant.
    pub fn register(
        &mut self,
        relationship: Relationship,
        evaluator: Arc<dyn LinkEvaluator>,
    ) -> Result<&mut Self, SchemaError> {
        let actual = evaluator.relationship();
        if actual != relationship {
            return Err(SchemaError::EvaluatorMismatch {
                expected: relationship,
                actual,
            });
        }
        *self.slot_mut(relationship) = Some(evaluator);
        Ok(self)
    }

    /// Empties the slot for `relationship`.
    pub fn unregister(&mut self, relationship: Relationship) -> &mut Self {
        *self.slot_mut(relationship) = None;
        self
    }

    /// The evaluator in `relationship`'s slot.
    pub fn get(&self, relationship: Relationship) -> Result<&Arc<dyn LinkEvaluator>, SchemaError> {
        self.slot(relationship)
            .as_ref()
            .ok_or(SchemaError::NoEvaluatorRegistered { relationship })
    }

    /// True if `relationship`'s slot is filled.
    #[must_use]
    pub fn is_registered(&self, relationship: Relationship) -> bool {
        self.slot(relationship).is_some()
    }

    /// Dispatches `link` to the evaluator for its relationship.
    pub fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink> {
        self.get(link.relationship)?.evaluate(link, starting, context)
    }

    const fn slot(&self, relationship: Relationship) -> &Slot {
        match relationship {
            Relationship::HasAttribute => &self.has_attribute,
            Relationship::IsAttributeOf => &self.is_attribute_of,
            Relationship::RequiresParameter => &self.requires_parameter,
            Relationship::IsParameterOn => &self.is_parameter_on,
            Relationship::IsTypeOf => &self.is_type_of,
            Relationship::Provides => &self.provides,
        }
    }

    fn slot_mut(&mut self, relationship: Relationship) -> &mut Slot {
        match relationship {
            Relationship::HasAttribute => &mut self.has_attribute,
            Relationship::IsAttributeOf => &mut self.is_attribute_of,
            Relationship::RequiresParameter => &mut self.requires_parameter,
            Relationship::IsParameterOn => &mut self.is_parameter_on,
            Relationship::IsTypeOf => &mut self.is_type_of,
            Relationship::Provides => &mut self.provides,
        }
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = Relationship::ALL
            .iter()
            .filter(|r| self.is_registered(**r))
            .map(|r| r.as_str())
            .collect();
        f.debug_struct("EvaluatorRegistry")
            .field("registered", &registered)
            .finish()
    }
}
