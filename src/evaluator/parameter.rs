//! Parameter discovery and on-demand construction.

use std::sync::Arc;

use tracing::{debug, warn};

use super::LinkEvaluator;
use crate::context::{select_fact, FactDiscoveryStrategy, QueryContext, TraceEventKind, TypeMatchingStrategy};
use crate::error::{ResolutionError, WeftError, WeftResult};
use crate::graph::{EvaluatedLink, Link, Relationship};
use crate::instance::TypedInstance;
use crate::name::QualifiedName;
use crate::schema::OperationName;
use crate::types::Type;

/// Types currently being constructed, innermost first.
///
/// Each level of recursion pushes a new frame that borrows its parent, so
/// the set is never mutated and unwinds with the call stack.
#[derive(Debug, Clone, Copy)]
pub struct ConstructionGuard<'a> {
    type_name: &'a QualifiedName,
    parent: Option<&'a ConstructionGuard<'a>>,
}

impl<'a> ConstructionGuard<'a> {
    /// A guard holding only `type_name`.
    #[must_use]
    pub const fn root(type_name: &'a QualifiedName) -> Self {
        Self {
            type_name,
            parent: None,
        }
    }

    /// A frame for `type_name` on top of this one.
    #[must_use]
    pub const fn push(&'a self, type_name: &'a QualifiedName) -> Self {
        Self {
            type_name,
            parent: Some(self),
        }
    }

    /// True if any frame holds `type_name`.
    #[must_use]
    pub fn contains(&self, type_name: &QualifiedName) -> bool {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current.type_name == type_name {
                return true;
            }
            frame = current.parent;
        }
        false
    }
}

/// Finds or builds operation arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterFactory;

impl ParameterFactory {
    /// Resolves a value for a parameter of type `param_ty`.
    ///
    /// In order: an exact-type fact (top level, then a single distinct value
    /// at any depth); `starting` if it has exactly that type; a constructed
    /// instance if `param_ty` is a parameter type, or a collection of one.
    pub fn discover(
        &self,
        param_ty: &Arc<Type>,
        starting: Option<&TypedInstance>,
        operation: &OperationName,
        context: &dyn QueryContext,
    ) -> WeftResult<TypedInstance> {
        context.check_cancelled()?;
        for discovery in [
            FactDiscoveryStrategy::TopLevelOnly,
            FactDiscoveryStrategy::AnyDepthExpectOneDistinct,
        ] {
            if let Some(fact) = context.get_fact(param_ty, discovery, TypeMatchingStrategy::Exact) {
                return Ok(fact);
            }
        }

        let ignore_empty = context.config().ignore_empty_strings;
        if let Some(candidate) = starting {
            if candidate.type_name() == param_ty.name() && candidate.has_value(ignore_empty) {
                return Ok(candidate.clone());
            }
        }

        if param_ty.is_collection() {
            if let Some(member_ty) = context.schema().collection_member_type(param_ty)? {
                if member_ty.is_parameter_type() {
                    return self.construct_collection(param_ty, &member_ty, operation, context);
                }
            }
        } else if param_ty.is_parameter_type() {
            let guard = ConstructionGuard::root(param_ty.name());
            return self.construct(param_ty, starting, operation, context, &guard);
        }

        Err(unresolved(
            format!(
                "No instance of type {} is present in the facts, and it is not a parameter type, so cannot be constructed",
                param_ty.name()
            ),
            context,
        ))
    }

    /// Builds an instance of `ty` attribute by attribute.
    ///
    /// Each attribute comes from the facts, then from inside `starting`,
    /// then from recursive construction, then from a nested query that may
    /// not invoke `operation`. `guard` must already contain `ty`.
    pub fn construct(
        &self,
        ty: &Arc<Type>,
        starting: Option<&TypedInstance>,
        operation: &OperationName,
        context: &dyn QueryContext,
        guard: &ConstructionGuard<'_>,
    ) -> WeftResult<TypedInstance> {
        let schema = context.schema();
        let shape = schema.resolve_aliases(ty)?;
        let mut attributes = Vec::with_capacity(shape.attributes().len());

        for attribute in shape.attributes() {
            context.check_cancelled()?;
            let attr_ty = schema.type_named(&attribute.type_name)?;
            let value = match self.attribute_value(&attr_ty, starting, operation, context, guard)? {
                Some(value) => value,
                None if attribute.nullable => TypedInstance::null(attr_ty),
                None => {
                    let message = format!(
                        "Unable to construct {}: no value for attribute '{}' of type {}",
                        ty.name(),
                        attribute.name,
                        attr_ty.name()
                    );
                    warn!(type_name = %ty.name(), attribute = %attribute.name, "construction failed");
                    context.record(TraceEventKind::Construction, message.clone());
                    return Err(unresolved(message, context));
                }
            };
            attributes.push((attribute.name.clone(), value));
        }

        let built = TypedInstance::object(schema, Arc::clone(ty), attributes)?;
        debug!(type_name = %ty.name(), "constructed parameter");
        context.record(TraceEventKind::Construction, format!("constructed {built}"));
        Ok(built)
    }

    /// Builds a collection of `member_ty` from the first collection fact
    /// whose members can each be turned into one.
    ///
    /// Every member is built against a context holding only that member.
    pub fn construct_collection(
        &self,
        collection_ty: &Arc<Type>,
        member_ty: &Arc<Type>,
        operation: &OperationName,
        context: &dyn QueryContext,
    ) -> WeftResult<TypedInstance> {
        for fact in context.facts() {
            let Some(members) = fact.members() else {
                continue;
            };
            match self.construct_members(member_ty, members, operation, context) {
                Ok(built) => {
                    debug!(
                        type_name = %collection_ty.name(),
                        members = built.len(),
                        source = %fact.type_name(),
                        "constructed collection parameter"
                    );
                    context.record(
                        TraceEventKind::Construction,
                        format!(
                            "constructed {} from {} members of {}",
                            collection_ty.name(),
                            built.len(),
                            fact.type_name()
                        ),
                    );
                    return TypedInstance::collection(context.schema(), Arc::clone(collection_ty), built);
                }
                Err(e) if e.is_unresolved_parameters() => {
                    debug!(source = %fact.type_name(), error = %e, "collection fact cannot build members");
                }
                Err(e) => return Err(e),
            }
        }

        let message = format!(
            "Unable to construct {}: no collection in the facts has members that each build a {}",
            collection_ty.name(),
            member_ty.name()
        );
        warn!(type_name = %collection_ty.name(), "collection construction failed");
        context.record(TraceEventKind::Construction, message.clone());
        Err(unresolved(message, context))
    }

    fn construct_members(
        &self,
        member_ty: &Arc<Type>,
        members: &[TypedInstance],
        operation: &OperationName,
        context: &dyn QueryContext,
    ) -> WeftResult<Vec<TypedInstance>> {
        let guard = ConstructionGuard::root(member_ty.name());
        members
            .iter()
            .filter(|m| !m.is_null())
            .map(|member| {
                let scoped = context.with_facts(vec![member.clone()]);
                self.construct(member_ty, Some(member), operation, scoped.as_ref(), &guard)
            })
            .collect()
    }

    fn attribute_value(
        &self,
        attr_ty: &Arc<Type>,
        starting: Option<&TypedInstance>,
        operation: &OperationName,
        context: &dyn QueryContext,
        guard: &ConstructionGuard<'_>,
    ) -> WeftResult<Option<TypedInstance>> {
        if let Some(fact) = context.get_fact(
            attr_ty,
            FactDiscoveryStrategy::AnyDepthExpectOneDistinct,
            TypeMatchingStrategy::Assignable,
        ) {
            return Ok(Some(fact));
        }

        // A value produced earlier on the path is not a fact, but may hold
        // the attribute.
        if let Some(candidate) = starting {
            if let Some(found) = select_fact(
                context.schema(),
                context.config(),
                std::slice::from_ref(candidate),
                attr_ty,
                FactDiscoveryStrategy::AnyDepthExpectOneDistinct,
                TypeMatchingStrategy::Assignable,
            ) {
                return Ok(Some(found));
            }
        }

        if !attr_ty.is_scalar() && !attr_ty.is_collection() && !guard.contains(attr_ty.name()) {
            let frame = guard.push(attr_ty.name());
            match self.construct(attr_ty, starting, operation, context, &frame) {
                Ok(built) => return Ok(Some(built)),
                Err(e) if e.is_unresolved_parameters() || matches!(e, WeftError::Instance(_)) => {
                    debug!(type_name = %attr_ty.name(), error = %e, "nested construction failed");
                }
                Err(e) => return Err(e),
            }
        }

        let result = context.find_excluding(attr_ty, operation)?;
        if result.is_fully_resolved() {
            Ok(result.first().cloned())
        } else {
            Ok(None)
        }
    }
}

fn unresolved(message: String, context: &dyn QueryContext) -> WeftError {
    let trace = context
        .trace()
        .snapshot()
        .into_iter()
        .filter(|e| matches!(e.kind, TraceEventKind::LinkEvaluated | TraceEventKind::LinkFailed))
        .map(|e| e.message)
        .collect();
    ResolutionError::UnresolvedOperationParameters { message, trace }.into()
}

/// Produces the value for an operation parameter.
///
/// The link starts at the parameter node; the evaluated value is carried on
/// to the operation node.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiresParameterEvaluator;

impl LinkEvaluator for RequiresParameterEvaluator {
    fn relationship(&self) -> Relationship {
        Relationship::RequiresParameter
    }

    fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink> {
        let (Some(operation), Some(index)) = (link.start.operation_name(), link.start.parameter_index()) else {
            return Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Link {link} does not start at a parameter"),
            ));
        };
        let schema = context.schema();
        let parameter = schema.operation(operation)?.parameters.get(index).ok_or_else(|| {
            WeftError::internal(format!("{operation} has no parameter {index}"))
        })?;
        let param_ty = schema.type_named(&parameter.type_name)?;

        let value = ParameterFactory.discover(&param_ty, Some(starting), operation, context)?;
        Ok(EvaluatedLink::success(link.clone(), starting.clone(), value))
    }
}
