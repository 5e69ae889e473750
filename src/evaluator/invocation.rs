//! `PROVIDES` links: calls an operation.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{LinkEvaluator, ParameterFactory};
use crate::context::QueryContext;
use crate::error::{SchemaError, WeftResult};
use crate::graph::{EvaluatedLink, Link, Relationship};
use crate::instance::TypedInstance;
use crate::invoke::{Invocation, OperationInvoker};

/// Invokes the operation at the start of a `PROVIDES` link.
///
/// The starting instance fills every parameter it is assignable to; the rest
/// are discovered or constructed. Invoker errors fail the link.
pub struct ProvidesEvaluator {
    invoker: Arc<dyn OperationInvoker>,
    parameters: ParameterFactory,
}

impl ProvidesEvaluator {
    /// Invokes operations through `invoker`.
    #[must_use]
    pub fn new(invoker: Arc<dyn OperationInvoker>) -> Self {
        Self {
            invoker,
            parameters: ParameterFactory,
        }
    }
}

impl std::fmt::Debug for ProvidesEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvidesEvaluator").finish_non_exhaustive()
    }
}

impl LinkEvaluator for ProvidesEvaluator {
    fn relationship(&self) -> Relationship {
        Relationship::Provides
    }

    fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink> {
        let Some(name) = link.start.operation_name() else {
            return Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Link {link} does not start at an operation"),
            ));
        };
        let schema = context.schema();
        let service = schema.service(&name.service).ok_or_else(|| SchemaError::UnknownOperation {
            name: name.to_string(),
        })?;
        let operation = schema.operation(name)?;

        let mut arguments = Vec::with_capacity(operation.parameters.len());
        for parameter in &operation.parameters {
            context.check_cancelled()?;
            let param_ty = schema.type_named(&parameter.type_name)?;
            if !starting.is_null() && schema.is_assignable_to(starting.ty(), &param_ty) {
                arguments.push(starting.clone());
            } else {
                arguments.push(self.parameters.discover(&param_ty, Some(starting), name, context)?);
            }
        }

        let call = Invocation {
            name,
            service,
            operation,
            arguments: &arguments,
            schema,
        };
        debug!(operation = %name, arguments = arguments.len(), "invoking operation");
        let outcome = self.invoker.invoke(&call);
        // The call has completed; a cancelled query discards its result.
        context.check_cancelled()?;

        match outcome {
            Ok(result) => Ok(EvaluatedLink::success(link.clone(), starting.clone(), result)),
            Err(e) => {
                warn!(operation = %name, error = %e, "operation invocation failed");
                Ok(EvaluatedLink::failed(link.clone(), starting.clone(), e.to_string()))
            }
        }
    }
}
