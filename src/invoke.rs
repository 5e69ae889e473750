//! Operation invocation.
//!
//! The engine never talks to a transport directly: invoking an operation goes
//! through an [`OperationInvoker`]. [`InMemoryInvoker`] routes calls to
//! registered closures and records every call; it is intended for embedded
//! usage, tests, and as a reference implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::{InvocationError, WeftError, WeftResult};
use crate::instance::{self, TypedInstance};
use crate::schema::{Operation, OperationName, Schema, Service};

/// One operation call.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Operation being called.
    pub name: &'a OperationName,
    /// Service declaring the operation.
    pub service: &'a Service,
    /// The operation definition.
    pub operation: &'a Operation,
    /// Arguments in parameter order.
    pub arguments: &'a [TypedInstance],
    /// Schema to build results against.
    pub schema: &'a Schema,
}

/// Invokes operations on behalf of the engine.
///
/// Calls are blocking; the engine waits for the result before evaluating
/// the next link.
pub trait OperationInvoker: Send + Sync {
    /// Calls the operation and returns its result.
    fn invoke(&self, call: &Invocation<'_>) -> Result<TypedInstance, InvocationError>;
}

type Handler = dyn Fn(&Invocation<'_>) -> Result<TypedInstance, InvocationError> + Send + Sync;

/// A call seen by [`InMemoryInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Operation that was called.
    pub operation: OperationName,
    /// Arguments it was called with.
    pub arguments: Vec<TypedInstance>,
}

fn lock_err(context: &'static str) -> WeftError {
    WeftError::internal(format!("poisoned lock: {context}"))
}

/// Invoker backed by registered closures.
///
/// # Example
/// ```
/// use weftql::{InMemoryInvoker, OperationName, QualifiedName};
///
/// let invoker = InMemoryInvoker::new();
/// let op = OperationName::new(QualifiedName::parse("acme.OrderService").unwrap(), "getOrder");
/// invoker
///     .respond_with_json(op.clone(), serde_json::json!({"id": 42, "status": "SHIPPED"}))
///     .unwrap();
/// assert_eq!(invoker.call_count(&op).unwrap(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryInvoker {
    handlers: RwLock<HashMap<OperationName, Arc<Handler>>>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl std::fmt::Debug for InMemoryInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = self.handlers.read().map(|h| h.len()).unwrap_or_default();
        f.debug_struct("InMemoryInvoker")
            .field("handlers", &registered)
            .finish_non_exhaustive()
    }
}

impl InMemoryInvoker {
    /// An invoker with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for `operation`.
    pub fn register<F>(&self, operation: OperationName, handler: F) -> WeftResult<()>
    where
        F: Fn(&Invocation<'_>) -> Result<TypedInstance, InvocationError> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| lock_err("invoker.register"))?;
        handlers.insert(operation, Arc::new(handler));
        Ok(())
    }

    /// Registers a handler that always answers with `response`, read as the
    /// operation's return type.
    pub fn respond_with_json(&self, operation: OperationName, response: serde_json::Value) -> WeftResult<()> {
        self.register(operation, move |call| {
            let failed = |reason: String| InvocationError::Failed {
                operation: call.name.to_string(),
                reason,
            };
            let return_type = call
                .schema
                .type_named(&call.operation.return_type)
                .map_err(|e| failed(e.to_string()))?;
            instance::from_value(call.schema, &return_type, &response).map_err(|e| failed(e.to_string()))
        })
    }

    /// Number of times `operation` has been invoked.
    pub fn call_count(&self, operation: &OperationName) -> WeftResult<usize> {
        let calls = self.calls.read().map_err(|_| lock_err("invoker.call_count"))?;
        Ok(calls.iter().filter(|c| &c.operation == operation).count())
    }

    /// Total number of invocations across all operations.
    pub fn total_calls(&self) -> WeftResult<usize> {
        let calls = self.calls.read().map_err(|_| lock_err("invoker.total_calls"))?;
        Ok(calls.len())
    }

    /// Every call so far, in invocation order.
    pub fn calls(&self) -> WeftResult<Vec<RecordedCall>> {
        let calls = self.calls.read().map_err(|_| lock_err("invoker.calls"))?;
        Ok(calls.clone())
    }
}

impl OperationInvoker for InMemoryInvoker {
    fn invoke(&self, call: &Invocation<'_>) -> Result<TypedInstance, InvocationError> {
        let poisoned = |context: &str| InvocationError::Failed {
            operation: call.name.to_string(),
            reason: format!("poisoned lock: {context}"),
        };
        let handler = {
            let handlers = self.handlers.read().map_err(|_| poisoned("invoker.invoke"))?;
            handlers.get(call.name).cloned()
        };
        {
            let mut calls = self.calls.write().map_err(|_| poisoned("invoker.record"))?;
            calls.push(RecordedCall {
                operation: call.name.clone(),
                arguments: call.arguments.to_vec(),
            });
        }
        let Some(handler) = handler else {
            warn!(operation = %call.name, "no handler registered");
            return Err(InvocationError::NotSupported {
                operation: call.name.to_string(),
            });
        };
        debug!(operation = %call.name, arguments = call.arguments.len(), "invoking");
        handler(call)
    }
}
