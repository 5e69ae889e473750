//! Error types for weftql.
//!
//! All errors in weftql are strongly typed using thiserror.
//! Each concern gets its own enum; `WeftError` aggregates them so callers can
//! match on the category they care about.

use thiserror::Error;

use crate::graph::Relationship;

/// Validation errors that occur during input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A qualified name failed to parse.
    #[error("Invalid qualified name '{name}': {reason}")]
    InvalidQualifiedName {
        /// The rejected input.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required field was absent.
    #[error("Required field '{field}' is missing")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// A field held an unusable value.
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField {
        /// Name of the field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Schema configuration errors.
///
/// These are fatal: they describe a schema or engine wiring that can never
/// resolve correctly, so retrying the same query is pointless.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A relationship's evaluator slot is empty.
    #[error("No link evaluator registered for relationship {relationship}")]
    NoEvaluatorRegistered {
        /// The relationship with no evaluator.
        relationship: Relationship,
    },

    /// An evaluator was registered in another relationship's slot.
    #[error("Evaluator for {actual} registered in the {expected} slot")]
    EvaluatorMismatch {
        /// Slot it was registered in.
        expected: Relationship,
        /// Relationship it evaluates.
        actual: Relationship,
    },

    /// An alias chain loops back on itself.
    #[error("Alias cycle detected while resolving '{type_name}'")]
    AliasCycle {
        /// Type where the cycle was found.
        type_name: String,
    },

    /// A type transitively inherits itself.
    #[error("Inheritance cycle detected at '{type_name}'")]
    InheritanceCycle {
        /// Type where the cycle was found.
        type_name: String,
    },

    /// A type name matches no registered type.
    #[error("Unknown type: {name}")]
    UnknownType {
        /// The unknown name.
        name: String,
    },

    /// A short name matches several registered types.
    #[error("Type name '{name}' is ambiguous, candidates: {candidates:?}")]
    AmbiguousTypeName {
        /// The short name.
        name: String,
        /// Every matching qualified name.
        candidates: Vec<String>,
    },

    /// An operation name matches no registered operation.
    #[error("Unknown operation: {name}")]
    UnknownOperation {
        /// The unknown name.
        name: String,
    },

    /// Two types share a name.
    #[error("Type '{name}' is declared more than once")]
    DuplicateType {
        /// The duplicated name.
        name: String,
    },

    /// Two operations share a name.
    #[error("Operation '{name}' is declared more than once")]
    DuplicateOperation {
        /// The duplicated name.
        name: String,
    },
}

/// Errors raised while building typed instances from values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InstanceError {
    /// Value shape does not match the type.
    #[error("Cannot read {found} as type {type_name}: expected {expected}")]
    ShapeMismatch {
        /// Type being built.
        type_name: String,
        /// Shape the type needs.
        expected: String,
        /// Shape that was supplied.
        found: String,
    },

    /// A scalar could not be converted to the type's primitive.
    #[error("Cannot convert '{value}' to {type_name}: {reason}")]
    ValueConversion {
        /// Type being built.
        type_name: String,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A value's type is not assignable where it is used.
    #[error("Value of type {actual} is not assignable to {expected}")]
    NotAssignable {
        /// Type that was needed.
        expected: String,
        /// Type that was supplied.
        actual: String,
    },

    /// An attribute is not declared on the type.
    #[error("Attribute '{attribute}' is not declared on type {type_name}")]
    UndeclaredAttribute {
        /// Type being built.
        type_name: String,
        /// The undeclared attribute.
        attribute: String,
    },
}

/// Errors raised while resolving a target node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// A parameter could not be found or constructed.
    ///
    /// `trace` holds the link descriptions evaluated before the failure.
    #[error("Unresolved operation parameters: {message}")]
    UnresolvedOperationParameters {
        /// What could not be resolved.
        message: String,
        /// Links evaluated before the failure.
        trace: Vec<String>,
    },

    /// The query was cancelled.
    #[error("Query was cancelled")]
    Cancelled,
}

/// Errors returned by an operation invoker.
///
/// These fail the link that invoked the operation; they never abort a query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// No handler is registered for the operation.
    #[error("No handler registered for operation {operation}")]
    NotSupported {
        /// The operation called.
        operation: String,
    },

    /// The handler returned an error.
    #[error("Invocation of {operation} failed: {reason}")]
    Failed {
        /// The operation called.
        operation: String,
        /// What went wrong.
        reason: String,
    },
}

/// Errors raised by the query runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The query queue is at capacity.
    #[error("Query queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The worker pool has shut down.
    #[error("Query worker pool disconnected")]
    Disconnected,

    /// A join timed out.
    #[error("Query timed out after {duration_ms}ms")]
    Timeout {
        /// How long the caller waited, in milliseconds.
        duration_ms: u64,
    },
}

/// Top-level error type for weftql.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WeftError {
    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Schema configuration error.
    #[error("Schema configuration error: {0}")]
    Schema(#[from] SchemaError),

    /// Instance construction error.
    #[error("Instance error: {0}")]
    Instance(#[from] InstanceError),

    /// Resolution error.
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Query runtime error.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// A broken internal invariant, such as a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl WeftError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a schema configuration error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if the query was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Resolution(ResolutionError::Cancelled))
    }

    /// Returns true if this is an unresolved-parameter failure.
    #[must_use]
    pub const fn is_unresolved_parameters(&self) -> bool {
        matches!(
            self,
            Self::Resolution(ResolutionError::UnresolvedOperationParameters { .. })
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Runtime(e) => matches!(e, RuntimeError::QueueFull { .. } | RuntimeError::Timeout { .. }),
            Self::Validation(_)
            | Self::Schema(_)
            | Self::Instance(_)
            | Self::Resolution(_)
            | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for weftql operations.
pub type WeftResult<T> = Result<T, WeftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_no_evaluator() {
        let err = SchemaError::NoEvaluatorRegistered {
            relationship: Relationship::HasAttribute,
        };
        let msg = format!("{err}");
        assert!(msg.contains("HAS_ATTRIBUTE"));
    }

    #[test]
    fn test_alias_cycle_message() {
        let err = SchemaError::AliasCycle {
            type_name: "acme.Loop".to_string(),
        };
        assert!(format!("{err}").contains("acme.Loop"));
    }

    #[test]
    fn test_unresolved_parameters_carries_trace() {
        let err = ResolutionError::UnresolvedOperationParameters {
            message: "no OrderId".to_string(),
            trace: vec!["a -[IS_TYPE_OF]-> b".to_string()],
        };
        let weft: WeftError = err.into();
        assert!(weft.is_unresolved_parameters());
        assert!(!weft.is_fatal());
        assert!(format!("{weft}").contains("no OrderId"));
    }

    #[test]
    fn test_weft_error_from_schema_is_fatal() {
        let err: WeftError = SchemaError::UnknownType {
            name: "Nope".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cancelled() {
        let err: WeftError = ResolutionError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_weft_error_retryable() {
        let err1: WeftError = RuntimeError::QueueFull { capacity: 4 }.into();
        assert!(err1.is_retryable());

        let err2: WeftError = RuntimeError::Timeout { duration_ms: 10 }.into();
        assert!(err2.is_retryable());

        let err3: WeftError = RuntimeError::Disconnected.into();
        assert!(!err3.is_retryable());

        let err4 = WeftError::internal("unexpected state");
        assert!(!err4.is_retryable());
        assert!(format!("{err4}").contains("unexpected state"));
    }
}
