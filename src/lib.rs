//! # weftql - semantic data integration
//!
//! weftql answers the question "given these facts, find me a value of that
//! type". Types come from a [`Schema`] of semantic types and services. The
//! engine searches the schema graph for a path from each fact's type to the
//! requested type, then walks the path: reading attributes, following type
//! relationships, and invoking service operations through an
//! [`OperationInvoker`] when the path needs data the facts do not hold.
//!
//! ## Core Concepts
//!
//! - **Type**: a named semantic type with attributes, supertypes, or an alias target
//! - **TypedInstance**: a value tied to the type it was read as
//! - **SchemaGraph**: types, attributes, parameters and operations joined by relationships
//! - **QueryEngine**: resolves requested types from facts, one candidate path at a time
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use weftql::{EngineConfig, InMemoryInvoker, OperationName, QualifiedName, QueryEngine, Schema, Service, Type};
//!
//! let schema = Arc::new(
//!     Schema::builder()
//!         .add_type(Type::named("acme.OrderId").alias_for("core.Int").build()?)
//!         .add_type(Type::named("acme.Order").attribute("id", "acme.OrderId").attribute("status", "core.String").build()?)
//!         .add_service(
//!             Service::new(QualifiedName::parse("acme.OrderService")?)
//!                 .operation("getOrder", &["acme.OrderId"], "acme.Order")?,
//!         )
//!         .build()?,
//! );
//!
//! let invoker = Arc::new(InMemoryInvoker::new());
//! invoker.respond_with_json(
//!     OperationName::parse("acme.OrderService@@getOrder")?,
//!     serde_json::json!({"id": 42, "status": "SHIPPED"}),
//! )?;
//!
//! let engine = QueryEngine::new(schema, invoker, EngineConfig::default())?;
//! let order_id = engine.parse_fact("acme.OrderId", &serde_json::json!(42))?;
//! let result = engine.find_by_name(vec![order_id], &["acme.Order"])?;
//! assert!(result.is_fully_resolved());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Type system
pub mod error;
pub mod name;
pub mod schema;
pub mod types;
pub mod value;

// Values and the schema graph
pub mod graph;
pub mod instance;

// Resolution
pub mod config;
pub mod context;
pub mod engine;
pub mod evaluator;
pub mod invoke;
pub mod query;
pub mod resolve;

pub use config::{EngineConfig, RuntimeConfig};
pub use context::{
    CancellationToken, DiagnosticTrace, FactContext, FactDiscoveryStrategy, QueryContext, TraceEvent,
    TraceEventKind, TypeMatchingStrategy,
};
pub use engine::runtime::{QueryHandle, QueryRuntime};
pub use engine::QueryEngine;
pub use error::{
    InstanceError, InvocationError, ResolutionError, RuntimeError, SchemaError, ValidationError, WeftError,
    WeftResult,
};
pub use evaluator::{EvaluatorRegistry, LinkEvaluator};
pub use graph::{EvaluatedLink, EvaluatedPath, Link, NodeId, Path, Relationship, SchemaGraph};
pub use instance::TypedInstance;
pub use invoke::{InMemoryInvoker, Invocation, OperationInvoker, RecordedCall};
pub use name::QualifiedName;
pub use query::{QueryId, QueryResult, QuerySpecTypeNode};
pub use schema::{Operation, OperationName, Parameter, Schema, SchemaBuilder, SchemaVersion, Service};
pub use types::{Attribute, PrimitiveKind, Type, TypeBuilder};
pub use value::ScalarValue;
