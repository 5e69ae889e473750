//! The immutable schema: types, services and their operations.
//!
//! A [`Schema`] is produced by [`SchemaBuilder::build`], which registers the
//! `core` primitives, canonicalizes every referenced name, validates the
//! alias and inheritance structure and computes the per-type flags. After
//! build the schema never changes; share it behind an `Arc`.

mod assignability;
mod service;

pub use service::{Operation, OperationName, Parameter, Service};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SchemaError, WeftResult};
use crate::name::QualifiedName;
use crate::types::{PrimitiveKind, Type};

/// Fingerprint of a schema's contents (hex-encoded blake3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form, the way commit ids are usually shown.
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

/// Immutable collection of types and services.
#[derive(Debug, Clone)]
pub struct Schema {
    types: BTreeMap<QualifiedName, Arc<Type>>,
    short_names: HashMap<String, Vec<QualifiedName>>,
    services: BTreeMap<QualifiedName, Service>,
    operations: BTreeMap<OperationName, Operation>,
    version: SchemaVersion,
}

impl Schema {
    /// Starts building a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Looks up a type by name.
    ///
    /// Unqualified names resolve when exactly one registered type carries
    /// that simple name. Parameterized names such as `core.Array<acme.Order>`
    /// are synthesized from their raw type when not already registered.
    pub fn type_named(&self, name: &QualifiedName) -> Result<Arc<Type>, SchemaError> {
        if let Some(ty) = self.types.get(name) {
            return Ok(Arc::clone(ty));
        }
        let canonical = self.canonicalize(name)?;
        if let Some(ty) = self.types.get(&canonical) {
            return Ok(Arc::clone(ty));
        }
        self.synthesize(&canonical).map(Arc::new)
    }

    /// Parses `name` and looks it up.
    pub fn type_by_name(&self, name: &str) -> WeftResult<Arc<Type>> {
        let parsed = QualifiedName::parse(name)?;
        Ok(self.type_named(&parsed)?)
    }

    /// The built-in type for a primitive.
    pub fn primitive(&self, kind: PrimitiveKind) -> Result<Arc<Type>, SchemaError> {
        self.type_named(&kind.qualified_name())
    }

    /// True if `name` resolves to a type.
    #[must_use]
    pub fn has_type(&self, name: &QualifiedName) -> bool {
        self.type_named(name).is_ok()
    }

    /// Registered types in name order, primitives included.
    pub fn types(&self) -> impl Iterator<Item = &Arc<Type>> {
        self.types.values()
    }

    /// Services in name order.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    /// Looks up a service.
    pub fn service(&self, name: &QualifiedName) -> Option<&Service> {
        self.services.get(name)
    }

    /// Looks up an operation.
    pub fn operation(&self, name: &OperationName) -> Result<&Operation, SchemaError> {
        self.operations
            .get(name)
            .ok_or_else(|| SchemaError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// All operations in `svc@@op` order.
    pub fn operations(&self) -> impl Iterator<Item = (&OperationName, &Operation)> {
        self.operations.iter()
    }

    /// Content fingerprint of the schema.
    pub const fn version(&self) -> &SchemaVersion {
        &self.version
    }

    /// Resolves short names (recursively, through type parameters) to their
    /// registered fully-qualified form.
    fn canonicalize(&self, name: &QualifiedName) -> Result<QualifiedName, SchemaError> {
        let raw = name.raw_name();
        let raw = if self.types.contains_key(&raw) {
            raw
        } else if raw.namespace().is_empty() {
            match self.short_names.get(raw.name()).map(Vec::as_slice) {
                Some([only]) => only.clone(),
                Some(candidates) if candidates.len() > 1 => {
                    return Err(SchemaError::AmbiguousTypeName {
                        name: raw.name().to_string(),
                        candidates: candidates.iter().map(ToString::to_string).collect(),
                    });
                }
                _ => {
                    return Err(SchemaError::UnknownType {
                        name: name.to_string(),
                    })
                }
            }
        } else {
            return Err(SchemaError::UnknownType {
                name: name.to_string(),
            });
        };
        let parameters = name
            .parameters()
            .iter()
            .map(|p| self.canonicalize(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(raw.with_parameters(parameters))
    }

    /// Builds a parameterized type from its (registered) raw type.
    fn synthesize(&self, name: &QualifiedName) -> Result<Type, SchemaError> {
        let base = self
            .types
            .get(&name.raw_name())
            .ok_or_else(|| SchemaError::UnknownType {
                name: name.to_string(),
            })?;
        for param in name.parameters() {
            self.type_named(param)?;
        }
        let ty = Type::parameterized(base, name.clone());
        let (scalar, collection) = self.compute_flags(&ty)?;
        Ok(ty.with_flags(scalar, collection))
    }

    fn compute_flags(&self, ty: &Type) -> Result<(bool, bool), SchemaError> {
        let collection = self.is_collection_type(ty)?;
        let resolved = self.resolve_aliases(ty)?;
        let scalar = !collection && resolved.attributes().is_empty();
        Ok((scalar, collection))
    }
}

/// Collects types and services, then validates them into a [`Schema`].
///
/// # Example
/// ```
/// use weftql::{QualifiedName, Schema, Service, Type};
///
/// let schema = Schema::builder()
///     .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
///     .add_type(Type::named("acme.Order").attribute("id", "acme.OrderId").build().unwrap())
///     .add_service(
///         Service::new(QualifiedName::parse("acme.OrderService").unwrap())
///             .operation("getOrder", &["acme.OrderId"], "acme.Order")
///             .unwrap(),
///     )
///     .build()
///     .unwrap();
/// assert!(schema.type_by_name("Order").is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    types: Vec<Type>,
    services: Vec<Service>,
}

impl SchemaBuilder {
    /// Adds a type.
    #[must_use]
    pub fn add_type(mut self, ty: Type) -> Self {
        self.types.push(ty);
        self
    }

    /// Adds several types.
    #[must_use]
    pub fn add_types(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.types.extend(types);
        self
    }

    /// Adds a service.
    #[must_use]
    pub fn add_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Validates and builds the schema.
    ///
    /// Fails on duplicate types or operations, unknown or ambiguous type
    /// references, alias cycles and inheritance cycles.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut types: BTreeMap<QualifiedName, Arc<Type>> = BTreeMap::new();
        for kind in PrimitiveKind::ALL {
            types.insert(kind.qualified_name(), Arc::new(Type::primitive(kind)));
        }
        for ty in &self.types {
            if types.contains_key(ty.name()) {
                return Err(SchemaError::DuplicateType {
                    name: ty.name().to_string(),
                });
            }
            types.insert(ty.name().clone(), Arc::new(ty.clone()));
        }

        let mut short_names: HashMap<String, Vec<QualifiedName>> = HashMap::new();
        for name in types.keys() {
            short_names
                .entry(name.name().to_string())
                .or_default()
                .push(name.clone());
        }

        let mut schema = Schema {
            types,
            short_names,
            services: BTreeMap::new(),
            operations: BTreeMap::new(),
            version: SchemaVersion(String::new()),
        };

        // Canonicalize references so every later lookup is by full name.
        let mut canonical = Vec::with_capacity(self.types.len());
        for ty in self.types {
            canonical.push(ty.map_references(|n| schema.canonicalize(n))?);
        }
        for ty in canonical {
            schema.types.insert(ty.name().clone(), Arc::new(ty));
        }

        let mut services = Vec::with_capacity(self.services.len());
        for mut service in self.services {
            for op in &mut service.operations {
                for param in &mut op.parameters {
                    param.type_name = schema.canonicalize(&param.type_name)?;
                }
                op.return_type = schema.canonicalize(&op.return_type)?;
            }
            services.push(service);
        }

        schema.check_alias_cycles()?;
        schema.check_inheritance_cycles()?;
        schema.merge_inherited_attributes()?;

        // Flags depend only on names and structure, so compute them over the
        // unflagged registry and swap the results in.
        let mut flagged = BTreeMap::new();
        for (name, ty) in &schema.types {
            if ty.is_primitive() {
                continue;
            }
            let (scalar, collection) = schema.compute_flags(ty)?;
            flagged.insert(
                name.clone(),
                Arc::new(Type::clone(ty).with_flags(scalar, collection)),
            );
        }
        schema.types.extend(flagged);

        // Pre-register parameterized types the schema itself refers to.
        let mut referenced: BTreeSet<QualifiedName> = BTreeSet::new();
        for ty in schema.types.values() {
            referenced.extend(ty.references().filter(|n| n.is_parameterized()).cloned());
        }
        for service in &services {
            for op in &service.operations {
                referenced.extend(
                    op.parameters
                        .iter()
                        .map(|p| &p.type_name)
                        .chain(std::iter::once(&op.return_type))
                        .filter(|n| n.is_parameterized())
                        .cloned(),
                );
            }
        }
        for name in referenced {
            if !schema.types.contains_key(&name) {
                let ty = schema.synthesize(&name)?;
                schema.types.insert(name, Arc::new(ty));
            }
        }

        for service in services {
            if schema.services.contains_key(&service.name) {
                return Err(SchemaError::DuplicateOperation {
                    name: service.name.to_string(),
                });
            }
            for op in &service.operations {
                let op_name = service.operation_name(&op.name);
                if schema.operations.contains_key(&op_name) {
                    return Err(SchemaError::DuplicateOperation {
                        name: op_name.to_string(),
                    });
                }
                schema.operations.insert(op_name, op.clone());
            }
            schema.services.insert(service.name.clone(), service);
        }

        schema.version = schema.fingerprint();
        debug!(
            types = schema.types.len(),
            operations = schema.operations.len(),
            version = %schema.version,
            "schema built"
        );
        Ok(schema)
    }
}

impl Schema {
    fn check_alias_cycles(&self) -> Result<(), SchemaError> {
        for ty in self.types.values() {
            let mut seen = BTreeSet::new();
            let mut current = Arc::clone(ty);
            while let Some(target) = current.alias_for() {
                if !seen.insert(current.name().clone()) {
                    return Err(SchemaError::AliasCycle {
                        type_name: ty.name().to_string(),
                    });
                }
                match self.types.get(&target.raw_name()) {
                    Some(next) if !target.is_parameterized() => current = Arc::clone(next),
                    _ => break,
                }
            }
        }
        Ok(())
    }

    fn check_inheritance_cycles(&self) -> Result<(), SchemaError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            schema: &Schema,
            name: &QualifiedName,
            marks: &mut HashMap<QualifiedName, Mark>,
        ) -> Result<(), SchemaError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(SchemaError::InheritanceCycle {
                        type_name: name.to_string(),
                    })
                }
                None => {}
            }
            marks.insert(name.clone(), Mark::Visiting);
            if let Some(ty) = schema.types.get(name) {
                for parent in ty.inherits() {
                    visit(schema, &parent.raw_name(), marks)?;
                }
            }
            marks.insert(name.clone(), Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for name in self.types.keys() {
            visit(self, name, &mut marks)?;
        }
        Ok(())
    }

    /// Gives every subtype its supertypes' attributes, nearest supertype
    /// first. Aliases are left alone; they take their shape from the target.
    fn merge_inherited_attributes(&mut self) -> Result<(), SchemaError> {
        let mut merged = BTreeMap::new();
        for (name, ty) in &self.types {
            if ty.is_primitive() || ty.is_type_alias() || ty.inherits().is_empty() {
                continue;
            }
            let mut inherited = Vec::new();
            for parent in self.inheritance_graph(ty)? {
                inherited.extend(self.resolve_aliases(&parent)?.attributes().iter().cloned());
            }
            if !inherited.is_empty() {
                merged.insert(
                    name.clone(),
                    Arc::new(Type::clone(ty).with_inherited_attributes(inherited)),
                );
            }
        }
        self.types.extend(merged);
        Ok(())
    }

    fn fingerprint(&self) -> SchemaVersion {
        let mut hasher = Hasher::new();
        for ty in self.types.values() {
            hasher.update(ty.name().to_string().as_bytes());
            for attr in ty.attributes() {
                hasher.update(b"|a:");
                hasher.update(attr.name.as_bytes());
                hasher.update(b":");
                hasher.update(attr.type_name.to_string().as_bytes());
                hasher.update(if attr.nullable { b"?" } else { b"!" });
            }
            for parent in ty.inherits() {
                hasher.update(b"|i:");
                hasher.update(parent.to_string().as_bytes());
            }
            if let Some(target) = ty.alias_for() {
                hasher.update(b"|as:");
                hasher.update(target.to_string().as_bytes());
            }
            if ty.is_parameter_type() {
                hasher.update(b"|param");
            }
            hasher.update(b"\n");
        }
        for (name, op) in &self.operations {
            hasher.update(name.to_string().as_bytes());
            for param in &op.parameters {
                hasher.update(b"|p:");
                hasher.update(param.type_name.to_string().as_bytes());
            }
            hasher.update(b"|r:");
            hasher.update(op.return_type.to_string().as_bytes());
            hasher.update(b"\n");
        }
        SchemaVersion(hasher.finalize().to_hex().to_string())
    }
}
