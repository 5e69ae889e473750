//! Schema types.
//!
//! A [`Type`] is identified by its [`QualifiedName`] and references other types
//! by name only. Relationships between types (alias resolution, inheritance,
//! assignability) are answered by the owning [`Schema`](crate::schema::Schema),
//! which also computes the derived `scalar` / `collection` flags when the type
//! is registered.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::name::{QualifiedName, ARRAY_NAME};

/// Built-in primitive types, registered in every schema under `core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// `core.String`.
    String,
    /// `core.Int`.
    Int,
    /// `core.Decimal`.
    Decimal,
    /// `core.Boolean`.
    Boolean,
    /// `core.Any`, which accepts every value.
    Any,
    /// `core.Array`.
    Array,
}

impl PrimitiveKind {
    /// Every built-in primitive, in registration order.
    pub const ALL: [Self; 6] = [
        Self::String,
        Self::Int,
        Self::Decimal,
        Self::Boolean,
        Self::Any,
        Self::Array,
    ];

    /// Name within the `core` namespace.
    #[must_use]
    pub const fn simple_name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::Any => "Any",
            Self::Array => ARRAY_NAME,
        }
    }

    /// Fully-qualified `core` name.
    #[must_use]
    pub fn qualified_name(self) -> QualifiedName {
        QualifiedName::core(self.simple_name())
    }
}

/// A declared attribute of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute type.
    pub type_name: QualifiedName,
    /// True if the attribute may be null.
    #[serde(default)]
    pub nullable: bool,
}

/// A type in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    name: QualifiedName,
    #[serde(default)]
    attributes: Vec<Attribute>,
    #[serde(default)]
    inherits: Vec<QualifiedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alias_for: Option<QualifiedName>,
    #[serde(default)]
    parameter_type: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primitive: Option<PrimitiveKind>,
    #[serde(default)]
    scalar: bool,
    #[serde(default)]
    collection: bool,
}

impl Type {
    /// Starts building a type with the given name.
    pub fn named(name: &str) -> TypeBuilder {
        TypeBuilder::new(name)
    }

    /// The built-in primitive type for `kind`.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Self {
        let collection = kind == PrimitiveKind::Array;
        Self {
            name: kind.qualified_name(),
            attributes: Vec::new(),
            inherits: Vec::new(),
            alias_for: None,
            parameter_type: false,
            primitive: Some(kind),
            scalar: !collection,
            collection,
        }
    }

    /// A parameterized use of `base`, e.g. `core.Array<acme.Order>`.
    ///
    /// Flags are left for the schema to compute.
    #[must_use]
    pub(crate) fn parameterized(base: &Self, name: QualifiedName) -> Self {
        Self {
            name,
            attributes: base.attributes.clone(),
            inherits: base.inherits.clone(),
            alias_for: base.alias_for.clone(),
            parameter_type: base.parameter_type,
            primitive: None,
            scalar: false,
            collection: false,
        }
    }

    /// Rewrites every referenced type name (not the type's own name).
    pub(crate) fn map_references<E>(
        mut self,
        mut f: impl FnMut(&QualifiedName) -> Result<QualifiedName, E>,
    ) -> Result<Self, E> {
        for attr in &mut self.attributes {
            attr.type_name = f(&attr.type_name)?;
        }
        for parent in &mut self.inherits {
            *parent = f(parent)?;
        }
        if let Some(target) = self.alias_for.take() {
            self.alias_for = Some(f(&target)?);
        }
        Ok(self)
    }

    /// Every type name this type refers to.
    pub(crate) fn references(&self) -> impl Iterator<Item = &QualifiedName> {
        self.attributes
            .iter()
            .map(|a| &a.type_name)
            .chain(self.inherits.iter())
            .chain(self.alias_for.iter())
    }

    /// Appends inherited attributes after the declared ones. A name already
    /// present is skipped, so the nearest declaration wins.
    pub(crate) fn with_inherited_attributes(
        mut self,
        inherited: impl IntoIterator<Item = Attribute>,
    ) -> Self {
        for attr in inherited {
            if !self.has_attribute(&attr.name) {
                self.attributes.push(attr);
            }
        }
        self
    }

    pub(crate) fn with_flags(mut self, scalar: bool, collection: bool) -> Self {
        self.scalar = scalar;
        self.collection = collection;
        self
    }

    /// The type's qualified name.
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Declared attributes followed by inherited ones, once the type is
    /// registered in a schema.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// True if the type has an attribute called `name`.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Declared direct supertypes.
    pub fn inherits(&self) -> &[QualifiedName] {
        &self.inherits
    }

    /// The aliased type, for aliases.
    pub fn alias_for(&self) -> Option<&QualifiedName> {
        self.alias_for.as_ref()
    }

    /// True for aliases.
    pub const fn is_type_alias(&self) -> bool {
        self.alias_for.is_some()
    }

    /// True if the type may be constructed on demand from its attributes.
    pub const fn is_parameter_type(&self) -> bool {
        self.parameter_type
    }

    /// True for the built-in `core` types.
    pub const fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    /// Which primitive this is, for built-in types.
    pub const fn primitive_kind(&self) -> Option<PrimitiveKind> {
        self.primitive
    }

    /// No attributes and not a collection, after alias resolution.
    pub const fn is_scalar(&self) -> bool {
        self.scalar
    }

    /// The type resolves to `core.Array`.
    pub const fn is_collection(&self) -> bool {
        self.collection
    }

    /// Type parameters of the name, e.g. the member of `core.Array<T>`.
    pub fn type_parameters(&self) -> &[QualifiedName] {
        self.name.parameters()
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Fluent builder for [`Type`].
///
/// Name parsing errors are collected and reported by [`TypeBuilder::build`].
///
/// # Example
/// ```
/// use weftql::Type;
///
/// let order = Type::named("acme.Order")
///     .attribute("id", "acme.OrderId")
///     .attribute("status", "acme.Status")
///     .build()
///     .unwrap();
/// assert_eq!(order.attributes().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    name: Result<QualifiedName, ValidationError>,
    attributes: Vec<Attribute>,
    inherits: Vec<QualifiedName>,
    alias_for: Option<QualifiedName>,
    parameter_type: bool,
    error: Option<ValidationError>,
}

impl TypeBuilder {
    /// Creates a new builder for the named type.
    pub fn new(name: &str) -> Self {
        Self {
            name: QualifiedName::parse(name),
            attributes: Vec::new(),
            inherits: Vec::new(),
            alias_for: None,
            parameter_type: false,
            error: None,
        }
    }

    fn parse(&mut self, name: &str) -> Option<QualifiedName> {
        match QualifiedName::parse(name) {
            Ok(q) => Some(q),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    /// Declares an attribute.
    #[must_use]
    pub fn attribute(self, name: impl Into<String>, type_name: &str) -> Self {
        self.push_attribute(name.into(), type_name, false)
    }

    /// Declares an attribute whose value may be null.
    #[must_use]
    pub fn nullable_attribute(self, name: impl Into<String>, type_name: &str) -> Self {
        self.push_attribute(name.into(), type_name, true)
    }

    fn push_attribute(mut self, name: String, type_name: &str, nullable: bool) -> Self {
        if let Some(type_name) = self.parse(type_name) {
            self.attributes.push(Attribute {
                name,
                type_name,
                nullable,
            });
        }
        self
    }

    /// Adds a direct supertype.
    #[must_use]
    pub fn inherits(mut self, type_name: &str) -> Self {
        if let Some(q) = self.parse(type_name) {
            self.inherits.push(q);
        }
        self
    }

    /// Makes this type an alias for another type.
    #[must_use]
    pub fn alias_for(mut self, type_name: &str) -> Self {
        self.alias_for = self.parse(type_name);
        self
    }

    /// Marks the type as constructible on demand.
    #[must_use]
    pub fn parameter_type(mut self) -> Self {
        self.parameter_type = true;
        self
    }

    /// Builds the type.
    ///
    /// Returns `ValidationError` if any name failed to parse, an attribute is
    /// declared twice, or an alias also declares attributes.
    pub fn build(self) -> Result<Type, ValidationError> {
        let name = self.name?;
        if let Some(e) = self.error {
            return Err(e);
        }
        for (idx, attr) in self.attributes.iter().enumerate() {
            if self.attributes[..idx].iter().any(|a| a.name == attr.name) {
                return Err(ValidationError::InvalidField {
                    field: format!("{name}.{}", attr.name),
                    reason: "attribute declared more than once".to_string(),
                });
            }
        }
        if self.alias_for.is_some() && !self.attributes.is_empty() {
            return Err(ValidationError::InvalidField {
                field: name.to_string(),
                reason: "a type alias cannot declare attributes".to_string(),
            });
        }
        Ok(Type {
            name,
            attributes: self.attributes,
            inherits: self.inherits,
            alias_for: self.alias_for,
            parameter_type: self.parameter_type,
            primitive: None,
            scalar: false,
            collection: false,
        })
    }
}
