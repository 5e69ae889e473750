//! Typed runtime values.
//!
//! A [`TypedInstance`] ties a value to the schema [`Type`] it was read as.
//! Instances are immutable once built; the validating constructors check the
//! declared type against the wrapped value before anything else sees it.

mod factory;

pub use factory::from_value;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error::{InstanceError, WeftResult};
use crate::name::QualifiedName;
use crate::schema::Schema;
use crate::types::{PrimitiveKind, Type};
use crate::value::ScalarValue;

/// A value of a schema type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedInstance {
    /// A structured value with attributes in declaration order.
    Object {
        ty: Arc<Type>,
        attributes: Vec<(String, TypedInstance)>,
    },
    /// An ordered collection.
    Collection {
        ty: Arc<Type>,
        members: Vec<TypedInstance>,
    },
    /// A scalar.
    Value { ty: Arc<Type>, value: ScalarValue },
    /// An absent value of a known type.
    Null { ty: Arc<Type> },
}

impl TypedInstance {
    /// Builds an object, checking every attribute is declared and assignable.
    pub fn object(
        schema: &Schema,
        ty: Arc<Type>,
        attributes: Vec<(String, Self)>,
    ) -> WeftResult<Self> {
        if ty.is_scalar() || ty.is_collection() {
            return Err(InstanceError::ShapeMismatch {
                type_name: ty.name().to_string(),
                expected: expected_shape(&ty).to_string(),
                found: "object".to_string(),
            }
            .into());
        }
        let declared_on = schema.resolve_aliases(&ty)?;
        for (name, value) in &attributes {
            let attr = declared_on
                .attribute(name)
                .ok_or_else(|| InstanceError::UndeclaredAttribute {
                    type_name: ty.name().to_string(),
                    attribute: name.clone(),
                })?;
            if value.is_null() {
                continue;
            }
            let attr_ty = schema.type_named(&attr.type_name)?;
            if !schema.is_assignable_to(value.ty(), &attr_ty) {
                return Err(InstanceError::NotAssignable {
                    expected: attr_ty.name().to_string(),
                    actual: value.type_name().to_string(),
                }
                .into());
            }
        }
        Ok(Self::Object { ty, attributes })
    }

    /// Builds a collection, checking every non-null member against the
    /// collection's member type.
    pub fn collection(schema: &Schema, ty: Arc<Type>, members: Vec<Self>) -> WeftResult<Self> {
        let member_ty = schema.collection_member_type(&ty)?.ok_or_else(|| {
            InstanceError::ShapeMismatch {
                type_name: ty.name().to_string(),
                expected: expected_shape(&ty).to_string(),
                found: "collection".to_string(),
            }
        })?;
        if member_ty.primitive_kind() != Some(PrimitiveKind::Any) {
            for member in members.iter().filter(|m| !m.is_null()) {
                if !schema.is_assignable_to(member.ty(), &member_ty) {
                    return Err(InstanceError::NotAssignable {
                        expected: member_ty.name().to_string(),
                        actual: member.type_name().to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(Self::Collection { ty, members })
    }

    /// Builds a scalar, checking the value fits the type's base primitive.
    pub fn scalar(schema: &Schema, ty: Arc<Type>, value: impl Into<ScalarValue>) -> WeftResult<Self> {
        let value = value.into();
        if !ty.is_scalar() {
            return Err(InstanceError::ShapeMismatch {
                type_name: ty.name().to_string(),
                expected: expected_shape(&ty).to_string(),
                found: value.type_name().to_string(),
            }
            .into());
        }
        let fits = match schema.base_primitive(&ty)? {
            Some(PrimitiveKind::String) => value.is_string(),
            Some(PrimitiveKind::Int) => value.is_int(),
            Some(PrimitiveKind::Decimal) => value.is_float() || value.is_int(),
            Some(PrimitiveKind::Boolean) => value.is_bool(),
            Some(PrimitiveKind::Array) => false,
            Some(PrimitiveKind::Any) | None => true,
        };
        if !fits {
            return Err(InstanceError::ValueConversion {
                type_name: ty.name().to_string(),
                value: value.to_string(),
                reason: format!("a {} value does not fit this type", value.type_name()),
            }
            .into());
        }
        Ok(Self::Value { ty, value })
    }

    /// A null of type `ty`.
    #[must_use]
    pub const fn null(ty: Arc<Type>) -> Self {
        Self::Null { ty }
    }

    /// The instance's type.
    pub const fn ty(&self) -> &Arc<Type> {
        match self {
            Self::Object { ty, .. }
            | Self::Collection { ty, .. }
            | Self::Value { ty, .. }
            | Self::Null { ty } => ty,
        }
    }

    /// Name of the instance's type.
    pub fn type_name(&self) -> &QualifiedName {
        self.ty().name()
    }

    /// True for a null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null { .. })
    }

    /// False for nulls, and for empty strings when `ignore_empty_strings` is set.
    #[must_use]
    pub fn has_value(&self, ignore_empty_strings: bool) -> bool {
        match self {
            Self::Null { .. } => false,
            Self::Value { value, .. } => !(ignore_empty_strings && value.is_empty_string()),
            Self::Object { .. } | Self::Collection { .. } => true,
        }
    }

    /// Attribute value of an object; `None` for other shapes or unknown names.
    pub fn get(&self, attribute: &str) -> Option<&Self> {
        match self {
            Self::Object { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == attribute)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Attribute values, for objects.
    pub fn attributes(&self) -> Option<&[(String, Self)]> {
        match self {
            Self::Object { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Members, for collections.
    pub fn members(&self) -> Option<&[Self]> {
        match self {
            Self::Collection { members, .. } => Some(members),
            _ => None,
        }
    }

    /// The scalar value, for scalars.
    pub const fn value(&self) -> Option<&ScalarValue> {
        match self {
            Self::Value { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The same value re-tagged with another type (used for aliases).
    #[must_use]
    pub fn with_type(self, ty: Arc<Type>) -> Self {
        match self {
            Self::Object { attributes, .. } => Self::Object { ty, attributes },
            Self::Collection { members, .. } => Self::Collection { ty, members },
            Self::Value { value, .. } => Self::Value { ty, value },
            Self::Null { .. } => Self::Null { ty },
        }
    }

    /// This instance and every nested instance, breadth first. Nulls are skipped.
    pub fn breadth_first(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([self]);
        while let Some(next) = queue.pop_front() {
            if next.is_null() {
                continue;
            }
            out.push(next);
            match next {
                Self::Object { attributes, .. } => queue.extend(attributes.iter().map(|(_, v)| v)),
                Self::Collection { members, .. } => queue.extend(members.iter()),
                Self::Value { .. } | Self::Null { .. } => {}
            }
        }
        out
    }

    /// Converts back to an untyped value tree.
    #[must_use]
    pub fn to_raw_value(&self) -> serde_json::Value {
        match self {
            Self::Object { attributes, .. } => serde_json::Value::Object(
                attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_raw_value()))
                    .collect(),
            ),
            Self::Collection { members, .. } => {
                serde_json::Value::Array(members.iter().map(Self::to_raw_value).collect())
            }
            Self::Value { value, .. } => value.to_json(),
            Self::Null { .. } => serde_json::Value::Null,
        }
    }

    /// Equality on values only, ignoring type tags.
    #[must_use]
    pub fn value_equals(&self, other: &Self) -> bool {
        self.to_raw_value() == other.to_raw_value()
    }
}

impl fmt::Display for TypedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { ty, value } => write!(f, "{}({value})", ty.name()),
            Self::Null { ty } => write!(f, "{}(null)", ty.name()),
            Self::Object { ty, attributes } => write!(f, "{}{{{} attributes}}", ty.name(), attributes.len()),
            Self::Collection { ty, members } => write!(f, "{}[{} members]", ty.name(), members.len()),
        }
    }
}

fn expected_shape(ty: &Type) -> &'static str {
    if ty.is_collection() {
        "collection"
    } else if ty.is_scalar() {
        "scalar"
    } else {
        "object"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema() -> Schema {
        Schema::builder()
            .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
            .add_type(Type::named("acme.Status").alias_for("core.String").build().unwrap())
            .add_type(
                Type::named("acme.Order")
                    .attribute("id", "acme.OrderId")
                    .nullable_attribute("status", "acme.Status")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn order(s: &Schema) -> TypedInstance {
        let id = TypedInstance::scalar(s, s.type_by_name("acme.OrderId").unwrap(), 42).unwrap();
        let status = TypedInstance::null(s.type_by_name("acme.Status").unwrap());
        TypedInstance::object(
            s,
            s.type_by_name("acme.Order").unwrap(),
            vec![("id".to_string(), id), ("status".to_string(), status)],
        )
        .unwrap()
    }

    #[test]
    fn scalar_constructor_checks_base_primitive() {
        let s = schema();
        let id_ty = s.type_by_name("acme.OrderId").unwrap();
        assert!(TypedInstance::scalar(&s, id_ty.clone(), 7).is_ok());
        assert!(TypedInstance::scalar(&s, id_ty, "seven").is_err());
        let order_ty = s.type_by_name("acme.Order").unwrap();
        assert!(TypedInstance::scalar(&s, order_ty, 1).is_err());
    }

    #[test]
    fn object_constructor_rejects_undeclared_and_mistyped() {
        let s = schema();
        let order_ty = s.type_by_name("acme.Order").unwrap();
        let status = TypedInstance::scalar(&s, s.type_by_name("acme.Status").unwrap(), "NEW").unwrap();

        let err = TypedInstance::object(&s, order_ty.clone(), vec![("nope".to_string(), status.clone())]);
        assert!(err.is_err());

        let err = TypedInstance::object(&s, order_ty, vec![("id".to_string(), status)]);
        assert!(err.is_err());
    }

    #[test]
    fn collection_constructor_checks_members() {
        let s = schema();
        let ids_ty = s.type_by_name("acme.OrderId[]").unwrap();
        let id = TypedInstance::scalar(&s, s.type_by_name("acme.OrderId").unwrap(), 1).unwrap();
        assert!(TypedInstance::collection(&s, ids_ty.clone(), vec![id]).is_ok());
        assert!(TypedInstance::collection(&s, ids_ty, vec![order(&s)]).is_err());
    }

    #[test]
    fn accessors() {
        let s = schema();
        let o = order(&s);
        assert_eq!(o.get("id").and_then(TypedInstance::value), Some(&ScalarValue::Int(42)));
        assert!(o.get("status").unwrap().is_null());
        assert!(o.get("missing").is_none());
        assert_eq!(o.type_name().to_string(), "acme.Order");
    }

    #[test]
    fn has_value_treats_empty_strings() {
        let s = schema();
        let empty = TypedInstance::scalar(&s, s.type_by_name("acme.Status").unwrap(), "").unwrap();
        assert!(!empty.has_value(true));
        assert!(empty.has_value(false));
        assert!(!TypedInstance::null(s.type_by_name("acme.Status").unwrap()).has_value(false));
    }

    #[test]
    fn breadth_first_skips_nulls() {
        let s = schema();
        let o = order(&s);
        let names: Vec<String> = o.breadth_first().iter().map(|i| i.type_name().to_string()).collect();
        assert_eq!(names, vec!["acme.Order", "acme.OrderId"]);
    }

    #[test]
    fn raw_value_and_value_equality() {
        let s = schema();
        let o = order(&s);
        assert_eq!(o.to_raw_value(), serde_json::json!({"id": 42, "status": null}));
        let retagged = o.clone().with_type(s.type_by_name("core.Any").unwrap());
        assert!(retagged.value_equals(&o));
        assert_ne!(retagged, o);
    }
}
