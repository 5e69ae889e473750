//! Builds [`TypedInstance`] trees from untyped value trees.

use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use super::TypedInstance;
use crate::error::{InstanceError, WeftResult};
use crate::schema::Schema;
use crate::types::{PrimitiveKind, Type};
use crate::value::ScalarValue;

/// Reads `value` as an instance of `ty`.
///
/// - `null` becomes `TypedInstance::Null`.
/// - Alias types are read as the type they resolve to and re-tagged with the
///   alias.
/// - A single-entry map whose value is itself a map is unwrapped, unless its
///   key is a declared attribute.
/// - Declared attributes missing from the map become nulls; undeclared keys
///   are ignored.
/// - Scalars are converted through the type's base primitive.
///
/// # Example
/// ```
/// use weftql::{instance, Schema, Type};
///
/// let schema = Schema::builder()
///     .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
///     .add_type(Type::named("acme.Order").attribute("id", "acme.OrderId").build().unwrap())
///     .build()
///     .unwrap();
/// let order_ty = schema.type_by_name("acme.Order").unwrap();
/// let order = instance::from_value(&schema, &order_ty, &serde_json::json!({"id": 42})).unwrap();
/// assert_eq!(order.get("id").unwrap().to_raw_value(), serde_json::json!(42));
/// ```
pub fn from_value(schema: &Schema, ty: &Arc<Type>, value: &Json) -> WeftResult<TypedInstance> {
    if value.is_null() {
        return Ok(TypedInstance::null(Arc::clone(ty)));
    }

    if ty.is_type_alias() {
        let resolved = schema.resolve_aliases(ty)?;
        if resolved.name() != ty.name() {
            let inner = from_value(schema, &resolved, value)?;
            return Ok(inner.with_type(Arc::clone(ty)));
        }
    }

    if ty.is_collection() {
        let Json::Array(items) = value else {
            return Err(shape_mismatch(ty, "collection", value));
        };
        let member_ty = match schema.collection_member_type(ty)? {
            Some(member) => member,
            None => schema.primitive(PrimitiveKind::Any)?,
        };
        let members = items
            .iter()
            .map(|item| from_value(schema, &member_ty, item))
            .collect::<WeftResult<Vec<_>>>()?;
        return Ok(TypedInstance::Collection {
            ty: Arc::clone(ty),
            members,
        });
    }

    if ty.is_scalar() {
        let scalar = convert_scalar(schema, ty, value)?;
        return Ok(TypedInstance::Value {
            ty: Arc::clone(ty),
            value: scalar,
        });
    }

    let Json::Object(map) = value else {
        return Err(shape_mismatch(ty, "object", value));
    };
    if map.len() == 1 {
        if let Some((key, inner @ Json::Object(_))) = map.iter().next() {
            if !ty.has_attribute(key) {
                debug!(type_name = %ty.name(), wrapper = %key, "unwrapping single-entry map");
                return from_value(schema, ty, inner);
            }
        }
    }

    let mut attributes = Vec::with_capacity(ty.attributes().len());
    for attr in ty.attributes() {
        let attr_ty = schema.type_named(&attr.type_name)?;
        let attr_value = match map.get(&attr.name) {
            Some(v) => from_value(schema, &attr_ty, v)?,
            None => TypedInstance::null(attr_ty),
        };
        attributes.push((attr.name.clone(), attr_value));
    }
    Ok(TypedInstance::Object {
        ty: Arc::clone(ty),
        attributes,
    })
}

fn convert_scalar(schema: &Schema, ty: &Type, value: &Json) -> WeftResult<ScalarValue> {
    let conversion_error = |reason: &str| InstanceError::ValueConversion {
        type_name: ty.name().to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let converted = match (schema.base_primitive(ty)?, value) {
        (_, Json::Array(_) | Json::Object(_)) => {
            return Err(shape_mismatch(ty, "scalar", value));
        }
        (Some(PrimitiveKind::String), Json::String(s)) => ScalarValue::String(s.clone()),
        (Some(PrimitiveKind::String), Json::Number(n)) => ScalarValue::String(n.to_string()),
        (Some(PrimitiveKind::String), Json::Bool(b)) => ScalarValue::String(b.to_string()),

        (Some(PrimitiveKind::Int), Json::Number(n)) => match n.as_i64() {
            Some(i) => ScalarValue::Int(i),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
                    ScalarValue::Int(f as i64)
                }
                _ => return Err(conversion_error("not an integer").into()),
            },
        },
        (Some(PrimitiveKind::Int), Json::String(s)) => ScalarValue::Int(
            s.trim()
                .parse::<i64>()
                .map_err(|e| conversion_error(&e.to_string()))?,
        ),

        (Some(PrimitiveKind::Decimal), Json::Number(n)) => match n.as_f64() {
            Some(f) => ScalarValue::Float(f),
            None => return Err(conversion_error("not representable as a decimal").into()),
        },
        (Some(PrimitiveKind::Decimal), Json::String(s)) => ScalarValue::Float(
            s.trim()
                .parse::<f64>()
                .map_err(|e| conversion_error(&e.to_string()))?,
        ),

        (Some(PrimitiveKind::Boolean), Json::Bool(b)) => ScalarValue::Bool(*b),
        (Some(PrimitiveKind::Boolean), Json::String(s)) => match s.trim() {
            "true" => ScalarValue::Bool(true),
            "false" => ScalarValue::Bool(false),
            _ => return Err(conversion_error("expected true or false").into()),
        },

        (Some(PrimitiveKind::Any) | None, v) => infer_scalar(v)
            .ok_or_else(|| conversion_error("unsupported value"))?,

        (Some(_), _) => return Err(conversion_error("incompatible value").into()),
    };
    Ok(converted)
}

fn infer_scalar(value: &Json) -> Option<ScalarValue> {
    match value {
        Json::Bool(b) => Some(ScalarValue::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(ScalarValue::Int)
            .or_else(|| n.as_f64().map(ScalarValue::Float)),
        Json::String(s) => Some(ScalarValue::String(s.clone())),
        Json::Null | Json::Array(_) | Json::Object(_) => None,
    }
}

fn shape_mismatch(ty: &Type, expected: &str, found: &Json) -> crate::error::WeftError {
    let found = match found {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "map",
    };
    InstanceError::ShapeMismatch {
        type_name: ty.name().to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::WeftError;
    use crate::schema::Schema;

    fn schema() -> Schema {
        Schema::builder()
            .add_type(Type::named("acme.OrderId").alias_for("core.Int").build().unwrap())
            .add_type(Type::named("acme.Price").alias_for("core.Decimal").build().unwrap())
            .add_type(Type::named("acme.Status").alias_for("core.String").build().unwrap())
            .add_type(Type::named("acme.Paid").alias_for("core.Boolean").build().unwrap())
            .add_type(
                Type::named("acme.Order")
                    .attribute("id", "acme.OrderId")
                    .attribute("status", "acme.Status")
                    .attribute("price", "acme.Price")
                    .build()
                    .unwrap(),
            )
            .add_type(Type::named("acme.PurchaseOrder").alias_for("acme.Order").build().unwrap())
            .add_type(Type::named("acme.Orders").alias_for("acme.Order[]").build().unwrap())
            .build()
            .unwrap()
    }

    fn read(s: &Schema, ty: &str, value: serde_json::Value) -> WeftResult<TypedInstance> {
        from_value(s, &s.type_by_name(ty).unwrap(), &value)
    }

    #[test]
    fn reads_object_with_missing_and_extra_keys() {
        let s = schema();
        let order = read(&s, "acme.Order", json!({"id": 42, "unknown": true})).unwrap();
        assert_eq!(order.get("id").unwrap().value(), Some(&ScalarValue::Int(42)));
        assert!(order.get("status").unwrap().is_null());
        assert!(order.get("unknown").is_none());
    }

    #[test]
    fn unwraps_single_entry_map() {
        let s = schema();
        let order = read(&s, "acme.Order", json!({"order": {"id": 1, "status": "NEW"}})).unwrap();
        assert_eq!(order.get("id").unwrap().value(), Some(&ScalarValue::Int(1)));
    }

    #[test]
    fn alias_is_read_as_target_and_retagged() {
        let s = schema();
        let po = read(&s, "acme.PurchaseOrder", json!({"id": 3})).unwrap();
        assert_eq!(po.type_name().to_string(), "acme.PurchaseOrder");
        assert!(po.get("id").is_some());
    }

    #[test]
    fn reads_collections_of_member_type() {
        let s = schema();
        let orders = read(&s, "acme.Orders", json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(orders.type_name().to_string(), "acme.Orders");
        let members = orders.members().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[1].type_name().to_string(), "acme.Order");
    }

    #[test]
    fn converts_scalars_losslessly() {
        let s = schema();
        assert_eq!(read(&s, "acme.OrderId", json!("17")).unwrap().value(), Some(&ScalarValue::Int(17)));
        assert_eq!(read(&s, "acme.OrderId", json!(17.0)).unwrap().value(), Some(&ScalarValue::Int(17)));
        assert_eq!(read(&s, "acme.Status", json!(5)).unwrap().value(), Some(&ScalarValue::from("5")));
        assert_eq!(read(&s, "acme.Price", json!("1.5")).unwrap().value(), Some(&ScalarValue::Float(1.5)));
        assert_eq!(read(&s, "acme.Paid", json!("true")).unwrap().value(), Some(&ScalarValue::Bool(true)));
    }

    #[test]
    fn conversion_failures_are_instance_errors() {
        let s = schema();
        assert!(matches!(
            read(&s, "acme.OrderId", json!("abc")),
            Err(WeftError::Instance(InstanceError::ValueConversion { .. }))
        ));
        assert!(matches!(
            read(&s, "acme.OrderId", json!(1.5)),
            Err(WeftError::Instance(InstanceError::ValueConversion { .. }))
        ));
        assert!(matches!(
            read(&s, "acme.Order", json!([1, 2])),
            Err(WeftError::Instance(InstanceError::ShapeMismatch { .. }))
        ));
        assert!(matches!(
            read(&s, "acme.Status", json!({"a": 1})),
            Err(WeftError::Instance(InstanceError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn null_reads_as_null() {
        let s = schema();
        assert!(read(&s, "acme.Order", serde_json::Value::Null).unwrap().is_null());
    }
}
