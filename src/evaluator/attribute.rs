//! `HAS_ATTRIBUTE` links: reads an attribute off an object.

use tracing::{debug, error};

use super::LinkEvaluator;
use crate::context::QueryContext;
use crate::error::WeftResult;
use crate::graph::{EvaluatedLink, Link, Relationship};
use crate::instance::TypedInstance;

/// Reads an attribute off an object.
#[derive(Debug, Clone, Copy, Default)]
pub struct HasAttributeEvaluator;

impl LinkEvaluator for HasAttributeEvaluator {
    fn relationship(&self) -> Relationship {
        Relationship::HasAttribute
    }

    fn evaluate(
        &self,
        link: &Link,
        starting: &TypedInstance,
        context: &dyn QueryContext,
    ) -> WeftResult<EvaluatedLink> {
        let Some(attribute) = link.end.attribute_name() else {
            error!(link = %link, "HAS_ATTRIBUTE link does not end at an attribute");
            return Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Link {link} does not end at an attribute"),
            ));
        };

        if !matches!(starting, TypedInstance::Object { .. }) {
            error!(
                link = %link,
                found = %starting,
                "HAS_ATTRIBUTE evaluated against a non-object"
            );
            return Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Cannot read attribute '{attribute}' from non-object {starting}"),
            ));
        }

        let declaring = context.schema().resolve_aliases(starting.ty())?;
        if !declaring.has_attribute(attribute) {
            error!(
                attribute,
                type_name = %starting.type_name(),
                "attribute not declared on instance type"
            );
            return Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Attribute '{attribute}' is not declared on {}", starting.type_name()),
            ));
        }

        match starting.get(attribute) {
            Some(value) if !value.is_null() => {
                debug!(attribute, value = %value, "attribute read");
                Ok(EvaluatedLink::success(link.clone(), starting.clone(), value.clone()))
            }
            _ => Ok(EvaluatedLink::failed(
                link.clone(),
                starting.clone(),
                format!("Attribute '{attribute}' evaluated to null"),
            )),
        }
    }
}
