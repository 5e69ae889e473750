//! Services and their operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::name::QualifiedName;

/// Identifies an operation within a service.
///
/// Displayed as `service@@operation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationName {
    /// Declaring service.
    pub service: QualifiedName,
    /// Operation name within the service.
    pub operation: String,
}

impl OperationName {
    /// Names `operation` on `service`.
    #[must_use]
    pub fn new(service: QualifiedName, operation: impl Into<String>) -> Self {
        Self {
            service,
            operation: operation.into(),
        }
    }

    /// Parses `svc@@op`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let (service, operation) =
            input
                .split_once("@@")
                .ok_or_else(|| ValidationError::InvalidField {
                    field: "operation name".to_string(),
                    reason: format!("'{input}' is not of the form service@@operation"),
                })?;
        if operation.is_empty() {
            return Err(ValidationError::MissingField {
                field: "operation".to_string(),
            });
        }
        Ok(Self::new(QualifiedName::raw(service)?, operation))
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@@{}", self.service, self.operation)
    }
}

/// An operation parameter. The name is optional; the type is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Optional parameter name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Parameter type.
    pub type_name: QualifiedName,
}

impl Parameter {
    /// An unnamed parameter of the given type.
    #[must_use]
    pub const fn of_type(type_name: QualifiedName) -> Self {
        Self {
            name: None,
            type_name,
        }
    }

    /// A named parameter of the given type.
    #[must_use]
    pub fn named(name: impl Into<String>, type_name: QualifiedName) -> Self {
        Self {
            name: Some(name.into()),
            type_name,
        }
    }
}

/// An invocable operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name within its service.
    pub name: String,
    /// Parameters, in call order.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Type the operation returns.
    pub return_type: QualifiedName,
}

impl Operation {
    /// An operation with the given signature.
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        return_type: QualifiedName,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            return_type,
        }
    }
}

/// A named group of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Fully-qualified service name.
    pub name: QualifiedName,
    /// Operations the service declares.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Service {
    /// A service with no operations.
    #[must_use]
    pub const fn new(name: QualifiedName) -> Self {
        Self {
            name,
            operations: Vec::new(),
        }
    }

    /// Adds an operation, parsing every type name.
    ///
    /// # Example
    /// ```
    /// use weftql::{QualifiedName, Service};
    ///
    /// let svc = Service::new(QualifiedName::parse("acme.OrderService").unwrap())
    ///     .operation("getOrder", &["acme.OrderId"], "acme.Order")
    ///     .unwrap();
    /// assert_eq!(svc.operations[0].parameters.len(), 1);
    /// ```
    pub fn operation(
        mut self,
        name: impl Into<String>,
        parameter_types: &[&str],
        return_type: &str,
    ) -> Result<Self, ValidationError> {
        let parameters = parameter_types
            .iter()
            .map(|t| QualifiedName::parse(t).map(Parameter::of_type))
            .collect::<Result<Vec<_>, _>>()?;
        self.operations.push(Operation::new(
            name,
            parameters,
            QualifiedName::parse(return_type)?,
        ));
        Ok(self)
    }

    /// Adds a fully described operation.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Looks up an operation by name.
    pub fn find_operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Full name of `operation` on this service.
    #[must_use]
    pub fn operation_name(&self, operation: &str) -> OperationName {
        OperationName::new(self.name.clone(), operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_name_display_and_parse() {
        let name = OperationName::new(QualifiedName::parse("acme.OrderService").unwrap(), "getOrder");
        assert_eq!(name.to_string(), "acme.OrderService@@getOrder");
        assert_eq!(OperationName::parse("acme.OrderService@@getOrder").unwrap(), name);
        assert!(OperationName::parse("acme.OrderService").is_err());
        assert!(OperationName::parse("acme.OrderService@@").is_err());
    }

    #[test]
    fn service_builder_parses_types() {
        let svc = Service::new(QualifiedName::parse("acme.OrderService").unwrap())
            .operation("getOrder", &["acme.OrderId"], "acme.Order")
            .unwrap()
            .operation("listOrders", &[], "acme.Order[]")
            .unwrap();
        assert_eq!(svc.operations.len(), 2);
        let list = svc.find_operation("listOrders").unwrap();
        assert!(list.return_type.is_array());
        assert!(svc.find_operation("missing").is_none());
    }

    #[test]
    fn service_builder_rejects_bad_type() {
        let result = Service::new(QualifiedName::parse("acme.S").unwrap()).operation("op", &["9x"], "acme.T");
        assert!(result.is_err());
    }
}
