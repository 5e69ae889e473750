//! Qualified type names.
//!
//! A `QualifiedName` is a dotted namespace plus a simple name, optionally
//! carrying ordered generic type parameters. Array shorthand (`Foo[]`) is
//! expanded to `core.Array<Foo>` while parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Namespace holding the built-in primitive types.
pub const CORE_NAMESPACE: &str = "core";

/// Simple name of the collection root type.
pub const ARRAY_NAME: &str = "Array";

const SEGMENT_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn segment_regex() -> Result<&'static Regex, ValidationError> {
    static SEGMENT: OnceLock<Result<Regex, String>> = OnceLock::new();
    SEGMENT
        .get_or_init(|| Regex::new(SEGMENT_PATTERN).map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|reason| ValidationError::InvalidField {
            field: "name segment pattern".to_string(),
            reason: reason.clone(),
        })
}

/// A namespaced, optionally parameterized type name.
///
/// # Examples
///
/// ```
/// use weftql::QualifiedName;
///
/// let name: QualifiedName = "acme.orders.Order[]".parse().unwrap();
/// assert!(name.is_array());
/// assert_eq!(name.parameters()[0].name(), "Order");
/// assert_eq!(name.to_string(), "core.Array<acme.orders.Order>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName {
    namespace: String,
    name: String,
    parameters: Vec<QualifiedName>,
}

impl QualifiedName {
    /// Parses a name such as `acme.Order`, `core.Array<acme.Order>` or `acme.Order[]`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let mut parser = Parser { src: input, pos: 0 };
        let parsed = parser.parse_type().map_err(|reason| ValidationError::InvalidQualifiedName {
            name: input.to_string(),
            reason,
        })?;
        parser.skip_ws();
        if parser.pos != input.len() {
            return Err(ValidationError::InvalidQualifiedName {
                name: input.to_string(),
                reason: format!("unexpected trailing input at position {}", parser.pos),
            });
        }
        Ok(parsed)
    }

    /// Builds an unparameterized name from a dotted raw name, validating every segment.
    pub fn raw(fully_qualified_name: &str) -> Result<Self, ValidationError> {
        Self::from_raw(fully_qualified_name, Vec::new())
    }

    fn from_raw(raw: &str, parameters: Vec<Self>) -> Result<Self, ValidationError> {
        let re = segment_regex()?;
        for segment in raw.split('.') {
            if !re.is_match(segment) {
                return Err(ValidationError::InvalidQualifiedName {
                    name: raw.to_string(),
                    reason: format!("'{segment}' is not a valid identifier"),
                });
            }
        }
        let (namespace, name) = match raw.rsplit_once('.') {
            Some((ns, n)) => (ns.to_string(), n.to_string()),
            None => (String::new(), raw.to_string()),
        };
        Ok(Self {
            namespace,
            name,
            parameters,
        })
    }

    /// Name of a built-in primitive.
    #[must_use]
    pub fn core(name: &str) -> Self {
        Self {
            namespace: CORE_NAMESPACE.to_string(),
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }

    /// `core.Array<member>`.
    #[must_use]
    pub fn array_of(member: Self) -> Self {
        Self {
            namespace: CORE_NAMESPACE.to_string(),
            name: ARRAY_NAME.to_string(),
            parameters: vec![member],
        }
    }

    /// Returns a copy of this name with the given type parameters.
    #[must_use]
    pub fn with_parameters(&self, parameters: Vec<Self>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            parameters,
        }
    }

    /// Dotted namespace; empty for unqualified names.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Simple name, without namespace or parameters.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type parameters, in order.
    pub fn parameters(&self) -> &[Self] {
        &self.parameters
    }

    /// Dotted name without type parameters.
    #[must_use]
    pub fn fully_qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Dotted name including type parameters, e.g. `core.Array<acme.Order>`.
    #[must_use]
    pub fn parameterized_name(&self) -> String {
        self.to_string()
    }

    /// This name with its type parameters removed.
    #[must_use]
    pub fn raw_name(&self) -> Self {
        self.with_parameters(Vec::new())
    }

    /// True if both names refer to the same raw type, ignoring parameters.
    #[must_use]
    pub fn raw_type_equals(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }

    /// True if the raw type is `core.Array`.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.namespace == CORE_NAMESPACE && self.name == ARRAY_NAME
    }

    /// True if the name carries type parameters.
    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            write!(f, "<")?;
            for (idx, param) in self.parameters.iter().enumerate() {
                if idx > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl FromStr for QualifiedName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.to_string()
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn parse_type(&mut self) -> Result<QualifiedName, String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let raw = &self.src[start..self.pos];
        if raw.is_empty() {
            return Err(format!("expected a type name at position {start}"));
        }

        let mut parameters = Vec::new();
        self.skip_ws();
        if self.peek() == Some('<') {
            self.pos += 1;
            loop {
                parameters.push(self.parse_type()?);
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        break;
                    }
                    Some(other) => {
                        return Err(format!("unexpected '{other}' at position {}", self.pos));
                    }
                    None => return Err("unterminated type parameter list".to_string()),
                }
            }
        }

        let mut name = QualifiedName::from_raw(raw, parameters).map_err(|e| e.to_string())?;
        loop {
            self.skip_ws();
            if self.src[self.pos..].starts_with("[]") {
                self.pos += 2;
                name = QualifiedName::array_of(name);
            } else {
                break;
            }
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_name() {
        let name = QualifiedName::parse("acme.orders.Order").unwrap();
        assert_eq!(name.namespace(), "acme.orders");
        assert_eq!(name.name(), "Order");
        assert!(name.parameters().is_empty());
        assert_eq!(name.fully_qualified_name(), "acme.orders.Order");
    }

    #[test]
    fn parses_unqualified_name() {
        let name = QualifiedName::parse("Order").unwrap();
        assert_eq!(name.namespace(), "");
        assert_eq!(name.to_string(), "Order");
    }

    #[test]
    fn names_may_contain_underscores() {
        let name = QualifiedName::parse("acme.first_name._Internal_Id").unwrap();
        assert_eq!(name.name(), "_Internal_Id");
        assert_eq!(name.namespace(), "acme.first_name");
    }

    #[test]
    fn array_shorthand_expands() {
        let short = QualifiedName::parse("acme.Order[]").unwrap();
        let long = QualifiedName::parse("core.Array<acme.Order>").unwrap();
        assert_eq!(short, long);
        assert!(short.is_array());
    }

    #[test]
    fn nested_array_shorthand() {
        let name = QualifiedName::parse("acme.Order[][]").unwrap();
        assert!(name.is_array());
        assert!(name.parameters()[0].is_array());
        assert_eq!(name.parameters()[0].parameters()[0].name(), "Order");
    }

    #[test]
    fn nested_generics_with_shorthand_inside() {
        let name = QualifiedName::parse("acme.Map<core.String, acme.Order[]>").unwrap();
        assert_eq!(name.parameters().len(), 2);
        assert!(name.parameters()[1].is_array());
        assert_eq!(name.to_string(), "acme.Map<core.String,core.Array<acme.Order>>");
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let name = QualifiedName::parse("acme.Pair<acme.A,core.Array<acme.B>>").unwrap();
        let again = QualifiedName::parse(&name.to_string()).unwrap();
        assert_eq!(name, again);
    }

    #[test]
    fn rejects_invalid_segments() {
        assert!(QualifiedName::parse("acme.9Order").is_err());
        assert!(QualifiedName::parse("acme..Order").is_err());
        assert!(QualifiedName::parse("").is_err());
        assert!(QualifiedName::parse("acme.Order<").is_err());
        assert!(QualifiedName::parse("acme.Order>").is_err());
    }

    #[test]
    fn raw_type_equality_ignores_parameters() {
        let a = QualifiedName::parse("acme.Order[]").unwrap();
        let b = QualifiedName::parse("core.Array<acme.Trade>").unwrap();
        assert!(a.raw_type_equals(&b));
        assert_ne!(a, b);
        assert_eq!(a.raw_name(), QualifiedName::core(ARRAY_NAME));
    }

    #[test]
    fn serde_uses_string_form() {
        let name = QualifiedName::parse("acme.Order[]").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"core.Array<acme.Order>\"");
        let back: QualifiedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
