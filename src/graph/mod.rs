//! The schema graph model.
//!
//! Types, attributes, operation parameters and operations are nodes;
//! [`Relationship`]s are the directed edges between them. A [`Path`] is an
//! ordered list of [`Link`]s from a starting type to a target type, found by
//! [`SchemaGraph::find_path`] and walked by the path evaluator.

mod builder;
mod evaluated;

pub use builder::SchemaGraph;
pub use evaluated::{EvaluatedLink, EvaluatedPath};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::QualifiedName;
use crate::schema::OperationName;

/// Kinds of edges in the schema graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    /// Type → one of its attributes.
    HasAttribute,
    /// Attribute → the type declaring it.
    IsAttributeOf,
    /// Operation parameter → the operation it belongs to.
    RequiresParameter,
    /// Type → a parameter it can populate.
    IsParameterOn,
    /// Type equivalence: attribute → its type, subtype → supertype, alias ↔ target.
    IsTypeOf,
    /// Operation → its return type. Evaluating it invokes the operation.
    Provides,
}

impl Relationship {
    /// Every relationship, in dispatch-table order.
    pub const ALL: [Self; 6] = [
        Self::HasAttribute,
        Self::IsAttributeOf,
        Self::RequiresParameter,
        Self::IsParameterOn,
        Self::IsTypeOf,
        Self::Provides,
    ];

    /// The conceptual inverse. `Provides` has none.
    #[must_use]
    pub const fn inverse(self) -> Option<Self> {
        match self {
            Self::HasAttribute => Some(Self::IsAttributeOf),
            Self::IsAttributeOf => Some(Self::HasAttribute),
            Self::RequiresParameter => Some(Self::IsParameterOn),
            Self::IsParameterOn => Some(Self::RequiresParameter),
            Self::IsTypeOf => Some(Self::IsTypeOf),
            Self::Provides => None,
        }
    }

    /// Upper-case name, as shown in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HasAttribute => "HAS_ATTRIBUTE",
            Self::IsAttributeOf => "IS_ATTRIBUTE_OF",
            Self::RequiresParameter => "REQUIRES_PARAMETER",
            Self::IsParameterOn => "IS_PARAMETER_ON",
            Self::IsTypeOf => "IS_TYPE_OF",
            Self::Provides => "PROVIDES",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the schema graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeId {
    /// A schema type.
    Type { name: QualifiedName },
    /// An attribute `name` declared on `owner`.
    Attribute { owner: QualifiedName, name: String },
    /// A service operation.
    Operation { name: OperationName },
    /// Parameter `index` of `operation`.
    Parameter { operation: OperationName, index: usize },
}

impl NodeId {
    /// Node for a type.
    #[must_use]
    pub const fn type_node(name: QualifiedName) -> Self {
        Self::Type { name }
    }

    /// Node for an attribute of `owner`.
    #[must_use]
    pub fn attribute(owner: QualifiedName, name: impl Into<String>) -> Self {
        Self::Attribute {
            owner,
            name: name.into(),
        }
    }

    /// Node for an operation.
    #[must_use]
    pub const fn operation(name: OperationName) -> Self {
        Self::Operation { name }
    }

    /// Node for a parameter of `operation`.
    #[must_use]
    pub const fn parameter(operation: OperationName, index: usize) -> Self {
        Self::Parameter { operation, index }
    }

    /// The type named by a `Type` node.
    pub const fn type_name(&self) -> Option<&QualifiedName> {
        match self {
            Self::Type { name } => Some(name),
            _ => None,
        }
    }

    /// The final `/` segment of an attribute node.
    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            Self::Attribute { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The operation an `Operation` or `Parameter` node refers to.
    pub const fn operation_name(&self) -> Option<&OperationName> {
        match self {
            Self::Operation { name } | Self::Parameter { operation: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Parameter index, for parameter nodes.
    pub const fn parameter_index(&self) -> Option<usize> {
        match self {
            Self::Parameter { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name } => write!(f, "{name}"),
            Self::Attribute { owner, name } => write!(f, "{owner}/{name}"),
            Self::Operation { name } => write!(f, "{name}"),
            Self::Parameter { operation, index } => write!(f, "param/{operation}/{index}"),
        }
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Node the link leaves.
    pub start: NodeId,
    /// How the two nodes are related.
    pub relationship: Relationship,
    /// Node the link reaches.
    pub end: NodeId,
}

impl Link {
    /// A link from `start` to `end`.
    #[must_use]
    pub const fn new(start: NodeId, relationship: Relationship, end: NodeId) -> Self {
        Self {
            start,
            relationship,
            end,
        }
    }

    /// `start -[RELATIONSHIP]-> end`
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.start, self.relationship, self.end)
    }
}

/// An ordered list of links between two types.
///
/// `exists` records whether the path was discoverable, not whether it will
/// evaluate successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Type the path starts at.
    pub start: QualifiedName,
    /// Type the path leads to.
    pub target: QualifiedName,
    /// Links in walking order.
    pub links: Vec<Link>,
    /// False if no path was found.
    pub exists: bool,
}

impl Path {
    /// A discovered path.
    #[must_use]
    pub const fn found(start: QualifiedName, target: QualifiedName, links: Vec<Link>) -> Self {
        Self {
            start,
            target,
            links,
            exists: true,
        }
    }

    /// The zero-link path from a type to itself.
    #[must_use]
    pub fn identity(ty: QualifiedName) -> Self {
        Self::found(ty.clone(), ty, Vec::new())
    }

    /// Marker for "no path between these types".
    #[must_use]
    pub const fn not_found(start: QualifiedName, target: QualifiedName) -> Self {
        Self {
            start,
            target,
            links: Vec::new(),
            exists: false,
        }
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True for a zero-link path.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True if any link invokes an operation.
    #[must_use]
    pub fn invokes_operation(&self) -> bool {
        self.links.iter().any(|l| l.relationship == Relationship::Provides)
    }

    /// Link descriptions joined with `, `.
    #[must_use]
    pub fn description(&self) -> String {
        if !self.exists {
            return format!("no path from {} to {}", self.start, self.target);
        }
        if self.links.is_empty() {
            return format!("{} is {}", self.start, self.target);
        }
        self.links
            .iter()
            .map(Link::description)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
