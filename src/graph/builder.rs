//! Builds the schema graph and discovers paths through it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use super::{Link, NodeId, Path, Relationship};
use crate::error::SchemaError;
use crate::name::QualifiedName;
use crate::schema::{OperationName, Schema};

/// Directed graph over a schema's types, attributes and operations.
///
/// Edges:
/// - `T -[HAS_ATTRIBUTE]-> T/a`, `T/a -[IS_ATTRIBUTE_OF]-> T`, `T/a -[IS_TYPE_OF]-> A`
/// - `Sub -[IS_TYPE_OF]-> Super`
/// - `Alias -[IS_TYPE_OF]-> Target` unless `Target` is a scalar primitive, and
///   back again unless `Target` is any primitive
/// - `P -[IS_PARAMETER_ON]-> param/op/i -[REQUIRES_PARAMETER]-> op -[PROVIDES]-> R`
/// - for parameter types, each attribute type `-[IS_PARAMETER_ON]->` the parameter
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    schema: Arc<Schema>,
    edges: BTreeMap<NodeId, Vec<Link>>,
    link_count: usize,
}

impl SchemaGraph {
    /// Builds the graph for `schema`.
    pub fn build(schema: Arc<Schema>) -> Result<Self, SchemaError> {
        let mut graph = Self {
            schema: Arc::clone(&schema),
            edges: BTreeMap::new(),
            link_count: 0,
        };

        for ty in schema.types() {
            let type_node = NodeId::type_node(ty.name().clone());
            for attr in ty.attributes() {
                let attr_node = NodeId::attribute(ty.name().clone(), attr.name.clone());
                graph.connect(type_node.clone(), Relationship::HasAttribute, attr_node.clone());
                graph.connect(attr_node.clone(), Relationship::IsAttributeOf, type_node.clone());
                graph.connect(
                    attr_node,
                    Relationship::IsTypeOf,
                    NodeId::type_node(attr.type_name.clone()),
                );
            }
            for parent in ty.inherits() {
                graph.connect(
                    type_node.clone(),
                    Relationship::IsTypeOf,
                    NodeId::type_node(parent.clone()),
                );
            }
            if let Some(target_name) = ty.alias_for() {
                // An alias of a scalar primitive resolves to itself and is
                // not assignable to the primitive, so no edge either way.
                let target = schema.type_named(target_name)?;
                let target_node = NodeId::type_node(target_name.clone());
                if !target.is_primitive() || target.name().is_array() {
                    graph.connect(type_node.clone(), Relationship::IsTypeOf, target_node.clone());
                }
                if !target.is_primitive() {
                    graph.connect(target_node, Relationship::IsTypeOf, type_node);
                }
            }
        }

        for (op_name, op) in schema.operations() {
            let op_node = NodeId::operation(op_name.clone());
            for (index, param) in op.parameters.iter().enumerate() {
                let param_node = NodeId::parameter(op_name.clone(), index);
                graph.connect(
                    NodeId::type_node(param.type_name.clone()),
                    Relationship::IsParameterOn,
                    param_node.clone(),
                );
                let param_ty = schema.type_named(&param.type_name)?;
                if param_ty.is_parameter_type() {
                    for attr in param_ty.attributes() {
                        graph.connect(
                            NodeId::type_node(attr.type_name.clone()),
                            Relationship::IsParameterOn,
                            param_node.clone(),
                        );
                    }
                }
                graph.connect(param_node, Relationship::RequiresParameter, op_node.clone());
            }
            graph.connect(
                op_node,
                Relationship::Provides,
                NodeId::type_node(op.return_type.clone()),
            );
        }

        debug!(
            nodes = graph.edges.len(),
            links = graph.link_count,
            "schema graph built"
        );
        Ok(graph)
    }

    fn connect(&mut self, start: NodeId, relationship: Relationship, end: NodeId) {
        let outgoing = self.edges.entry(start.clone()).or_default();
        let link = Link::new(start, relationship, end);
        if !outgoing.contains(&link) {
            outgoing.push(link);
            self.link_count += 1;
        }
    }

    /// The schema the graph was built from.
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Links leaving `node`, in insertion order.
    pub fn outgoing(&self, node: &NodeId) -> &[Link] {
        self.edges.get(node).map_or(&[][..], Vec::as_slice)
    }

    /// Every link, grouped by start node.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.edges.values().flatten()
    }

    /// Number of distinct links.
    pub const fn link_count(&self) -> usize {
        self.link_count
    }

    /// Shortest path from `start` to `target`, skipping excluded operations.
    ///
    /// Breadth first over links in insertion order, so the same graph always
    /// yields the same path.
    #[must_use]
    pub fn find_path(
        &self,
        start: &QualifiedName,
        target: &QualifiedName,
        excluded_operations: &BTreeSet<OperationName>,
    ) -> Path {
        if start == target {
            return Path::identity(start.clone());
        }
        let start_node = NodeId::type_node(start.clone());
        let target_node = NodeId::type_node(target.clone());

        let mut came_from: HashMap<NodeId, &Link> = HashMap::new();
        let mut visited: HashSet<&NodeId> = HashSet::from([&start_node]);
        let mut queue: VecDeque<&NodeId> = VecDeque::from([&start_node]);

        while let Some(node) = queue.pop_front() {
            for link in self.outgoing(node) {
                if link
                    .end
                    .operation_name()
                    .is_some_and(|op| excluded_operations.contains(op))
                {
                    continue;
                }
                if !visited.insert(&link.end) {
                    continue;
                }
                came_from.insert(link.end.clone(), link);
                if link.end == target_node {
                    let links = Self::unwind(&came_from, &start_node, &target_node);
                    debug!(%start, %target, hops = links.len(), "path found");
                    return Path::found(start.clone(), target.clone(), links);
                }
                queue.push_back(&link.end);
            }
        }
        debug!(%start, %target, "no path");
        Path::not_found(start.clone(), target.clone())
    }

    fn unwind(came_from: &HashMap<NodeId, &Link>, start: &NodeId, target: &NodeId) -> Vec<Link> {
        let mut links = Vec::new();
        let mut cursor = target;
        while cursor != start {
            let Some(link) = came_from.get(cursor) else {
                break;
            };
            links.push((*link).clone());
            cursor = &link.start;
        }
        links.reverse();
        links
    }
}
