//! Alias resolution, inheritance and assignability.
//!
//! Every component asks these questions through the [`Schema`] so that there
//! is exactly one definition of "is this value usable as that type".
//!
//! Rules:
//! - Alias chains stop one step before a primitive: two aliases of
//!   `core.Int` are distinct types. Aliases of collections resolve through
//!   to the collection.
//! - Assignability is nominal. `A` is assignable to `B` when both resolve to
//!   the same type or `A` transitively inherits `B`.
//! - Type parameters are covariant.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use super::Schema;
use crate::error::SchemaError;
use crate::name::QualifiedName;
use crate::types::{PrimitiveKind, Type};

impl Schema {
    /// Follows the alias chain to the first non-alias type.
    ///
    /// An alias whose target is a (non-collection) primitive resolves to
    /// itself.
    pub fn resolve_aliases(&self, ty: &Type) -> Result<Arc<Type>, SchemaError> {
        let mut current = Arc::new(ty.clone());
        let mut visited = BTreeSet::new();
        while let Some(target_name) = current.alias_for() {
            if !visited.insert(current.name().clone()) {
                return Err(SchemaError::AliasCycle {
                    type_name: ty.name().to_string(),
                });
            }
            let target = self.type_named(target_name)?;
            if target.is_primitive() && !target.name().is_array() {
                break;
            }
            current = target;
        }
        Ok(current)
    }

    /// Direct and transitive supertypes, in declaration order without
    /// duplicates. An alias reports the graph of the type it aliases.
    pub fn inheritance_graph(&self, ty: &Type) -> Result<Vec<Arc<Type>>, SchemaError> {
        if let Some(target) = ty.alias_for() {
            let target = self.type_named(target)?;
            return self.inheritance_graph(&target);
        }
        let mut graph = Vec::new();
        let mut excluded = BTreeSet::from([ty.name().clone()]);
        self.collect_supertypes(ty, &mut excluded, &mut graph)?;
        Ok(graph)
    }

    fn collect_supertypes(
        &self,
        ty: &Type,
        excluded: &mut BTreeSet<QualifiedName>,
        out: &mut Vec<Arc<Type>>,
    ) -> Result<(), SchemaError> {
        for parent_name in ty.inherits() {
            if !excluded.insert(parent_name.clone()) {
                continue;
            }
            let parent = self.type_named(parent_name)?;
            out.push(Arc::clone(&parent));
            let parent_graph = if parent.is_type_alias() {
                self.inheritance_graph(&parent)?
            } else {
                let mut nested = Vec::new();
                self.collect_supertypes(&parent, excluded, &mut nested)?;
                nested
            };
            for t in parent_graph {
                if !out.iter().any(|o| o.name() == t.name()) {
                    excluded.insert(t.name().clone());
                    out.push(t);
                }
            }
        }
        Ok(())
    }

    /// True if `source` equals `target` or inherits from it, after alias
    /// resolution on both sides.
    pub fn inherits_from(&self, source: &Type, target: &Type) -> Result<bool, SchemaError> {
        self.inherits_from_inner(source, target, true)
    }

    fn inherits_from_inner(
        &self,
        source: &Type,
        target: &Type,
        consider_parameters: bool,
    ) -> Result<bool, SchemaError> {
        let target = self.resolve_aliases(target)?;
        if self.resolves_same_as(source, &target, consider_parameters)? {
            return Ok(true);
        }
        for candidate in self.inheritance_graph(source)? {
            if self.resolves_same_as(&candidate, &target, consider_parameters)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn resolves_same_as(
        &self,
        a: &Type,
        b: &Type,
        consider_parameters: bool,
    ) -> Result<bool, SchemaError> {
        let a = self.resolve_aliases(a)?;
        let b = self.resolve_aliases(b)?;
        if !a.name().raw_type_equals(b.name()) {
            return Ok(false);
        }
        if !consider_parameters {
            return Ok(true);
        }
        let (ap, bp) = (a.type_parameters(), b.type_parameters());
        if ap.len() != bp.len() {
            return Ok(false);
        }
        for (x, y) in ap.iter().zip(bp) {
            let x = self.type_named(x)?;
            let y = self.type_named(y)?;
            if !self.resolves_same_as(&x, &y, true)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fallible form of [`Schema::is_assignable_to`].
    pub fn try_is_assignable_to(&self, source: &Type, target: &Type) -> Result<bool, SchemaError> {
        let source = self.resolve_aliases(source)?;
        let target = self.resolve_aliases(target)?;

        if self.resolves_same_as(&source, &target, true)? {
            return Ok(true);
        }
        let (sp, tp) = (source.type_parameters(), target.type_parameters());
        if sp.len() != tp.len() {
            return Ok(false);
        }
        if !sp.is_empty() {
            if !self.inherits_from_inner(&source, &target, false)? {
                return Ok(false);
            }
            for (s, t) in sp.iter().zip(tp) {
                let s = self.type_named(s)?;
                let t = self.type_named(t)?;
                if !self.try_is_assignable_to(&s, &t)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        self.inherits_from_inner(&source, &target, true)
    }

    /// True if an instance of `source` may be used where `target` is expected.
    ///
    /// Schema inconsistencies (which a built schema should never contain)
    /// are logged and treated as "not assignable".
    #[must_use]
    pub fn is_assignable_to(&self, source: &Type, target: &Type) -> bool {
        match self.try_is_assignable_to(source, target) {
            Ok(result) => result,
            Err(e) => {
                warn!(source = %source.name(), target = %target.name(), error = %e, "assignability check failed");
                false
            }
        }
    }

    pub(crate) fn is_collection_type(&self, ty: &Type) -> Result<bool, SchemaError> {
        if ty.name().is_array() || ty.alias_for().is_some_and(|a| a.is_array()) {
            return Ok(true);
        }
        if self.resolve_aliases(ty)?.name().is_array() {
            return Ok(true);
        }
        Ok(self
            .inheritance_graph(ty)?
            .iter()
            .any(|t| t.name().is_array() || t.alias_for().is_some_and(|a| a.is_array())))
    }

    /// Member type of a collection type; `core.Any` for a raw array.
    ///
    /// Returns `None` if `ty` is not a collection.
    pub fn collection_member_type(&self, ty: &Type) -> Result<Option<Arc<Type>>, SchemaError> {
        if !self.is_collection_type(ty)? {
            return Ok(None);
        }
        let resolved = self.resolve_aliases(ty)?;
        let array_name = std::iter::once(resolved.name().clone())
            .chain(self.inheritance_graph(ty)?.iter().map(|t| t.name().clone()))
            .find(QualifiedName::is_array);
        match array_name.as_ref().and_then(|n| n.parameters().first()) {
            Some(member) => self.type_named(member).map(Some),
            None => self.primitive(PrimitiveKind::Any).map(Some),
        }
    }

    /// The primitive a scalar type ultimately stores its value as.
    ///
    /// Follows aliases fully, then the first supertype chain that reaches a
    /// primitive.
    pub fn base_primitive(&self, ty: &Type) -> Result<Option<PrimitiveKind>, SchemaError> {
        let mut visited = BTreeSet::new();
        self.base_primitive_inner(ty, &mut visited)
    }

    fn base_primitive_inner(
        &self,
        ty: &Type,
        visited: &mut BTreeSet<QualifiedName>,
    ) -> Result<Option<PrimitiveKind>, SchemaError> {
        if let Some(kind) = ty.primitive_kind() {
            return Ok(Some(kind));
        }
        if !visited.insert(ty.name().clone()) {
            return Ok(None);
        }
        if let Some(target) = ty.alias_for() {
            let target = self.type_named(target)?;
            return self.base_primitive_inner(&target, visited);
        }
        for parent in ty.inherits() {
            let parent = self.type_named(parent)?;
            if let Some(kind) = self.base_primitive_inner(&parent, visited)? {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;
    use crate::types::{PrimitiveKind, Type};

    fn schema() -> Schema {
        Schema::builder()
            .add_type(Type::named("acme.Height").alias_for("core.Int").build().unwrap())
            .add_type(Type::named("acme.Weight").alias_for("core.Int").build().unwrap())
            .add_type(Type::named("acme.Name").alias_for("core.String").build().unwrap())
            .add_type(Type::named("acme.FirstName").inherits("acme.Name").build().unwrap())
            .add_type(Type::named("acme.GivenName").alias_for("acme.FirstName").build().unwrap())
            .add_type(Type::named("acme.Animal").build().unwrap())
            .add_type(Type::named("acme.Dog").inherits("acme.Animal").build().unwrap())
            .add_type(Type::named("acme.Puppy").inherits("acme.Dog").build().unwrap())
            .add_type(Type::named("acme.Dogs").alias_for("acme.Dog[]").build().unwrap())
            .add_type(Type::named("acme.Things").alias_for("core.Array").build().unwrap())
            .build()
            .unwrap()
    }

    fn t(schema: &Schema, name: &str) -> std::sync::Arc<Type> {
        schema.type_by_name(name).unwrap()
    }

    #[test]
    fn alias_of_primitive_resolves_to_itself() {
        let s = schema();
        let height = t(&s, "acme.Height");
        assert_eq!(s.resolve_aliases(&height).unwrap().name(), height.name());
    }

    #[test]
    fn alias_of_alias_resolves_through() {
        let s = schema();
        let given = t(&s, "acme.GivenName");
        assert_eq!(s.resolve_aliases(&given).unwrap().name().name(), "FirstName");
    }

    #[test]
    fn alias_of_collection_resolves_to_collection() {
        let s = schema();
        let dogs = t(&s, "acme.Dogs");
        assert_eq!(s.resolve_aliases(&dogs).unwrap().name().to_string(), "core.Array<acme.Dog>");
        let things = t(&s, "acme.Things");
        assert!(s.resolve_aliases(&things).unwrap().name().is_array());
    }

    #[test]
    fn distinct_primitive_aliases_are_not_assignable() {
        let s = schema();
        let (h, w) = (t(&s, "acme.Height"), t(&s, "acme.Weight"));
        assert!(!s.is_assignable_to(&h, &w));
        assert!(!s.is_assignable_to(&w, &h));
        assert!(s.is_assignable_to(&h, &h));
    }

    #[test]
    fn inheritance_is_one_directional() {
        let s = schema();
        let (dog, animal, puppy) = (t(&s, "acme.Dog"), t(&s, "acme.Animal"), t(&s, "acme.Puppy"));
        assert!(s.is_assignable_to(&dog, &animal));
        assert!(!s.is_assignable_to(&animal, &dog));
        assert!(s.is_assignable_to(&puppy, &animal));
        assert!(!s.is_assignable_to(&animal, &puppy));
    }

    #[test]
    fn inheritance_via_alias() {
        let s = schema();
        let (given, name) = (t(&s, "acme.GivenName"), t(&s, "acme.Name"));
        assert!(s.is_assignable_to(&given, &name));
        assert!(!s.is_assignable_to(&name, &given));
        let graph = s.inheritance_graph(&given).unwrap();
        assert!(graph.iter().any(|g| g.name().name() == "Name"));
    }

    #[test]
    fn collections_are_covariant() {
        let s = schema();
        let dogs = t(&s, "acme.Dog[]");
        let animals = t(&s, "acme.Animal[]");
        assert!(s.is_assignable_to(&dogs, &animals));
        assert!(!s.is_assignable_to(&animals, &dogs));
    }

    #[test]
    fn collection_alias_is_symmetric_with_collection() {
        let s = schema();
        let alias = t(&s, "acme.Dogs");
        let dogs = t(&s, "acme.Dog[]");
        let animals = t(&s, "acme.Animal[]");
        let puppies = t(&s, "acme.Puppy[]");
        assert_eq!(s.is_assignable_to(&alias, &animals), s.is_assignable_to(&dogs, &animals));
        assert_eq!(s.is_assignable_to(&animals, &alias), s.is_assignable_to(&animals, &dogs));
        assert_eq!(s.is_assignable_to(&puppies, &alias), s.is_assignable_to(&puppies, &dogs));
        assert!(s.is_assignable_to(&alias, &dogs));
        assert!(s.is_assignable_to(&dogs, &alias));
    }

    #[test]
    fn collection_member_types() {
        let s = schema();
        let member = s.collection_member_type(&t(&s, "acme.Dogs")).unwrap().unwrap();
        assert_eq!(member.name().name(), "Dog");
        let any = s.collection_member_type(&t(&s, "acme.Things")).unwrap().unwrap();
        assert_eq!(any.primitive_kind(), Some(PrimitiveKind::Any));
        assert!(s.collection_member_type(&t(&s, "acme.Dog")).unwrap().is_none());
    }

    #[test]
    fn base_primitive_follows_aliases_and_inheritance() {
        let s = schema();
        assert_eq!(s.base_primitive(&t(&s, "acme.Height")).unwrap(), Some(PrimitiveKind::Int));
        assert_eq!(s.base_primitive(&t(&s, "acme.GivenName")).unwrap(), Some(PrimitiveKind::String));
        assert_eq!(s.base_primitive(&t(&s, "acme.Animal")).unwrap(), None);
    }
}
