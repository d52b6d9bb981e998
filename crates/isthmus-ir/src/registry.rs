//! Name registry and type-reference resolution.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{IrError, Result};
use crate::name::QualifiedName;
use crate::site::Site;
use crate::types::{Container, DeclId, Primitive, Ty, TypeRef};

/// Arena index keyed by qualified name.
///
/// Declarations are registered before any reference is resolved, so forward
/// references and cycles through handles resolve regardless of order.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_name: BTreeMap<String, DeclId>,
    names: Vec<QualifiedName>,
}

/// The declaration a reference is resolved on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub namespace: &'a [String],
    pub owner: &'a str,
    pub site: &'a Site,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a qualified name, returning its arena index.
    ///
    /// Type keywords are reserved: a declaration named `list` or `i32` would
    /// be shadowed by the builtin in every unqualified reference.
    pub fn register(&mut self, name: QualifiedName, site: &Site) -> Result<DeclId> {
        let key = name.key();
        if Container::from_keyword(&name.name).is_some() || Primitive::from_keyword(&name.name).is_some() {
            return Err(IrError::InvalidDeclaration {
                name: key,
                detail: format!("'{}' is a reserved type keyword", name.name),
                site: site.clone(),
            });
        }
        if self.by_name.contains_key(&key) {
            return Err(IrError::DuplicateName {
                name: key,
                site: site.clone(),
            });
        }
        let id = DeclId(self.names.len());
        trace!(name = %key, %id, "registered declaration");
        self.by_name.insert(key, id);
        self.names.push(name);
        Ok(id)
    }

    pub fn lookup(&self, dotted: &str) -> Option<DeclId> {
        self.by_name.get(dotted.strip_prefix('.').unwrap_or(dotted)).copied()
    }

    pub fn name(&self, id: DeclId) -> Option<&QualifiedName> {
        self.names.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Find a declared name: absolute references are looked up directly,
    /// relative ones in the scope namespace and then each enclosing namespace.
    pub fn find(&self, reference: &str, namespace: &[String]) -> Option<DeclId> {
        if reference.starts_with('.') {
            return self.lookup(reference);
        }
        (0..=namespace.len()).rev().find_map(|depth| {
            let mut key = namespace[..depth].join(".");
            if !key.is_empty() {
                key.push('.');
            }
            key.push_str(reference);
            self.lookup(&key)
        })
    }

    /// Resolve a type reference into a [`Ty`].
    pub fn resolve(&self, reference: &TypeRef, scope: Scope<'_>) -> Result<Ty> {
        let site = if reference.site.is_known() {
            &reference.site
        } else {
            scope.site
        };
        let arity_error = |expected: usize| IrError::GenericArity {
            name: scope.owner.to_string(),
            reference: reference.to_string(),
            expected,
            found: reference.params.len(),
            site: site.clone(),
        };

        let resolved = if let Some(container) = Container::from_keyword(&reference.name) {
            if reference.params.len() != container.arity() {
                return Err(arity_error(container.arity()));
            }
            let mut params = reference
                .params
                .iter()
                .map(|p| self.resolve(p, scope))
                .collect::<Result<Vec<_>>>()?
                .into_iter();
            let mut next = || params.next().ok_or_else(|| arity_error(container.arity()));
            match container {
                Container::Optional => Ty::optional(next()?),
                Container::List => Ty::list(next()?),
                Container::Set => Ty::set(next()?),
                Container::Map => {
                    let key = next()?;
                    Ty::map(key, next()?)
                }
            }
        } else if let Some(primitive) = Primitive::from_keyword(&reference.name) {
            if !reference.params.is_empty() {
                return Err(arity_error(0));
            }
            Ty::Primitive(primitive)
        } else {
            let id = self.find(&reference.name, scope.namespace).ok_or_else(|| {
                IrError::UnresolvedType {
                    name: scope.owner.to_string(),
                    reference: reference.name.clone(),
                    site: site.clone(),
                }
            })?;
            if !reference.params.is_empty() {
                return Err(arity_error(0));
            }
            Ty::Declared(id)
        };

        Ok(if reference.optional && !resolved.is_optional() {
            Ty::optional(resolved)
        } else {
            resolved
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(path: &[&str]) -> Vec<String> {
        path.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.register(QualifiedName::parse("item"), &Site::default()).unwrap();
        reg.register(QualifiedName::parse("a.item"), &Site::default()).unwrap();
        reg.register(QualifiedName::parse("a.b.thing"), &Site::default()).unwrap();
        reg
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = registry();
        let err = reg
            .register(QualifiedName::parse("a.item"), &Site::new("x.toml", 3, 1))
            .unwrap_err();
        assert!(matches!(err, IrError::DuplicateName { ref name, .. } if name == "a.item"));
        assert!(err.to_string().starts_with("x.toml:3:1"));
    }

    #[test]
    fn type_keywords_cannot_name_declarations() {
        let mut reg = registry();
        for name in ["list", "set", "map", "optional", "i32", "a.map", "a.b.string"] {
            let err = reg.register(QualifiedName::parse(name), &Site::default()).unwrap_err();
            assert!(matches!(err, IrError::InvalidDeclaration { .. }), "{name}: {err}");
            assert!(err.to_string().contains("reserved type keyword"), "{err}");
        }
        reg.register(QualifiedName::parse("a.mapping"), &Site::default()).unwrap();
    }

    #[test]
    fn relative_lookup_prefers_innermost_namespace() {
        let reg = registry();
        assert_eq!(reg.find("item", &ns(&["a", "b"])), Some(DeclId(1)));
        assert_eq!(reg.find("item", &ns(&["c"])), Some(DeclId(0)));
        assert_eq!(reg.find(".item", &ns(&["a", "b"])), Some(DeclId(0)));
        assert_eq!(reg.find("b.thing", &ns(&["a"])), Some(DeclId(2)));
        assert_eq!(reg.find("thing", &ns(&["a"])), None);
    }

    #[test]
    fn resolve_containers_and_optional_marker() {
        let reg = registry();
        let namespace = ns(&["a"]);
        let site = Site::default();
        let scope = Scope {
            namespace: &namespace,
            owner: "a.owner",
            site: &site,
        };
        let ty = reg
            .resolve(&"map<string, list<item>>?".parse().unwrap(), scope)
            .unwrap();
        assert_eq!(
            ty,
            Ty::optional(Ty::map(
                Ty::Primitive(Primitive::String),
                Ty::list(Ty::Declared(DeclId(1)))
            ))
        );
        let ty = reg.resolve(&"optional<i32>?".parse().unwrap(), scope).unwrap();
        assert_eq!(ty, Ty::optional(Ty::Primitive(Primitive::I32)));
    }

    #[test]
    fn resolve_reports_arity_and_unknown_names() {
        let reg = registry();
        let site = Site::default();
        let scope = Scope {
            namespace: &[],
            owner: "owner",
            site: &site,
        };
        let err = reg.resolve(&"map<string>".parse().unwrap(), scope).unwrap_err();
        assert!(matches!(err, IrError::GenericArity { expected: 2, found: 1, .. }));
        let err = reg.resolve(&"i32<string>".parse().unwrap(), scope).unwrap_err();
        assert!(matches!(err, IrError::GenericArity { expected: 0, .. }));
        let err = reg.resolve(&"missing".parse().unwrap(), scope).unwrap_err();
        assert!(matches!(err, IrError::UnresolvedType { ref reference, .. } if reference == "missing"));
    }
}
