//! Building the immutable IR.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::decl::{DeclKind, Declaration, Deriving, Doc, Function};
use crate::error::{IrError, Result};
use crate::name::QualifiedName;
use crate::registry::{Scope, TypeRegistry};
use crate::types::{DeclId, Ty, TypeRef};
use crate::validate;

/// Collects front-end declarations and builds an [`Ir`].
#[derive(Debug, Default)]
pub struct IrBuilder {
    sources: Vec<Declaration<TypeRef>>,
    default_deriving: BTreeSet<Deriving>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities unioned into every record's declared `deriving` set.
    pub fn with_default_deriving(mut self, deriving: impl IntoIterator<Item = Deriving>) -> Self {
        self.default_deriving.extend(deriving);
        self
    }

    pub fn add(&mut self, declaration: Declaration<TypeRef>) -> &mut Self {
        self.sources.push(declaration);
        self
    }

    pub fn extend(&mut self, declarations: impl IntoIterator<Item = Declaration<TypeRef>>) -> &mut Self {
        self.sources.extend(declarations);
        self
    }

    /// Register, resolve and validate every declaration.
    ///
    /// Runs in four passes: hoist inline function types into named
    /// declarations, register every qualified name, resolve every type
    /// reference, then validate the resolved IR.
    pub fn build(self) -> Result<Ir> {
        let sources = hoist_anonymous_functions(self.sources)?;

        let mut registry = TypeRegistry::new();
        for decl in &sources {
            registry.register(decl.qualified_name(), &decl.site)?;
        }

        let mut decls = Vec::with_capacity(sources.len());
        for mut decl in sources {
            if let DeclKind::Record(record) = &mut decl.kind {
                record.deriving.extend(self.default_deriving.iter().copied());
            }
            let namespace = decl.namespace_path();
            let owner = decl.qualified_name().key();
            let site = decl.site.clone();
            let scope = Scope {
                namespace: &namespace,
                owner: &owner,
                site: &site,
            };
            debug!(name = %owner, kind = decl.kind.label(), "resolving declaration");
            decls.push(decl.try_map(&mut |reference: TypeRef| registry.resolve(&reference, scope))?);
        }

        let ir = Ir { decls, registry };
        validate::validate(&ir)?;
        info!(declarations = ir.len(), "built IR");
        Ok(ir)
    }
}

/// The resolved, validated declaration arena.
///
/// Immutable once built: every generator stage only borrows it.
#[derive(Debug)]
pub struct Ir {
    decls: Vec<Declaration<Ty>>,
    registry: TypeRegistry,
}

impl Ir {
    pub fn decl(&self, id: DeclId) -> &Declaration<Ty> {
        &self.decls[id.0]
    }

    pub fn get(&self, id: DeclId) -> Option<&Declaration<Ty>> {
        self.decls.get(id.0)
    }

    pub fn lookup(&self, dotted: &str) -> Option<DeclId> {
        self.registry.lookup(dotted)
    }

    /// Look up a declaration by its dotted name.
    pub fn find(&self, dotted: &str) -> Option<&Declaration<Ty>> {
        self.lookup(dotted).map(|id| self.decl(id))
    }

    pub fn qualified_name(&self, id: DeclId) -> QualifiedName {
        self.decl(id).qualified_name()
    }

    /// Declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration<Ty>)> {
        self.decls.iter().enumerate().map(|(i, d)| (DeclId(i), d))
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Replace every inline function type with a reference to a synthesized,
/// named function declaration in the referencing declaration's namespace.
fn hoist_anonymous_functions(sources: Vec<Declaration<TypeRef>>) -> Result<Vec<Declaration<TypeRef>>> {
    let mut hoisted = Vec::new();
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(sources.len());
    for decl in sources {
        let namespace = decl.namespace.clone();
        let owner = decl.qualified_name().key();
        let mut hoister = Hoister {
            namespace: &namespace,
            owner: &owner,
            hoisted: &mut hoisted,
            seen: &mut seen,
        };
        out.push(decl.try_map(&mut |reference| hoister.hoist(reference))?);
    }
    if !hoisted.is_empty() {
        debug!(count = hoisted.len(), "hoisted anonymous functions");
    }
    out.extend(hoisted);
    Ok(out)
}

struct Hoister<'a> {
    namespace: &'a str,
    owner: &'a str,
    hoisted: &'a mut Vec<Declaration<TypeRef>>,
    seen: &'a mut BTreeSet<String>,
}

impl Hoister<'_> {
    fn hoist(&mut self, reference: TypeRef) -> Result<TypeRef> {
        let TypeRef {
            name,
            params,
            optional,
            function,
            site,
        } = reference;
        let params = params
            .into_iter()
            .map(|p| self.hoist(p))
            .collect::<Result<Vec<_>>>()?;
        let Some(function) = function else {
            return Ok(TypeRef {
                name,
                params,
                optional,
                function: None,
                site,
            });
        };
        if !params.is_empty() {
            return Err(IrError::invalid(
                self.owner,
                &site,
                "an inline function type cannot take generic parameters",
            ));
        }

        let function = (*function).try_map(&mut |t| self.hoist(t))?;
        let synthesized = anonymous_name(&function);
        let qualified = QualifiedName::new(
            crate::decl::namespace_segments(self.namespace),
            synthesized.clone(),
        );
        if self.seen.insert(qualified.key()) {
            self.hoisted.push(Declaration {
                name: synthesized,
                namespace: self.namespace.to_string(),
                site: site.clone(),
                doc: Doc::default(),
                kind: DeclKind::Function(Function {
                    anonymous: true,
                    ..function
                }),
            });
        }
        Ok(TypeRef {
            name: format!(".{qualified}"),
            params: Vec::new(),
            optional,
            function: None,
            site,
        })
    }
}

/// Deterministic name for an anonymous function, derived from its signature.
pub fn anonymous_name(function: &Function<TypeRef>) -> String {
    let mut parts = vec!["function".to_string()];
    if function.is_async {
        parts.push("async".into());
    }
    for param in &function.params {
        parts.push(param.ty.signature(2));
    }
    if let Some(ret) = &function.ret {
        parts.push("returns".into());
        parts.push(ret.signature(2));
    }
    if !function.throws.is_empty() {
        parts.push("throws".into());
        parts.extend(function.throws.iter().map(|t| t.signature(2)));
    }
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Field, Param, Record};
    use crate::site::Site;
    use crate::types::Primitive;

    fn record(name: &str, namespace: &str, fields: &[(&str, &str)]) -> Declaration<TypeRef> {
        Declaration {
            name: name.into(),
            namespace: namespace.into(),
            site: Site::default(),
            doc: Doc::default(),
            kind: DeclKind::Record(Record {
                fields: fields
                    .iter()
                    .map(|(n, t)| Field {
                        name: n.to_string(),
                        ty: t.parse().unwrap(),
                        site: Site::default(),
                        doc: Doc::default(),
                    })
                    .collect(),
                constants: Vec::new(),
                deriving: BTreeSet::new(),
            }),
        }
    }

    #[test]
    fn forward_references_resolve() {
        let mut builder = IrBuilder::new();
        builder
            .add(record("outer", "geo", &[("inner", "inner")]))
            .add(record("inner", "geo", &[("x", "i32")]));
        let ir = builder.build().unwrap();
        let outer = ir.find("geo.outer").unwrap();
        let DeclKind::Record(r) = &outer.kind else {
            panic!("expected record");
        };
        assert_eq!(r.fields[0].ty, Ty::Declared(ir.lookup("geo.inner").unwrap()));
    }

    #[test]
    fn default_deriving_is_unioned() {
        let mut builder = IrBuilder::new().with_default_deriving([Deriving::Eq]);
        builder.add(record("point", "", &[("x", "i32")]));
        let ir = builder.build().unwrap();
        let DeclKind::Record(r) = &ir.find("point").unwrap().kind else {
            panic!("expected record");
        };
        assert!(r.derives(Deriving::Eq));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = IrBuilder::new();
        builder
            .add(record("point", "geo", &[]))
            .add(record("point", "geo", &[]));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, IrError::DuplicateName { ref name, .. } if name == "geo.point"));
    }

    #[test]
    fn anonymous_functions_are_hoisted_once() {
        let callback = TypeRef::inline_function(Function {
            implemented_by: BTreeSet::new(),
            params: vec![Param {
                name: "value".into(),
                ty: TypeRef::named("i32"),
                site: Site::default(),
            }],
            ret: Some(TypeRef::named("bool")),
            is_async: false,
            throws: Vec::new(),
            anonymous: false,
        });
        let mut decl = record("holder", "app", &[]);
        if let DeclKind::Record(r) = &mut decl.kind {
            for name in ["a", "b"] {
                r.fields.push(Field {
                    name: name.into(),
                    ty: callback.clone(),
                    site: Site::default(),
                    doc: Doc::default(),
                });
            }
        }
        let mut builder = IrBuilder::new();
        builder.add(decl);
        // Fields of function type are rejected by validation, so only hoist here.
        let hoisted = hoist_anonymous_functions(builder.sources).unwrap();
        assert_eq!(hoisted.len(), 2);
        assert_eq!(hoisted[1].name, "function_i32_returns_bool");
        assert_eq!(hoisted[1].namespace, "app");
        let DeclKind::Function(f) = &hoisted[1].kind else {
            panic!("expected function");
        };
        assert!(f.anonymous);
        let DeclKind::Record(r) = &hoisted[0].kind else {
            panic!("expected record");
        };
        assert_eq!(r.fields[0].ty.name, ".app.function_i32_returns_bool");
        assert_eq!(r.fields[1].ty.name, ".app.function_i32_returns_bool");
    }

    #[test]
    fn iteration_preserves_declaration_order() {
        let mut builder = IrBuilder::new();
        builder
            .add(record("b", "", &[("v", "f64")]))
            .add(record("a", "", &[("v", "list<b>")]));
        let ir = builder.build().unwrap();
        let names: Vec<_> = ir.iter().map(|(_, d)| d.name.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
        let DeclKind::Record(r) = &ir.decl(DeclId(0)).kind else {
            panic!("expected record");
        };
        assert_eq!(r.fields[0].ty, Ty::Primitive(Primitive::F64));
    }
}
