//! Declaration-time semantic checks over the resolved IR.

use std::collections::BTreeSet;

use crate::decl::{ConstValue, Constant, DeclKind, Deriving, Param, Side};
use crate::error::{IrError, Result};
use crate::ir::Ir;
use crate::site::Site;
use crate::types::{DeclId, Primitive, Ty};

pub(crate) fn validate(ir: &Ir) -> Result<()> {
    for (_, decl) in ir.iter() {
        let owner = decl.qualified_name().key();
        let cx = Checker {
            ir,
            owner: &owner,
            site: &decl.site,
        };
        match &decl.kind {
            DeclKind::Record(record) => {
                cx.unique(
                    record
                        .fields
                        .iter()
                        .map(|f| (f.name.as_str(), &f.site))
                        .chain(record.constants.iter().map(|c| (c.name.as_str(), &c.site))),
                )?;
                for field in &record.fields {
                    cx.field_type(&field.name, &field.ty, &field.site)?;
                    if record.derives(Deriving::Ord) && !has_natural_order(ir, &field.ty) {
                        return Err(IrError::UnorderedField {
                            name: owner.clone(),
                            field: field.name.clone(),
                            site: field.site.clone(),
                        });
                    }
                }
                cx.constants(&record.constants)?;
            }
            DeclKind::Interface(iface) => {
                cx.unique(
                    iface
                        .methods
                        .iter()
                        .map(|m| (m.name.as_str(), &m.site))
                        .chain(iface.properties.iter().map(|p| (p.name.as_str(), &p.site)))
                        .chain(iface.constants.iter().map(|c| (c.name.as_str(), &c.site))),
                )?;
                for method in &iface.methods {
                    if method.is_static && method.is_const {
                        return Err(cx.invalid(
                            &method.site,
                            format!("method '{}' cannot be both static and const", method.name),
                        ));
                    }
                    if method.is_static && iface.implemented_by != BTreeSet::from([Side::Native]) {
                        return Err(cx.invalid(
                            &method.site,
                            format!(
                                "static method '{}' requires an interface implemented only by native code",
                                method.name
                            ),
                        ));
                    }
                    cx.signature(&method.params, method.ret.as_ref(), &method.throws, &method.site)?;
                }
                for property in &iface.properties {
                    cx.no_error_domain(&property.ty, &property.site)?;
                }
                cx.constants(&iface.constants)?;
            }
            DeclKind::Function(function) => {
                if function.implemented_by.is_empty() {
                    return Err(cx.invalid(&decl.site, "function must be implemented by at least one side"));
                }
                cx.signature(&function.params, function.ret.as_ref(), &function.throws, &decl.site)?;
            }
            DeclKind::ErrorDomain(domain) => {
                if domain.codes.is_empty() {
                    return Err(cx.invalid(&decl.site, "error domain declares no error codes"));
                }
                cx.unique(domain.codes.iter().map(|c| (c.name.as_str(), &c.site)))?;
                for code in &domain.codes {
                    cx.unique(code.params.iter().map(|p| (p.name.as_str(), &p.site)))?;
                    for param in &code.params {
                        cx.no_error_domain(&param.ty, &param.site)?;
                    }
                }
            }
            DeclKind::Enum(e) => {
                if e.items.is_empty() {
                    return Err(cx.invalid(&decl.site, "enum declares no items"));
                }
                cx.unique(e.items.iter().map(|i| (i.name.as_str(), &decl.site)))?;
            }
            DeclKind::Flags(flags) => {
                cx.unique(flags.flags.iter().map(|i| (i.name.as_str(), &decl.site)))?;
                if flags.flags.iter().any(|f| f.all && f.none) {
                    return Err(cx.invalid(&decl.site, "a flag cannot be both 'all' and 'none'"));
                }
                if flags.ordinary_count() > 64 {
                    return Err(cx.invalid(&decl.site, "flags support at most 64 bits"));
                }
            }
        }
    }
    check_value_cycles(ir)
}

struct Checker<'a> {
    ir: &'a Ir,
    owner: &'a str,
    site: &'a Site,
}

impl Checker<'_> {
    fn invalid(&self, site: &Site, detail: impl Into<String>) -> IrError {
        let site = if site.is_known() { site } else { self.site };
        IrError::invalid(self.owner, site, detail)
    }

    fn kind_of(&self, id: DeclId) -> &'static str {
        self.ir.decl(id).kind.label()
    }

    fn unique<'s>(&self, names: impl Iterator<Item = (&'s str, &'s Site)>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (name, site) in names {
            if !seen.insert(name) {
                return Err(self.invalid(site, format!("member '{name}' is declared more than once")));
            }
        }
        Ok(())
    }

    fn field_type(&self, field: &str, ty: &Ty, site: &Site) -> Result<()> {
        let mut offending = None;
        ty.walk(&mut |t| {
            if let Some(id) = t.declared() {
                let kind = &self.ir.decl(id).kind;
                if offending.is_none() && (kind.is_handle() || matches!(kind, DeclKind::ErrorDomain(_))) {
                    offending = Some(id);
                }
            }
        });
        match offending {
            Some(id) => Err(self.invalid(
                site,
                format!("field '{field}' cannot hold a value of {} type", self.kind_of(id)),
            )),
            None => Ok(()),
        }
    }

    fn no_error_domain(&self, ty: &Ty, site: &Site) -> Result<()> {
        let mut found = false;
        ty.walk(&mut |t| {
            if let Some(id) = t.declared() {
                found |= matches!(self.ir.decl(id).kind, DeclKind::ErrorDomain(_));
            }
        });
        if found {
            return Err(self.invalid(site, "error domains can only be thrown"));
        }
        Ok(())
    }

    fn signature(&self, params: &[Param<Ty>], ret: Option<&Ty>, throws: &[Ty], site: &Site) -> Result<()> {
        self.unique(params.iter().map(|p| (p.name.as_str(), &p.site)))?;
        for param in params {
            self.no_error_domain(&param.ty, &param.site)?;
        }
        if let Some(ret) = ret {
            self.no_error_domain(ret, site)?;
        }
        for thrown in throws {
            let is_domain = thrown
                .declared()
                .is_some_and(|id| matches!(self.ir.decl(id).kind, DeclKind::ErrorDomain(_)));
            if !is_domain {
                return Err(self.invalid(site, "only error domains can be thrown"));
            }
        }
        Ok(())
    }

    fn constants(&self, constants: &[Constant<Ty>]) -> Result<()> {
        for constant in constants {
            let Ty::Primitive(primitive) = constant.ty else {
                return Err(self.invalid(
                    &constant.site,
                    format!("constant '{}' must have a primitive type", constant.name),
                ));
            };
            if !literal_matches(primitive, &constant.value) {
                return Err(self.invalid(
                    &constant.site,
                    format!("constant '{}' value does not match type {primitive}", constant.name),
                ));
            }
        }
        Ok(())
    }
}

fn literal_matches(primitive: Primitive, value: &ConstValue) -> bool {
    match (primitive, value) {
        (Primitive::Bool, ConstValue::Bool(_)) => true,
        (Primitive::I8, ConstValue::Int(v)) => i8::try_from(*v).is_ok(),
        (Primitive::I16, ConstValue::Int(v)) => i16::try_from(*v).is_ok(),
        (Primitive::I32, ConstValue::Int(v)) => i32::try_from(*v).is_ok(),
        (Primitive::I64, ConstValue::Int(_)) => true,
        (Primitive::F32, ConstValue::Float(v)) => v.is_finite() && v.abs() <= f64::from(f32::MAX),
        (Primitive::F64, ConstValue::Float(v)) => v.is_finite(),
        (Primitive::F32 | Primitive::F64, ConstValue::Int(_)) => true,
        (Primitive::String, ConstValue::Text(_)) => true,
        _ => false,
    }
}

/// Whether a field of this type can take part in a derived ordering.
pub fn has_natural_order(ir: &Ir, ty: &Ty) -> bool {
    match ty {
        Ty::Primitive(p) => p.has_natural_order(),
        Ty::Declared(id) => match &ir.decl(*id).kind {
            DeclKind::Enum(_) => true,
            DeclKind::Record(r) => r.derives(Deriving::Ord),
            _ => false,
        },
        Ty::Optional(_) | Ty::List(_) | Ty::Set(_) | Ty::Map(..) => false,
    }
}

/// The record a field embeds by value, looking through `optional`.
fn embedded_record(ir: &Ir, ty: &Ty) -> Option<DeclId> {
    match ty {
        Ty::Optional(inner) => embedded_record(ir, inner),
        Ty::Declared(id) if matches!(ir.decl(*id).kind, DeclKind::Record(_)) => Some(*id),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

fn check_value_cycles(ir: &Ir) -> Result<()> {
    let mut marks = vec![Mark::Unvisited; ir.len()];
    let mut path = Vec::new();
    for (id, _) in ir.iter() {
        visit(ir, id, &mut marks, &mut path)?;
    }
    Ok(())
}

fn visit(ir: &Ir, id: DeclId, marks: &mut [Mark], path: &mut Vec<DeclId>) -> Result<()> {
    match marks[id.0] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let start = path.iter().position(|p| *p == id).unwrap_or(0);
            let mut names: Vec<String> = path[start..].iter().map(|p| ir.qualified_name(*p).key()).collect();
            names.push(ir.qualified_name(id).key());
            let decl = ir.decl(id);
            return Err(IrError::CyclicDependency {
                name: decl.qualified_name().key(),
                path: names,
                site: decl.site.clone(),
            });
        }
        Mark::Unvisited => {}
    }
    marks[id.0] = Mark::Active;
    path.push(id);
    if let DeclKind::Record(record) = &ir.decl(id).kind {
        for field in &record.fields {
            if let Some(next) = embedded_record(ir, &field.ty) {
                visit(ir, next, marks, path)?;
            }
        }
    }
    path.pop();
    marks[id.0] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::decl::Declaration;
    use crate::error::IrError;
    use crate::ir::IrBuilder;
    use crate::types::TypeRef;

    fn build(source: &str) -> crate::error::Result<crate::ir::Ir> {
        #[derive(serde::Deserialize)]
        struct File {
            declarations: Vec<Declaration<TypeRef>>,
        }
        let file: File = toml::from_str(source).unwrap();
        let mut builder = IrBuilder::new();
        builder.extend(file.declarations);
        builder.build()
    }

    #[test]
    fn record_cannot_embed_interface() {
        let err = build(
            r#"
[[declarations]]
name = "service"
kind = "interface"

[[declarations]]
name = "holder"
kind = "record"
fields = [{ name = "services", type = "list<service>" }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("interface type"), "{err}");
    }

    #[test]
    fn ord_rejects_booleans_and_containers() {
        let err = build(
            r#"
[[declarations]]
name = "sorted"
kind = "record"
deriving = ["ord"]
fields = [{ name = "id", type = "i32" }, { name = "flag", type = "bool" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::UnorderedField { ref field, .. } if field == "flag"));

        let err = build(
            r#"
[[declarations]]
name = "sorted"
kind = "record"
deriving = ["ord"]
fields = [{ name = "ids", type = "list<i32>" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::UnorderedField { .. }));
    }

    #[test]
    fn ord_accepts_enums_and_ordered_records() {
        build(
            r#"
[[declarations]]
name = "color"
kind = "enum"
items = ["red", "green"]

[[declarations]]
name = "inner"
kind = "record"
deriving = ["ord"]
fields = [{ name = "when", type = "date" }]

[[declarations]]
name = "outer"
kind = "record"
deriving = ["ord"]
fields = [{ name = "color", type = "color" }, { name = "inner", type = "inner" }, { name = "name", type = "string" }]
"#,
        )
        .unwrap();
    }

    #[test]
    fn only_error_domains_can_be_thrown() {
        let err = build(
            r#"
[[declarations]]
name = "point"
kind = "record"

[[declarations]]
name = "api"
kind = "interface"
methods = [{ name = "run", throws = ["point"] }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only error domains"), "{err}");

        let err = build(
            r#"
[[declarations]]
name = "failure"
kind = "error-domain"
codes = [{ name = "bad" }]

[[declarations]]
name = "api"
kind = "interface"
methods = [{ name = "run", returns = "failure" }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("can only be thrown"), "{err}");
    }

    #[test]
    fn static_methods_need_native_only_interfaces() {
        let err = build(
            r#"
[[declarations]]
name = "api"
kind = "interface"
implemented-by = ["native", "managed"]
methods = [{ name = "create", static = true }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("implemented only by native"), "{err}");

        let err = build(
            r#"
[[declarations]]
name = "api"
kind = "interface"
methods = [{ name = "create", static = true, const = true }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both static and const"), "{err}");
    }

    #[test]
    fn constant_literal_must_match_type() {
        let err = build(
            r#"
[[declarations]]
name = "limits"
kind = "record"
constants = [{ name = "max", type = "i8", value = 300 }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match type i8"), "{err}");
    }

    #[test]
    fn float_constants_must_be_finite_and_in_range() {
        for (ty, value) in [("f64", "nan"), ("f64", "-inf"), ("f32", "inf"), ("f32", "1e39")] {
            let err = build(&format!(
                "[[declarations]]\nname = \"limits\"\nkind = \"record\"\nconstants = [{{ name = \"x\", type = \"{ty}\", value = {value} }}]\n"
            ))
            .unwrap_err();
            assert!(err.to_string().contains(&format!("does not match type {ty}")), "{value}: {err}");
        }
        build(
            r#"
[[declarations]]
name = "limits"
kind = "record"
constants = [{ name = "big", type = "f32", value = 3.4e38 }, { name = "huge", type = "f64", value = 1e300 }]
"#,
        )
        .unwrap();
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let err = build(
            r#"
[[declarations]]
name = "point"
kind = "record"
fields = [{ name = "x", type = "i32" }, { name = "x", type = "i64" }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'x' is declared more than once"), "{err}");
    }

    #[test]
    fn value_cycles_are_rejected() {
        let err = build(
            r#"
[[declarations]]
name = "node"
kind = "record"
fields = [{ name = "next", type = "node?" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::CyclicDependency { ref path, .. } if path == &["node", "node"]));

        let err = build(
            r#"
[[declarations]]
name = "a"
kind = "record"
fields = [{ name = "b", type = "b" }]

[[declarations]]
name = "b"
kind = "record"
fields = [{ name = "a", type = "a" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::CyclicDependency { ref path, .. } if path.len() == 3));
    }

    #[test]
    fn cycles_through_collections_and_handles_are_legal() {
        build(
            r#"
[[declarations]]
name = "tree"
kind = "record"
fields = [{ name = "children", type = "list<tree>" }]

[[declarations]]
name = "parent"
kind = "interface"
methods = [{ name = "child", returns = "child" }]

[[declarations]]
name = "child"
kind = "interface"
methods = [{ name = "parent", returns = "parent" }]
"#,
        )
        .unwrap();
    }
}
