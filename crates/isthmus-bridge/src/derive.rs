//! Capability deriver.
//!
//! Turns a record's declared `deriving` set into a [`DerivePlan`] that every
//! emitter renders the same way:
//! - **eq:** every field compared with its own natural equality, recursing
//!   into nested records and element-wise into containers
//! - **ord:** fields compared in declaration order, returning on the first
//!   non-equal field
//! - **str:** the qualified IDL name followed by `{field=value,...}` in
//!   declaration order
//!
//! A zero-field record is always equal to another instance and never orders
//! before one.

use std::collections::{BTreeMap, BTreeSet};

use isthmus_ir::{DeclId, DeclKind, Deriving, Ir, IrError, Primitive, Site, Ty};
use tracing::debug;

use crate::error::Result;

/// How one field takes part in a derived operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Primitive(Primitive),
    /// An enum (by ordinal) or flags value (by bit pattern).
    Enumerated(DeclId),
    /// A nested record, compared through its own derived operations.
    Record(DeclId),
    Optional(Box<Comparison>),
    /// Lists: element-wise and order-sensitive.
    Sequence(Box<Comparison>),
    /// Sets: membership only.
    Membership(Box<Comparison>),
    /// Maps: key by key.
    Keyed(Box<Comparison>, Box<Comparison>),
    /// A handle type. Never valid in a record field, kept for completeness of
    /// the mapping.
    Handle(DeclId),
}

impl Comparison {
    pub fn of(ir: &Ir, ty: &Ty) -> Self {
        match ty {
            Ty::Primitive(p) => Comparison::Primitive(*p),
            Ty::Optional(inner) => Comparison::Optional(Box::new(Self::of(ir, inner))),
            Ty::List(inner) => Comparison::Sequence(Box::new(Self::of(ir, inner))),
            Ty::Set(inner) => Comparison::Membership(Box::new(Self::of(ir, inner))),
            Ty::Map(k, v) => Comparison::Keyed(Box::new(Self::of(ir, k)), Box::new(Self::of(ir, v))),
            Ty::Declared(id) => match &ir.decl(*id).kind {
                DeclKind::Record(_) => Comparison::Record(*id),
                DeclKind::Enum(_) | DeclKind::Flags(_) => Comparison::Enumerated(*id),
                _ => Comparison::Handle(*id),
            },
        }
    }

    /// Whether a target's identity-based equality would be wrong here:
    /// binary blobs and containers, seen through one optional layer.
    pub fn is_structural(&self) -> bool {
        match self {
            Comparison::Primitive(p) => *p == Primitive::Binary,
            Comparison::Optional(inner) => inner.is_structural(),
            Comparison::Sequence(_) | Comparison::Membership(_) | Comparison::Keyed(..) => true,
            Comparison::Enumerated(_) | Comparison::Record(_) | Comparison::Handle(_) => false,
        }
    }

    /// Every nested record this comparison reaches.
    pub fn records(&self) -> Vec<DeclId> {
        let mut out = Vec::new();
        self.collect_records(&mut out);
        out
    }

    fn collect_records(&self, out: &mut Vec<DeclId>) {
        match self {
            Comparison::Record(id) => out.push(*id),
            Comparison::Optional(inner) | Comparison::Sequence(inner) | Comparison::Membership(inner) => {
                inner.collect_records(out)
            }
            Comparison::Keyed(k, v) => {
                k.collect_records(out);
                v.collect_records(out);
            }
            Comparison::Primitive(_) | Comparison::Enumerated(_) | Comparison::Handle(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedField {
    /// IDL field name; emitters apply their own casing.
    pub name: String,
    pub comparison: Comparison,
}

/// Derived operations of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivePlan {
    pub record: DeclId,
    /// Qualified IDL name, the prefix of the string representation.
    pub label: String,
    /// Fields in declaration order.
    pub fields: Vec<DerivedField>,
    pub capabilities: BTreeSet<Deriving>,
}

impl DerivePlan {
    pub fn equality(&self) -> bool {
        self.capabilities.contains(&Deriving::Eq)
    }

    pub fn ordering(&self) -> bool {
        self.capabilities.contains(&Deriving::Ord)
    }

    pub fn string(&self) -> bool {
        self.capabilities.contains(&Deriving::Str)
    }

    /// Literal text preceding the field at `index` in the string
    /// representation, e.g. `shop.point{x=` then `,y=`.
    pub fn string_label(&self, index: usize) -> String {
        let name = &self.fields[index].name;
        if index == 0 {
            format!("{}{{{name}=", self.label)
        } else {
            format!(",{name}=")
        }
    }

    /// Complete representation of a zero-field record, or the closing text
    /// after the last field otherwise.
    pub fn string_suffix(&self) -> String {
        if self.fields.is_empty() {
            format!("{}{{}}", self.label)
        } else {
            "}".to_string()
        }
    }
}

/// Plan the derived operations of one record; `None` for other kinds.
///
/// A capability on a record requires the same capability on every record
/// nested in its fields, since the generated operation delegates to it.
pub fn derive(ir: &Ir, id: DeclId) -> Result<Option<DerivePlan>> {
    let decl = ir.decl(id);
    let DeclKind::Record(record) = &decl.kind else {
        return Ok(None);
    };
    let label = decl.qualified_name().key();
    let mut fields = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let comparison = Comparison::of(ir, &field.ty);
        for nested in comparison.records() {
            require_capabilities(ir, &label, &field.name, &field.site, &record.deriving, nested)?;
        }
        fields.push(DerivedField {
            name: field.name.clone(),
            comparison,
        });
    }
    debug!(record = %label, capabilities = ?record.deriving, "derived record operations");
    Ok(Some(DerivePlan {
        record: id,
        label,
        fields,
        capabilities: record.deriving.clone(),
    }))
}

fn require_capabilities(
    ir: &Ir,
    owner: &str,
    field: &str,
    site: &Site,
    wanted: &BTreeSet<Deriving>,
    nested: DeclId,
) -> Result<()> {
    let DeclKind::Record(inner) = &ir.decl(nested).kind else {
        return Ok(());
    };
    if let Some(missing) = wanted.iter().find(|c| !inner.deriving.contains(c)) {
        return Err(IrError::InvalidDeclaration {
            name: owner.to_string(),
            detail: format!(
                "field '{field}' holds '{}' which does not derive {missing:?}",
                ir.qualified_name(nested)
            ),
            site: site.clone(),
        }
        .into());
    }
    Ok(())
}

/// Plans for every record in the IR.
pub fn derive_all(ir: &Ir) -> Result<BTreeMap<DeclId, DerivePlan>> {
    let mut plans = BTreeMap::new();
    for (id, _) in ir.iter() {
        if let Some(plan) = derive(ir, id)? {
            plans.insert(id, plan);
        }
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use isthmus_ir::{DeclarationFile, IrBuilder};

    fn build(source: &str, defaults: &[Deriving]) -> Ir {
        let file = DeclarationFile::parse_toml(source).unwrap();
        let mut builder = IrBuilder::new().with_default_deriving(defaults.iter().copied());
        builder.extend(file.declarations);
        builder.build().unwrap()
    }

    const SHAPES: &str = r#"
namespace = "geo"

[[declarations]]
name = "point"
kind = "record"
deriving = ["eq", "ord", "str"]
fields = [{ name = "x", type = "i32" }, { name = "y", type = "i32" }]

[[declarations]]
name = "path"
kind = "record"
deriving = ["eq"]
fields = [
    { name = "points", type = "list<point>" },
    { name = "label", type = "string?" },
    { name = "blob", type = "binary" },
]

[[declarations]]
name = "empty"
kind = "record"
deriving = ["eq", "ord", "str"]
"#;

    #[test]
    fn fields_keep_declaration_order() {
        let ir = build(SHAPES, &[]);
        let point = ir.lookup("geo.point").unwrap();
        let plan = derive(&ir, point).unwrap().unwrap();
        let names: Vec<&str> = plan.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        assert!(plan.equality() && plan.ordering() && plan.string());
        assert_eq!(plan.string_label(0), "geo.point{x=");
        assert_eq!(plan.string_label(1), ",y=");
        assert_eq!(plan.string_suffix(), "}");
    }

    #[test]
    fn container_fields_compare_structurally() {
        let ir = build(SHAPES, &[]);
        let path = ir.lookup("geo.path").unwrap();
        let plan = derive(&ir, path).unwrap().unwrap();
        let point = ir.lookup("geo.point").unwrap();
        assert_eq!(
            plan.fields[0].comparison,
            Comparison::Sequence(Box::new(Comparison::Record(point)))
        );
        assert!(plan.fields[0].comparison.is_structural());
        assert!(!plan.fields[1].comparison.is_structural());
        assert!(plan.fields[2].comparison.is_structural());
        assert_eq!(plan.fields[0].comparison.records(), vec![point]);
    }

    #[test]
    fn zero_field_record_renders_braces() {
        let ir = build(SHAPES, &[]);
        let plan = derive(&ir, ir.lookup("geo.empty").unwrap()).unwrap().unwrap();
        assert!(plan.fields.is_empty());
        assert_eq!(plan.string_suffix(), "geo.empty{}");
    }

    #[test]
    fn nested_record_must_share_capabilities() {
        let ir = build(
            r#"
[[declarations]]
name = "inner"
kind = "record"
fields = [{ name = "v", type = "i8" }]

[[declarations]]
name = "outer"
kind = "record"
deriving = ["str"]
fields = [{ name = "items", type = "map<string, inner>" }]
"#,
            &[],
        );
        let err = derive_all(&ir).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Ir(IrError::InvalidDeclaration { ref name, ref detail, .. })
                if name == "outer" && detail.contains("'items'")
        ));
    }

    #[test]
    fn default_deriving_reaches_every_record() {
        let ir = build(
            r#"
[[declarations]]
name = "a"
kind = "record"
fields = [{ name = "b", type = "b" }]

[[declarations]]
name = "b"
kind = "record"
"#,
            &[Deriving::Eq, Deriving::Str],
        );
        let plans = derive_all(&ir).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.values().all(|p| p.equality() && p.string() && !p.ordering()));
    }
}
