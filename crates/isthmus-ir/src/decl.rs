//! The declaration model.
//!
//! Declarations are generic over the type-reference representation: the
//! front end produces `Declaration<TypeRef>`, resolution turns them into
//! `Declaration<Ty>`. The `try_map` helpers perform that conversion while
//! keeping every other attribute untouched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::name::QualifiedName;
use crate::site::Site;

/// Which side of the boundary provides an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Native,
    Managed,
}

fn native_only() -> BTreeSet<Side> {
    BTreeSet::from([Side::Native])
}

fn both_sides() -> BTreeSet<Side> {
    BTreeSet::from([Side::Native, Side::Managed])
}

/// Structural capabilities a record may derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deriving {
    /// Structural equality (and hashing).
    Eq,
    /// Lexicographic ordering over fields in declaration order.
    Ord,
    /// `Name{field=value,...}` string representation.
    Str,
}

/// Deprecation marker: a plain flag or a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deprecation {
    Flag(bool),
    Message(String),
}

impl Default for Deprecation {
    fn default() -> Self {
        Deprecation::Flag(false)
    }
}

impl Deprecation {
    pub fn is_deprecated(&self) -> bool {
        !matches!(self, Deprecation::Flag(false))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Deprecation::Message(msg) => Some(msg),
            Deprecation::Flag(_) => None,
        }
    }
}

/// Documentation attached to a declaration or member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub deprecated: Deprecation,
}

impl Doc {
    pub fn is_empty(&self) -> bool {
        self.comment.is_none() && !self.deprecated.is_deprecated()
    }

    /// Comment lines, trimmed.
    pub fn lines(&self) -> Vec<&str> {
        self.comment
            .as_deref()
            .map(|c| c.lines().map(str::trim).collect())
            .unwrap_or_default()
    }
}

/// A named type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Declaration<T> {
    pub name: String,
    /// Dotted namespace path, empty for the root namespace.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
    #[serde(flatten)]
    pub kind: DeclKind<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub enum DeclKind<T> {
    Record(Record<T>),
    Interface(Interface<T>),
    Enum(Enum),
    Flags(Flags),
    Function(Function<T>),
    ErrorDomain(ErrorDomain<T>),
}

impl<T> DeclKind<T> {
    pub fn label(&self) -> &'static str {
        match self {
            DeclKind::Record(_) => "record",
            DeclKind::Interface(_) => "interface",
            DeclKind::Enum(_) => "enum",
            DeclKind::Flags(_) => "flags",
            DeclKind::Function(_) => "function",
            DeclKind::ErrorDomain(_) => "error-domain",
        }
    }

    /// Whether values of this kind are passed as handles rather than by value.
    pub fn is_handle(&self) -> bool {
        matches!(self, DeclKind::Interface(_) | DeclKind::Function(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Record<T> {
    #[serde(default)]
    pub fields: Vec<Field<T>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<Constant<T>>,
    #[serde(default)]
    pub deriving: BTreeSet<Deriving>,
}

impl<T> Record<T> {
    pub fn derives(&self, capability: Deriving) -> bool {
        self.deriving.contains(&capability)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Field<T> {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: T,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
}

/// A literal constant attached to a record or interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Constant<T> {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: T,
    pub value: ConstValue,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Interface<T> {
    #[serde(default = "native_only")]
    pub implemented_by: BTreeSet<Side>,
    #[serde(default)]
    pub methods: Vec<Method<T>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property<T>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<Constant<T>>,
}

impl<T> Interface<T> {
    pub fn is_native(&self) -> bool {
        self.implemented_by.contains(&Side::Native)
    }

    pub fn is_managed(&self) -> bool {
        self.implemented_by.contains(&Side::Managed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Method<T> {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param<T>>,
    #[serde(default, rename = "returns", skip_serializing_if = "Option::is_none")]
    pub ret: Option<T>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "const")]
    pub is_const: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throws: Vec<T>,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Param<T> {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: T,
    #[serde(default)]
    pub site: Site,
}

/// An observable value exposed by an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Property<T> {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: T,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
}

/// Member of an enum or flags declaration. Accepts a bare name or a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ItemRepr")]
pub struct Item {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub none: bool,
    #[serde(flatten)]
    pub doc: Doc,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemRepr {
    Bare(String),
    Full {
        name: String,
        #[serde(default)]
        all: bool,
        #[serde(default)]
        none: bool,
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        deprecated: Deprecation,
    },
}

impl From<ItemRepr> for Item {
    fn from(repr: ItemRepr) -> Self {
        match repr {
            ItemRepr::Bare(name) => Item::named(name),
            ItemRepr::Full {
                name,
                all,
                none,
                comment,
                deprecated,
            } => Item {
                name,
                all,
                none,
                doc: Doc { comment, deprecated },
            },
        }
    }
}

impl Item {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            all: false,
            none: false,
            doc: Doc::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub flags: Vec<Item>,
}

impl Flags {
    /// Bit value of every flag in declaration order.
    ///
    /// Ordinary flags get `1 << i` counting only ordinary flags, `none` is 0,
    /// and `all` is the union of every ordinary bit.
    pub fn bit_values(&self) -> Vec<(&str, u64)> {
        let mut ordinary = 0u32;
        let mut union = 0u64;
        let mut values: Vec<(&str, Option<u64>)> = Vec::with_capacity(self.flags.len());
        for flag in &self.flags {
            if flag.all {
                values.push((&flag.name, None));
            } else if flag.none {
                values.push((&flag.name, Some(0)));
            } else {
                let bit = 1u64 << ordinary;
                ordinary += 1;
                union |= bit;
                values.push((&flag.name, Some(bit)));
            }
        }
        values
            .into_iter()
            .map(|(name, value)| (name, value.unwrap_or(union)))
            .collect()
    }

    pub fn ordinary_count(&self) -> usize {
        self.flags.iter().filter(|f| !f.all && !f.none).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Function<T> {
    #[serde(default = "both_sides")]
    pub implemented_by: BTreeSet<Side>,
    #[serde(default)]
    pub params: Vec<Param<T>>,
    #[serde(default, rename = "returns", skip_serializing_if = "Option::is_none")]
    pub ret: Option<T>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throws: Vec<T>,
    /// Set for functions hoisted from an inline type reference.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ErrorDomain<T> {
    pub codes: Vec<ErrorCode<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ErrorCode<T> {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param<T>>,
    #[serde(default)]
    pub site: Site,
    #[serde(flatten)]
    pub doc: Doc,
}

impl<T> Declaration<T> {
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new(namespace_segments(&self.namespace), self.name.clone())
    }

    pub fn namespace_path(&self) -> Vec<String> {
        namespace_segments(&self.namespace)
    }

    /// Convert every type reference with `f`, preserving all other attributes.
    pub fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Declaration<U>, E> {
        Ok(Declaration {
            name: self.name,
            namespace: self.namespace,
            site: self.site,
            doc: self.doc,
            kind: self.kind.try_map(f)?,
        })
    }
}

pub(crate) fn namespace_segments(namespace: &str) -> Vec<String> {
    namespace
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl<T> DeclKind<T> {
    pub fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<DeclKind<U>, E> {
        Ok(match self {
            DeclKind::Record(r) => DeclKind::Record(Record {
                fields: r
                    .fields
                    .into_iter()
                    .map(|fd| fd.try_map(f))
                    .collect::<Result<_, E>>()?,
                constants: map_constants(r.constants, f)?,
                deriving: r.deriving,
            }),
            DeclKind::Interface(i) => DeclKind::Interface(Interface {
                implemented_by: i.implemented_by,
                methods: i
                    .methods
                    .into_iter()
                    .map(|m| m.try_map(f))
                    .collect::<Result<_, E>>()?,
                properties: i
                    .properties
                    .into_iter()
                    .map(|p| {
                        Ok(Property {
                            name: p.name,
                            ty: f(p.ty)?,
                            site: p.site,
                            doc: p.doc,
                        })
                    })
                    .collect::<Result<_, E>>()?,
                constants: map_constants(i.constants, f)?,
            }),
            DeclKind::Enum(e) => DeclKind::Enum(e),
            DeclKind::Flags(fl) => DeclKind::Flags(fl),
            DeclKind::Function(func) => DeclKind::Function(func.try_map(f)?),
            DeclKind::ErrorDomain(d) => DeclKind::ErrorDomain(ErrorDomain {
                codes: d
                    .codes
                    .into_iter()
                    .map(|c| {
                        Ok(ErrorCode {
                            name: c.name,
                            params: map_params(c.params, f)?,
                            site: c.site,
                            doc: c.doc,
                        })
                    })
                    .collect::<Result<_, E>>()?,
            }),
        })
    }
}

impl<T> Field<T> {
    fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Field<U>, E> {
        Ok(Field {
            name: self.name,
            ty: f(self.ty)?,
            site: self.site,
            doc: self.doc,
        })
    }
}

impl<T> Method<T> {
    fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Method<U>, E> {
        Ok(Method {
            name: self.name,
            params: map_params(self.params, f)?,
            ret: self.ret.map(&mut *f).transpose()?,
            is_static: self.is_static,
            is_const: self.is_const,
            is_async: self.is_async,
            throws: self.throws.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
            site: self.site,
            doc: self.doc,
        })
    }
}

impl<T> Function<T> {
    pub fn try_map<U, E>(self, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Function<U>, E> {
        Ok(Function {
            implemented_by: self.implemented_by,
            params: map_params(self.params, f)?,
            ret: self.ret.map(&mut *f).transpose()?,
            is_async: self.is_async,
            throws: self.throws.into_iter().map(&mut *f).collect::<Result<_, E>>()?,
            anonymous: self.anonymous,
        })
    }
}

fn map_params<T, U, E>(
    params: Vec<Param<T>>,
    f: &mut impl FnMut(T) -> Result<U, E>,
) -> Result<Vec<Param<U>>, E> {
    params
        .into_iter()
        .map(|p| {
            Ok(Param {
                name: p.name,
                ty: f(p.ty)?,
                site: p.site,
            })
        })
        .collect()
}

fn map_constants<T, U, E>(
    constants: Vec<Constant<T>>,
    f: &mut impl FnMut(T) -> Result<U, E>,
) -> Result<Vec<Constant<U>>, E> {
    constants
        .into_iter()
        .map(|c| {
            Ok(Constant {
                name: c.name,
                ty: f(c.ty)?,
                value: c.value,
                site: c.site,
                doc: c.doc,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    #[test]
    fn record_from_toml() {
        let decl: Declaration<TypeRef> = toml::from_str(
            r#"
name = "point"
namespace = "geo"
kind = "record"
comment = "A point."
deriving = ["eq", "ord"]

[[fields]]
name = "x"
type = "i32"

[[fields]]
name = "label"
type = "string?"
"#,
        )
        .unwrap();
        assert_eq!(decl.qualified_name().to_string(), "geo.point");
        assert_eq!(decl.doc.comment.as_deref(), Some("A point."));
        let DeclKind::Record(record) = &decl.kind else {
            panic!("expected record");
        };
        assert_eq!(record.fields.len(), 2);
        assert!(record.fields[1].ty.optional);
        assert!(record.derives(Deriving::Ord));
        assert!(!record.derives(Deriving::Str));
    }

    #[test]
    fn interface_defaults_to_native() {
        let decl: Declaration<TypeRef> = toml::from_str(
            r#"
name = "calculator"
kind = "interface"

[[methods]]
name = "add"
returns = "i32"
params = [{ name = "a", type = "i32" }, { name = "b", type = "i32" }]
"#,
        )
        .unwrap();
        let DeclKind::Interface(iface) = &decl.kind else {
            panic!("expected interface");
        };
        assert!(iface.is_native());
        assert!(!iface.is_managed());
        assert_eq!(iface.methods[0].params.len(), 2);
        assert!(decl.kind.is_handle());
    }

    #[test]
    fn omitted_member_lists_default_to_empty() {
        let bodies = ["kind = \"record\"", "kind = \"function\"", "kind = \"error-domain\"\ncodes = []"];
        let decls: Vec<Declaration<TypeRef>> = bodies
            .into_iter()
            .map(|body| toml::from_str(&format!("name = \"empty\"\n{body}\n")).unwrap())
            .collect();
        let DeclKind::Record(record) = &decls[0].kind else {
            panic!("expected record");
        };
        assert!(record.fields.is_empty() && record.deriving.is_empty());
        let DeclKind::Function(function) = &decls[1].kind else {
            panic!("expected function");
        };
        assert!(function.params.is_empty() && function.ret.is_none());
        let DeclKind::ErrorDomain(domain) = &decls[2].kind else {
            panic!("expected error domain");
        };
        assert!(domain.codes.is_empty());

        let code: ErrorCode<TypeRef> = toml::from_str("name = \"closed\"\n").unwrap();
        assert!(code.params.is_empty());
    }

    #[test]
    fn flag_bits_follow_declaration_order() {
        let flags = Flags {
            flags: vec![
                Item {
                    none: true,
                    ..Item::named("none")
                },
                Item::named("read"),
                Item::named("write"),
                Item::named("exec"),
                Item {
                    all: true,
                    ..Item::named("all")
                },
            ],
        };
        assert_eq!(
            flags.bit_values(),
            vec![("none", 0), ("read", 1), ("write", 2), ("exec", 4), ("all", 7)]
        );
        assert_eq!(flags.ordinary_count(), 3);
    }

    #[test]
    fn enum_items_accept_bare_names() {
        let e: Enum = toml::from_str(r#"items = ["red", { name = "green", comment = "go" }]"#).unwrap();
        assert_eq!(e.items[0].name, "red");
        assert_eq!(e.items[1].doc.comment.as_deref(), Some("go"));
    }

    #[test]
    fn deprecation_forms() {
        let doc: Doc = toml::from_str(r#"deprecated = "use v2""#).unwrap();
        assert!(doc.deprecated.is_deprecated());
        assert_eq!(doc.deprecated.message(), Some("use v2"));
        let doc: Doc = toml::from_str("deprecated = true").unwrap();
        assert!(doc.deprecated.is_deprecated());
        assert!(Doc::default().is_empty());
    }

    #[test]
    fn try_map_converts_every_reference() {
        let decl: Declaration<TypeRef> = toml::from_str(
            r#"
name = "errors"
kind = "error-domain"

[[codes]]
name = "with_params"
params = [{ name = "code", type = "i32" }, { name = "text", type = "string" }]
"#,
        )
        .unwrap();
        let mapped: Declaration<String> = decl
            .try_map(&mut |t: TypeRef| Ok::<_, ()>(t.name))
            .unwrap();
        let DeclKind::ErrorDomain(domain) = mapped.kind else {
            panic!("expected error domain");
        };
        assert_eq!(domain.codes[0].params[1].ty, "string");
    }
}
