//! Type references and resolved types.
//!
//! A [`TypeRef`] is a reference as written by the front end (a possibly
//! relative name plus generic parameters). Resolution turns it into a
//! [`Ty`], which is either a builtin primitive, a builtin container, or an
//! index into the declaration arena.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decl::Function;
use crate::site::Site;

/// The primitive set every target must be able to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Binary,
    Date,
}

impl Primitive {
    pub const ALL: [Primitive; 10] = [
        Primitive::Bool,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::F32,
        Primitive::F64,
        Primitive::String,
        Primitive::Binary,
        Primitive::Date,
    ];

    /// The IDL keyword naming this primitive.
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::I16 => "i16",
            Primitive::I32 => "i32",
            Primitive::I64 => "i64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
            Primitive::String => "string",
            Primitive::Binary => "binary",
            Primitive::Date => "date",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == keyword)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// Whether values of this primitive are totally ordered for `ord` deriving.
    ///
    /// Booleans and binary blobs are excluded.
    pub fn has_natural_order(self) -> bool {
        self.is_integer() || self.is_float() || matches!(self, Primitive::String | Primitive::Date)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Builtin parametric containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Optional,
    List,
    Set,
    Map,
}

impl Container {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "optional" => Some(Container::Optional),
            "list" => Some(Container::List),
            "set" => Some(Container::Set),
            "map" => Some(Container::Map),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Container::Optional => "optional",
            Container::List => "list",
            Container::Set => "set",
            Container::Map => "map",
        }
    }

    /// Number of generic parameters the container takes.
    pub fn arity(self) -> usize {
        match self {
            Container::Map => 2,
            _ => 1,
        }
    }
}

/// A type reference as produced by the front end.
///
/// Deserializes either from a table or from the compact textual form
/// `map<string, list<i32>>?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TypeRefRepr")]
pub struct TypeRef {
    /// Name as written; relative unless it starts with `.`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<TypeRef>,
    /// Shorthand for wrapping the reference in `optional<..>`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// An anonymous function type declared inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<Box<Function<TypeRef>>>,
    #[serde(default)]
    pub site: Site,
}

/// Name used for inline function references before they are hoisted.
pub const ANONYMOUS_FUNCTION: &str = "<function>";

#[derive(Deserialize)]
#[serde(untagged)]
enum TypeRefRepr {
    Text(String),
    Table {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        params: Vec<TypeRef>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        function: Option<Box<Function<TypeRef>>>,
        #[serde(default)]
        site: Site,
    },
}

impl TryFrom<TypeRefRepr> for TypeRef {
    type Error = String;

    fn try_from(repr: TypeRefRepr) -> Result<Self, Self::Error> {
        match repr {
            TypeRefRepr::Text(text) => text.parse(),
            TypeRefRepr::Table {
                name,
                params,
                optional,
                function,
                site,
            } => {
                let name = match (name, &function) {
                    (Some(name), _) => name,
                    (None, Some(_)) => ANONYMOUS_FUNCTION.to_string(),
                    (None, None) => return Err("type reference needs a name or a function".into()),
                };
                Ok(TypeRef {
                    name,
                    params,
                    optional,
                    function,
                    site,
                })
            }
        }
    }
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            optional: false,
            function: None,
            site: Site::default(),
        }
    }

    pub fn generic(name: impl Into<String>, params: Vec<TypeRef>) -> Self {
        Self {
            params,
            ..Self::named(name)
        }
    }

    pub fn inline_function(function: Function<TypeRef>) -> Self {
        Self {
            function: Some(Box::new(function)),
            ..Self::named(ANONYMOUS_FUNCTION)
        }
    }

    pub fn into_optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn at(mut self, site: Site) -> Self {
        self.site = site;
        self
    }

    pub fn is_absolute(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Identifier-safe signature used when naming anonymous functions.
    pub fn signature(&self, depth: usize) -> String {
        let mut out = self.name.trim_start_matches('.').replace('.', "_");
        for param in &self.params {
            out.push_str(&"_".repeat(depth));
            out.push_str(&param.signature(depth + 1));
        }
        if self.optional {
            out.push_str("_opt");
        }
        out
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            write!(f, "<")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, ">")?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeExprParser {
            chars: s.chars().collect(),
            pos: 0,
        };
        let parsed = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(format!("unexpected trailing input in type expression '{s}'"));
        }
        Ok(parsed)
    }
}

/// Recursive-descent parser for the compact `name<params>?` notation.
struct TypeExprParser {
    chars: Vec<char>,
    pos: usize,
}

impl TypeExprParser {
    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.chars.get(self.pos) == Some(&expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, String> {
        self.skip_ws();
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(format!("expected a type name at offset {start}"));
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        let mut type_ref = TypeRef::named(name);
        if self.eat('<') {
            loop {
                type_ref.params.push(self.parse_type()?);
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(format!("expected ',' or '>' at offset {}", self.pos));
            }
        }
        if self.eat('?') {
            type_ref.optional = true;
        }
        Ok(type_ref)
    }
}

/// Index of a declaration in the IR arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclId(pub usize);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Primitive(Primitive),
    Optional(Box<Ty>),
    List(Box<Ty>),
    Set(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    Declared(DeclId),
}

impl Ty {
    pub fn optional(inner: Ty) -> Self {
        Ty::Optional(Box::new(inner))
    }

    pub fn list(inner: Ty) -> Self {
        Ty::List(Box::new(inner))
    }

    pub fn set(inner: Ty) -> Self {
        Ty::Set(Box::new(inner))
    }

    pub fn map(key: Ty, value: Ty) -> Self {
        Ty::Map(Box::new(key), Box::new(value))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Ty::Optional(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Ty::List(_) | Ty::Set(_) | Ty::Map(..))
    }

    /// The type with one level of `optional` removed.
    pub fn strip_optional(&self) -> &Ty {
        match self {
            Ty::Optional(inner) => inner,
            other => other,
        }
    }

    pub fn declared(&self) -> Option<DeclId> {
        match self {
            Ty::Declared(id) => Some(*id),
            _ => None,
        }
    }

    /// Visit this type and every nested type, outermost first.
    pub fn walk(&self, visit: &mut impl FnMut(&Ty)) {
        visit(self);
        match self {
            Ty::Optional(inner) | Ty::List(inner) | Ty::Set(inner) => inner.walk(visit),
            Ty::Map(key, value) => {
                key.walk(visit);
                value.walk(visit);
            }
            Ty::Primitive(_) | Ty::Declared(_) => {}
        }
    }
}
