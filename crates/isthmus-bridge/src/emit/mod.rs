//! Typed per-target emitters.
//!
//! Each target implements [`Emitter`]: a pure function from one declaration
//! (plus its target views) to the files that represent it. Emitters never
//! touch the filesystem; the pipeline collects their output.

mod cpp;
mod csharp;
mod glue;
mod java;
mod support;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use isthmus_ir::{ConstValue, DeclId, DeclKind, Declaration, Doc, Ir, Param, Primitive, Site, Ty};
use isthmus_targets::{TargetConfig, TargetLanguage, ViewResolver};
use serde::Serialize;

use crate::derive::DerivePlan;
use crate::error::{GenerateError, Result};
use crate::marshal::{select_strategy, MarshalStrategy};
use crate::shape::{select_shapes, BridgingShape};

pub use cpp::CppEmitter;
pub use csharp::CSharpEmitter;
pub use java::JavaEmitter;
pub(crate) use support::runtime_files;

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub target: TargetLanguage,
    /// Path relative to the target's output directory until the pipeline
    /// anchors it.
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(target: TargetLanguage, path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            target,
            path: path.into(),
            contents,
        }
    }
}

/// Everything an emitter may consult for one target.
pub struct EmitContext<'a> {
    /// Views in the language being emitted.
    pub view: &'a ViewResolver<'a>,
    /// Views on the native side, for glue code that names native types.
    pub native: &'a ViewResolver<'a>,
    pub config: &'a TargetConfig,
    pub plans: &'a BTreeMap<DeclId, DerivePlan>,
}

impl<'a> EmitContext<'a> {
    pub fn ir(&self) -> &'a Ir {
        self.view.ir()
    }

    pub fn language(&self) -> TargetLanguage {
        self.view.language()
    }

    pub fn shapes(&self, id: DeclId) -> BTreeSet<BridgingShape> {
        select_shapes(self.ir(), id, self.view.backing(id))
    }

    pub fn strategy(&self, ty: &Ty) -> MarshalStrategy {
        select_strategy(self.ir(), ty)
    }

    pub fn plan(&self, id: DeclId) -> Option<&'a DerivePlan> {
        self.plans.get(&id)
    }

    /// Qualified IDL name, used in banners and string representations.
    pub fn label(&self, id: DeclId) -> String {
        self.ir().qualified_name(id).key()
    }

    pub fn error(&self, id: DeclId, detail: impl Into<String>) -> GenerateError {
        GenerateError::emit(self.language().display_name(), self.label(id), detail)
    }
}

pub trait Emitter {
    fn language(&self) -> TargetLanguage;

    /// Files representing one declaration, in a stable order.
    fn emit_declaration(&self, ctx: &EmitContext<'_>, id: DeclId) -> Result<Vec<GeneratedFile>>;

    /// Fixed support files emitted once per target.
    fn support_files(&self, _ctx: &EmitContext<'_>) -> Result<Vec<GeneratedFile>> {
        Ok(Vec::new())
    }
}

pub fn emitter_for(language: TargetLanguage) -> Box<dyn Emitter> {
    match language {
        TargetLanguage::Cpp => Box::new(CppEmitter),
        TargetLanguage::Java => Box::new(JavaEmitter),
        TargetLanguage::CSharp => Box::new(CSharpEmitter),
    }
}

const INDENT: &str = "    ";

/// Line-oriented source builder with block indentation.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn lines<S: AsRef<str>>(&mut self, lines: impl IntoIterator<Item = S>) {
        for line in lines {
            self.line(line);
        }
    }

    /// An empty line, never two in a row and never at the start.
    pub fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") && !self.out.ends_with("{\n") {
            self.out.push('\n');
        }
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Write `open`, the indented body, then `close`.
    pub fn block<T>(&mut self, open: impl AsRef<str>, close: &str, body: impl FnOnce(&mut Self) -> T) -> T {
        self.line(open);
        self.indent();
        let result = body(self);
        self.dedent();
        if self.out.ends_with("\n\n") {
            self.out.pop();
        }
        self.line(close);
        result
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// First lines of every generated file.
pub(crate) fn banner(comment: &str, label: &str) -> [String; 2] {
    [
        format!("{comment} AUTOGENERATED FILE - DO NOT MODIFY!"),
        format!("{comment} This file was generated by isthmus from {label}"),
    ]
}

/// Double-quoted literal valid in C++, Java and C#.
pub(crate) fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A constant's literal in C-family syntax, suffixed for its primitive.
pub(crate) fn constant_literal(primitive: Primitive, value: &ConstValue, language: TargetLanguage) -> Option<String> {
    let literal = match (primitive, value) {
        (Primitive::Bool, ConstValue::Bool(b)) => b.to_string(),
        // the positive half of the minimum overflows before negation in C++
        (Primitive::I64, ConstValue::Int(i64::MIN)) if language == TargetLanguage::Cpp => {
            "(-9223372036854775807LL - 1)".to_string()
        }
        (Primitive::I32, ConstValue::Int(v)) if language == TargetLanguage::Cpp && *v == i64::from(i32::MIN) => {
            "(-2147483647 - 1)".to_string()
        }
        (Primitive::I64, ConstValue::Int(v)) if language != TargetLanguage::Cpp => format!("{v}L"),
        (Primitive::F32 | Primitive::F64, ConstValue::Float(v)) if !v.is_finite() => return None,
        (Primitive::F32, ConstValue::Float(v)) if v.abs() > f64::from(f32::MAX) => return None,
        (Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64, ConstValue::Int(v)) => v.to_string(),
        (Primitive::F32, ConstValue::Float(v)) => format!("{v:?}f"),
        (Primitive::F32, ConstValue::Int(v)) => format!("{v}.0f"),
        (Primitive::F64, ConstValue::Float(v)) => format!("{v:?}"),
        (Primitive::F64, ConstValue::Int(v)) => format!("{v}.0"),
        (Primitive::String, ConstValue::Text(s)) => string_literal(s),
        _ => return None,
    };
    Some(literal)
}

/// Comment lines of a declaration or member, empty when undocumented.
pub(crate) fn doc_lines(doc: &Doc) -> Vec<String> {
    let mut lines: Vec<String> = doc.lines().into_iter().map(str::to_string).collect();
    if let Some(message) = doc.deprecated.message() {
        lines.push(format!("@deprecated {message}"));
    } else if doc.deprecated.is_deprecated() {
        lines.push("@deprecated".to_string());
    }
    lines
}

/// Write a `/** ... */` block for C++ and Java.
pub(crate) fn block_comment(w: &mut CodeWriter, lines: &[String]) {
    match lines {
        [] => {}
        [only] => w.line(format!("/** {only} */")),
        _ => {
            w.line("/**");
            for line in lines {
                if line.is_empty() {
                    w.line(" *");
                } else {
                    w.line(format!(" * {line}"));
                }
            }
            w.line(" */");
        }
    }
}

/// JNI and C ABI symbol stem: snake-cased namespace and name joined by `_`.
pub(crate) fn symbol_stem(ctx: &EmitContext<'_>, id: DeclId) -> String {
    let mut parts: Vec<String> = ctx
        .native
        .namespace_of(id)
        .iter()
        .map(|s| isthmus_ir::ident::convert(s, isthmus_ir::Case::Snake))
        .collect();
    parts.push(isthmus_ir::ident::convert(&ctx.ir().decl(id).name, isthmus_ir::Case::Snake));
    parts.join("_")
}

/// One call crossing the boundary: an interface method, or the single
/// invocation of a function value.
pub(crate) struct Call<'d> {
    pub name: &'d str,
    pub params: &'d [Param<Ty>],
    pub ret: Option<&'d Ty>,
    pub is_static: bool,
    pub is_const: bool,
    pub is_async: bool,
    pub throws: &'d [Ty],
    pub doc: &'d Doc,
    pub site: &'d Site,
}

/// Calls of an interface or function, in declaration order.
pub(crate) fn calls(decl: &Declaration<Ty>) -> Vec<Call<'_>> {
    match &decl.kind {
        DeclKind::Interface(iface) => iface
            .methods
            .iter()
            .map(|m| Call {
                name: &m.name,
                params: &m.params,
                ret: m.ret.as_ref(),
                is_static: m.is_static,
                is_const: m.is_const,
                is_async: m.is_async,
                throws: &m.throws,
                doc: &m.doc,
                site: &m.site,
            })
            .collect(),
        DeclKind::Function(function) => vec![Call {
            name: "call",
            params: &function.params,
            ret: function.ret.as_ref(),
            is_static: false,
            is_const: false,
            is_async: function.is_async,
            throws: &function.throws,
            doc: &decl.doc,
            site: &decl.site,
        }],
        _ => Vec::new(),
    }
}

/// Every type a declaration mentions: fields, constants, signatures, error
/// parameters.
pub(crate) fn decl_types(kind: &DeclKind<Ty>) -> Vec<&Ty> {
    let mut out = Vec::new();
    match kind {
        DeclKind::Record(record) => {
            out.extend(record.fields.iter().map(|f| &f.ty));
            out.extend(record.constants.iter().map(|c| &c.ty));
        }
        DeclKind::Interface(iface) => {
            for method in &iface.methods {
                out.extend(method.params.iter().map(|p| &p.ty));
                out.extend(method.ret.iter());
                out.extend(method.throws.iter());
            }
            out.extend(iface.properties.iter().map(|p| &p.ty));
            out.extend(iface.constants.iter().map(|c| &c.ty));
        }
        DeclKind::Function(function) => {
            out.extend(function.params.iter().map(|p| &p.ty));
            out.extend(function.ret.iter());
            out.extend(function.throws.iter());
        }
        DeclKind::ErrorDomain(domain) => {
            for code in &domain.codes {
                out.extend(code.params.iter().map(|p| &p.ty));
            }
        }
        DeclKind::Enum(_) | DeclKind::Flags(_) => {}
    }
    out
}

/// Declarations referenced from `tys`, excluding `owner`, in id order.
pub(crate) fn referenced<'t>(owner: DeclId, tys: impl IntoIterator<Item = &'t Ty>) -> BTreeSet<DeclId> {
    let mut out = BTreeSet::new();
    for ty in tys {
        ty.walk(&mut |t| {
            if let Ty::Declared(id) = t {
                if *id != owner {
                    out.insert(*id);
                }
            }
        });
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use isthmus_ir::{DeclarationFile, IrBuilder};
    use isthmus_targets::{CSharpConfig, CppConfig, JavaConfig, Profile};

    pub const SHOP: &str = r#"
namespace = "shop"

[[declarations]]
name = "color"
kind = "enum"
items = ["red", { name = "light_blue", comment = "A pale color." }]

[[declarations]]
name = "access"
kind = "flags"
flags = ["read", "write", { name = "none", none = true }, { name = "all", all = true }]

[[declarations]]
name = "line_item"
kind = "record"
comment = "One line of a cart."
deriving = ["eq", "ord", "str"]
fields = [
    { name = "count", type = "i32" },
    { name = "title", type = "string" },
    { name = "color", type = "color" },
]
constants = [{ name = "max_count", type = "i32", value = 99 }]

[[declarations]]
name = "summary"
kind = "record"
deriving = ["eq", "str"]
fields = [
    { name = "items", type = "list<line_item>" },
    { name = "note", type = "string?" },
    { name = "digest", type = "binary" },
    { name = "access", type = "access" },
]

[[declarations]]
name = "cart_error"
kind = "error-domain"
codes = [
    { name = "out_of_stock", params = [{ name = "item", type = "i32" }] },
    { name = "closed" },
]

[[declarations]]
name = "predicate"
kind = "function"
params = [{ name = "item", type = "line_item" }]
returns = "bool"

[[declarations]]
name = "cart_observer"
kind = "interface"
implemented-by = ["managed"]
methods = [{ name = "on_change", params = [{ name = "count", type = "i32" }, { name = "stamp", type = "date" }] }]

[[declarations]]
name = "cart"
kind = "interface"
comment = "A shopping cart."
methods = [
    { name = "add", params = [{ name = "item", type = "line_item" }, { name = "quantity", type = "i32" }], throws = ["cart_error"] },
    { name = "count", const = true, returns = "i32" },
    { name = "summarize", async = true, returns = "summary" },
    { name = "filter", params = [{ name = "keep", type = "predicate" }], returns = "list<line_item>" },
    { name = "watch", params = [{ name = "observer", type = "cart_observer" }] },
    { name = "create", static = true, returns = "cart" },
]
properties = [{ name = "owner", type = "string" }]
constants = [{ name = "currency", type = "string", value = "EUR" }]
"#;

    pub fn shop_ir() -> Ir {
        let file = DeclarationFile::parse_toml(SHOP).unwrap();
        let mut builder = IrBuilder::new();
        builder.extend(file.declarations);
        builder.build().unwrap()
    }

    pub fn config(language: TargetLanguage) -> TargetConfig {
        match language {
            TargetLanguage::Cpp => TargetConfig::Cpp(CppConfig {
                namespace: "acme".into(),
                ..CppConfig::default()
            }),
            TargetLanguage::Java => TargetConfig::Java(JavaConfig {
                package: "com.acme".into(),
                native_lib: Some("shop".into()),
                ..JavaConfig::default()
            }),
            TargetLanguage::CSharp => TargetConfig::CSharp(CSharpConfig {
                namespace: "Acme".into(),
                ..CSharpConfig::default()
            }),
        }
    }

    /// Emit `dotted` for `language` and return the files' contents.
    pub fn emit(ir: &Ir, language: TargetLanguage, dotted: &str) -> Vec<GeneratedFile> {
        let config = config(language);
        let native_config = self::config(TargetLanguage::Cpp);
        let view = ViewResolver::new(ir, &config, Profile::builtin(language)).unwrap();
        let native = ViewResolver::new(ir, &native_config, Profile::cpp()).unwrap();
        let plans = crate::derive::derive_all(ir).unwrap();
        let ctx = EmitContext {
            view: &view,
            native: &native,
            config: &config,
            plans: &plans,
        };
        let id = ir.lookup(dotted).unwrap();
        emitter_for(language).emit_declaration(&ctx, id).unwrap()
    }

    /// Assert every fragment occurs in `text`, in the given order.
    pub fn assert_in_order(text: &str, fragments: &[&str]) {
        let mut from = 0;
        for fragment in fragments {
            match text[from..].find(fragment) {
                Some(at) => from += at + fragment.len(),
                None => panic!("missing or out of order: {fragment:?}\n--- generated ---\n{text}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_indents_blocks() {
        let mut w = CodeWriter::new();
        w.line("namespace a {");
        w.blank();
        w.block("struct B {", "};", |w| {
            w.line("int x;");
            w.blank();
        });
        w.line("}");
        assert_eq!(w.finish(), "namespace a {\nstruct B {\n    int x;\n};\n}\n");
    }

    #[test]
    fn literals_are_escaped_and_suffixed() {
        assert_eq!(string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(
            constant_literal(Primitive::I64, &ConstValue::Int(7), TargetLanguage::Java).unwrap(),
            "7L"
        );
        assert_eq!(
            constant_literal(Primitive::I64, &ConstValue::Int(7), TargetLanguage::Cpp).unwrap(),
            "7"
        );
        assert_eq!(
            constant_literal(Primitive::F32, &ConstValue::Float(1.5), TargetLanguage::CSharp).unwrap(),
            "1.5f"
        );
        assert_eq!(
            constant_literal(Primitive::F64, &ConstValue::Int(2), TargetLanguage::Cpp).unwrap(),
            "2.0"
        );
        assert!(constant_literal(Primitive::Bool, &ConstValue::Int(1), TargetLanguage::Cpp).is_none());
    }

    #[test]
    fn extreme_constants_have_valid_spellings() {
        let min = ConstValue::Int(i64::MIN);
        assert_eq!(
            constant_literal(Primitive::I64, &min, TargetLanguage::Cpp).unwrap(),
            "(-9223372036854775807LL - 1)"
        );
        assert_eq!(
            constant_literal(Primitive::I64, &min, TargetLanguage::Java).unwrap(),
            "-9223372036854775808L"
        );
        assert_eq!(
            constant_literal(Primitive::I64, &min, TargetLanguage::CSharp).unwrap(),
            "-9223372036854775808L"
        );
        assert_eq!(
            constant_literal(Primitive::I32, &ConstValue::Int(i64::from(i32::MIN)), TargetLanguage::Cpp).unwrap(),
            "(-2147483647 - 1)"
        );
        assert_eq!(
            constant_literal(Primitive::F64, &ConstValue::Float(1e300), TargetLanguage::Java).unwrap(),
            "1e300"
        );
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(constant_literal(Primitive::F64, &ConstValue::Float(value), TargetLanguage::Cpp).is_none());
        }
        assert!(constant_literal(Primitive::F32, &ConstValue::Float(1e39), TargetLanguage::Java).is_none());
    }

    #[test]
    fn doc_lines_include_deprecation() {
        let doc = Doc {
            comment: Some("First.\nSecond.".into()),
            deprecated: isthmus_ir::Deprecation::Message("use other".into()),
        };
        assert_eq!(doc_lines(&doc), ["First.", "Second.", "@deprecated use other"]);
        let mut w = CodeWriter::new();
        block_comment(&mut w, &doc_lines(&doc));
        assert_eq!(
            w.finish(),
            "/**\n * First.\n * Second.\n * @deprecated use other\n */\n"
        );
    }
}
