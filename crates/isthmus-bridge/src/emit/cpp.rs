//! C++ headers for the native side.
//!
//! One header per declaration. Records become structs with derived
//! operators and a wire codec specialization; interfaces become abstract
//! classes; functions become `std::function` aliases; error domains become
//! an exception class per code.

use std::collections::BTreeSet;

use isthmus_ir::{
    Case, Constant, DeclId, DeclKind, Doc, Enum, ErrorDomain, Flags, Function, Interface, Primitive, Record, Ty,
};
use isthmus_targets::{TargetConfig, TargetLanguage};
use tracing::debug;

use super::{
    banner, block_comment, constant_literal, doc_lines, referenced, string_literal, CodeWriter, EmitContext,
    Emitter, GeneratedFile,
};
use crate::error::Result;

pub struct CppEmitter;

impl Emitter for CppEmitter {
    fn language(&self) -> TargetLanguage {
        TargetLanguage::Cpp
    }

    fn emit_declaration(&self, ctx: &EmitContext<'_>, id: DeclId) -> Result<Vec<GeneratedFile>> {
        let decl = ctx.ir().decl(id);
        let mut header = Header::new(ctx, id);
        match &decl.kind {
            DeclKind::Record(record) => header.record(record)?,
            DeclKind::Enum(e) => header.enumeration(e)?,
            DeclKind::Flags(flags) => header.flags(flags)?,
            DeclKind::Interface(iface) => header.interface(iface)?,
            DeclKind::Function(function) => header.function(function)?,
            DeclKind::ErrorDomain(domain) => header.error_domain(domain)?,
        }
        debug!(declaration = %ctx.label(id), kind = decl.kind.label(), "emitted C++ header");
        Ok(vec![GeneratedFile::new(
            TargetLanguage::Cpp,
            ctx.view.file_path(id),
            header.finish(),
        )])
    }
}

/// Spelling of a value parameter: by value when cheap, else by const reference.
pub(crate) fn param_type(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    let view = ctx.native.view(ty);
    if view.by_value {
        view.spelling
    } else {
        format!("const {}&", view.spelling)
    }
}

/// Return spelling, wrapped in a future for asynchronous calls.
pub(crate) fn return_type(ctx: &EmitContext<'_>, ret: Option<&Ty>, is_async: bool) -> String {
    let plain = ret.map_or_else(|| "void".to_string(), |t| ctx.native.view(t).spelling);
    if is_async {
        format!("std::future<{plain}>")
    } else {
        plain
    }
}

fn deprecated_attribute(doc: &Doc) -> String {
    match doc.deprecated.message() {
        Some(message) => format!("[[deprecated({})]] ", string_literal(message)),
        None if doc.deprecated.is_deprecated() => "[[deprecated]] ".to_string(),
        None => String::new(),
    }
}

struct Header<'c, 'a> {
    ctx: &'c EmitContext<'a>,
    id: DeclId,
    system: BTreeSet<&'static str>,
    body: CodeWriter,
    /// Code after the declaration's namespace closes.
    trailer: CodeWriter,
}

impl<'c, 'a> Header<'c, 'a> {
    fn new(ctx: &'c EmitContext<'a>, id: DeclId) -> Self {
        let mut system = BTreeSet::new();
        system.insert("cstdint");
        system.insert("string");
        system.insert("isthmus/runtime.hpp");
        Self {
            ctx,
            id,
            system,
            body: CodeWriter::new(),
            trailer: CodeWriter::new(),
        }
    }

    fn name(&self) -> Result<String> {
        Ok(self.ctx.view.type_name(self.id)?)
    }

    fn qualified(&self) -> String {
        self.ctx.view.qualified_type_name(self.id)
    }

    fn ty(&mut self, ty: &Ty) -> String {
        self.note(ty);
        self.ctx.view.view(ty).spelling
    }

    fn param(&mut self, ty: &Ty) -> String {
        self.note(ty);
        param_type(self.ctx, ty)
    }

    /// Record the standard headers a type needs.
    fn note(&mut self, ty: &Ty) {
        let ir = self.ctx.ir();
        let system = &mut self.system;
        ty.walk(&mut |t| match t {
            Ty::Optional(_) => {
                system.insert("optional");
            }
            Ty::List(_) | Ty::Primitive(Primitive::Binary) => {
                system.insert("vector");
            }
            Ty::Set(_) => {
                system.insert("unordered_set");
            }
            Ty::Map(..) => {
                system.insert("unordered_map");
            }
            Ty::Primitive(Primitive::Date) => {
                system.insert("chrono");
            }
            Ty::Declared(id) => match &ir.decl(*id).kind {
                DeclKind::Interface(_) => {
                    system.insert("memory");
                }
                DeclKind::Function(_) => {
                    system.insert("functional");
                }
                _ => {}
            },
            Ty::Primitive(_) => {}
        });
    }

    fn constants(&mut self, constants: &[Constant<Ty>]) -> Result<()> {
        for constant in constants {
            let Ty::Primitive(primitive) = constant.ty else {
                return Err(self.ctx.error(self.id, format!("constant '{}' is not a primitive", constant.name)));
            };
            let name = self.ctx.view.constant_name(&constant.name, self.id, &constant.site)?;
            let literal = constant_literal(primitive, &constant.value, TargetLanguage::Cpp).ok_or_else(|| {
                self.ctx
                    .error(self.id, format!("constant '{}' has no {primitive} literal", constant.name))
            })?;
            let ty = self.ty(&constant.ty);
            block_comment(&mut self.body, &doc_lines(&constant.doc));
            if primitive == Primitive::String {
                self.body.line(format!("static inline const {ty} {name} = {literal};"));
            } else {
                self.body.line(format!("static constexpr {ty} {name} = {literal};"));
            }
        }
        if !constants.is_empty() {
            self.body.blank();
        }
        Ok(())
    }

    fn record(&mut self, record: &Record<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = self.name()?;
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let field_name = ctx.view.field_name(&field.name, self.id, &field.site)?;
            let ty = self.ty(&field.ty);
            fields.push((field_name, ty, field));
        }
        self.system.insert("utility");

        block_comment(&mut self.body, &doc_lines(&decl.doc));
        self.body
            .line(format!("struct {}{name} final {{", deprecated_attribute(&decl.doc)));
        self.body.indent();
        self.constants(&record.constants)?;
        for (field_name, ty, field) in &fields {
            block_comment(&mut self.body, &doc_lines(&field.doc));
            self.body
                .line(format!("{}{ty} {field_name};", deprecated_attribute(&field.doc)));
        }
        self.body.blank();
        if fields.is_empty() {
            self.body.line(format!("{name}() = default;"));
        } else {
            let params: Vec<String> = fields.iter().map(|(f, ty, _)| format!("{ty} {f}_")).collect();
            self.body.line(format!("{name}({})", params.join(", ")));
            for (i, (f, _, _)) in fields.iter().enumerate() {
                let lead = if i == 0 { ":" } else { "," };
                self.body.line(format!("{lead} {f}(std::move({f}_))"));
            }
            self.body.line("{}");
        }
        self.body.dedent();
        self.body.line("};");

        if let Some(plan) = ctx.plan(self.id) {
            let names: Vec<&str> = fields.iter().map(|(f, _, _)| f.as_str()).collect();
            if plan.equality() {
                self.body.blank();
                self.equality(&name, &names);
            }
            if plan.ordering() {
                self.body.blank();
                self.ordering(&name, &names);
            }
            if plan.string() {
                self.system.insert("sstream");
                self.body.blank();
                self.body.block(format!("inline std::string to_string(const {name}& value) {{"), "}", |w| {
                    if names.is_empty() {
                        w.line(format!("return {};", string_literal(&plan.string_suffix())));
                        return;
                    }
                    w.line("std::ostringstream out;");
                    for (i, f) in names.iter().enumerate() {
                        w.line(format!(
                            "out << {} << ::isthmus::str(value.{f});",
                            string_literal(&plan.string_label(i))
                        ));
                    }
                    w.line(format!("out << {};", string_literal(&plan.string_suffix())));
                    w.line("return out.str();");
                });
            }
        }

        let qualified = self.qualified();
        let field_types: Vec<String> = record.fields.iter().map(|f| ctx.view.view(&f.ty).spelling).collect();
        let w = &mut self.trailer;
        w.line("namespace isthmus::wire {");
        w.blank();
        w.line("template <>");
        w.block(format!("struct Codec<{qualified}> {{"), "};", |w| {
            if fields.is_empty() {
                w.line(format!("static void write(Writer&, const {qualified}&) {{}}"));
                w.line(format!("static {qualified} read(Reader&) {{ return {qualified}(); }}"));
                return;
            }
            w.block(
                format!("static void write(Writer& writer, const {qualified}& value) {{"),
                "}",
                |w| {
                    for ((f, _, _), ty) in fields.iter().zip(&field_types) {
                        w.line(format!("Codec<{ty}>::write(writer, value.{f});"));
                    }
                },
            );
            w.block(format!("static {qualified} read(Reader& reader) {{"), "}", |w| {
                for ((f, _, _), ty) in fields.iter().zip(&field_types) {
                    w.line(format!("auto f_{f} = Codec<{ty}>::read(reader);"));
                }
                let args: Vec<String> = fields.iter().map(|(f, _, _)| format!("std::move(f_{f})")).collect();
                w.line(format!("return {qualified}({});", args.join(", ")));
            });
        });
        w.blank();
        w.line("}  // namespace isthmus::wire");
        Ok(())
    }

    fn equality(&mut self, name: &str, fields: &[&str]) {
        let w = &mut self.body;
        if fields.is_empty() {
            w.block(format!("inline bool operator==(const {name}&, const {name}&) {{"), "}", |w| {
                w.line("return true;")
            });
        } else {
            w.block(
                format!("inline bool operator==(const {name}& lhs, const {name}& rhs) {{"),
                "}",
                |w| {
                    for (i, f) in fields.iter().enumerate() {
                        let lead = if i == 0 { "return " } else { "    && " };
                        let end = if i + 1 == fields.len() { ";" } else { "" };
                        w.line(format!("{lead}lhs.{f} == rhs.{f}{end}"));
                    }
                },
            );
        }
        w.block(
            format!("inline bool operator!=(const {name}& lhs, const {name}& rhs) {{"),
            "}",
            |w| w.line("return !(lhs == rhs);"),
        );
    }

    fn ordering(&mut self, name: &str, fields: &[&str]) {
        let w = &mut self.body;
        if fields.is_empty() {
            w.block(format!("inline bool operator<(const {name}&, const {name}&) {{"), "}", |w| {
                w.line("return false;")
            });
        } else {
            w.block(
                format!("inline bool operator<(const {name}& lhs, const {name}& rhs) {{"),
                "}",
                |w| {
                    for f in fields {
                        w.line(format!("if (lhs.{f} < rhs.{f}) return true;"));
                        w.line(format!("if (rhs.{f} < lhs.{f}) return false;"));
                    }
                    w.line("return false;");
                },
            );
        }
        for (op, expr) in [(">", "rhs < lhs"), ("<=", "!(rhs < lhs)"), (">=", "!(lhs < rhs)")] {
            w.block(
                format!("inline bool operator{op}(const {name}& lhs, const {name}& rhs) {{"),
                "}",
                |w| w.line(format!("return {expr};")),
            );
        }
    }

    fn enumeration(&mut self, e: &Enum) -> Result<()> {
        let decl = self.ctx.ir().decl(self.id);
        let name = self.name()?;
        let mut items = Vec::with_capacity(e.items.len());
        for item in &e.items {
            items.push((self.ctx.view.enum_item_name(&item.name, self.id)?, item));
        }
        let w = &mut self.body;
        block_comment(w, &doc_lines(&decl.doc));
        w.block(
            format!("enum class {}{name} : int32_t {{", deprecated_attribute(&decl.doc)),
            "};",
            |w| {
                for (ordinal, (item_name, item)) in items.iter().enumerate() {
                    block_comment(w, &doc_lines(&item.doc));
                    w.line(format!("{item_name} = {ordinal},"));
                }
            },
        );
        w.blank();
        w.block(format!("inline std::string to_string({name} value) {{"), "}", |w| {
            w.block("switch (value) {", "}", |w| {
                for (item_name, item) in &items {
                    w.line(format!(
                        "case {name}::{item_name}: return {};",
                        string_literal(&item.name)
                    ));
                }
            });
            w.line("return \"<invalid>\";");
        });
        Ok(())
    }

    fn flags(&mut self, flags: &Flags) -> Result<()> {
        let decl = self.ctx.ir().decl(self.id);
        let name = self.name()?;
        let mut bits = Vec::with_capacity(flags.flags.len());
        for ((flag_name, value), item) in flags.bit_values().into_iter().zip(&flags.flags) {
            bits.push((self.ctx.view.enum_item_name(flag_name, self.id)?, value, item));
        }
        let mask: u64 = bits
            .iter()
            .filter(|(_, _, item)| !item.all && !item.none)
            .fold(0, |acc, (_, value, _)| acc | value);

        let w = &mut self.body;
        block_comment(w, &doc_lines(&decl.doc));
        w.block(
            format!("enum class {}{name} : uint64_t {{", deprecated_attribute(&decl.doc)),
            "};",
            |w| {
                for (flag_name, value, item) in &bits {
                    block_comment(w, &doc_lines(&item.doc));
                    w.line(format!("{flag_name} = {value:#x},"));
                }
            },
        );
        w.blank();
        for op in ["|", "&", "^"] {
            w.block(
                format!("constexpr {name} operator{op}({name} lhs, {name} rhs) noexcept {{"),
                "}",
                |w| {
                    w.line(format!(
                        "return static_cast<{name}>(static_cast<uint64_t>(lhs) {op} static_cast<uint64_t>(rhs));"
                    ))
                },
            );
            w.block(
                format!("inline {name}& operator{op}=({name}& lhs, {name} rhs) noexcept {{"),
                "}",
                |w| w.line(format!("return lhs = lhs {op} rhs;")),
            );
        }
        w.block(format!("constexpr {name} operator~({name} value) noexcept {{"), "}", |w| {
            w.line(format!(
                "return static_cast<{name}>(~static_cast<uint64_t>(value) & {mask:#x}ULL);"
            ))
        });
        w.blank();
        w.block(format!("inline std::string to_string({name} value) {{"), "}", |w| {
            w.line("std::string out;");
            for (_, value, item) in bits.iter().filter(|(_, _, item)| !item.all && !item.none) {
                w.block(
                    format!("if ((static_cast<uint64_t>(value) & {value:#x}ULL) != 0) {{"),
                    "}",
                    |w| {
                        w.line(format!(
                            "out += out.empty() ? {} : {};",
                            string_literal(&item.name),
                            string_literal(&format!("|{}", item.name))
                        ))
                    },
                );
            }
            w.line("return out.empty() ? \"0\" : out;");
        });
        Ok(())
    }

    fn interface(&mut self, iface: &Interface<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = self.name()?;
        let export = match ctx.config {
            TargetConfig::Cpp(c) => c.export_macro.as_ref().map(|m| format!("{m} ")).unwrap_or_default(),
            _ => String::new(),
        };
        self.system.insert("memory");

        block_comment(&mut self.body, &doc_lines(&decl.doc));
        self.body.line(format!(
            "class {}{export}{name} {{",
            deprecated_attribute(&decl.doc)
        ));
        self.body.line("public:");
        self.body.indent();
        self.body.line(format!("virtual ~{name}() = default;"));
        self.body.blank();
        self.constants(&iface.constants)?;

        for method in &iface.methods {
            let method_name = ctx.view.method_name(&method.name, self.id, &method.site)?;
            let mut params = Vec::with_capacity(method.params.len());
            for p in &method.params {
                let param_name = ctx.view.field_name(&p.name, self.id, &p.site)?;
                params.push(format!("{} {param_name}", self.param(&p.ty)));
            }
            if let Some(ret) = &method.ret {
                self.note(ret);
            }
            if method.is_async {
                self.system.insert("future");
            }
            let ret = return_type(ctx, method.ret.as_ref(), method.is_async);
            let mut doc = doc_lines(&method.doc);
            for thrown in &method.throws {
                doc.push(format!("@throws {}", ctx.view.view(thrown).spelling));
            }
            block_comment(&mut self.body, &doc);
            let attr = deprecated_attribute(&method.doc);
            let params = params.join(", ");
            if method.is_static {
                self.body.line(format!("{attr}static {ret} {method_name}({params});"));
            } else {
                let constness = if method.is_const { " const" } else { "" };
                self.body
                    .line(format!("{attr}virtual {ret} {method_name}({params}){constness} = 0;"));
            }
        }

        if !iface.properties.is_empty() {
            self.body.blank();
        }
        for property in &iface.properties {
            let property_name = ctx.view.method_name(&property.name, self.id, &property.site)?;
            let ty = self.ty(&property.ty);
            block_comment(&mut self.body, &doc_lines(&property.doc));
            self.body.line(format!(
                "{}virtual ::isthmus::ReadOnlyProperty<{ty}> {property_name}() const = 0;",
                deprecated_attribute(&property.doc)
            ));
        }
        self.body.dedent();
        self.body.line("};");
        Ok(())
    }

    fn function(&mut self, function: &Function<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = self.name()?;
        self.system.insert("functional");
        let mut params = Vec::with_capacity(function.params.len());
        for p in &function.params {
            let param_name = ctx.view.field_name(&p.name, self.id, &p.site)?;
            params.push(format!("{} {param_name}", self.param(&p.ty)));
        }
        if let Some(ret) = &function.ret {
            self.note(ret);
        }
        if function.is_async {
            self.system.insert("future");
        }
        let ret = return_type(ctx, function.ret.as_ref(), function.is_async);
        let mut doc = doc_lines(&decl.doc);
        for thrown in &function.throws {
            doc.push(format!("@throws {}", ctx.view.view(thrown).spelling));
        }
        block_comment(&mut self.body, &doc);
        self.body.line(format!(
            "using {name} {}= std::function<{ret}({})>;",
            deprecated_attribute(&decl.doc),
            params.join(", ")
        ));
        Ok(())
    }

    fn error_domain(&mut self, domain: &ErrorDomain<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = self.name()?;
        self.system.insert("string_view");
        self.system.insert("utility");

        struct Code<'d> {
            class: String,
            tag: &'d str,
            params: Vec<(String, String)>,
            doc: &'d Doc,
        }
        let mut codes = Vec::with_capacity(domain.codes.len());
        for code in &domain.codes {
            let class = ctx.view.naming().ty.apply(&code.name);
            let mut params = Vec::with_capacity(code.params.len());
            for p in &code.params {
                let param_name = ctx.view.field_name(&p.name, self.id, &p.site)?;
                params.push((param_name, self.ty(&p.ty)));
            }
            codes.push(Code {
                class,
                tag: &code.name,
                params,
                doc: &code.doc,
            });
        }

        let label = ctx.label(self.id);
        let w = &mut self.body;
        block_comment(w, &doc_lines(&decl.doc));
        w.line(format!(
            "class {}{name} : public ::isthmus::DomainError {{",
            deprecated_attribute(&decl.doc)
        ));
        w.line("public:");
        w.indent();
        w.line(format!("static constexpr const char* DOMAIN_NAME = {};", string_literal(&label)));
        w.blank();
        for code in &codes {
            w.line(format!("class {};", code.class));
        }
        w.blank();
        w.line("/** Throw the error named `code`, reading its parameters from `params`. */");
        w.line("[[noreturn]] static void raise(std::string_view code, ::isthmus::wire::Reader& params, std::string message);");
        w.dedent();
        w.blank();
        w.line("protected:");
        w.indent();
        w.line(format!("{name}(const char* code, std::string message)"));
        w.line(": ::isthmus::DomainError(DOMAIN_NAME, code, std::move(message))");
        w.line("{}");
        w.dedent();
        w.line("};");

        for code in &codes {
            w.blank();
            block_comment(w, &doc_lines(code.doc));
            w.line(format!("class {name}::{} final : public {name} {{", code.class));
            w.line("public:");
            w.indent();
            let mut ctor: Vec<String> = code.params.iter().map(|(p, ty)| format!("{ty} {p}_")).collect();
            ctor.push("std::string message".to_string());
            w.line(format!("{}({})", code.class, ctor.join(", ")));
            w.line(format!(": {name}({}, std::move(message))", string_literal(code.tag)));
            for (p, _) in &code.params {
                w.line(format!(", {p}(std::move({p}_))"));
            }
            w.line("{}");
            w.blank();
            if code.params.is_empty() {
                w.line("void write_params(::isthmus::wire::Writer&) const override {}");
            } else {
                w.block(
                    "void write_params(::isthmus::wire::Writer& writer) const override {",
                    "}",
                    |w| {
                        for (p, ty) in &code.params {
                            w.line(format!("::isthmus::wire::Codec<{ty}>::write(writer, {p});"));
                        }
                    },
                );
                w.blank();
                for (p, ty) in &code.params {
                    w.line(format!("{ty} {p};"));
                }
            }
            w.dedent();
            w.line("};");
        }

        w.blank();
        w.block(
            format!(
                "inline void {name}::raise(std::string_view code, ::isthmus::wire::Reader& params, std::string message) {{"
            ),
            "}",
            |w| {
                for code in &codes {
                    w.block(format!("if (code == {}) {{", string_literal(code.tag)), "}", |w| {
                        let mut args = Vec::with_capacity(code.params.len() + 1);
                        for (p, ty) in &code.params {
                            w.line(format!("auto f_{p} = ::isthmus::wire::Codec<{ty}>::read(params);"));
                            args.push(format!("std::move(f_{p})"));
                        }
                        args.push("std::move(message)".to_string());
                        w.line(format!("throw {}({});", code.class, args.join(", ")));
                    });
                }
                w.line("throw ::isthmus::UnknownErrorCode(DOMAIN_NAME, std::string(code), std::move(message));");
            },
        );
        w.blank();
        w.line(format!(
            "inline const bool {}_registered = ::isthmus::register_domain({name}::DOMAIN_NAME, &{name}::raise);",
            isthmus_ir::ident::convert(&decl.name, Case::Snake)
        ));
        Ok(())
    }

    fn finish(self) -> String {
        let ctx = self.ctx;
        let ir = ctx.ir();
        let decl = ir.decl(self.id);
        let mut w = CodeWriter::new();
        w.lines(banner("//", &ctx.label(self.id)));
        w.blank();
        w.line("#pragma once");
        w.blank();

        let deps = referenced(self.id, super::decl_types(&decl.kind));
        let (forward, included): (Vec<DeclId>, Vec<DeclId>) = deps
            .into_iter()
            .partition(|id| matches!(ir.decl(*id).kind, DeclKind::Interface(_)));
        for header in self.system.iter().filter(|h| !h.contains('/')) {
            w.line(format!("#include <{header}>"));
        }
        w.blank();
        for header in self.system.iter().filter(|h| h.contains('/')) {
            w.line(format!("#include <{header}>"));
        }
        for id in included {
            let path = ctx.view.file_path(id);
            let parts: Vec<String> = path.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            w.line(format!("#include \"{}\"", parts.join("/")));
        }
        w.blank();

        for id in forward {
            let namespace = ctx.view.namespace_of(id).join("::");
            let name = ctx.view.local_type_name(id);
            if namespace.is_empty() {
                w.line(format!("class {name};"));
            } else {
                w.line(format!("namespace {namespace} {{ class {name}; }}"));
            }
        }
        w.blank();

        let namespace = ctx.view.namespace_of(self.id).join("::");
        let body = self.body.finish();
        if namespace.is_empty() {
            w.lines(body.lines());
        } else {
            w.line(format!("namespace {namespace} {{"));
            w.blank();
            w.lines(body.lines());
            w.blank();
            w.line(format!("}}  // namespace {namespace}"));
        }
        let trailer = self.trailer.finish();
        if !trailer.is_empty() {
            w.blank();
            w.lines(trailer.lines());
        }
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{assert_in_order, emit, shop_ir};
    use super::*;
    use std::path::PathBuf;

    fn header(dotted: &str) -> String {
        let ir = shop_ir();
        let files = emit(&ir, TargetLanguage::Cpp, dotted);
        assert_eq!(files.len(), 1);
        files.into_iter().next().unwrap().contents
    }

    #[test]
    fn record_struct_with_derived_operators() {
        let text = header("shop.line_item");
        assert_in_order(
            &text,
            &[
                "// AUTOGENERATED FILE - DO NOT MODIFY!",
                "#pragma once",
                "#include <cstdint>",
                "#include \"acme/shop/color.hpp\"",
                "namespace acme::shop {",
                "/** One line of a cart. */",
                "struct LineItem final {",
                "static constexpr int32_t MAX_COUNT = 99;",
                "int32_t count;",
                "std::string title;",
                "::acme::shop::Color color;",
                "LineItem(int32_t count_, std::string title_, ::acme::shop::Color color_)",
                ": count(std::move(count_))",
                ", title(std::move(title_))",
                "inline bool operator==(const LineItem& lhs, const LineItem& rhs) {",
                "return lhs.count == rhs.count",
                "&& lhs.color == rhs.color;",
                "inline bool operator<(const LineItem& lhs, const LineItem& rhs) {",
                "if (lhs.count < rhs.count) return true;",
                "if (rhs.count < lhs.count) return false;",
                "if (lhs.title < rhs.title) return true;",
                "inline std::string to_string(const LineItem& value) {",
                "out << \"shop.line_item{count=\" << ::isthmus::str(value.count);",
                "out << \",title=\" << ::isthmus::str(value.title);",
                "out << \"}\";",
                "}  // namespace acme::shop",
                "namespace isthmus::wire {",
                "struct Codec<::acme::shop::LineItem> {",
                "Codec<int32_t>::write(writer, value.count);",
                "auto f_count = Codec<int32_t>::read(reader);",
                "return ::acme::shop::LineItem(std::move(f_count), std::move(f_title), std::move(f_color));",
            ],
        );
    }

    #[test]
    fn record_without_ordering_has_no_less_than() {
        let text = header("shop.summary");
        assert!(text.contains("operator=="));
        assert!(!text.contains("operator<"));
        assert!(text.contains("#include <vector>"));
        assert!(text.contains("#include <optional>"));
        assert!(text.contains("std::optional<std::string> note;"));
    }

    #[test]
    fn enum_and_flags() {
        let text = header("shop.color");
        assert_in_order(
            &text,
            &[
                "enum class Color : int32_t {",
                "RED = 0,",
                "/** A pale color. */",
                "LIGHT_BLUE = 1,",
                "case Color::LIGHT_BLUE: return \"light_blue\";",
            ],
        );
        let text = header("shop.access");
        assert_in_order(
            &text,
            &[
                "enum class Access : uint64_t {",
                "READ = 0x1,",
                "WRITE = 0x2,",
                "NONE = 0x0,",
                "ALL = 0x3,",
                "constexpr Access operator|(Access lhs, Access rhs) noexcept {",
                "return static_cast<Access>(~static_cast<uint64_t>(value) & 0x3ULL);",
            ],
        );
    }

    #[test]
    fn interface_is_abstract_with_forward_declarations() {
        let text = header("shop.cart");
        assert_in_order(
            &text,
            &[
                "#include <future>",
                "#include <memory>",
                "#include \"acme/shop/line_item.hpp\"",
                "namespace acme::shop { class CartObserver; }",
                "/** A shopping cart. */",
                "class Cart {",
                "virtual ~Cart() = default;",
                "static inline const std::string CURRENCY = \"EUR\";",
                "@throws ::acme::shop::CartError",
                "virtual void add(const ::acme::shop::LineItem& item, int32_t quantity) = 0;",
                "virtual int32_t count() const = 0;",
                "virtual std::future<::acme::shop::Summary> summarize() = 0;",
                "virtual std::vector<::acme::shop::LineItem> filter(const ::acme::shop::Predicate& keep) = 0;",
                "virtual void watch(const std::shared_ptr<::acme::shop::CartObserver>& observer) = 0;",
                "static std::shared_ptr<::acme::shop::Cart> create();",
                "virtual ::isthmus::ReadOnlyProperty<std::string> owner() const = 0;",
            ],
        );
    }

    #[test]
    fn function_alias() {
        let text = header("shop.predicate");
        assert!(text.contains("using Predicate = std::function<bool(const ::acme::shop::LineItem& item)>;"));
        assert!(text.contains("#include <functional>"));
    }

    #[test]
    fn error_domain_hierarchy() {
        let text = header("shop.cart_error");
        assert_in_order(
            &text,
            &[
                "class CartError : public ::isthmus::DomainError {",
                "static constexpr const char* DOMAIN_NAME = \"shop.cart_error\";",
                "class OutOfStock;",
                "class Closed;",
                "class CartError::OutOfStock final : public CartError {",
                "OutOfStock(int32_t item_, std::string message)",
                ": CartError(\"out_of_stock\", std::move(message))",
                "::isthmus::wire::Codec<int32_t>::write(writer, item);",
                "class CartError::Closed final : public CartError {",
                "void write_params(::isthmus::wire::Writer&) const override {}",
                "if (code == \"out_of_stock\") {",
                "throw OutOfStock(std::move(f_item), std::move(message));",
                "throw Closed(std::move(message));",
                "inline const bool cart_error_registered",
            ],
        );
    }

    #[test]
    fn header_paths_follow_namespaces() {
        let ir = shop_ir();
        let files = emit(&ir, TargetLanguage::Cpp, "shop.line_item");
        assert_eq!(files[0].path, PathBuf::from("acme/shop/line_item.hpp"));
    }
}
