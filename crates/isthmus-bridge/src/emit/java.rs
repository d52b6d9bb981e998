//! Java sources plus the JNI glue that binds them to the native side.
//!
//! Interfaces become abstract classes carrying a nested `NativeProxy` (a
//! native implementation seen from Java) and `ReverseStub` (static entry
//! points native code calls into a Java implementation). Every interface and
//! function also gets a C++ glue header under `jni/`, holding the `JNIEXPORT`
//! functions and the native proxy of Java implementations.

use std::collections::BTreeSet;
use std::path::PathBuf;

use isthmus_ir::{Case, DeclId, DeclKind, Enum, ErrorDomain, Flags, Primitive, Record, Ty};
use isthmus_targets::{TargetConfig, TargetLanguage};
use tracing::debug;

use super::glue::{self, Abi, HandleGlue};
use super::{
    banner, block_comment, calls, constant_literal, cpp, doc_lines, string_literal, Call, CodeWriter,
    EmitContext, Emitter, GeneratedFile,
};
use crate::error::Result;
use crate::marshal::{Carrier, CodecNames};

pub struct JavaEmitter;

impl Emitter for JavaEmitter {
    fn language(&self) -> TargetLanguage {
        TargetLanguage::Java
    }

    fn emit_declaration(&self, ctx: &EmitContext<'_>, id: DeclId) -> Result<Vec<GeneratedFile>> {
        let decl = ctx.ir().decl(id);
        let mut file = JavaFile::new(ctx, id);
        match &decl.kind {
            DeclKind::Record(record) => file.record(record)?,
            DeclKind::Enum(e) => file.enumeration(e)?,
            DeclKind::Flags(flags) => file.flags(flags)?,
            DeclKind::Interface(_) | DeclKind::Function(_) => file.handle_type()?,
            DeclKind::ErrorDomain(domain) => file.error_domain(domain)?,
        }
        let mut files = vec![GeneratedFile::new(
            TargetLanguage::Java,
            ctx.view.file_path(id),
            file.finish(),
        )];
        if decl.kind.is_handle() {
            files.push(jni_glue(ctx, id)?);
        }
        debug!(declaration = %ctx.label(id), files = files.len(), "emitted Java sources");
        Ok(files)
    }

    fn support_files(&self, ctx: &EmitContext<'_>) -> Result<Vec<GeneratedFile>> {
        let base = ctx.config.base_namespace();
        let mut java: PathBuf = base.iter().collect();
        java.push("NativeCompletion.java");
        let mut header: PathBuf = PathBuf::from("jni");
        header.extend(base.iter());
        header.push("NativeCompletion.hpp");
        Ok(vec![
            GeneratedFile::new(TargetLanguage::Java, java, native_completion_java(&base)),
            GeneratedFile::new(TargetLanguage::Java, header, native_completion_glue(&base)),
        ])
    }
}

/// JNI short name: `_` becomes `_1`, `$` becomes `_00024`, package dots
/// become `_`, anything outside ASCII alphanumerics becomes `_0xxxx`.
pub(crate) fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '.' | '/' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("_0{unit:04x}"));
                }
            }
        }
    }
    out
}

fn java_carrier(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Scalar(p) => match p {
            Primitive::Bool => "boolean",
            Primitive::I8 => "byte",
            Primitive::I16 => "short",
            Primitive::I32 => "int",
            Primitive::I64 | Primitive::Date => "long",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
            Primitive::String | Primitive::Binary => "byte[]",
        },
        Carrier::Ordinal => "int",
        Carrier::Bits | Carrier::Handle => "long",
        Carrier::Buffer => "byte[]",
    }
}

fn descriptor(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Scalar(p) => match p {
            Primitive::Bool => "Z",
            Primitive::I8 => "B",
            Primitive::I16 => "S",
            Primitive::I32 => "I",
            Primitive::I64 | Primitive::Date => "J",
            Primitive::F32 => "F",
            Primitive::F64 => "D",
            Primitive::String | Primitive::Binary => "[B",
        },
        Carrier::Ordinal => "I",
        Carrier::Bits | Carrier::Handle => "J",
        Carrier::Buffer => "[B",
    }
}

/// Suffix of the `CallStatic...Method` used for a return carrier.
fn call_kind(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Scalar(p) => match p {
            Primitive::Bool => "Boolean",
            Primitive::I8 => "Byte",
            Primitive::I16 => "Short",
            Primitive::I32 => "Int",
            Primitive::I64 | Primitive::Date => "Long",
            Primitive::F32 => "Float",
            Primitive::F64 => "Double",
            Primitive::String | Primitive::Binary => "Object",
        },
        Carrier::Ordinal => "Int",
        Carrier::Bits | Carrier::Handle => "Long",
        Carrier::Buffer => "Object",
    }
}

struct JavaCodecs<'c, 'a>(&'c EmitContext<'a>);

impl CodecNames for JavaCodecs<'_, '_> {
    fn primitive(&self, primitive: Primitive) -> String {
        format!("Codecs.{}", primitive.keyword().to_uppercase())
    }
    fn optional(&self, inner: String) -> String {
        format!("Codecs.optional({inner})")
    }
    fn list(&self, element: String) -> String {
        format!("Codecs.list({element})")
    }
    fn set(&self, element: String) -> String {
        format!("Codecs.set({element})")
    }
    fn map(&self, key: String, value: String) -> String {
        format!("Codecs.map({key}, {value})")
    }
    fn enumeration(&self, id: DeclId) -> String {
        format!("Codecs.enumeration({}.class)", self.0.view.qualified_type_name(id))
    }
    fn flags(&self, id: DeclId) -> String {
        format!("Codecs.flags({}.class)", self.0.view.qualified_type_name(id))
    }
    fn declared(&self, id: DeclId) -> String {
        format!("{}.CODEC", self.0.view.qualified_type_name(id))
    }
}

fn codec(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    ctx.strategy(ty).codec(&JavaCodecs(ctx))
}

fn declared_name(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    ty.declared().map(|id| ctx.view.qualified_type_name(id)).unwrap_or_default()
}

/// Carrier expression for a Java value.
fn to_carrier(ctx: &EmitContext<'_>, ty: &Ty, expr: &str) -> String {
    match glue::carrier(ctx, ty) {
        Carrier::Scalar(Primitive::Date) => format!("{expr}.toEpochMilli()"),
        Carrier::Scalar(_) => expr.to_string(),
        Carrier::Ordinal => format!("{expr}.ordinal()"),
        Carrier::Bits => format!("Codecs.bits({expr})"),
        Carrier::Handle => format!("{}.toHandle({expr})", declared_name(ctx, ty)),
        Carrier::Buffer => format!("Codecs.encode({}, {expr})", codec(ctx, ty)),
    }
}

/// Java value of a carrier expression.
fn from_carrier(ctx: &EmitContext<'_>, ty: &Ty, expr: &str) -> String {
    match glue::carrier(ctx, ty) {
        Carrier::Scalar(Primitive::Date) => format!("java.time.Instant.ofEpochMilli({expr})"),
        Carrier::Scalar(_) => expr.to_string(),
        Carrier::Ordinal => format!("{}.values()[{expr}]", declared_name(ctx, ty)),
        Carrier::Bits => format!("Codecs.flagSet({}.class, {expr})", declared_name(ctx, ty)),
        Carrier::Handle => format!("{}.fromHandle({expr})", declared_name(ctx, ty)),
        Carrier::Buffer => format!("Codecs.decode({}, {expr})", codec(ctx, ty)),
    }
}

fn return_type(ctx: &EmitContext<'_>, ret: Option<&Ty>, is_async: bool) -> String {
    match (ret, is_async) {
        (Some(ty), false) => ctx.view.view(ty).spelling,
        (None, false) => "void".to_string(),
        (Some(ty), true) => format!("java.util.concurrent.CompletableFuture<{}>", ctx.view.view(ty).boxed),
        (None, true) => "java.util.concurrent.CompletableFuture<Void>".to_string(),
    }
}

fn completion_class(ctx: &EmitContext<'_>) -> String {
    let mut base = ctx.config.base_namespace();
    base.push("NativeCompletion".to_string());
    base.join(".")
}

fn nullable_prefix(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    match ctx.config {
        TargetConfig::Java(c) if ctx.view.view(ty).nullable => c
            .nullable_annotation
            .as_ref()
            .map(|a| format!("@{a} "))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn deprecated(w: &mut CodeWriter, doc: &isthmus_ir::Doc) {
    if doc.deprecated.is_deprecated() {
        w.line("@Deprecated");
    }
}

/// A call's parameters as (Java name, native name, type).
struct CallParam<'d> {
    java: String,
    native: String,
    ty: &'d Ty,
}

fn call_params<'d>(ctx: &EmitContext<'_>, id: DeclId, call: &Call<'d>) -> Result<Vec<CallParam<'d>>> {
    call.params
        .iter()
        .map(|p| {
            Ok(CallParam {
                java: ctx.view.field_name(&p.name, id, &p.site)?,
                native: ctx.native.field_name(&p.name, id, &p.site)?,
                ty: &p.ty,
            })
        })
        .collect()
}

fn native_method_name(name: &str) -> String {
    format!("native{}", isthmus_ir::ident::convert(name, Case::Pascal))
}

struct JavaFile<'c, 'a> {
    ctx: &'c EmitContext<'a>,
    id: DeclId,
    imports: BTreeSet<&'static str>,
    w: CodeWriter,
}

impl<'c, 'a> JavaFile<'c, 'a> {
    fn new(ctx: &'c EmitContext<'a>, id: DeclId) -> Self {
        Self {
            ctx,
            id,
            imports: BTreeSet::new(),
            w: CodeWriter::new(),
        }
    }

    fn constants(&mut self, constants: &[isthmus_ir::Constant<Ty>]) -> Result<()> {
        let ctx = self.ctx;
        for constant in constants {
            let Ty::Primitive(primitive) = constant.ty else {
                return Err(ctx.error(self.id, format!("constant '{}' is not a primitive", constant.name)));
            };
            let name = ctx.view.constant_name(&constant.name, self.id, &constant.site)?;
            let literal = constant_literal(primitive, &constant.value, TargetLanguage::Java).ok_or_else(|| {
                ctx.error(self.id, format!("constant '{}' has no {primitive} literal", constant.name))
            })?;
            block_comment(&mut self.w, &doc_lines(&constant.doc));
            deprecated(&mut self.w, &constant.doc);
            self.w.line(format!(
                "public static final {} {name} = {literal};",
                ctx.view.view(&constant.ty).spelling
            ));
        }
        if !constants.is_empty() {
            self.w.blank();
        }
        Ok(())
    }

    fn record(&mut self, record: &Record<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        let plan = ctx.plan(self.id);
        let ordered = plan.is_some_and(|p| p.ordering());
        self.imports.extend(["io.isthmus.runtime.Codec", "io.isthmus.runtime.Codecs"]);
        self.imports.extend(["io.isthmus.runtime.WireReader", "io.isthmus.runtime.WireWriter"]);

        struct JavaField<'d> {
            name: String,
            getter: String,
            spelling: String,
            boxed: String,
            by_value: bool,
            nullable: String,
            ty: &'d Ty,
            doc: &'d isthmus_ir::Doc,
        }
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let view = ctx.view.view(&field.ty);
            fields.push(JavaField {
                name: ctx.view.field_name(&field.name, self.id, &field.site)?,
                getter: format!("get{}", isthmus_ir::ident::convert(&field.name, Case::Pascal)),
                spelling: view.spelling,
                boxed: view.boxed,
                by_value: view.by_value,
                nullable: nullable_prefix(ctx, &field.ty),
                ty: &field.ty,
                doc: &field.doc,
            });
        }

        block_comment(&mut self.w, &doc_lines(&decl.doc));
        deprecated(&mut self.w, &decl.doc);
        let implements = if ordered {
            format!(" implements Comparable<{name}>")
        } else {
            String::new()
        };
        self.w.line(format!("public final class {name}{implements} {{"));
        self.w.indent();
        self.constants(&record.constants)?;

        let w = &mut self.w;
        for f in &fields {
            w.line(format!("private final {}{} {};", f.nullable, f.spelling, f.name));
        }
        w.blank();
        let params: Vec<String> = fields
            .iter()
            .map(|f| format!("{}{} {}", f.nullable, f.spelling, f.name))
            .collect();
        w.block(format!("public {name}({}) {{", params.join(", ")), "}", |w| {
            for f in &fields {
                w.line(format!("this.{0} = {0};", f.name));
            }
        });
        for f in &fields {
            w.blank();
            block_comment(w, &doc_lines(f.doc));
            deprecated(w, f.doc);
            w.block(format!("public {}{} {}() {{", f.nullable, f.spelling, f.getter), "}", |w| {
                w.line(format!("return {};", f.name))
            });
        }

        if let Some(plan) = plan {
            if plan.equality() {
                w.blank();
                w.line("@Override");
                w.block("public boolean equals(Object obj) {", "}", |w| {
                    w.block("if (this == obj) {", "}", |w| w.line("return true;"));
                    w.block(format!("if (!(obj instanceof {name})) {{"), "}", |w| w.line("return false;"));
                    if fields.is_empty() {
                        w.line("return true;");
                        return;
                    }
                    w.line(format!("{name} other = ({name}) obj;"));
                    for (i, f) in fields.iter().enumerate() {
                        let binary = matches!(f.ty.strip_optional(), Ty::Primitive(Primitive::Binary));
                        let test = match f.ty {
                            Ty::Primitive(Primitive::F32 | Primitive::F64) => {
                                format!("{}.compare({1}, other.{1}) == 0", f.boxed, f.name)
                            }
                            _ if f.by_value => format!("{0} == other.{0}", f.name),
                            _ if binary => format!("java.util.Arrays.equals({0}, other.{0})", f.name),
                            _ => format!("java.util.Objects.equals({0}, other.{0})", f.name),
                        };
                        let lead = if i == 0 { "return " } else { "    && " };
                        let end = if i + 1 == fields.len() { ";" } else { "" };
                        w.line(format!("{lead}{test}{end}"));
                    }
                });
                w.blank();
                w.line("@Override");
                w.block("public int hashCode() {", "}", |w| {
                    w.line("int hash = 17;");
                    for f in &fields {
                        let binary = matches!(f.ty.strip_optional(), Ty::Primitive(Primitive::Binary));
                        let term = if f.by_value {
                            format!("{}.hashCode({})", f.boxed, f.name)
                        } else if binary {
                            format!("java.util.Arrays.hashCode({})", f.name)
                        } else {
                            format!("java.util.Objects.hashCode({})", f.name)
                        };
                        w.line(format!("hash = 31 * hash + {term};"));
                    }
                    w.line("return hash;");
                });
            }
            if plan.ordering() {
                w.blank();
                w.line("@Override");
                w.block(format!("public int compareTo({name} other) {{"), "}", |w| {
                    if !fields.is_empty() {
                        w.line("int cmp;");
                    }
                    for f in &fields {
                        if f.by_value {
                            w.line(format!("cmp = {}.compare({1}, other.{1});", f.boxed, f.name));
                        } else {
                            w.line(format!("cmp = {0}.compareTo(other.{0});", f.name));
                        }
                        w.block("if (cmp != 0) {", "}", |w| w.line("return cmp;"));
                    }
                    w.line("return 0;");
                });
            }
            if plan.string() {
                w.blank();
                w.line("@Override");
                w.block("public String toString() {", "}", |w| {
                    if fields.is_empty() {
                        w.line(format!("return {};", string_literal(&plan.string_suffix())));
                        return;
                    }
                    for (i, f) in fields.iter().enumerate() {
                        let value = if matches!(f.ty.strip_optional(), Ty::Primitive(Primitive::Binary)) {
                            format!("java.util.Arrays.toString({})", f.name)
                        } else {
                            f.name.clone()
                        };
                        let lead = if i == 0 { "return " } else { "    + " };
                        w.line(format!("{lead}{} + {value}", string_literal(&plan.string_label(i))));
                    }
                    w.line(format!("    + {};", string_literal(&plan.string_suffix())));
                });
            }
        }

        let codecs: Vec<String> = fields.iter().map(|f| codec(ctx, f.ty)).collect();
        w.blank();
        w.line(format!("public static final Codec<{name}> CODEC = new Codec<{name}>() {{"));
        w.indent();
        w.line("@Override");
        w.block(format!("public void write(WireWriter writer, {name} value) {{"), "}", |w| {
            for (f, c) in fields.iter().zip(&codecs) {
                w.line(format!("{c}.write(writer, value.{});", f.name));
            }
        });
        w.blank();
        w.line("@Override");
        w.block(format!("public {name} read(WireReader reader) {{"), "}", |w| {
            for (f, c) in fields.iter().zip(&codecs) {
                w.line(format!("{} {}_ = {c}.read(reader);", f.spelling, f.name));
            }
            let args: Vec<String> = fields.iter().map(|f| format!("{}_", f.name)).collect();
            w.line(format!("return new {name}({});", args.join(", ")));
        });
        w.dedent();
        w.line("};");
        w.dedent();
        w.line("}");
        Ok(())
    }

    fn enumeration(&mut self, e: &Enum) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        block_comment(&mut self.w, &doc_lines(&decl.doc));
        deprecated(&mut self.w, &decl.doc);
        self.w.line(format!("public enum {name} {{"));
        self.w.indent();
        for item in &e.items {
            let item_name = ctx.view.enum_item_name(&item.name, self.id)?;
            block_comment(&mut self.w, &doc_lines(&item.doc));
            deprecated(&mut self.w, &item.doc);
            self.w.line(format!("{item_name},"));
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn flags(&mut self, flags: &Flags) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        block_comment(&mut self.w, &doc_lines(&decl.doc));
        deprecated(&mut self.w, &decl.doc);
        self.w.line(format!("public enum {name} {{"));
        self.w.indent();
        for item in flags.flags.iter().filter(|f| !f.all && !f.none) {
            let item_name = ctx.view.enum_item_name(&item.name, self.id)?;
            block_comment(&mut self.w, &doc_lines(&item.doc));
            deprecated(&mut self.w, &item.doc);
            self.w.line(format!("{item_name},"));
        }
        self.w.line(";");
        for item in flags.flags.iter().filter(|f| f.all || f.none) {
            let method = ctx.view.method_name(&item.name, self.id, &decl.site)?;
            let factory = if item.all { "allOf" } else { "noneOf" };
            self.w.blank();
            block_comment(&mut self.w, &doc_lines(&item.doc));
            self.w.block(
                format!("public static java.util.EnumSet<{name}> {method}() {{"),
                "}",
                |w| w.line(format!("return java.util.EnumSet.{factory}({name}.class);")),
            );
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    /// Interfaces and functions: the type itself, handle conversion and the
    /// proxies its backing calls for.
    fn handle_type(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        let backing = ctx.view.backing(self.id);
        let is_function = matches!(decl.kind, DeclKind::Function(_));
        let calls = calls(decl);
        self.imports.extend(["io.isthmus.runtime.Codec", "io.isthmus.runtime.Codecs"]);

        let mut params = Vec::with_capacity(calls.len());
        for call in &calls {
            params.push(call_params(ctx, self.id, call)?);
        }
        let mut method_names = Vec::with_capacity(calls.len());
        for call in &calls {
            method_names.push(ctx.view.method_name(call.name, self.id, call.site)?);
        }
        let properties = match &decl.kind {
            DeclKind::Interface(iface) => iface.properties.as_slice(),
            _ => &[],
        };
        let mut property_names = Vec::with_capacity(properties.len());
        for property in properties {
            property_names.push(ctx.view.method_name(&property.name, self.id, &property.site)?);
        }

        let signature = |call: &Call<'_>, method: &str, params: &[CallParam<'_>]| {
            let list: Vec<String> = params
                .iter()
                .map(|p| {
                    format!(
                        "{}{} {}",
                        nullable_prefix(ctx, p.ty),
                        ctx.view.view(p.ty).spelling,
                        p.java
                    )
                })
                .collect();
            format!(
                "{} {method}({})",
                return_type(ctx, call.ret, call.is_async),
                list.join(", ")
            )
        };

        block_comment(&mut self.w, &doc_lines(&decl.doc));
        deprecated(&mut self.w, &decl.doc);
        if is_function {
            self.w.line("@FunctionalInterface");
            self.w.line(format!("public interface {name} {{"));
        } else {
            self.w.line(format!("public abstract class {name} {{"));
        }
        self.w.indent();
        if let DeclKind::Interface(iface) = &decl.kind {
            self.constants(&iface.constants)?;
        }

        let w = &mut self.w;
        let abstract_kw = if is_function { "" } else { "public abstract " };
        for ((call, method), params) in calls.iter().zip(&method_names).zip(&params) {
            let mut doc = if is_function { Vec::new() } else { doc_lines(call.doc) };
            for thrown in call.throws {
                doc.push(format!("@throws {}", ctx.view.view(thrown).spelling));
            }
            block_comment(w, &doc);
            if !is_function {
                deprecated(w, call.doc);
            }
            if call.is_static {
                let native = native_method_name(call.name);
                w.block(format!("public static {} {{", signature(call, method, params)), "}", |w| {
                    w.lines(native_call(ctx, call, &format!("NativeProxy.{native}"), None, params));
                });
            } else {
                w.line(format!("{abstract_kw}{};", signature(call, method, params)));
            }
        }
        for (property, property_name) in properties.iter().zip(&property_names) {
            w.blank();
            block_comment(w, &doc_lines(&property.doc));
            deprecated(w, &property.doc);
            w.line(format!(
                "public abstract io.isthmus.runtime.ReadOnlyProperty<{}> {property_name}();",
                ctx.view.view(&property.ty).boxed
            ));
        }

        let visibility = if is_function { "" } else { "public " };
        w.blank();
        w.block(format!("{visibility}static long toHandle({name} value) {{"), "}", |w| {
            if backing.native {
                w.block("if (value instanceof NativeProxy) {", "}", |w| {
                    w.line("return ((NativeProxy) value).nativeRef;")
                });
            }
            if backing.managed {
                w.line("return io.isthmus.runtime.Handles.register(value);");
            } else {
                w.line(format!(
                    "throw new IllegalArgumentException(\"{name} is implemented natively, cannot pass \" + value.getClass().getName());"
                ));
            }
        });
        w.blank();
        w.block(format!("{visibility}static {name} fromHandle(long handle) {{"), "}", |w| {
            let reverse = format!("return io.isthmus.runtime.Handles.reverse(handle, {name}.class);");
            match (backing.native, backing.managed) {
                (true, true) => {
                    w.block("if (io.isthmus.runtime.Handles.isReverse(handle)) {", "}", |w| w.line(&reverse));
                    w.line("return new NativeProxy(handle);");
                }
                (true, false) => w.line("return new NativeProxy(handle);"),
                (false, _) => w.line(&reverse),
            }
        });
        w.blank();
        let field_kw = if is_function { "" } else { "public static final " };
        w.line(format!(
            "{field_kw}Codec<{name}> CODEC = Codecs.handle({name}::toHandle, {name}::fromHandle);"
        ));

        if backing.native {
            w.blank();
            native_proxy(
                ctx,
                w,
                &name,
                is_function,
                &calls,
                &method_names,
                &params,
                properties,
                &property_names,
            );
        }
        if backing.managed {
            w.blank();
            reverse_stub(
                ctx,
                w,
                &name,
                is_function,
                &calls,
                &method_names,
                &params,
                properties,
                &property_names,
            );
        }
        w.dedent();
        w.line("}");
        Ok(())
    }

    fn error_domain(&mut self, domain: &ErrorDomain<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        self.imports.extend(["io.isthmus.runtime.Codecs", "io.isthmus.runtime.WireReader"]);
        self.imports.insert("io.isthmus.runtime.WireWriter");

        struct Code<'d> {
            class: String,
            tag: &'d str,
            params: Vec<(String, String, String)>,
            doc: &'d isthmus_ir::Doc,
        }
        let mut codes = Vec::with_capacity(domain.codes.len());
        for code in &domain.codes {
            let mut params = Vec::with_capacity(code.params.len());
            for p in &code.params {
                params.push((
                    ctx.view.field_name(&p.name, self.id, &p.site)?,
                    ctx.view.view(&p.ty).spelling,
                    codec(ctx, &p.ty),
                ));
            }
            codes.push(Code {
                class: ctx.view.naming().ty.apply(&code.name),
                tag: &code.name,
                params,
                doc: &code.doc,
            });
        }

        let w = &mut self.w;
        block_comment(w, &doc_lines(&decl.doc));
        deprecated(w, &decl.doc);
        w.line(format!(
            "public abstract class {name} extends io.isthmus.runtime.DomainException {{"
        ));
        w.indent();
        w.line(format!("public static final String DOMAIN = {};", string_literal(&ctx.label(self.id))));
        w.blank();
        w.block("static {", "}", |w| {
            w.line(format!("io.isthmus.runtime.DomainException.register(DOMAIN, {name}::decode);"))
        });
        w.blank();
        w.block(format!("protected {name}(String code, String message) {{"), "}", |w| {
            w.line("super(DOMAIN, code, message);")
        });
        for code in &codes {
            w.blank();
            block_comment(w, &doc_lines(code.doc));
            w.block(format!("public static final class {} extends {name} {{", code.class), "}", |w| {
                for (p, ty, _) in &code.params {
                    w.line(format!("private final {ty} {p};"));
                }
                w.blank();
                let mut ctor: Vec<String> = code.params.iter().map(|(p, ty, _)| format!("{ty} {p}")).collect();
                ctor.push("String message".to_string());
                w.block(format!("public {}({}) {{", code.class, ctor.join(", ")), "}", |w| {
                    w.line(format!("super({}, message);", string_literal(code.tag)));
                    for (p, _, _) in &code.params {
                        w.line(format!("this.{p} = {p};"));
                    }
                });
                for (p, ty, _) in &code.params {
                    w.blank();
                    let getter = format!("get{}", isthmus_ir::ident::convert(p, Case::Pascal));
                    w.block(format!("public {ty} {getter}() {{"), "}", |w| w.line(format!("return {p};")));
                }
                w.blank();
                w.line("@Override");
                w.block("public void writeParams(WireWriter writer) {", "}", |w| {
                    for (p, _, c) in &code.params {
                        w.line(format!("{c}.write(writer, {p});"));
                    }
                });
            });
        }
        w.blank();
        w.block(
            format!("static {name} decode(String code, WireReader params, String message) {{"),
            "}",
            |w| {
                w.block("switch (code) {", "}", |w| {
                    for code in &codes {
                        if code.params.is_empty() {
                            w.line(format!("case {}:", string_literal(code.tag)));
                            w.line(format!("    return new {}(message);", code.class));
                            continue;
                        }
                        w.block(format!("case {}: {{", string_literal(code.tag)), "}", |w| {
                            let mut args = Vec::with_capacity(code.params.len() + 1);
                            for (p, ty, c) in &code.params {
                                w.line(format!("{ty} {p}_ = {c}.read(params);"));
                                args.push(format!("{p}_"));
                            }
                            args.push("message".to_string());
                            w.line(format!("return new {}({});", code.class, args.join(", ")));
                        });
                    }
                    w.line("default:");
                    w.line("    return null;");
                });
            },
        );
        w.dedent();
        w.line("}");
        Ok(())
    }

    fn finish(self) -> String {
        let ctx = self.ctx;
        let mut w = CodeWriter::new();
        w.lines(banner("//", &ctx.label(self.id)));
        w.blank();
        let package = ctx.view.namespace_of(self.id).join(".");
        if !package.is_empty() {
            w.line(format!("package {package};"));
            w.blank();
        }
        for import in &self.imports {
            w.line(format!("import {import};"));
        }
        w.blank();
        w.lines(self.w.finish().lines());
        w.finish()
    }
}

/// Body of a Java method forwarding to a static native method.
fn native_call(
    ctx: &EmitContext<'_>,
    call: &Call<'_>,
    native: &str,
    receiver: Option<&str>,
    params: &[CallParam<'_>],
) -> Vec<String> {
    let mut args: Vec<String> = receiver.map(str::to_string).into_iter().collect();
    args.extend(params.iter().map(|p| to_carrier(ctx, p.ty, &p.java)));
    let mut lines = Vec::new();
    if call.is_async {
        let completion = completion_class(ctx);
        let (boxed, codec) = match call.ret {
            Some(ty) => (ctx.view.view(ty).boxed, codec(ctx, ty)),
            None => ("Void".to_string(), "null".to_string()),
        };
        lines.push(format!("{completion}<{boxed}> completion = new {completion}<>({codec});"));
        args.push("completion".to_string());
        lines.push(format!("{native}({});", args.join(", ")));
        lines.push("return completion.future();".to_string());
    } else {
        let invoke = format!("{native}({})", args.join(", "));
        match call.ret {
            Some(ty) => lines.push(format!("return {};", from_carrier(ctx, ty, &invoke))),
            None => lines.push(format!("{invoke};")),
        }
    }
    lines
}

fn native_declaration(ctx: &EmitContext<'_>, call: &Call<'_>, receiver: bool, params: &[CallParam<'_>]) -> String {
    let mut list = Vec::new();
    if receiver {
        list.push("long nativeRef".to_string());
    }
    for p in params {
        list.push(format!("{} {}", java_carrier(glue::carrier(ctx, p.ty)), p.java));
    }
    if call.is_async {
        list.push(format!("{}<?> completion", completion_class(ctx)));
    }
    let ret = match call.ret {
        Some(ty) if !call.is_async => java_carrier(glue::carrier(ctx, ty)),
        _ => "void",
    };
    format!(
        "static native {ret} {}({});",
        native_method_name(call.name),
        list.join(", ")
    )
}

#[allow(clippy::too_many_arguments)]
fn native_proxy(
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
    name: &str,
    is_function: bool,
    calls: &[Call<'_>],
    method_names: &[String],
    params: &[Vec<CallParam<'_>>],
    properties: &[isthmus_ir::Property<Ty>],
    property_names: &[String],
) {
    let (cleaner, native_lib) = match ctx.config {
        TargetConfig::Java(c) => (c.native_cleaner, c.native_lib.clone()),
        _ => (true, None),
    };
    let relation = if is_function { "implements" } else { "extends" };
    let modifiers = if is_function { "final" } else { "private static final" };
    w.block(format!("{modifiers} class NativeProxy {relation} {name} {{"), "}", |w| {
        if let Some(lib) = &native_lib {
            w.block("static {", "}", |w| {
                w.line(format!("System.loadLibrary({});", string_literal(lib)))
            });
            w.blank();
        }
        if cleaner {
            w.line("private static final java.lang.ref.Cleaner CLEANER = java.lang.ref.Cleaner.create();");
            w.blank();
        }
        w.line("private final long nativeRef;");
        if !cleaner {
            w.line("private final java.util.concurrent.atomic.AtomicBoolean destroyed =");
            w.line("    new java.util.concurrent.atomic.AtomicBoolean(false);");
        }
        w.blank();
        w.block("NativeProxy(long nativeRef) {", "}", |w| {
            w.block("if (nativeRef == 0) {", "}", |w| {
                w.line(format!(
                    "throw new IllegalStateException(\"{name}: native reference is zero\");"
                ))
            });
            w.line("this.nativeRef = nativeRef;");
            if cleaner {
                w.line("CLEANER.register(this, new Destroy(nativeRef));");
            }
        });
        w.blank();
        if cleaner {
            w.block("private static final class Destroy implements Runnable {", "}", |w| {
                w.line("private final long nativeRef;");
                w.blank();
                w.block("Destroy(long nativeRef) {", "}", |w| w.line("this.nativeRef = nativeRef;"));
                w.blank();
                w.line("@Override");
                w.block("public void run() {", "}", |w| w.line("nativeDestroy(nativeRef);"));
            });
        } else {
            w.line("@Override");
            w.line("@SuppressWarnings(\"deprecation\")");
            w.block("protected void finalize() throws Throwable {", "}", |w| {
                w.block("try {", "}", |w| {
                    w.block("if (destroyed.compareAndSet(false, true)) {", "}", |w| {
                        w.line("nativeDestroy(nativeRef);")
                    });
                });
                w.block("finally {", "}", |w| w.line("super.finalize();"));
            });
        }
        w.blank();
        w.line("static native void nativeDestroy(long nativeRef);");

        for ((call, method), params) in calls.iter().zip(method_names).zip(params) {
            w.blank();
            if !call.is_static {
                let list: Vec<String> = params
                    .iter()
                    .map(|p| format!("{} {}", ctx.view.view(p.ty).spelling, p.java))
                    .collect();
                w.line("@Override");
                w.block(
                    format!(
                        "public {} {method}({}) {{",
                        return_type(ctx, call.ret, call.is_async),
                        list.join(", ")
                    ),
                    "}",
                    |w| w.lines(native_call(ctx, call, &native_method_name(call.name), Some("nativeRef"), params)),
                );
                w.blank();
            }
            w.line(native_declaration(ctx, call, !call.is_static, params));
        }
        for (property, property_name) in properties.iter().zip(property_names) {
            let boxed = ctx.view.view(&property.ty).boxed;
            let native = native_method_name(&property.name);
            w.blank();
            w.line("@Override");
            w.block(
                format!("public io.isthmus.runtime.ReadOnlyProperty<{boxed}> {property_name}() {{"),
                "}",
                |w| {
                    w.line(format!(
                        "return new io.isthmus.runtime.NativeProperty<>({}, {native}(nativeRef));",
                        codec(ctx, &property.ty)
                    ))
                },
            );
            w.blank();
            w.line(format!("static native long {native}(long nativeRef);"));
        }
    });
}

#[allow(clippy::too_many_arguments)]
fn reverse_stub(
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
    name: &str,
    is_function: bool,
    calls: &[Call<'_>],
    method_names: &[String],
    params: &[Vec<CallParam<'_>>],
    properties: &[isthmus_ir::Property<Ty>],
    property_names: &[String],
) {
    let modifiers = if is_function { "final" } else { "static final" };
    let target = format!("{name} target = io.isthmus.runtime.Handles.reverse(handle, {name}.class);");
    w.block(format!("{modifiers} class ReverseStub {{"), "}", |w| {
        w.line("private ReverseStub() {");
        w.line("}");
        for ((call, method), params) in calls.iter().zip(method_names).zip(params) {
            let mut list = vec!["long handle".to_string()];
            list.extend(
                params
                    .iter()
                    .map(|p| format!("{} {}", java_carrier(glue::carrier(ctx, p.ty)), p.java)),
            );
            if call.is_async {
                list.push("long completion".to_string());
            }
            let ret = match call.ret {
                Some(ty) if !call.is_async => java_carrier(glue::carrier(ctx, ty)),
                _ => "void",
            };
            let args: Vec<String> = params.iter().map(|p| from_carrier(ctx, p.ty, &p.java)).collect();
            let invoke = format!("target.{method}({})", args.join(", "));
            w.blank();
            w.block(format!("static {ret} {method}({}) {{", list.join(", ")), "}", |w| {
                w.line(&target);
                match call.ret {
                    _ if call.is_async => {
                        let codec = call.ret.map_or_else(|| "null".to_string(), |ty| codec(ctx, ty));
                        w.line(format!("{}.forward({invoke}, {codec}, completion);", completion_class(ctx)));
                    }
                    Some(ty) => w.line(format!("return {};", to_carrier(ctx, ty, &invoke))),
                    None => w.line(format!("{invoke};")),
                }
            });
        }
        for (property, property_name) in properties.iter().zip(property_names) {
            w.blank();
            w.block(format!("static long {property_name}(long handle) {{"), "}", |w| {
                w.line(&target);
                w.line(format!(
                    "return io.isthmus.runtime.NativeProperty.export(target.{property_name}(), {});",
                    codec(ctx, &property.ty)
                ));
            });
        }
        w.blank();
        w.block("static void release(long handle) {", "}", |w| {
            w.line("io.isthmus.runtime.Handles.release(handle);")
        });
    });
}

/// The C++ half of an interface or function: `JNIEXPORT` entry points for
/// the native proxy and a native proxy class for Java implementations.
fn jni_glue(ctx: &EmitContext<'_>, id: DeclId) -> Result<GeneratedFile> {
    let ir = ctx.ir();
    let decl = ir.decl(id);
    let backing = ctx.view.backing(id);
    let is_function = matches!(decl.kind, DeclKind::Function(_));
    let self_ty = Ty::Declared(id);
    let value_ty = ctx.native.view(&self_ty).spelling;
    let native_class = ctx.native.qualified_type_name(id);
    let java_class = ctx.view.qualified_type_name(id);
    let stub = format!("{}$ReverseStub", java_class.replace('.', "/"));
    let mut glue_ns = ctx.native.namespace_of(id);
    glue_ns.push("jni".to_string());
    let glue_ns = glue_ns.join("::");
    let proxy = format!("{}JavaProxy", ctx.native.local_type_name(id));
    let qualified_proxy = format!("::{glue_ns}::{proxy}");
    let calls = calls(decl);
    let properties = match &decl.kind {
        DeclKind::Interface(iface) => iface.properties.as_slice(),
        _ => &[],
    };

    let mut w = CodeWriter::new();
    w.lines(banner("//", &ctx.label(id)));
    w.line("// Include from exactly one translation unit of the native library.");
    w.blank();
    w.line("#pragma once");
    w.blank();
    w.line("#include <memory>");
    w.line("#include <stdexcept>");
    w.blank();
    w.line("#include <isthmus/jni.hpp>");
    w.blank();
    w.line(format!("#include \"{}\"", glue::native_include(ctx, id)));
    let deps = super::referenced(id, super::decl_types(&decl.kind));
    for dep in &deps {
        w.line(format!("#include \"{}\"", glue::native_include(ctx, *dep)));
    }
    w.blank();
    glue::handle_traits_decl(&mut w, Abi::Jni, &value_ty);
    let handle_deps = glue::handle_dependencies(ctx, id);
    if !handle_deps.is_empty() {
        w.blank();
        for dep in handle_deps {
            let mut path = ctx.view.namespace_of(dep);
            path.push(format!("Native{}.hpp", ctx.view.local_type_name(dep)));
            w.line(format!("#include \"{}\"", path.join("/")));
        }
    }

    if backing.managed {
        w.blank();
        w.line(format!("namespace {glue_ns} {{"));
        w.blank();
        java_proxy_class(ctx, &mut w, id, &proxy, &stub, is_function, &calls, properties)?;
        w.blank();
        w.line(format!("}}  // namespace {glue_ns}"));
    }

    w.blank();
    let reverse_ref = format!("std::make_shared<::isthmus::jni::ReverseRef>(env, handle, \"{stub}\")");
    let wrap = if is_function {
        format!("{value_ty}({qualified_proxy}({reverse_ref}))")
    } else {
        format!("std::make_shared<{qualified_proxy}>({reverse_ref})")
    };
    glue::handle_traits_defs(
        &mut w,
        Abi::Jni,
        &HandleGlue {
            spelling: &value_ty,
            native: backing.native,
            managed: backing.managed,
            proxy: &qualified_proxy,
            wrap: &wrap,
            is_function,
        },
    );

    if backing.native {
        let prefix = format!("Java_{}", mangle(&format!("{java_class}$NativeProxy")));
        w.blank();
        w.line("extern \"C\" {");
        w.blank();
        w.block(
            format!("JNIEXPORT void JNICALL {prefix}_nativeDestroy(JNIEnv*, jclass, jlong nativeRef) {{"),
            "}",
            |w| w.line(format!("::isthmus::jni::destroy<{value_ty}>(nativeRef);")),
        );
        for call in &calls {
            let params = call_params(ctx, id, call)?;
            let mut list = vec!["JNIEnv* env".to_string(), "jclass".to_string()];
            if !call.is_static {
                list.push("jlong nativeRef".to_string());
            }
            for p in &params {
                list.push(format!(
                    "{} j_{}",
                    Abi::Jni.carrier_type(glue::carrier(ctx, p.ty)),
                    p.native
                ));
            }
            if call.is_async {
                list.push("jobject j_completion".to_string());
            }
            let ret_carrier = call.ret.filter(|_| !call.is_async).map(|ty| glue::carrier(ctx, ty));
            let jret = ret_carrier.map_or("void", |c| Abi::Jni.carrier_type(c));
            let zero = ret_carrier.map_or("", |c| Abi::Jni.zero(c));
            let args: Vec<String> = params
                .iter()
                .map(|p| glue::to_native(ctx, Abi::Jni, p.ty, &format!("j_{}", p.native)))
                .collect();
            let method = ctx.native.method_name(call.name, id, call.site)?;
            let invoke = if is_function {
                format!("self({})", args.join(", "))
            } else if call.is_static {
                format!("{native_class}::{method}({})", args.join(", "))
            } else {
                format!("self->{method}({})", args.join(", "))
            };
            w.blank();
            w.block(
                format!(
                    "JNIEXPORT {jret} JNICALL {prefix}_{}({}) {{",
                    mangle(&native_method_name(call.name)),
                    list.join(", ")
                ),
                "}",
                |w| {
                    w.line("try {");
                    w.indent();
                    if !call.is_static {
                        w.line(format!("const auto& self = ::isthmus::jni::unbox<{value_ty}>(nativeRef);"));
                    }
                    match call.ret {
                        _ if call.is_async => {
                            w.line(format!("::isthmus::jni::forward_future(env, j_completion, {invoke});"))
                        }
                        Some(ty) => w.line(format!("return {};", glue::from_native(ctx, Abi::Jni, ty, &invoke))),
                        None => w.line(format!("{invoke};")),
                    }
                    w.dedent();
                    w.line(format!("}} ISTHMUS_JNI_TRANSLATE_EXCEPTIONS_RETURN(env, {zero})"));
                },
            );
        }
        for property in properties {
            let method = ctx.native.method_name(&property.name, id, &property.site)?;
            w.blank();
            w.block(
                format!(
                    "JNIEXPORT jlong JNICALL {prefix}_{}(JNIEnv* env, jclass, jlong nativeRef) {{",
                    mangle(&native_method_name(&property.name))
                ),
                "}",
                |w| {
                    w.line("try {");
                    w.indent();
                    w.line(format!("const auto& self = ::isthmus::jni::unbox<{value_ty}>(nativeRef);"));
                    w.line(format!("return ::isthmus::jni::property_to_handle(self->{method}());"));
                    w.dedent();
                    w.line("} ISTHMUS_JNI_TRANSLATE_EXCEPTIONS_RETURN(env, 0)");
                },
            );
        }
        w.blank();
        w.line("}  // extern \"C\"");
    }

    let mut path = PathBuf::from("jni");
    path.extend(ctx.view.namespace_of(id));
    path.push(format!("Native{}.hpp", ctx.view.local_type_name(id)));
    Ok(GeneratedFile::new(TargetLanguage::Java, path, w.finish()))
}

/// Native class forwarding calls to a Java implementation's `ReverseStub`.
#[allow(clippy::too_many_arguments)]
fn java_proxy_class(
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
    id: DeclId,
    proxy: &str,
    stub: &str,
    is_function: bool,
    calls: &[Call<'_>],
    properties: &[isthmus_ir::Property<Ty>],
) -> Result<()> {
    let native_class = ctx.native.qualified_type_name(id);
    if is_function {
        w.line(format!("class {proxy} {{"));
    } else {
        w.line(format!("class {proxy} final : public {native_class} {{"));
    }
    w.line("public:");
    w.indent();
    w.line(format!("explicit {proxy}(std::shared_ptr<::isthmus::jni::ReverseRef> ref)"));
    w.line(": ref_(std::move(ref))");
    w.line("{}");
    w.blank();
    w.line("jlong handle() const { return ref_->handle(); }");

    for call in calls.iter().filter(|c| !c.is_static) {
        let params = call_params(ctx, id, call)?;
        let method = ctx.view.method_name(call.name, id, call.site)?;
        let list: Vec<String> = params
            .iter()
            .map(|p| format!("{} {}", cpp::param_type(ctx, p.ty), p.native))
            .collect();
        let ret = cpp::return_type(ctx, call.ret, call.is_async);
        let head = if is_function {
            format!("{ret} operator()({}) const {{", list.join(", "))
        } else {
            let name = ctx.native.method_name(call.name, id, call.site)?;
            let constness = if call.is_const { " const" } else { "" };
            format!("{ret} {name}({}){constness} override {{", list.join(", "))
        };
        let mut desc = String::from("(J");
        for p in &params {
            desc.push_str(descriptor(glue::carrier(ctx, p.ty)));
        }
        if call.is_async {
            desc.push('J');
        }
        desc.push(')');
        let ret_carrier = call.ret.filter(|_| !call.is_async).map(|ty| glue::carrier(ctx, ty));
        desc.push_str(ret_carrier.map_or("V", descriptor));
        let mut args = vec!["ref_->handle()".to_string()];
        args.extend(params.iter().map(|p| glue::from_native(ctx, Abi::Jni, p.ty, &p.native)));

        w.blank();
        w.block(head, "}", |w| {
            w.line("JNIEnv* env = ::isthmus::jni::attach();");
            w.line(format!(
                "static const ::isthmus::jni::StaticMethod method(env, \"{stub}\", \"{method}\", \"{desc}\");"
            ));
            if call.is_async {
                let value = call.ret.map_or_else(|| "void".to_string(), |ty| ctx.native.view(ty).spelling);
                w.line(format!("auto completion = ::isthmus::jni::make_completion<{value}>();"));
                args.push("completion.handle()".to_string());
            }
            let args = args.join(", ");
            match ret_carrier {
                Some(carrier) => {
                    w.line(format!(
                        "auto result = env->CallStatic{}Method(method.cls(), method.id(), {args});",
                        call_kind(carrier)
                    ));
                    w.line("::isthmus::jni::jniExceptionCheck(env);");
                    let result = if call_kind(carrier) == "Object" {
                        "static_cast<jbyteArray>(result)"
                    } else {
                        "result"
                    };
                    if let Some(ty) = call.ret {
                        w.line(format!("return {};", glue::to_native(ctx, Abi::Jni, ty, result)));
                    }
                }
                None => {
                    w.line(format!("env->CallStaticVoidMethod(method.cls(), method.id(), {args});"));
                    w.line("::isthmus::jni::jniExceptionCheck(env);");
                    if call.is_async {
                        w.line("return completion.future();");
                    }
                }
            }
        });
    }
    for property in properties {
        let name = ctx.native.method_name(&property.name, id, &property.site)?;
        let java_name = ctx.view.method_name(&property.name, id, &property.site)?;
        let value = ctx.native.view(&property.ty).spelling;
        w.blank();
        w.block(
            format!("::isthmus::ReadOnlyProperty<{value}> {name}() const override {{"),
            "}",
            |w| {
                w.line("JNIEnv* env = ::isthmus::jni::attach();");
                w.line(format!(
                    "static const ::isthmus::jni::StaticMethod method(env, \"{stub}\", \"{java_name}\", \"(J)J\");"
                ));
                w.line("auto result = env->CallStaticLongMethod(method.cls(), method.id(), ref_->handle());");
                w.line("::isthmus::jni::jniExceptionCheck(env);");
                w.line(format!("return ::isthmus::jni::property_from_handle<{value}>(env, result);"));
            },
        );
    }
    w.dedent();
    w.blank();
    w.line("private:");
    w.indent();
    w.line("std::shared_ptr<::isthmus::jni::ReverseRef> ref_;");
    w.dedent();
    w.line("};");
    Ok(())
}

fn native_completion_java(base: &[String]) -> String {
    let mut w = CodeWriter::new();
    w.lines(banner("//", "isthmus runtime support"));
    w.blank();
    if !base.is_empty() {
        w.line(format!("package {};", base.join(".")));
        w.blank();
    }
    w.line("import io.isthmus.runtime.Codec;");
    w.line("import io.isthmus.runtime.Codecs;");
    w.blank();
    w.line("/** Pending result of an asynchronous native call, signalled at most once. */");
    w.block("public final class NativeCompletion<T> {", "}", |w| {
        w.line("private final Codec<T> codec;");
        w.line("private final java.util.concurrent.CompletableFuture<T> future = new java.util.concurrent.CompletableFuture<>();");
        w.line("private final java.util.concurrent.atomic.AtomicBoolean completed = new java.util.concurrent.atomic.AtomicBoolean(false);");
        w.blank();
        w.block("public NativeCompletion(Codec<T> codec) {", "}", |w| w.line("this.codec = codec;"));
        w.blank();
        w.block("public java.util.concurrent.CompletableFuture<T> future() {", "}", |w| {
            w.line("return future;")
        });
        w.blank();
        w.line("/** Called from native code with the encoded result. */");
        w.block("void succeed(byte[] payload) {", "}", |w| {
            w.line("claim();");
            w.block("try {", "}", |w| {
                w.line("future.complete(codec == null ? null : Codecs.decode(codec, payload));")
            });
            w.block("catch (RuntimeException e) {", "}", |w| w.line("future.completeExceptionally(e);"));
        });
        w.blank();
        w.line("/** Called from native code with the translated failure. */");
        w.block("void fail(Throwable error) {", "}", |w| {
            w.line("claim();");
            w.line("future.completeExceptionally(error);");
        });
        w.blank();
        w.block("private void claim() {", "}", |w| {
            w.block("if (!completed.compareAndSet(false, true)) {", "}", |w| {
                w.line("throw new IllegalStateException(\"completion already signalled\");")
            });
        });
        w.blank();
        w.line("/** Deliver a Java result to a pending native completion. */");
        w.block(
            "public static <T> void forward(java.util.concurrent.CompletableFuture<T> future, Codec<T> codec, long nativeCompletion) {",
            "}",
            |w| {
                w.block("future.whenComplete((value, error) -> {", "});", |w| {
                    w.block("if (error != null) {", "}", |w| w.line("nativeFail(nativeCompletion, error);"));
                    w.block("else {", "}", |w| {
                        w.line("nativeSucceed(nativeCompletion, codec == null ? new byte[0] : Codecs.encode(codec, value));")
                    });
                });
            },
        );
        w.blank();
        w.line("private static native void nativeSucceed(long nativeCompletion, byte[] payload);");
        w.blank();
        w.line("private static native void nativeFail(long nativeCompletion, Throwable error);");
    });
    w.finish()
}

fn native_completion_glue(base: &[String]) -> String {
    let mut class = base.to_vec();
    class.push("NativeCompletion".to_string());
    let prefix = format!("Java_{}", mangle(&class.join(".")));
    let mut w = CodeWriter::new();
    w.lines(banner("//", "isthmus runtime support"));
    w.line("// Include from exactly one translation unit of the native library.");
    w.blank();
    w.line("#pragma once");
    w.blank();
    w.line("#include <isthmus/jni.hpp>");
    w.blank();
    w.line("extern \"C\" {");
    w.blank();
    w.block(
        format!("JNIEXPORT void JNICALL {prefix}_nativeSucceed(JNIEnv* env, jclass, jlong completion, jbyteArray payload) {{"),
        "}",
        |w| w.line("::isthmus::jni::complete_success(env, completion, payload);"),
    );
    w.blank();
    w.block(
        format!("JNIEXPORT void JNICALL {prefix}_nativeFail(JNIEnv* env, jclass, jlong completion, jthrowable error) {{"),
        "}",
        |w| w.line("::isthmus::jni::complete_failure(env, completion, error);"),
    );
    w.blank();
    w.line("}  // extern \"C\"");
    w.finish()
}
