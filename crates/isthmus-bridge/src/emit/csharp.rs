//! C# sources plus the C ABI glue they call through `DllImport`.
//!
//! Every interface and function gets a glue header under `cabi/` that
//! exports plain C entry points for the native proxy and hosts the native
//! proxy of C# implementations, which calls back through a table of
//! function pointers registered from C# at module load.
//!
//! Buffers always transfer ownership with the call: the receiving side
//! decodes and releases them.

use std::path::PathBuf;

use isthmus_ir::{Case, DeclId, DeclKind, Doc, Enum, ErrorDomain, Flags, Primitive, Property, Record, Ty};
use isthmus_targets::keywords::is_reserved;
use isthmus_targets::{TargetConfig, TargetLanguage};
use tracing::debug;

use super::glue::{self, Abi, HandleGlue};
use super::{banner, calls, constant_literal, cpp, string_literal, symbol_stem, Call, CodeWriter, EmitContext, Emitter, GeneratedFile};
use crate::error::Result;
use crate::marshal::{Carrier, MarshalStrategy};

pub struct CSharpEmitter;

impl Emitter for CSharpEmitter {
    fn language(&self) -> TargetLanguage {
        TargetLanguage::CSharp
    }

    fn emit_declaration(&self, ctx: &EmitContext<'_>, id: DeclId) -> Result<Vec<GeneratedFile>> {
        let decl = ctx.ir().decl(id);
        let mut file = CsFile::new(ctx, id);
        match &decl.kind {
            DeclKind::Record(record) => file.record(record)?,
            DeclKind::Enum(e) => file.enumeration(e)?,
            DeclKind::Flags(flags) => file.flags(flags)?,
            DeclKind::Interface(_) | DeclKind::Function(_) => file.handle_type()?,
            DeclKind::ErrorDomain(domain) => file.error_domain(domain)?,
        }
        let mut files = vec![GeneratedFile::new(
            TargetLanguage::CSharp,
            ctx.view.file_path(id),
            file.finish(),
        )];
        if decl.kind.is_handle() {
            files.push(cabi_glue(ctx, id)?);
        }
        debug!(declaration = %ctx.label(id), files = files.len(), "emitted C# sources");
        Ok(files)
    }

    fn support_files(&self, ctx: &EmitContext<'_>) -> Result<Vec<GeneratedFile>> {
        let base = ctx.config.base_namespace();
        let mut source: PathBuf = base.iter().collect();
        source.push("NativeCompletion.cs");
        let mut header = PathBuf::from("cabi");
        header.extend(base.iter());
        header.push("NativeCompletion.hpp");
        let prefix = completion_symbol_prefix(ctx);
        Ok(vec![
            GeneratedFile::new(
                TargetLanguage::CSharp,
                source,
                native_completion_cs(&base, &dll_name(ctx), &prefix),
            ),
            GeneratedFile::new(TargetLanguage::CSharp, header, native_completion_glue(&prefix)),
        ])
    }
}

fn dll_name(ctx: &EmitContext<'_>) -> String {
    match ctx.config {
        TargetConfig::CSharp(c) => c.dll_name.clone(),
        _ => "native".to_string(),
    }
}

fn completion_symbol_prefix(ctx: &EmitContext<'_>) -> String {
    let mut parts: Vec<String> = ctx
        .config
        .base_namespace()
        .iter()
        .map(|s| isthmus_ir::ident::convert(s, Case::Snake))
        .collect();
    parts.push("completion".to_string());
    parts.join("_")
}

/// A class of the per-target support file, qualified by the base namespace.
fn support_class(ctx: &EmitContext<'_>, class: &str) -> String {
    let mut base = ctx.config.base_namespace();
    base.push(class.to_string());
    base.join(".")
}

/// Parameter and local names: camel case, `@`-escaped when reserved.
fn local_name(name: &str) -> String {
    let camel = isthmus_ir::ident::convert(name, Case::Camel);
    if is_reserved(TargetLanguage::CSharp, &camel) {
        format!("@{camel}")
    } else {
        camel
    }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `///` documentation plus an `Obsolete` attribute when deprecated.
fn doc_comment(w: &mut CodeWriter, doc: &Doc, exceptions: &[String]) {
    let lines = doc.lines();
    if !lines.is_empty() {
        w.line("/// <summary>");
        for line in lines {
            w.line(format!("/// {}", xml_escape(line)).trim_end());
        }
        w.line("/// </summary>");
    }
    for exception in exceptions {
        w.line(format!("/// <exception cref=\"{exception}\"/>"));
    }
    match doc.deprecated.message() {
        Some(message) => w.line(format!("[System.Obsolete({})]", string_literal(message))),
        None if doc.deprecated.is_deprecated() => w.line("[System.Obsolete]"),
        None => {}
    }
}

fn cs_carrier(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Scalar(p) => match p {
            Primitive::Bool => "byte",
            Primitive::I8 => "sbyte",
            Primitive::I16 => "short",
            Primitive::I32 => "int",
            Primitive::I64 | Primitive::Date => "long",
            Primitive::F32 => "float",
            Primitive::F64 => "double",
            Primitive::String | Primitive::Binary => "NativeBuffer",
        },
        Carrier::Ordinal => "int",
        Carrier::Bits | Carrier::Handle => "ulong",
        Carrier::Buffer => "NativeBuffer",
    }
}

/// Class holding `ToHandle`, `FromHandle` and `Codec` for a handle type.
/// Delegates cannot carry members, so functions get a `Bridge` companion.
fn handle_owner(ctx: &EmitContext<'_>, id: DeclId) -> String {
    let name = ctx.view.qualified_type_name(id);
    match ctx.ir().decl(id).kind {
        DeclKind::Function(_) => format!("{name}Bridge"),
        _ => name,
    }
}

fn codec(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    strategy_codec(ctx, &ctx.strategy(ty))
}

fn strategy_codec(ctx: &EmitContext<'_>, strategy: &MarshalStrategy) -> String {
    match strategy {
        MarshalStrategy::Direct(p) | MarshalStrategy::Copy(p) => {
            format!("Codecs.{}", isthmus_ir::ident::convert(p.keyword(), Case::Pascal))
        }
        MarshalStrategy::Ordinal(id) => format!("Codecs.Enumeration<{}>()", ctx.view.qualified_type_name(*id)),
        MarshalStrategy::BitSet(id) => format!("Codecs.Flags<{}>()", ctx.view.qualified_type_name(*id)),
        MarshalStrategy::Optional(inner) => {
            // value types are wrapped in Nullable<T>, references are not
            let wrapper = match **inner {
                MarshalStrategy::Direct(_) | MarshalStrategy::Ordinal(_) | MarshalStrategy::BitSet(_) => "OptionalValue",
                _ => "Optional",
            };
            format!("Codecs.{wrapper}({})", strategy_codec(ctx, inner))
        }
        MarshalStrategy::ElementWise { ordered, element } => {
            let kind = if *ordered { "List" } else { "Set" };
            format!("Codecs.{kind}({})", strategy_codec(ctx, element))
        }
        MarshalStrategy::KeyWise { key, value } => {
            format!("Codecs.Map({}, {})", strategy_codec(ctx, key), strategy_codec(ctx, value))
        }
        MarshalStrategy::Recursive(id) => format!("{}.Codec", ctx.view.qualified_type_name(*id)),
        MarshalStrategy::Handle(id) => format!("{}.Codec", handle_owner(ctx, *id)),
    }
}

fn declared_name(ctx: &EmitContext<'_>, ty: &Ty) -> String {
    ty.declared().map(|id| ctx.view.qualified_type_name(id)).unwrap_or_default()
}

fn to_carrier(ctx: &EmitContext<'_>, ty: &Ty, expr: &str) -> String {
    match glue::carrier(ctx, ty) {
        Carrier::Scalar(Primitive::Bool) => format!("(byte)({expr} ? 1 : 0)"),
        Carrier::Scalar(Primitive::Date) => format!("Dates.ToMillis({expr})"),
        Carrier::Scalar(_) => expr.to_string(),
        Carrier::Ordinal => format!("(int){expr}"),
        Carrier::Bits => format!("(ulong){expr}"),
        Carrier::Handle => {
            let owner = ty.declared().map(|id| handle_owner(ctx, id)).unwrap_or_default();
            format!("{owner}.ToHandle({expr})")
        }
        Carrier::Buffer => format!("Codecs.ToNative({}, {expr})", codec(ctx, ty)),
    }
}

fn from_carrier(ctx: &EmitContext<'_>, ty: &Ty, expr: &str) -> String {
    match glue::carrier(ctx, ty) {
        Carrier::Scalar(Primitive::Bool) => format!("{expr} != 0"),
        Carrier::Scalar(Primitive::Date) => format!("Dates.FromMillis({expr})"),
        Carrier::Scalar(_) => expr.to_string(),
        Carrier::Ordinal | Carrier::Bits => format!("({}){expr}", declared_name(ctx, ty)),
        Carrier::Handle => {
            let owner = ty.declared().map(|id| handle_owner(ctx, id)).unwrap_or_default();
            format!("{owner}.FromHandle({expr})")
        }
        Carrier::Buffer => format!("Codecs.FromNative({}, {expr})", codec(ctx, ty)),
    }
}

fn return_type(ctx: &EmitContext<'_>, ret: Option<&Ty>, is_async: bool) -> String {
    match (ret, is_async) {
        (Some(ty), false) => ctx.view.view(ty).spelling,
        (None, false) => "void".to_string(),
        (Some(ty), true) => format!("System.Threading.Tasks.Task<{}>", ctx.view.view(ty).spelling),
        (None, true) => "System.Threading.Tasks.Task".to_string(),
    }
}

/// Values whose equality, hash and text are structural rather than the
/// runtime type's own.
fn is_structural(ty: &Ty) -> bool {
    matches!(
        ty.strip_optional(),
        Ty::List(_) | Ty::Set(_) | Ty::Map(..) | Ty::Primitive(Primitive::Binary)
    )
}

struct CallParam<'d> {
    name: String,
    native: String,
    ty: &'d Ty,
}

fn call_params<'d>(ctx: &EmitContext<'_>, id: DeclId, call: &Call<'d>) -> Result<Vec<CallParam<'d>>> {
    call.params
        .iter()
        .map(|p| {
            Ok(CallParam {
                name: local_name(&p.name),
                native: ctx.native.field_name(&p.name, id, &p.site)?,
                ty: &p.ty,
            })
        })
        .collect()
}

fn extern_name(name: &str) -> String {
    format!("Native{}", isthmus_ir::ident::convert(name, Case::Pascal))
}

/// Function pointer type of a reverse vtable slot, as seen from C#.
fn slot_pointer(ctx: &EmitContext<'_>, call: &Call<'_>, params: &[CallParam<'_>]) -> String {
    let mut types = vec!["ulong".to_string()];
    types.extend(params.iter().map(|p| cs_carrier(glue::carrier(ctx, p.ty)).to_string()));
    if call.is_async {
        types.push("ulong".to_string());
    }
    types.push("NativeError*".to_string());
    types.push(match call.ret {
        Some(ty) if !call.is_async => cs_carrier(glue::carrier(ctx, ty)).to_string(),
        _ => "void".to_string(),
    });
    format!("delegate* unmanaged<{}>", types.join(", "))
}

struct CsFile<'c, 'a> {
    ctx: &'c EmitContext<'a>,
    id: DeclId,
    interop: bool,
    w: CodeWriter,
}

impl<'c, 'a> CsFile<'c, 'a> {
    fn new(ctx: &'c EmitContext<'a>, id: DeclId) -> Self {
        Self {
            ctx,
            id,
            interop: false,
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
            let literal = constant_literal(primitive, &constant.value, TargetLanguage::CSharp).ok_or_else(|| {
                ctx.error(self.id, format!("constant '{}' has no {primitive} literal", constant.name))
            })?;
            doc_comment(&mut self.w, &constant.doc, &[]);
            self.w.line(format!(
                "public const {} {name} = {literal};",
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

        struct CsField<'d> {
            property: String,
            local: String,
            spelling: String,
            by_value: bool,
            ty: &'d Ty,
            doc: &'d Doc,
        }
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let view = ctx.view.view(&field.ty);
            fields.push(CsField {
                property: ctx.view.field_name(&field.name, self.id, &field.site)?,
                local: local_name(&field.name),
                spelling: view.spelling,
                by_value: view.by_value,
                ty: &field.ty,
                doc: &field.doc,
            });
        }

        let mut bases = Vec::new();
        if plan.is_some_and(|p| p.equality()) {
            bases.push(format!("System.IEquatable<{name}>"));
        }
        if plan.is_some_and(|p| p.ordering()) {
            bases.push(format!("System.IComparable<{name}>"));
        }
        let bases = if bases.is_empty() {
            String::new()
        } else {
            format!(" : {}", bases.join(", "))
        };

        doc_comment(&mut self.w, &decl.doc, &[]);
        self.w.line(format!("public sealed class {name}{bases}"));
        self.w.line("{");
        self.w.indent();
        self.constants(&record.constants)?;

        let w = &mut self.w;
        let params: Vec<String> = fields.iter().map(|f| format!("{} {}", f.spelling, f.local)).collect();
        w.line(format!("public {name}({})", params.join(", ")));
        w.block("{", "}", |w| {
            for f in &fields {
                w.line(format!("{} = {};", f.property, f.local));
            }
        });
        for f in &fields {
            w.blank();
            doc_comment(w, f.doc, &[]);
            w.line(format!("public {} {} {{ get; }}", f.spelling, f.property));
        }

        if let Some(plan) = plan {
            if plan.equality() {
                w.blank();
                w.line(format!("public bool Equals({name}? other)"));
                w.block("{", "}", |w| {
                    w.line("if (other is null) return false;");
                    w.line("if (ReferenceEquals(this, other)) return true;");
                    if fields.is_empty() {
                        w.line("return true;");
                        return;
                    }
                    for (i, f) in fields.iter().enumerate() {
                        let test = match f.ty {
                            Ty::Primitive(Primitive::F32 | Primitive::F64) => {
                                format!("{0}.Equals(other.{0})", f.property)
                            }
                            _ if is_structural(f.ty) => format!("Structural.Equals({0}, other.{0})", f.property),
                            _ if f.by_value => format!("{0} == other.{0}", f.property),
                            _ => format!("object.Equals({0}, other.{0})", f.property),
                        };
                        let lead = if i == 0 { "return " } else { "    && " };
                        let end = if i + 1 == fields.len() { ";" } else { "" };
                        w.line(format!("{lead}{test}{end}"));
                    }
                });
                w.blank();
                w.line(format!("public override bool Equals(object? obj) => obj is {name} other && Equals(other);"));
                w.blank();
                w.line("public override int GetHashCode()");
                w.block("{", "}", |w| {
                    w.line("var hash = new System.HashCode();");
                    for f in &fields {
                        if is_structural(f.ty) {
                            w.line(format!("hash.Add(Structural.Hash({}));", f.property));
                        } else {
                            w.line(format!("hash.Add({});", f.property));
                        }
                    }
                    w.line("return hash.ToHashCode();");
                });
                w.blank();
                w.line(format!(
                    "public static bool operator ==({name}? left, {name}? right) => left is null ? right is null : left.Equals(right);"
                ));
                w.blank();
                w.line(format!("public static bool operator !=({name}? left, {name}? right) => !(left == right);"));
            }
            if plan.ordering() {
                w.blank();
                w.line(format!("public int CompareTo({name}? other)"));
                w.block("{", "}", |w| {
                    w.line("if (other is null) return 1;");
                    if !fields.is_empty() {
                        w.line("int cmp;");
                    }
                    for f in &fields {
                        if matches!(f.ty, Ty::Primitive(Primitive::String)) {
                            w.line(format!("cmp = string.CompareOrdinal({0}, other.{0});", f.property));
                        } else {
                            w.line(format!("cmp = {0}.CompareTo(other.{0});", f.property));
                        }
                        w.line("if (cmp != 0) return cmp;");
                    }
                    w.line("return 0;");
                });
            }
            if plan.string() {
                w.blank();
                if fields.is_empty() {
                    w.line(format!(
                        "public override string ToString() => {};",
                        string_literal(&plan.string_suffix())
                    ));
                } else {
                    w.line("public override string ToString()");
                    w.block("{", "}", |w| {
                        for (i, f) in fields.iter().enumerate() {
                            let value = if is_structural(f.ty) {
                                format!("Structural.Format({})", f.property)
                            } else {
                                f.property.clone()
                            };
                            let lead = if i == 0 { "return " } else { "    + " };
                            w.line(format!("{lead}{} + {value}", string_literal(&plan.string_label(i))));
                        }
                        w.line(format!("    + {};", string_literal(&plan.string_suffix())));
                    });
                }
            }
        }

        w.blank();
        w.line(format!(
            "public static readonly Codec<{name}> Codec = Codecs.Record<{name}>(WriteWire, ReadWire);"
        ));
        w.blank();
        w.line(format!("private static void WriteWire(WireWriter writer, {name} value)"));
        w.block("{", "}", |w| {
            for f in &fields {
                w.line(format!("{}.Write(writer, value.{});", codec(ctx, f.ty), f.property));
            }
        });
        w.blank();
        w.line(format!("private static {name} ReadWire(WireReader reader)"));
        w.block("{", "}", |w| {
            for f in &fields {
                w.line(format!("var {} = {}.Read(reader);", f.local, codec(ctx, f.ty)));
            }
            let args: Vec<&str> = fields.iter().map(|f| f.local.as_str()).collect();
            w.line(format!("return new {name}({});", args.join(", ")));
        });
        w.dedent();
        w.line("}");
        Ok(())
    }

    fn enumeration(&mut self, e: &Enum) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        doc_comment(&mut self.w, &decl.doc, &[]);
        self.w.line(format!("public enum {name} : int"));
        self.w.line("{");
        self.w.indent();
        for (ordinal, item) in e.items.iter().enumerate() {
            let item_name = ctx.view.enum_item_name(&item.name, self.id)?;
            doc_comment(&mut self.w, &item.doc, &[]);
            self.w.line(format!("{item_name} = {ordinal},"));
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn flags(&mut self, flags: &Flags) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        doc_comment(&mut self.w, &decl.doc, &[]);
        self.w.line("[System.Flags]");
        self.w.line(format!("public enum {name} : ulong"));
        self.w.line("{");
        self.w.indent();
        for ((flag_name, value), item) in flags.bit_values().into_iter().zip(&flags.flags) {
            let item_name = ctx.view.enum_item_name(flag_name, self.id)?;
            doc_comment(&mut self.w, &item.doc, &[]);
            self.w.line(format!("{item_name} = {value:#x},"));
        }
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn handle_type(&mut self) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;
        let backing = ctx.view.backing(self.id);
        let is_function = matches!(decl.kind, DeclKind::Function(_));
        let calls = calls(decl);
        let properties: &[Property<Ty>] = match &decl.kind {
            DeclKind::Interface(iface) => &iface.properties,
            _ => &[],
        };
        let mut params = Vec::with_capacity(calls.len());
        let mut method_names = Vec::with_capacity(calls.len());
        for call in &calls {
            params.push(call_params(ctx, self.id, call)?);
            method_names.push(if is_function {
                "Invoke".to_string()
            } else {
                ctx.view.method_name(call.name, self.id, call.site)?
            });
        }
        let mut property_names = Vec::with_capacity(properties.len());
        for property in properties {
            property_names.push(ctx.view.method_name(&property.name, self.id, &property.site)?);
        }
        let members = Members {
            calls: &calls,
            names: &method_names,
            params: &params,
            properties,
            property_names: &property_names,
        };
        self.interop = true;

        let signature = |call: &Call<'_>, method: &str, params: &[CallParam<'_>]| {
            let list: Vec<String> = params
                .iter()
                .map(|p| format!("{} {}", ctx.view.view(p.ty).spelling, p.name))
                .collect();
            format!("{} {method}({})", return_type(ctx, call.ret, call.is_async), list.join(", "))
        };
        let exceptions = |call: &Call<'_>| -> Vec<String> {
            call.throws.iter().map(|t| ctx.view.view(t).spelling).collect()
        };

        let owner = if is_function {
            let call = &calls[0];
            doc_comment(&mut self.w, &decl.doc, &exceptions(call));
            self.w.line(format!("public delegate {};", signature(call, &name, &params[0])));
            self.w.blank();
            let owner = format!("{name}Bridge");
            self.w.line(format!("public static class {owner}"));
            owner
        } else {
            doc_comment(&mut self.w, &decl.doc, &[]);
            self.w.line(format!("public abstract class {name}"));
            name.clone()
        };
        self.w.line("{");
        self.w.indent();
        if let DeclKind::Interface(iface) = &decl.kind {
            self.constants(&iface.constants)?;
        }

        let w = &mut self.w;
        if !is_function {
            for ((call, method), params) in calls.iter().zip(&method_names).zip(&params) {
                doc_comment(w, call.doc, &exceptions(call));
                if call.is_static {
                    w.line(format!("public static {}", signature(call, method, params)));
                    w.block("{", "}", |w| {
                        w.lines(extern_call(ctx, call, &format!("NativeProxy.{}", extern_name(call.name)), None, params))
                    });
                } else {
                    w.line(format!("public abstract {};", signature(call, method, params)));
                }
                w.blank();
            }
            for (property, property_name) in properties.iter().zip(&property_names) {
                doc_comment(w, &property.doc, &[]);
                w.line(format!(
                    "public abstract IReadOnlyProperty<{}> {property_name} {{ get; }}",
                    ctx.view.view(&property.ty).spelling
                ));
                w.blank();
            }
        }

        w.line(format!("public static ulong ToHandle({name} value)"));
        w.block("{", "}", |w| {
            if backing.native {
                let test = if is_function {
                    "if (value.Target is NativeProxy proxy) return proxy.NativeHandle;"
                } else {
                    "if (value is NativeProxy proxy) return proxy.NativeHandle;"
                };
                w.line(test);
            }
            if backing.managed {
                w.line("return Handles.Register(value);");
            } else {
                w.line(format!(
                    "throw new System.ArgumentException(\"{name} is implemented natively, cannot pass \" + value.GetType().FullName);"
                ));
            }
        });
        w.blank();
        w.line(format!("public static {name} FromHandle(ulong handle)"));
        w.block("{", "}", |w| {
            let wrap = if is_function {
                "return new NativeProxy(handle).Invoke;"
            } else {
                "return new NativeProxy(handle);"
            };
            let reverse = format!("return Handles.Reverse<{name}>(handle);");
            match (backing.native, backing.managed) {
                (true, true) => {
                    w.line(format!("if (Handles.IsReverse(handle)) {reverse}"));
                    w.line(wrap);
                }
                (true, false) => w.line(wrap),
                (false, _) => w.line(&reverse),
            }
        });
        w.blank();
        w.line(format!(
            "public static readonly Codec<{name}> Codec = Codecs.Handle<{name}>(ToHandle, FromHandle);"
        ));

        if backing.native {
            w.blank();
            native_proxy(ctx, w, self.id, &name, is_function, &members);
        }
        if backing.managed {
            w.blank();
            reverse_stub(ctx, w, self.id, &name, &members);
        }
        w.dedent();
        w.line("}");
        debug!(owner = %owner, "emitted C# handle type");
        Ok(())
    }

    fn error_domain(&mut self, domain: &ErrorDomain<Ty>) -> Result<()> {
        let ctx = self.ctx;
        let decl = ctx.ir().decl(self.id);
        let name = ctx.view.type_name(self.id)?;

        struct Code<'d> {
            class: String,
            tag: &'d str,
            params: Vec<(String, String, String, String)>,
            doc: &'d Doc,
        }
        let mut codes = Vec::with_capacity(domain.codes.len());
        for code in &domain.codes {
            let mut params = Vec::with_capacity(code.params.len());
            for p in &code.params {
                params.push((
                    ctx.view.field_name(&p.name, self.id, &p.site)?,
                    local_name(&p.name),
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
        doc_comment(w, &decl.doc, &[]);
        w.line(format!("public abstract class {name} : DomainException"));
        w.block("{", "}", |w| {
            w.line(format!("public const string DomainName = {};", string_literal(&ctx.label(self.id))));
            w.blank();
            w.line(format!("protected {name}(string code, string message)"));
            w.line("    : base(DomainName, code, message)");
            w.line("{");
            w.line("}");
            w.blank();
            w.line("[System.Runtime.CompilerServices.ModuleInitializer]");
            w.line("internal static void Register() => DomainException.Register(DomainName, Decode);");
            for code in &codes {
                w.blank();
                doc_comment(w, code.doc, &[]);
                w.line(format!("public sealed class {} : {name}", code.class));
                w.block("{", "}", |w| {
                    let mut ctor: Vec<String> = code.params.iter().map(|(_, l, ty, _)| format!("{ty} {l}")).collect();
                    ctor.push("string message".to_string());
                    w.line(format!("public {}({})", code.class, ctor.join(", ")));
                    w.line(format!("    : base({}, message)", string_literal(code.tag)));
                    w.block("{", "}", |w| {
                        for (p, l, _, _) in &code.params {
                            w.line(format!("{p} = {l};"));
                        }
                    });
                    for (p, _, ty, _) in &code.params {
                        w.blank();
                        w.line(format!("public {ty} {p} {{ get; }}"));
                    }
                    w.blank();
                    w.line("public override void WriteParams(WireWriter writer)");
                    w.block("{", "}", |w| {
                        for (p, _, _, c) in &code.params {
                            w.line(format!("{c}.Write(writer, {p});"));
                        }
                    });
                });
            }
            w.blank();
            w.line(format!("private static {name}? Decode(string code, WireReader reader, string message)"));
            w.block("{", "}", |w| {
                w.line("switch (code)");
                w.block("{", "}", |w| {
                    for code in &codes {
                        w.line(format!("case {}:", string_literal(code.tag)));
                        w.block("{", "}", |w| {
                            let mut args = Vec::with_capacity(code.params.len() + 1);
                            for (_, l, _, c) in &code.params {
                                w.line(format!("var {l} = {c}.Read(reader);"));
                                args.push(l.clone());
                            }
                            args.push("message".to_string());
                            w.line(format!("return new {}({});", code.class, args.join(", ")));
                        });
                    }
                    w.line("default:");
                    w.line("    return null;");
                });
            });
        });
        Ok(())
    }

    fn finish(self) -> String {
        let ctx = self.ctx;
        let mut w = CodeWriter::new();
        w.lines(banner("//", &ctx.label(self.id)));
        w.blank();
        w.line("#nullable enable");
        w.blank();
        w.line("using Isthmus.Runtime;");
        if self.interop {
            w.line("using System.Runtime.InteropServices;");
        }
        w.blank();
        let namespace = ctx.view.namespace_of(self.id).join(".");
        if !namespace.is_empty() {
            w.line(format!("namespace {namespace};"));
            w.blank();
        }
        w.lines(self.w.finish().lines());
        w.finish()
    }
}

/// Calls, properties and their target names of one handle type.
struct Members<'m, 'd> {
    calls: &'m [Call<'d>],
    names: &'m [String],
    params: &'m [Vec<CallParam<'d>>],
    properties: &'d [Property<Ty>],
    property_names: &'m [String],
}

/// Body invoking a `DllImport` entry point and translating its result.
fn extern_call(
    ctx: &EmitContext<'_>,
    call: &Call<'_>,
    entry: &str,
    receiver: Option<&str>,
    params: &[CallParam<'_>],
) -> Vec<String> {
    let mut args: Vec<String> = receiver.map(str::to_string).into_iter().collect();
    args.extend(params.iter().map(|p| to_carrier(ctx, p.ty, &p.name)));
    let mut lines = Vec::new();
    if call.is_async {
        let completion = support_class(ctx, "NativeCompletion");
        let (value, codec) = match call.ret {
            Some(ty) => (ctx.view.view(ty).spelling, codec(ctx, ty)),
            None => ("object?".to_string(), "null".to_string()),
        };
        lines.push(format!("var completion = new {completion}<{value}>({codec});"));
        args.push("completion.Handle".to_string());
    }
    args.push("out var error".to_string());
    let invoke = format!("{entry}({})", args.join(", "));
    match call.ret {
        Some(ty) if !call.is_async => {
            lines.push(format!("var result = {invoke};"));
            lines.push("error.ThrowIfSet();".to_string());
            if receiver.is_some() {
                lines.push("System.GC.KeepAlive(this);".to_string());
            }
            lines.push(format!("return {};", from_carrier(ctx, ty, "result")));
        }
        _ => {
            lines.push(format!("{invoke};"));
            lines.push("error.ThrowIfSet();".to_string());
            if receiver.is_some() {
                lines.push("System.GC.KeepAlive(this);".to_string());
            }
            if call.is_async {
                lines.push("return completion.Task;".to_string());
            }
        }
    }
    lines
}

fn dll_import(w: &mut CodeWriter, dll: &str, symbol: &str) {
    w.line(format!(
        "[DllImport({}, EntryPoint = {})]",
        string_literal(dll),
        string_literal(symbol)
    ));
}

fn native_proxy(
    ctx: &EmitContext<'_>,
    w: &mut CodeWriter,
    id: DeclId,
    name: &str,
    is_function: bool,
    members: &Members<'_, '_>,
) {
    let stem = symbol_stem(ctx, id);
    let dll = dll_name(ctx);
    let base = if is_function {
        " : System.IDisposable".to_string()
    } else {
        format!(" : {name}, System.IDisposable")
    };
    w.line(format!("internal sealed class NativeProxy{base}"));
    w.block("{", "}", |w| {
        w.line("private ulong _handle;");
        w.blank();
        w.line("internal NativeProxy(ulong handle)");
        w.block("{", "}", |w| {
            w.line(format!(
                "if (handle == 0) throw new InvalidHandleException({});",
                string_literal(name)
            ));
            w.line("_handle = handle;");
        });
        w.blank();
        w.line("~NativeProxy() => Cleanup();");
        w.blank();
        w.line("internal ulong NativeHandle => LiveHandle();");
        w.blank();
        w.line("private ulong LiveHandle()");
        w.block("{", "}", |w| {
            w.line("ulong handle = System.Threading.Volatile.Read(ref _handle);");
            w.line(format!(
                "if (handle == 0) throw new System.ObjectDisposedException({});",
                string_literal(name)
            ));
            w.line("return handle;");
        });
        w.blank();
        w.line("public void Dispose()");
        w.block("{", "}", |w| {
            w.line("Cleanup();");
            w.line("System.GC.SuppressFinalize(this);");
        });
        w.blank();
        w.line("private void Cleanup()");
        w.block("{", "}", |w| {
            w.line("ulong handle = System.Threading.Interlocked.Exchange(ref _handle, 0UL);");
            w.line("if (handle != 0) NativeDestroy(handle);");
        });
        w.blank();
        dll_import(w, &dll, &format!("{stem}_destroy"));
        w.line("private static extern void NativeDestroy(ulong handle);");

        for ((call, method), params) in members.calls.iter().zip(members.names).zip(members.params) {
            let entry = extern_name(call.name);
            w.blank();
            if !call.is_static {
                let list: Vec<String> = params
                    .iter()
                    .map(|p| format!("{} {}", ctx.view.view(p.ty).spelling, p.name))
                    .collect();
                let modifier = if is_function { "" } else { "override " };
                w.line(format!(
                    "public {modifier}{} {method}({})",
                    return_type(ctx, call.ret, call.is_async),
                    list.join(", ")
                ));
                w.block("{", "}", |w| w.lines(extern_call(ctx, call, &entry, Some("LiveHandle()"), params)));
                w.blank();
            }
            let mut list = Vec::new();
            if !call.is_static {
                list.push("ulong self".to_string());
            }
            list.extend(
                params
                    .iter()
                    .map(|p| format!("{} {}", cs_carrier(glue::carrier(ctx, p.ty)), p.name)),
            );
            if call.is_async {
                list.push("ulong completion".to_string());
            }
            list.push("out NativeError error".to_string());
            let ret = match call.ret {
                Some(ty) if !call.is_async => cs_carrier(glue::carrier(ctx, ty)),
                _ => "void",
            };
            let symbol_method = isthmus_ir::ident::convert(call.name, Case::Snake);
            dll_import(w, &dll, &format!("{stem}_{symbol_method}"));
            w.line(format!("internal static extern {ret} {entry}({});", list.join(", ")));
        }
        for (property, property_name) in members.properties.iter().zip(members.property_names) {
            let entry = extern_name(&property.name);
            let value = ctx.view.view(&property.ty).spelling;
            w.blank();
            w.line(format!("public override IReadOnlyProperty<{value}> {property_name}"));
            w.block("{", "}", |w| {
                w.line("get");
                w.block("{", "}", |w| {
                    w.line(format!("var result = {entry}(LiveHandle(), out var error);"));
                    w.line("error.ThrowIfSet();");
                    w.line(format!("return new NativeProperty<{value}>({}, result);", codec(ctx, &property.ty)));
                });
            });
            w.blank();
            let symbol_method = isthmus_ir::ident::convert(&property.name, Case::Snake);
            dll_import(w, &dll, &format!("{stem}_{symbol_method}"));
            w.line(format!(
                "private static extern ulong {entry}(ulong self, out NativeError error);"
            ));
        }
    });
}

/// Entry points native code calls into a C# implementation, registered as a
/// function pointer table when the module loads.
fn reverse_stub(ctx: &EmitContext<'_>, w: &mut CodeWriter, id: DeclId, name: &str, members: &Members<'_, '_>) {
    let stem = symbol_stem(ctx, id);
    let dll = dll_name(ctx);
    let target = format!("var target = Handles.Reverse<{name}>(handle);");
    let forward = format!("{}.Forward", support_class(ctx, "NativeCompletions"));
    w.line("internal static unsafe class ReverseStub");
    w.block("{", "}", |w| {
        w.line("[StructLayout(LayoutKind.Sequential)]");
        w.line("private struct VTable");
        w.block("{", "}", |w| {
            for ((call, method), params) in members.calls.iter().zip(members.names).zip(members.params) {
                w.line(format!("public {} {method};", slot_pointer(ctx, call, params)));
            }
            for property_name in members.property_names {
                w.line(format!("public delegate* unmanaged<ulong, NativeError*, ulong> {property_name};"));
            }
            w.line("public delegate* unmanaged<ulong, void> Release;");
        });

        for ((call, method), params) in members.calls.iter().zip(members.names).zip(members.params) {
            let mut list = vec!["ulong handle".to_string()];
            list.extend(
                params
                    .iter()
                    .map(|p| format!("{} {}", cs_carrier(glue::carrier(ctx, p.ty)), p.name)),
            );
            if call.is_async {
                list.push("ulong completion".to_string());
            }
            list.push("NativeError* error".to_string());
            let ret_carrier = call.ret.filter(|_| !call.is_async).map(|ty| glue::carrier(ctx, ty));
            let ret = ret_carrier.map_or("void", cs_carrier);
            let args: Vec<String> = params.iter().map(|p| from_carrier(ctx, p.ty, &p.name)).collect();
            let invoke = format!("target.{method}({})", args.join(", "));
            w.blank();
            w.line("[UnmanagedCallersOnly]");
            w.line(format!("private static {ret} {method}({})", list.join(", ")));
            w.block("{", "}", |w| {
                w.line("try");
                w.block("{", "}", |w| {
                    w.line(&target);
                    match call.ret {
                        _ if call.is_async => {
                            let codec = call.ret.map_or_else(|| "null".to_string(), |ty| codec(ctx, ty));
                            w.line(format!("{forward}({invoke}, {codec}, completion);"));
                        }
                        Some(ty) => w.line(format!("return {};", to_carrier(ctx, ty, &invoke))),
                        None => w.line(format!("{invoke};")),
                    }
                });
                w.line("catch (System.Exception e)");
                w.block("{", "}", |w| {
                    w.line("*error = NativeError.From(e);");
                    if ret_carrier.is_some() {
                        w.line("return default;");
                    }
                });
            });
        }
        for (property, property_name) in members.properties.iter().zip(members.property_names) {
            w.blank();
            w.line("[UnmanagedCallersOnly]");
            w.line(format!("private static ulong {property_name}(ulong handle, NativeError* error)"));
            w.block("{", "}", |w| {
                w.line("try");
                w.block("{", "}", |w| {
                    w.line(&target);
                    w.line(format!(
                        "return NativeProperty.Export(target.{property_name}, {});",
                        codec(ctx, &property.ty)
                    ));
                });
                w.line("catch (System.Exception e)");
                w.block("{", "}", |w| {
                    w.line("*error = NativeError.From(e);");
                    w.line("return 0;");
                });
            });
        }
        w.blank();
        w.line("[UnmanagedCallersOnly]");
        w.line("private static void Release(ulong handle) => Handles.Release(handle);");
        w.blank();
        w.line("[System.Runtime.CompilerServices.ModuleInitializer]");
        w.line("internal static void Register()");
        w.block("{", "}", |w| {
            w.line("var vtable = new VTable");
            w.block("{", "};", |w| {
                for method in members.names.iter().chain(members.property_names) {
                    w.line(format!("{method} = &{method},"));
                }
                w.line("Release = &Release,");
            });
            w.line("NativeRegister(&vtable);");
        });
        w.blank();
        dll_import(w, &dll, &format!("{stem}_register"));
        w.line("private static extern void NativeRegister(VTable* vtable);");
    });
}

/// The C++ half of an interface or function: `extern "C"` entry points for
/// the C# native proxy and the native proxy of C# implementations.
fn cabi_glue(ctx: &EmitContext<'_>, id: DeclId) -> Result<GeneratedFile> {
    let decl = ctx.ir().decl(id);
    let backing = ctx.view.backing(id);
    let is_function = matches!(decl.kind, DeclKind::Function(_));
    let value_ty = ctx.native.view(&Ty::Declared(id)).spelling;
    let native_class = ctx.native.qualified_type_name(id);
    let local = ctx.native.local_type_name(id);
    let mut glue_ns = ctx.native.namespace_of(id);
    glue_ns.push("cabi".to_string());
    let glue_ns = glue_ns.join("::");
    let proxy = format!("{local}CSharpProxy");
    let qualified_proxy = format!("::{glue_ns}::{proxy}");
    let vtable_type = format!("{local}VTable");
    let vtable = format!("{}_vtable", isthmus_ir::ident::convert(&decl.name, Case::Snake));
    let stem = symbol_stem(ctx, id);
    let calls = calls(decl);
    let properties: &[Property<Ty>] = match &decl.kind {
        DeclKind::Interface(iface) => &iface.properties,
        _ => &[],
    };
    let mut params = Vec::with_capacity(calls.len());
    let mut native_names = Vec::with_capacity(calls.len());
    for call in &calls {
        params.push(call_params(ctx, id, call)?);
        native_names.push(ctx.native.method_name(call.name, id, call.site)?);
    }
    let mut property_names = Vec::with_capacity(properties.len());
    for property in properties {
        property_names.push(ctx.native.method_name(&property.name, id, &property.site)?);
    }

    let mut w = CodeWriter::new();
    w.lines(banner("//", &ctx.label(id)));
    w.line("// Include from exactly one translation unit of the native library.");
    w.blank();
    w.line("#pragma once");
    w.blank();
    w.line("#include <cstdint>");
    w.line("#include <memory>");
    w.line("#include <stdexcept>");
    w.blank();
    w.line("#include <isthmus/cabi.hpp>");
    w.blank();
    w.line(format!("#include \"{}\"", glue::native_include(ctx, id)));
    for dep in super::referenced(id, super::decl_types(&decl.kind)) {
        w.line(format!("#include \"{}\"", glue::native_include(ctx, dep)));
    }
    w.blank();
    glue::handle_traits_decl(&mut w, Abi::C, &value_ty);
    let handle_deps = glue::handle_dependencies(ctx, id);
    if !handle_deps.is_empty() {
        w.blank();
        for dep in handle_deps {
            let mut path = ctx.view.namespace_of(dep);
            path.push(format!("{}Cabi.hpp", ctx.view.local_type_name(dep)));
            w.line(format!("#include \"{}\"", path.join("/")));
        }
    }

    if backing.managed {
        w.blank();
        w.line(format!("namespace {glue_ns} {{"));
        w.blank();
        w.block(format!("struct {vtable_type} {{"), "};", |w| {
            for ((call, native), params) in calls.iter().zip(&native_names).zip(&params) {
                let mut list = vec!["uint64_t handle".to_string()];
                list.extend(
                    params
                        .iter()
                        .map(|p| format!("{} {}", Abi::C.carrier_type(glue::carrier(ctx, p.ty)), p.native)),
                );
                if call.is_async {
                    list.push("uint64_t completion".to_string());
                }
                list.push("isthmus_error* error".to_string());
                let ret = match call.ret {
                    Some(ty) if !call.is_async => Abi::C.carrier_type(glue::carrier(ctx, ty)),
                    _ => "void",
                };
                w.line(format!("{ret} (*{native})({});", list.join(", ")));
            }
            for native in &property_names {
                w.line(format!("uint64_t (*{native})(uint64_t handle, isthmus_error* error);"));
            }
            w.line("void (*release)(uint64_t handle);");
        });
        w.blank();
        w.line(format!("inline {vtable_type} {vtable}{{}};"));
        w.blank();
        if is_function {
            w.line(format!("class {proxy} {{"));
        } else {
            w.line(format!("class {proxy} final : public {native_class} {{"));
        }
        w.line("public:");
        w.indent();
        w.line(format!("explicit {proxy}(uint64_t handle)"));
        w.line(format!(
            ": ref_(std::make_shared<::isthmus::cabi::ReverseRef>(handle, {vtable}.release))"
        ));
        w.line("{}");
        w.blank();
        w.line("uint64_t handle() const { return ref_->handle(); }");
        for ((call, native), params) in calls.iter().zip(&native_names).zip(&params) {
            let list: Vec<String> = params
                .iter()
                .map(|p| format!("{} {}", cpp::param_type(ctx, p.ty), p.native))
                .collect();
            let ret = cpp::return_type(ctx, call.ret, call.is_async);
            let head = if is_function {
                format!("{ret} operator()({}) const {{", list.join(", "))
            } else {
                let constness = if call.is_const { " const" } else { "" };
                format!("{ret} {native}({}){constness} override {{", list.join(", "))
            };
            let mut args = vec!["handle()".to_string()];
            args.extend(params.iter().map(|p| glue::from_native(ctx, Abi::C, p.ty, &p.native)));
            w.blank();
            w.block(head, "}", |w| {
                w.line("isthmus_error error{};");
                if call.is_async {
                    let value = call.ret.map_or_else(|| "void".to_string(), |ty| ctx.native.view(ty).spelling);
                    w.line(format!("auto completion = ::isthmus::cabi::make_completion<{value}>();"));
                    args.push("completion.handle()".to_string());
                }
                args.push("&error".to_string());
                let invoke = format!("{vtable}.{native}({})", args.join(", "));
                match call.ret {
                    Some(ty) if !call.is_async => {
                        w.line(format!("auto result = {invoke};"));
                        w.line("::isthmus::cabi::rethrow(error);");
                        w.line(format!("return {};", glue::to_native(ctx, Abi::C, ty, "result")));
                    }
                    _ => {
                        w.line(format!("{invoke};"));
                        w.line("::isthmus::cabi::rethrow(error);");
                        if call.is_async {
                            w.line("return completion.future();");
                        }
                    }
                }
            });
        }
        for (property, native) in properties.iter().zip(&property_names) {
            let value = ctx.native.view(&property.ty).spelling;
            w.blank();
            w.block(
                format!("::isthmus::ReadOnlyProperty<{value}> {native}() const override {{"),
                "}",
                |w| {
                    w.line("isthmus_error error{};");
                    w.line(format!("auto result = {vtable}.{native}(handle(), &error);"));
                    w.line("::isthmus::cabi::rethrow(error);");
                    w.line(format!("return ::isthmus::cabi::property_from_handle<{value}>(result);"));
                },
            );
        }
        w.dedent();
        w.blank();
        w.line("private:");
        w.indent();
        w.line("std::shared_ptr<::isthmus::cabi::ReverseRef> ref_;");
        w.dedent();
        w.line("};");
        w.blank();
        w.line(format!("}}  // namespace {glue_ns}"));
    }

    w.blank();
    let wrap = if is_function {
        format!("{value_ty}({qualified_proxy}(handle))")
    } else {
        format!("std::make_shared<{qualified_proxy}>(handle)")
    };
    glue::handle_traits_defs(
        &mut w,
        Abi::C,
        &HandleGlue {
            spelling: &value_ty,
            native: backing.native,
            managed: backing.managed,
            proxy: &qualified_proxy,
            wrap: &wrap,
            is_function,
        },
    );

    w.blank();
    w.line("extern \"C\" {");
    if backing.managed {
        w.blank();
        w.block(
            format!("ISTHMUS_EXPORT void {stem}_register(const ::{glue_ns}::{vtable_type}* vtable) {{"),
            "}",
            |w| w.line(format!("::{glue_ns}::{vtable} = *vtable;")),
        );
    }
    if backing.native {
        w.blank();
        w.block(format!("ISTHMUS_EXPORT void {stem}_destroy(uint64_t self) {{"), "}", |w| {
            w.line(format!("::isthmus::cabi::destroy<{value_ty}>(self);"))
        });
        for ((call, native), params) in calls.iter().zip(&native_names).zip(&params) {
            let mut list = Vec::new();
            if !call.is_static {
                list.push("uint64_t self".to_string());
            }
            list.extend(
                params
                    .iter()
                    .map(|p| format!("{} {}", Abi::C.carrier_type(glue::carrier(ctx, p.ty)), p.native)),
            );
            if call.is_async {
                list.push("uint64_t completion".to_string());
            }
            list.push("isthmus_error* error".to_string());
            let ret = match call.ret {
                Some(ty) if !call.is_async => Abi::C.carrier_type(glue::carrier(ctx, ty)),
                _ => "void",
            };
            let args: Vec<String> = params
                .iter()
                .map(|p| glue::to_native(ctx, Abi::C, p.ty, &p.native))
                .collect();
            let invoke = if is_function {
                format!("target({})", args.join(", "))
            } else if call.is_static {
                format!("{native_class}::{native}({})", args.join(", "))
            } else {
                format!("target->{native}({})", args.join(", "))
            };
            let symbol = isthmus_ir::ident::convert(call.name, Case::Snake);
            w.blank();
            w.block(
                format!("ISTHMUS_EXPORT {ret} {stem}_{symbol}({}) {{", list.join(", ")),
                "}",
                |w| {
                    w.block("return ::isthmus::cabi::guard(error, [&] {", "});", |w| {
                        if !call.is_static {
                            w.line(format!("const auto& target = ::isthmus::cabi::unbox<{value_ty}>(self);"));
                        }
                        match call.ret {
                            _ if call.is_async => {
                                w.line(format!("::isthmus::cabi::forward_future(completion, {invoke});"))
                            }
                            Some(ty) => w.line(format!("return {};", glue::from_native(ctx, Abi::C, ty, &invoke))),
                            None => w.line(format!("{invoke};")),
                        }
                    });
                },
            );
        }
        for (property, native) in properties.iter().zip(&property_names) {
            let symbol = isthmus_ir::ident::convert(&property.name, Case::Snake);
            w.blank();
            w.block(
                format!("ISTHMUS_EXPORT uint64_t {stem}_{symbol}(uint64_t self, isthmus_error* error) {{"),
                "}",
                |w| {
                    w.block("return ::isthmus::cabi::guard(error, [&] {", "});", |w| {
                        w.line(format!("const auto& target = ::isthmus::cabi::unbox<{value_ty}>(self);"));
                        w.line(format!("return ::isthmus::cabi::property_to_handle(target->{native}());"));
                    });
                },
            );
        }
    }
    w.blank();
    w.line("}  // extern \"C\"");

    let mut path = PathBuf::from("cabi");
    path.extend(ctx.view.namespace_of(id));
    path.push(format!("{}Cabi.hpp", ctx.view.local_type_name(id)));
    Ok(GeneratedFile::new(TargetLanguage::CSharp, path, w.finish()))
}

fn native_completion_cs(base: &[String], dll: &str, prefix: &str) -> String {
    let mut w = CodeWriter::new();
    w.lines(banner("//", "isthmus runtime support"));
    w.blank();
    w.line("#nullable enable");
    w.blank();
    w.line("using Isthmus.Runtime;");
    w.line("using System.Runtime.InteropServices;");
    w.blank();
    if !base.is_empty() {
        w.line(format!("namespace {};", base.join(".")));
        w.blank();
    }
    w.line("internal interface INativeCompletion");
    w.block("{", "}", |w| {
        w.line("void Succeed(NativeBuffer payload);");
        w.blank();
        w.line("void Fail(NativeBuffer error);");
    });
    w.blank();
    w.line("/// <summary>");
    w.line("/// Pending result of an asynchronous native call, signalled at most once.");
    w.line("/// </summary>");
    w.line("public sealed class NativeCompletion<T> : INativeCompletion");
    w.block("{", "}", |w| {
        w.line("private readonly Codec<T>? _codec;");
        w.line("private readonly System.Threading.Tasks.TaskCompletionSource<T> _source =");
        w.line("    new(System.Threading.Tasks.TaskCreationOptions.RunContinuationsAsynchronously);");
        w.line("private int _completed;");
        w.blank();
        w.line("public NativeCompletion(Codec<T>? codec)");
        w.block("{", "}", |w| {
            w.line("_codec = codec;");
            w.line("Handle = Handles.Register(this);");
        });
        w.blank();
        w.line("public ulong Handle { get; }");
        w.blank();
        w.line("public System.Threading.Tasks.Task<T> Task => _source.Task;");
        w.blank();
        w.line("void INativeCompletion.Succeed(NativeBuffer payload)");
        w.block("{", "}", |w| {
            w.line("Claim();");
            w.line("try");
            w.block("{", "}", |w| {
                w.line("_source.SetResult(_codec is null ? default! : Codecs.FromNative(_codec, payload));")
            });
            w.line("catch (System.Exception e)");
            w.block("{", "}", |w| w.line("_source.SetException(e);"));
        });
        w.blank();
        w.line("void INativeCompletion.Fail(NativeBuffer error)");
        w.block("{", "}", |w| {
            w.line("Claim();");
            w.line("_source.SetException(NativeError.Decode(error));");
        });
        w.blank();
        w.line("private void Claim()");
        w.block("{", "}", |w| {
            w.line("if (System.Threading.Interlocked.Exchange(ref _completed, 1) != 0)");
            w.line("    throw new System.InvalidOperationException(\"completion already signalled\");");
            w.line("Handles.Release(Handle);");
        });
    });
    w.blank();
    w.line("public static unsafe class NativeCompletions");
    w.block("{", "}", |w| {
        w.line("/// <summary>Deliver a C# result to a pending native completion.</summary>");
        w.line("public static void Forward<T>(System.Threading.Tasks.Task<T> task, Codec<T>? codec, ulong completion)");
        w.block("{", "}", |w| {
            w.line("task.ContinueWith(t =>");
            w.block("{", "});", |w| {
                w.line("if (t.IsFaulted || t.IsCanceled)");
                w.line("    NativeFail(completion, NativeError.Encode(t.Exception?.InnerException ?? new System.OperationCanceledException()));");
                w.line("else");
                w.line("    NativeSucceed(completion, codec is null ? default : Codecs.ToNative(codec, t.Result));");
            });
        });
        w.blank();
        w.line("public static void Forward(System.Threading.Tasks.Task task, object? codec, ulong completion)");
        w.block("{", "}", |w| {
            w.line("async System.Threading.Tasks.Task<object?> Wrap() { await task; return null; }");
            w.line("Forward(Wrap(), null, completion);");
        });
        w.blank();
        w.line("[UnmanagedCallersOnly]");
        w.line("private static void Succeed(ulong handle, NativeBuffer payload) =>");
        w.line("    Handles.Reverse<INativeCompletion>(handle).Succeed(payload);");
        w.blank();
        w.line("[UnmanagedCallersOnly]");
        w.line("private static void Fail(ulong handle, NativeBuffer error) =>");
        w.line("    Handles.Reverse<INativeCompletion>(handle).Fail(error);");
        w.blank();
        w.line("[System.Runtime.CompilerServices.ModuleInitializer]");
        w.line("internal static void Register() => NativeRegister(&Succeed, &Fail);");
        w.blank();
        dll_import(w, dll, &format!("{prefix}_register"));
        w.line("private static extern void NativeRegister(");
        w.line("    delegate* unmanaged<ulong, NativeBuffer, void> succeed,");
        w.line("    delegate* unmanaged<ulong, NativeBuffer, void> fail);");
        w.blank();
        dll_import(w, dll, &format!("{prefix}_succeed"));
        w.line("private static extern void NativeSucceed(ulong completion, NativeBuffer payload);");
        w.blank();
        dll_import(w, dll, &format!("{prefix}_fail"));
        w.line("private static extern void NativeFail(ulong completion, NativeBuffer error);");
    });
    w.finish()
}

fn native_completion_glue(prefix: &str) -> String {
    let mut w = CodeWriter::new();
    w.lines(banner("//", "isthmus runtime support"));
    w.line("// Include from exactly one translation unit of the native library.");
    w.blank();
    w.line("#pragma once");
    w.blank();
    w.line("#include <cstdint>");
    w.blank();
    w.line("#include <isthmus/cabi.hpp>");
    w.blank();
    w.line("extern \"C\" {");
    w.blank();
    w.block(
        format!(
            "ISTHMUS_EXPORT void {prefix}_register(void (*succeed)(uint64_t, isthmus_buffer), void (*fail)(uint64_t, isthmus_buffer)) {{"
        ),
        "}",
        |w| w.line("::isthmus::cabi::register_completion(succeed, fail);"),
    );
    w.blank();
    w.block(
        format!("ISTHMUS_EXPORT void {prefix}_succeed(uint64_t completion, isthmus_buffer payload) {{"),
        "}",
        |w| w.line("::isthmus::cabi::complete_success(completion, payload);"),
    );
    w.blank();
    w.block(
        format!("ISTHMUS_EXPORT void {prefix}_fail(uint64_t completion, isthmus_buffer error) {{"),
        "}",
        |w| w.line("::isthmus::cabi::complete_failure(completion, error);"),
    );
    w.blank();
    w.line("}  // extern \"C\"");
    w.finish()
}
