//! Native glue shared by the JNI and C ABI bridges.
//!
//! Both bridges pass values as carriers (see [`Carrier`]) and convert them to
//! native types with the same helpers, differing only in the runtime
//! namespace and whether a JNI environment is threaded through.

use isthmus_ir::{DeclId, DeclKind, Primitive, Ty};

use super::{CodeWriter, EmitContext};
use crate::marshal::Carrier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abi {
    Jni,
    C,
}

impl Abi {
    pub(crate) fn runtime(self) -> &'static str {
        match self {
            Abi::Jni => "::isthmus::jni",
            Abi::C => "::isthmus::cabi",
        }
    }

    fn env_arg(self) -> &'static str {
        match self {
            Abi::Jni => "env, ",
            Abi::C => "",
        }
    }

    fn env_param(self) -> &'static str {
        match self {
            Abi::Jni => "JNIEnv* env, ",
            Abi::C => "",
        }
    }

    pub(crate) fn handle_type(self) -> &'static str {
        match self {
            Abi::Jni => "jlong",
            Abi::C => "uint64_t",
        }
    }

    pub(crate) fn carrier_type(self, carrier: Carrier) -> &'static str {
        match (self, carrier) {
            (Abi::Jni, Carrier::Scalar(p)) => match p {
                Primitive::Bool => "jboolean",
                Primitive::I8 => "jbyte",
                Primitive::I16 => "jshort",
                Primitive::I32 => "jint",
                Primitive::F32 => "jfloat",
                Primitive::F64 => "jdouble",
                Primitive::I64 | Primitive::Date => "jlong",
                Primitive::String | Primitive::Binary => "jbyteArray",
            },
            (Abi::Jni, Carrier::Ordinal) => "jint",
            (Abi::Jni, Carrier::Bits | Carrier::Handle) => "jlong",
            (Abi::Jni, Carrier::Buffer) => "jbyteArray",
            (Abi::C, Carrier::Scalar(p)) => match p {
                Primitive::Bool => "uint8_t",
                Primitive::I8 => "int8_t",
                Primitive::I16 => "int16_t",
                Primitive::I32 => "int32_t",
                Primitive::F32 => "float",
                Primitive::F64 => "double",
                Primitive::I64 | Primitive::Date => "int64_t",
                Primitive::String | Primitive::Binary => "isthmus_buffer",
            },
            (Abi::C, Carrier::Ordinal) => "int32_t",
            (Abi::C, Carrier::Bits | Carrier::Handle) => "uint64_t",
            (Abi::C, Carrier::Buffer) => "isthmus_buffer",
        }
    }

    /// Value returned when an exception was translated instead of a result.
    pub(crate) fn zero(self, carrier: Carrier) -> &'static str {
        match (self, carrier) {
            (Abi::Jni, Carrier::Buffer) => "nullptr",
            (Abi::C, Carrier::Buffer) => "isthmus_buffer{}",
            _ => "0",
        }
    }
}

/// Carrier of a value type.
pub(crate) fn carrier(ctx: &EmitContext<'_>, ty: &Ty) -> Carrier {
    ctx.strategy(ty).carrier()
}

/// Native expression for a carrier `expr` holding a value of `ty`.
pub(crate) fn to_native(ctx: &EmitContext<'_>, abi: Abi, ty: &Ty, expr: &str) -> String {
    let spelling = ctx.native.view(ty).spelling;
    let (rt, env) = (abi.runtime(), abi.env_arg());
    match carrier(ctx, ty) {
        Carrier::Scalar(Primitive::Bool) => format!("({expr} != 0)"),
        Carrier::Scalar(Primitive::Date) => format!("{rt}::from_millis({expr})"),
        Carrier::Scalar(_) | Carrier::Ordinal | Carrier::Bits => format!("static_cast<{spelling}>({expr})"),
        Carrier::Handle => format!("{rt}::from_handle<{spelling}>({env}{expr})"),
        Carrier::Buffer => format!("{rt}::decode<{spelling}>({env}{expr})"),
    }
}

/// Carrier expression for a native `expr` holding a value of `ty`.
pub(crate) fn from_native(ctx: &EmitContext<'_>, abi: Abi, ty: &Ty, expr: &str) -> String {
    let spelling = ctx.native.view(ty).spelling;
    let (rt, env) = (abi.runtime(), abi.env_arg());
    let carrier = carrier(ctx, ty);
    match carrier {
        Carrier::Scalar(Primitive::Date) => format!("{rt}::to_millis({expr})"),
        Carrier::Scalar(_) | Carrier::Ordinal | Carrier::Bits => {
            format!("static_cast<{}>({expr})", abi.carrier_type(carrier))
        }
        Carrier::Handle => format!("{rt}::to_handle<{spelling}>({env}{expr})"),
        Carrier::Buffer => format!("{rt}::encode<{spelling}>({env}{expr})"),
    }
}

/// Native header of a declaration, relative to the C++ output directory.
pub(crate) fn native_include(ctx: &EmitContext<'_>, id: DeclId) -> String {
    let parts: Vec<String> = ctx
        .native
        .file_path(id)
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// How a handle type crosses: which sides implement it and how a managed
/// implementation is recognised and wrapped on the native side.
pub(crate) struct HandleGlue<'s> {
    pub spelling: &'s str,
    pub native: bool,
    pub managed: bool,
    /// Native class wrapping a managed implementation.
    pub proxy: &'s str,
    /// Expression building a `proxy`-backed value from `handle`.
    pub wrap: &'s str,
    pub is_function: bool,
}

/// Declare the runtime's `HandleTraits` specialisation for one interface or
/// function. Declared ahead of any other glue header so mutually
/// referencing types resolve.
pub(crate) fn handle_traits_decl(w: &mut CodeWriter, abi: Abi, spelling: &str) {
    let rt = abi.runtime().trim_start_matches("::");
    let (handle, env) = (abi.handle_type(), abi.env_param());
    w.line(format!("namespace {rt} {{"));
    w.blank();
    w.line("template <>");
    w.block(format!("struct HandleTraits<{spelling}> {{"), "};", |w| {
        w.line(format!("static {handle} to({env}const {spelling}& value);"));
        w.line(format!("static {spelling} from({env}{handle} handle);"));
    });
    w.blank();
    w.line(format!("}}  // namespace {rt}"));
}

/// Define the members declared by [`handle_traits_decl`].
pub(crate) fn handle_traits_defs(w: &mut CodeWriter, abi: Abi, glue: &HandleGlue<'_>) {
    let rt = abi.runtime().trim_start_matches("::");
    let (handle, env) = (abi.handle_type(), abi.env_param());
    let spelling = glue.spelling;
    w.line(format!("namespace {rt} {{"));
    w.blank();
    w.block(
        format!("inline {handle} HandleTraits<{spelling}>::to({env}const {spelling}& value) {{"),
        "}",
        |w| {
            if abi == Abi::Jni {
                w.line("(void)env;");
            }
            if glue.managed {
                let detect = if glue.is_function {
                    format!("value.target<{}>()", glue.proxy)
                } else {
                    format!("dynamic_cast<const {}*>(value.get())", glue.proxy)
                };
                w.block(format!("if (auto proxy = {detect}) {{"), "}", |w| {
                    w.line("return proxy->handle();")
                });
            }
            if glue.native {
                w.line("return box(value);");
            } else {
                w.line(format!(
                    "throw std::invalid_argument(\"{spelling} is only implemented on the managed side\");"
                ));
            }
        },
    );
    w.blank();
    w.block(
        format!("inline {spelling} HandleTraits<{spelling}>::from({env}{handle} handle) {{"),
        "}",
        |w| match (glue.native, glue.managed) {
            (true, true) => {
                w.block("if (is_reverse(handle)) {", "}", |w| w.line(format!("return {};", glue.wrap)));
                w.line(format!("return unbox<{spelling}>(handle);"));
            }
            (true, false) => w.line(format!("return unbox<{spelling}>(handle);")),
            (false, _) => w.line(format!("return {};", glue.wrap)),
        },
    );
    w.blank();
    w.line(format!("}}  // namespace {rt}"));
}

/// Interface and function declarations whose handles a declaration passes.
pub(crate) fn handle_dependencies(ctx: &EmitContext<'_>, id: DeclId) -> Vec<DeclId> {
    let ir = ctx.ir();
    super::referenced(id, super::decl_types(&ir.decl(id).kind))
        .into_iter()
        .filter(|dep| matches!(ir.decl(*dep).kind, DeclKind::Interface(_) | DeclKind::Function(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carriers_map_to_abi_types() {
        assert_eq!(Abi::Jni.carrier_type(Carrier::Scalar(Primitive::Date)), "jlong");
        assert_eq!(Abi::Jni.carrier_type(Carrier::Buffer), "jbyteArray");
        assert_eq!(Abi::C.carrier_type(Carrier::Scalar(Primitive::Bool)), "uint8_t");
        assert_eq!(Abi::C.carrier_type(Carrier::Bits), "uint64_t");
        assert_eq!(Abi::C.zero(Carrier::Buffer), "isthmus_buffer{}");
        assert_eq!(Abi::Jni.zero(Carrier::Ordinal), "0");
    }

    #[test]
    fn managed_only_handles_never_box() {
        let mut w = CodeWriter::new();
        handle_traits_decl(&mut w, Abi::C, "std::shared_ptr<::a::Sink>");
        handle_traits_defs(
            &mut w,
            Abi::C,
            &HandleGlue {
                spelling: "std::shared_ptr<::a::Sink>",
                native: false,
                managed: true,
                proxy: "::a::cabi::SinkCSharpProxy",
                wrap: "std::make_shared<::a::cabi::SinkCSharpProxy>(handle)",
                is_function: false,
            },
        );
        let text = w.finish();
        assert!(text.contains("namespace isthmus::cabi {"));
        assert!(text.contains("static uint64_t to(const std::shared_ptr<::a::Sink>& value);"));
        assert!(text.contains(
            "inline uint64_t HandleTraits<std::shared_ptr<::a::Sink>>::to(const std::shared_ptr<::a::Sink>& value) {"
        ));
        assert!(text.contains("dynamic_cast<const ::a::cabi::SinkCSharpProxy*>(value.get())"));
        assert!(text.contains("throw std::invalid_argument"));
        assert!(!text.contains("box(value)"));
        assert!(text.contains("return std::make_shared<::a::cabi::SinkCSharpProxy>(handle);"));
    }
}
