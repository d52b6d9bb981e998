//! Value marshalling strategies across the native boundary.
//!
//! Every parameter, return value and field that crosses the boundary gets a
//! [`MarshalStrategy`], chosen from its resolved IR type alone. Emitters turn
//! the strategy into glue code; the strategy never depends on the target.

use isthmus_ir::{DeclId, DeclKind, Ir, Primitive, Ty};

/// Strategy for marshalling one value across the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalStrategy {
    /// Scalar passed by value with no ownership transfer. Timestamps cross as
    /// milliseconds since the Unix epoch.
    Direct(Primitive),
    /// Text or binary blob; the receiver gets an independent copy.
    Copy(Primitive),
    /// Enum passed as its ordinal.
    Ordinal(DeclId),
    /// Flags passed as their bit pattern.
    BitSet(DeclId),
    /// Present value or an explicit absence marker, never a sentinel.
    Optional(Box<MarshalStrategy>),
    /// New container built element by element. Lists keep source order,
    /// sets only guarantee membership.
    ElementWise {
        ordered: bool,
        element: Box<MarshalStrategy>,
    },
    /// New map built key by key.
    KeyWise {
        key: Box<MarshalStrategy>,
        value: Box<MarshalStrategy>,
    },
    /// Nested record marshalled field by field.
    Recursive(DeclId),
    /// Interface or function value passed as a native or reverse handle.
    Handle(DeclId),
}

/// What physically crosses the boundary for a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Scalar(Primitive),
    Ordinal,
    Bits,
    Handle,
    /// A length-prefixed byte buffer in the runtime wire format.
    Buffer,
}

/// Select the marshal strategy for a resolved type.
pub fn select_strategy(ir: &Ir, ty: &Ty) -> MarshalStrategy {
    match ty {
        Ty::Primitive(p @ (Primitive::String | Primitive::Binary)) => MarshalStrategy::Copy(*p),
        Ty::Primitive(p) => MarshalStrategy::Direct(*p),
        Ty::Optional(inner) => MarshalStrategy::Optional(Box::new(select_strategy(ir, inner))),
        Ty::List(inner) => MarshalStrategy::ElementWise {
            ordered: true,
            element: Box::new(select_strategy(ir, inner)),
        },
        Ty::Set(inner) => MarshalStrategy::ElementWise {
            ordered: false,
            element: Box::new(select_strategy(ir, inner)),
        },
        Ty::Map(k, v) => MarshalStrategy::KeyWise {
            key: Box::new(select_strategy(ir, k)),
            value: Box::new(select_strategy(ir, v)),
        },
        Ty::Declared(id) => match &ir.decl(*id).kind {
            DeclKind::Enum(_) => MarshalStrategy::Ordinal(*id),
            DeclKind::Flags(_) => MarshalStrategy::BitSet(*id),
            DeclKind::Record(_) => MarshalStrategy::Recursive(*id),
            DeclKind::Interface(_) | DeclKind::Function(_) | DeclKind::ErrorDomain(_) => MarshalStrategy::Handle(*id),
        },
    }
}

/// Spelling of wire codecs in a managed target's runtime library.
///
/// [`MarshalStrategy::codec`] composes these into one codec expression for
/// values carried in a buffer.
pub trait CodecNames {
    fn primitive(&self, primitive: Primitive) -> String;
    fn optional(&self, inner: String) -> String;
    fn list(&self, element: String) -> String;
    fn set(&self, element: String) -> String;
    fn map(&self, key: String, value: String) -> String;
    fn enumeration(&self, id: DeclId) -> String;
    fn flags(&self, id: DeclId) -> String;
    /// Codec of a record, or of the handles of an interface or function.
    fn declared(&self, id: DeclId) -> String;
}

impl MarshalStrategy {
    pub fn carrier(&self) -> Carrier {
        match self {
            MarshalStrategy::Direct(p) => Carrier::Scalar(*p),
            MarshalStrategy::Ordinal(_) => Carrier::Ordinal,
            MarshalStrategy::BitSet(_) => Carrier::Bits,
            MarshalStrategy::Handle(_) => Carrier::Handle,
            MarshalStrategy::Copy(_)
            | MarshalStrategy::Optional(_)
            | MarshalStrategy::ElementWise { .. }
            | MarshalStrategy::KeyWise { .. }
            | MarshalStrategy::Recursive(_) => Carrier::Buffer,
        }
    }

    /// Codec expression for this strategy in a managed target.
    pub fn codec(&self, names: &impl CodecNames) -> String {
        match self {
            MarshalStrategy::Direct(p) | MarshalStrategy::Copy(p) => names.primitive(*p),
            MarshalStrategy::Ordinal(id) => names.enumeration(*id),
            MarshalStrategy::BitSet(id) => names.flags(*id),
            MarshalStrategy::Optional(inner) => names.optional(inner.codec(names)),
            MarshalStrategy::ElementWise { ordered: true, element } => names.list(element.codec(names)),
            MarshalStrategy::ElementWise { ordered: false, element } => names.set(element.codec(names)),
            MarshalStrategy::KeyWise { key, value } => names.map(key.codec(names), value.codec(names)),
            MarshalStrategy::Recursive(id) | MarshalStrategy::Handle(id) => names.declared(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isthmus_ir::{DeclarationFile, IrBuilder};

    fn ir() -> Ir {
        let file = DeclarationFile::parse_toml(
            r#"
[[declarations]]
name = "mode"
kind = "enum"
items = ["on", "off"]

[[declarations]]
name = "perm"
kind = "flags"
flags = ["read"]

[[declarations]]
name = "entry"
kind = "record"
fields = [{ name = "id", type = "i64" }]

[[declarations]]
name = "sink"
kind = "interface"
"#,
        )
        .unwrap();
        let mut builder = IrBuilder::new();
        builder.extend(file.declarations);
        builder.build().unwrap()
    }

    fn declared(ir: &Ir, dotted: &str) -> Ty {
        Ty::Declared(ir.lookup(dotted).unwrap())
    }

    #[test]
    fn strategy_selection() {
        let ir = ir();
        assert_eq!(
            select_strategy(&ir, &Ty::Primitive(Primitive::I32)),
            MarshalStrategy::Direct(Primitive::I32)
        );
        assert_eq!(
            select_strategy(&ir, &Ty::Primitive(Primitive::Binary)),
            MarshalStrategy::Copy(Primitive::Binary)
        );
        assert!(matches!(select_strategy(&ir, &declared(&ir, "mode")), MarshalStrategy::Ordinal(_)));
        assert!(matches!(select_strategy(&ir, &declared(&ir, "perm")), MarshalStrategy::BitSet(_)));
        assert!(matches!(select_strategy(&ir, &declared(&ir, "entry")), MarshalStrategy::Recursive(_)));
        assert!(matches!(select_strategy(&ir, &declared(&ir, "sink")), MarshalStrategy::Handle(_)));
        let set = select_strategy(&ir, &Ty::set(Ty::Primitive(Primitive::String)));
        assert!(matches!(set, MarshalStrategy::ElementWise { ordered: false, .. }));
    }

    #[test]
    fn carriers() {
        let ir = ir();
        assert_eq!(
            select_strategy(&ir, &Ty::Primitive(Primitive::Date)).carrier(),
            Carrier::Scalar(Primitive::Date)
        );
        assert_eq!(select_strategy(&ir, &Ty::Primitive(Primitive::String)).carrier(), Carrier::Buffer);
        assert_eq!(
            select_strategy(&ir, &Ty::optional(Ty::Primitive(Primitive::I8))).carrier(),
            Carrier::Buffer
        );
        assert_eq!(select_strategy(&ir, &declared(&ir, "perm")).carrier(), Carrier::Bits);
        assert_eq!(select_strategy(&ir, &declared(&ir, "sink")).carrier(), Carrier::Handle);
    }

    struct Plain<'a>(&'a Ir);

    impl CodecNames for Plain<'_> {
        fn primitive(&self, primitive: Primitive) -> String {
            primitive.keyword().to_uppercase()
        }
        fn optional(&self, inner: String) -> String {
            format!("opt({inner})")
        }
        fn list(&self, element: String) -> String {
            format!("list({element})")
        }
        fn set(&self, element: String) -> String {
            format!("set({element})")
        }
        fn map(&self, key: String, value: String) -> String {
            format!("map({key}, {value})")
        }
        fn enumeration(&self, id: DeclId) -> String {
            format!("enum({})", self.0.decl(id).name)
        }
        fn flags(&self, id: DeclId) -> String {
            format!("flags({})", self.0.decl(id).name)
        }
        fn declared(&self, id: DeclId) -> String {
            format!("{}.CODEC", self.0.decl(id).name)
        }
    }

    #[test]
    fn codec_expressions_nest() {
        let ir = ir();
        let entry = ir.lookup("entry").unwrap();
        let mode = ir.lookup("mode").unwrap();
        let ty = Ty::map(Ty::Declared(mode), Ty::list(Ty::optional(Ty::Declared(entry))));
        assert_eq!(
            select_strategy(&ir, &ty).codec(&Plain(&ir)),
            "map(enum(mode), list(opt(entry.CODEC)))"
        );
        let perm = Ty::set(declared(&ir, "perm"));
        assert_eq!(select_strategy(&ir, &perm).codec(&Plain(&ir)), "set(flags(perm))");
    }
}
