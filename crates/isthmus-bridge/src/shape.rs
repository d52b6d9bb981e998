//! Bridging shape selection.

use std::collections::BTreeSet;
use std::fmt;

use isthmus_ir::{DeclId, DeclKind, Ir};
use isthmus_targets::Backing;
use serde::Serialize;

/// How calls cross the boundary for an interface or function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BridgingShape {
    /// Managed object owning one native handle; calls forward to native code.
    NativeProxy,
    /// Native code holding a reverse handle to a managed implementation.
    ReverseProxy,
    /// A function value wrapped as a single-method interface.
    FunctionProxy,
    /// Calls return a pending result resolved by a completion.
    Async,
}

impl fmt::Display for BridgingShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BridgingShape::NativeProxy => "native-proxy",
            BridgingShape::ReverseProxy => "reverse-proxy",
            BridgingShape::FunctionProxy => "function-proxy",
            BridgingShape::Async => "async",
        };
        f.write_str(label)
    }
}

/// The shapes a declaration needs, empty for value types.
///
/// Function values reuse the proxy rules of interfaces, so a function gets
/// [`BridgingShape::FunctionProxy`] together with the native and reverse
/// shapes its backing calls for.
pub fn select_shapes(ir: &Ir, id: DeclId, backing: Backing) -> BTreeSet<BridgingShape> {
    let mut shapes = BTreeSet::new();
    let is_async = match &ir.decl(id).kind {
        DeclKind::Interface(iface) => iface.methods.iter().any(|m| m.is_async),
        DeclKind::Function(function) => {
            shapes.insert(BridgingShape::FunctionProxy);
            function.is_async
        }
        _ => return shapes,
    };
    if backing.native {
        shapes.insert(BridgingShape::NativeProxy);
    }
    if backing.managed {
        shapes.insert(BridgingShape::ReverseProxy);
    }
    if is_async {
        shapes.insert(BridgingShape::Async);
    }
    shapes
}

/// Design-time warning for native-backed types whose asynchronous calls may
/// still be running when the owning proxy is reclaimed.
pub fn destructor_warning(ir: &Ir, id: DeclId, shapes: &BTreeSet<BridgingShape>) -> Option<String> {
    if shapes.contains(&BridgingShape::NativeProxy) && shapes.contains(&BridgingShape::Async) {
        Some(format!(
            "'{}': the native destructor may run while asynchronous calls are in flight; \
             the native implementation must tolerate concurrent destruction",
            ir.qualified_name(id)
        ))
    } else {
        None
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
name = "store"
kind = "interface"
methods = [{ name = "load", async = true, returns = "string" }]

[[declarations]]
name = "listener"
kind = "interface"
implemented-by = ["managed"]
methods = [{ name = "on_event", params = [{ name = "code", type = "i32" }] }]

[[declarations]]
name = "predicate"
kind = "function"
params = [{ name = "value", type = "i32" }]
returns = "bool"

[[declarations]]
name = "point"
kind = "record"
"#,
        )
        .unwrap();
        let mut builder = IrBuilder::new();
        builder.extend(file.declarations);
        builder.build().unwrap()
    }

    #[test]
    fn interfaces_follow_their_backing() {
        let ir = ir();
        let store = ir.lookup("store").unwrap();
        let shapes = select_shapes(&ir, store, Backing { native: true, managed: false });
        assert_eq!(
            shapes.into_iter().collect::<Vec<_>>(),
            vec![BridgingShape::NativeProxy, BridgingShape::Async]
        );
        let listener = ir.lookup("listener").unwrap();
        let shapes = select_shapes(&ir, listener, Backing { native: false, managed: true });
        assert_eq!(shapes.into_iter().collect::<Vec<_>>(), vec![BridgingShape::ReverseProxy]);
    }

    #[test]
    fn functions_are_single_method_proxies() {
        let ir = ir();
        let predicate = ir.lookup("predicate").unwrap();
        let shapes = select_shapes(&ir, predicate, Backing { native: true, managed: true });
        assert!(shapes.contains(&BridgingShape::FunctionProxy));
        assert!(shapes.contains(&BridgingShape::NativeProxy));
        assert!(shapes.contains(&BridgingShape::ReverseProxy));
        assert!(!shapes.contains(&BridgingShape::Async));
    }

    #[test]
    fn value_types_have_no_shape() {
        let ir = ir();
        let point = ir.lookup("point").unwrap();
        assert!(select_shapes(&ir, point, Backing::default()).is_empty());
    }

    #[test]
    fn async_native_proxies_warn() {
        let ir = ir();
        let store = ir.lookup("store").unwrap();
        let shapes = select_shapes(&ir, store, Backing { native: true, managed: false });
        let warning = destructor_warning(&ir, store, &shapes).unwrap();
        assert!(warning.starts_with("'store'"));
        let listener = ir.lookup("listener").unwrap();
        let shapes = select_shapes(&ir, listener, Backing { native: false, managed: true });
        assert!(destructor_warning(&ir, listener, &shapes).is_none());
    }
}
