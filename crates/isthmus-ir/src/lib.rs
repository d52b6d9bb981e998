//! Declaration model and intermediate representation for isthmus.
//!
//! Front-end declarations are collected by an [`IrBuilder`], registered by
//! qualified name, resolved and validated into an immutable [`Ir`] that every
//! later generation stage reads.

pub mod decl;
pub mod error;
pub mod ident;
pub mod ir;
pub mod name;
pub mod registry;
pub mod site;
pub mod source;
pub mod types;
mod validate;

pub use decl::{
    ConstValue, Constant, DeclKind, Declaration, Deprecation, Deriving, Doc, Enum, ErrorCode, ErrorDomain, Field,
    Flags, Function, Interface, Item, Method, Param, Property, Record, Side,
};
pub use error::{IrError, Result};
pub use ident::{Case, IdentifierStyle};
pub use ir::{Ir, IrBuilder};
pub use name::QualifiedName;
pub use site::Site;
pub use source::DeclarationFile;
pub use types::{DeclId, Primitive, Ty, TypeRef};
pub use validate::has_natural_order;
