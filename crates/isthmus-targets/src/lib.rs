//! Target languages and per-target type views for isthmus.
//!
//! A target is described by three things:
//! - **Profile:** how each primitive and container is spelled
//! - **Config:** output location, namespace/package and identifier styles
//! - **View resolver:** the pure mapping from IR types and names to the
//!   target's spelling, nullability and boxing rules

pub mod config;
pub mod error;
pub mod keywords;
pub mod language;
pub mod parse;
pub mod profile;
pub mod view;

pub use config::{CSharpConfig, CppConfig, IdentifierOverrides, JavaConfig, Naming, TargetConfig};
pub use error::{Result, TargetError};
pub use language::TargetLanguage;
pub use profile::{ContainerSpelling, PrimitiveSpelling, Profile};
pub use view::{Backing, TypeView, ViewResolver};
