//! Capability derivation and bridging-protocol code generation for isthmus.
//!
//! Turns a validated IR into per-target source files and the native glue
//! that binds them.
//!
//! ## Modules
//!
//! - [`derive`]: equality, ordering and string plans for records
//! - [`shape`]: which bridging shapes an interface or function needs
//! - [`marshal`]: how each type crosses the boundary
//! - [`emit`]: the C++, Java and C# emitters
//! - [`pipeline`]: all-or-nothing generation across targets
//! - [`report`]: the processed-files report

pub mod derive;
pub mod emit;
pub mod error;
pub mod marshal;
pub mod pipeline;
pub mod report;
pub mod shape;

pub use derive::{derive, derive_all, Comparison, DerivePlan};
pub use emit::{emitter_for, CSharpEmitter, CodeWriter, CppEmitter, EmitContext, Emitter, GeneratedFile, JavaEmitter};
pub use error::{GenerateError, Result};
pub use marshal::{select_strategy, Carrier, MarshalStrategy};
pub use pipeline::{generate, GenerationOutput, TargetSetup};
pub use report::{sha256_hex, FileEntry, GenerationReport};
pub use shape::{destructor_warning, select_shapes, BridgingShape};
