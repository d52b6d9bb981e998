//! Error types for target-language operations.

use std::path::PathBuf;

/// Errors that can occur while preparing or resolving a target view.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading profile files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file not found.
    #[error("profile file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The active profile cannot represent a required primitive.
    #[error("target '{target}' has no representation for primitive '{primitive}' (profile '{profile}')")]
    UnsupportedPrimitive {
        target: String,
        profile: String,
        primitive: String,
    },

    /// A generated identifier collides with a reserved word of the target.
    #[error("{site}: identifier '{identifier}' generated for '{name}' is reserved in {target}")]
    ReservedIdentifier {
        target: String,
        identifier: String,
        name: String,
        site: isthmus_ir::Site,
    },

    /// An unknown target key was requested.
    #[error("unknown target '{key}' (expected one of: cpp, java, csharp)")]
    UnknownTarget { key: String },

    /// Structural problem in a profile.
    #[error("validation error: {detail}")]
    Validation { detail: String },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
