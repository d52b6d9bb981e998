//! Generation errors.

use isthmus_ir::IrError;
use isthmus_targets::TargetError;
use thiserror::Error;

/// Errors that abort binding generation.
///
/// Generation is all-or-nothing: any of these means no file is produced.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("{target}: cannot emit '{name}': {detail}")]
    Emit {
        target: String,
        name: String,
        detail: String,
    },
}

impl GenerateError {
    pub(crate) fn emit(target: impl Into<String>, name: impl Into<String>, detail: impl Into<String>) -> Self {
        GenerateError::Emit {
            target: target.into(),
            name: name.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;
