use thiserror::Error;

use crate::site::Site;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("{site}: duplicate declaration '{name}'")]
    DuplicateName { name: String, site: Site },

    #[error("{site}: unresolved type '{reference}' referenced from '{name}'")]
    UnresolvedType {
        name: String,
        reference: String,
        site: Site,
    },

    #[error("{site}: '{name}' embeds itself by value through {}", path.join(" -> "))]
    CyclicDependency {
        name: String,
        path: Vec<String>,
        site: Site,
    },

    #[error("{site}: invalid declaration '{name}': {detail}")]
    InvalidDeclaration {
        name: String,
        detail: String,
        site: Site,
    },

    #[error("{site}: '{name}' derives ord but field '{field}' has no natural order")]
    UnorderedField {
        name: String,
        field: String,
        site: Site,
    },

    #[error("{site}: '{reference}' in '{name}' expects {expected} type parameter(s), found {found}")]
    GenericArity {
        name: String,
        reference: String,
        expected: usize,
        found: usize,
        site: Site,
    },

    #[error("invalid declaration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid declaration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IrError {
    /// The qualified name of the declaration the error is about, if any.
    pub fn declaration(&self) -> Option<&str> {
        match self {
            IrError::DuplicateName { name, .. }
            | IrError::UnresolvedType { name, .. }
            | IrError::CyclicDependency { name, .. }
            | IrError::InvalidDeclaration { name, .. }
            | IrError::UnorderedField { name, .. }
            | IrError::GenericArity { name, .. } => Some(name),
            IrError::Toml(_) | IrError::Json(_) | IrError::Io(_) => None,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, site: &Site, detail: impl Into<String>) -> Self {
        IrError::InvalidDeclaration {
            name: name.into(),
            detail: detail.into(),
            site: site.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IrError>;
