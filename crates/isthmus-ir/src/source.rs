//! Declaration files: the structured output of the IDL front end.
//!
//! ```toml
//! namespace = "shop"
//!
//! [[declarations]]
//! name = "item"
//! kind = "record"
//! deriving = ["eq", "str"]
//! fields = [{ name = "price", type = "f64" }]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decl::Declaration;
use crate::error::Result;
use crate::types::TypeRef;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclarationFile {
    /// Namespace prepended to every declaration in the file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default)]
    pub declarations: Vec<Declaration<TypeRef>>,
}

impl DeclarationFile {
    pub fn parse_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str::<Self>(source)?.scoped())
    }

    pub fn parse_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str::<Self>(source)?.scoped())
    }

    /// Load a `.json` or `.toml` declaration file, stamping the path into
    /// every declaration site that does not name a file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let mut file = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&source)?,
            _ => Self::parse_toml(&source)?,
        };
        for decl in &mut file.declarations {
            if decl.site.file.is_none() {
                decl.site.file = Some(path.to_path_buf());
            }
        }
        debug!(path = %path.display(), declarations = file.declarations.len(), "loaded declaration file");
        Ok(file)
    }

    fn scoped(mut self) -> Self {
        if !self.namespace.is_empty() {
            for decl in &mut self.declarations {
                decl.namespace = if decl.namespace.is_empty() {
                    self.namespace.clone()
                } else {
                    format!("{}.{}", self.namespace, decl.namespace)
                };
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::decl::DeclKind;

    #[test]
    fn file_namespace_is_prepended() {
        let file = DeclarationFile::parse_toml(
            r#"
namespace = "shop"

[[declarations]]
name = "item"
kind = "record"

[[declarations]]
name = "cart"
namespace = "checkout"
kind = "record"
"#,
        )
        .unwrap();
        assert_eq!(file.declarations[0].qualified_name().to_string(), "shop.item");
        assert_eq!(file.declarations[1].qualified_name().to_string(), "shop.checkout.cart");
    }

    #[test]
    fn json_declarations() {
        let file = DeclarationFile::parse_json(
            r#"{"declarations": [
                {"name": "color", "kind": "enum", "items": ["red", "blue"]},
                {"name": "on_change", "kind": "function", "params": [{"name": "value", "type": "color"}]}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(file.declarations[0].kind, DeclKind::Enum(_)));
        assert!(matches!(file.declarations[1].kind, DeclKind::Function(_)));
    }

    #[test]
    fn load_stamps_file_into_sites() {
        let mut tmp = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(tmp, "[[declarations]]\nname = \"x\"\nkind = \"enum\"\nitems = [\"a\"]").unwrap();
        let file = DeclarationFile::load(tmp.path()).unwrap();
        assert_eq!(file.declarations[0].site.file.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(DeclarationFile::parse_toml("[[declarations]]\nname = 3").is_err());
    }
}
