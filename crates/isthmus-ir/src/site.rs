//! Declaration sites.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a declaration or member was written in the IDL source.
///
/// Sites come from the front-end parser; a default site is used for
/// synthesized declarations and hand-built fixtures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    /// Source file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// 1-based line number (0 when unknown).
    #[serde(default)]
    pub line: u32,
    /// 1-based column number (0 when unknown).
    #[serde(default)]
    pub column: u32,
}

impl Site {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }

    pub fn is_known(&self) -> bool {
        self.file.is_some() || self.line > 0
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column),
            None => write!(f, "<input>:{}:{}", self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_file() {
        let site = Site::new("api/calc.idl", 12, 5);
        assert_eq!(site.to_string(), "api/calc.idl:12:5");
        assert!(site.is_known());
    }

    #[test]
    fn default_site_is_unknown() {
        let site = Site::default();
        assert!(!site.is_known());
        assert_eq!(site.to_string(), "<input>:0:0");
    }
}
