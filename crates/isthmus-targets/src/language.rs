//! Supported target languages.

use std::fmt;
use std::str::FromStr;

use isthmus_ir::Side;
use serde::{Deserialize, Serialize};

use crate::error::TargetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    /// The native side: C++ headers.
    Cpp,
    /// Managed side on the JVM, bridged through JNI.
    Java,
    /// Managed side on .NET, bridged through a C ABI.
    #[serde(rename = "csharp")]
    CSharp,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 3] = [TargetLanguage::Cpp, TargetLanguage::Java, TargetLanguage::CSharp];

    pub fn key(self) -> &'static str {
        match self {
            TargetLanguage::Cpp => "cpp",
            TargetLanguage::Java => "java",
            TargetLanguage::CSharp => "csharp",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TargetLanguage::Cpp => "C++",
            TargetLanguage::Java => "Java",
            TargetLanguage::CSharp => "C#",
        }
    }

    /// Which side of the boundary code in this language runs on.
    pub fn side(self) -> Side {
        match self {
            TargetLanguage::Cpp => Side::Native,
            TargetLanguage::Java | TargetLanguage::CSharp => Side::Managed,
        }
    }

    pub fn source_extension(self) -> &'static str {
        match self {
            TargetLanguage::Cpp => "hpp",
            TargetLanguage::Java => "java",
            TargetLanguage::CSharp => "cs",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TargetLanguage {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| TargetError::UnknownTarget { key: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys() {
        assert_eq!("csharp".parse::<TargetLanguage>().unwrap(), TargetLanguage::CSharp);
        assert!(matches!(
            "objc".parse::<TargetLanguage>(),
            Err(TargetError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn sides() {
        assert_eq!(TargetLanguage::Cpp.side(), Side::Native);
        assert_eq!(TargetLanguage::Java.side(), Side::Managed);
    }
}
