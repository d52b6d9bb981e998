//! Target profiles: how each target spells the builtin types.
//!
//! Every target ships with a builtin profile. A project may replace it with a
//! `.profile.toml` file (see [`crate::parse`]); the active profile must cover
//! the whole primitive set before any emission starts.

use std::collections::BTreeMap;

use isthmus_ir::Primitive;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::language::TargetLanguage;

fn yes() -> bool {
    true
}

/// Spelling of one primitive in a target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrimitiveSpelling {
    /// The type name used for plain fields and parameters.
    pub typename: String,
    /// The type name used inside nullable or generic containers, if different.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxed: Option<String>,
    /// Passed by value rather than by reference.
    #[serde(default = "yes")]
    pub by_value: bool,
}

impl PrimitiveSpelling {
    pub fn new(typename: impl Into<String>, boxed: Option<&str>, by_value: bool) -> Self {
        Self {
            typename: typename.into(),
            boxed: boxed.map(str::to_string),
            by_value,
        }
    }

    pub fn boxed_name(&self) -> &str {
        self.boxed.as_deref().unwrap_or(&self.typename)
    }
}

/// Generic container spellings, written without their type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerSpelling {
    pub list: String,
    pub set: String,
    pub map: String,
    /// Wrapper for optional values; `None` when the target expresses
    /// optionality through nullable references instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Profile {
    pub name: String,
    pub language: TargetLanguage,
    pub primitives: BTreeMap<Primitive, PrimitiveSpelling>,
    pub containers: ContainerSpelling,
}

impl Profile {
    pub fn builtin(language: TargetLanguage) -> Self {
        match language {
            TargetLanguage::Cpp => Self::cpp(),
            TargetLanguage::Java => Self::java(),
            TargetLanguage::CSharp => Self::csharp(),
        }
    }

    pub fn cpp() -> Self {
        let table = [
            (Primitive::Bool, "bool", true),
            (Primitive::I8, "int8_t", true),
            (Primitive::I16, "int16_t", true),
            (Primitive::I32, "int32_t", true),
            (Primitive::I64, "int64_t", true),
            (Primitive::F32, "float", true),
            (Primitive::F64, "double", true),
            (Primitive::String, "std::string", false),
            (Primitive::Binary, "std::vector<uint8_t>", false),
            (Primitive::Date, "std::chrono::system_clock::time_point", true),
        ];
        Self {
            name: "cpp".into(),
            language: TargetLanguage::Cpp,
            primitives: table
                .into_iter()
                .map(|(p, name, by_value)| (p, PrimitiveSpelling::new(name, None, by_value)))
                .collect(),
            containers: ContainerSpelling {
                list: "std::vector".into(),
                set: "std::unordered_set".into(),
                map: "std::unordered_map".into(),
                optional: Some("std::optional".into()),
            },
        }
    }

    pub fn java() -> Self {
        let table = [
            (Primitive::Bool, "boolean", Some("Boolean")),
            (Primitive::I8, "byte", Some("Byte")),
            (Primitive::I16, "short", Some("Short")),
            (Primitive::I32, "int", Some("Integer")),
            (Primitive::I64, "long", Some("Long")),
            (Primitive::F32, "float", Some("Float")),
            (Primitive::F64, "double", Some("Double")),
            (Primitive::String, "String", None),
            (Primitive::Binary, "byte[]", None),
            (Primitive::Date, "java.time.Instant", None),
        ];
        Self {
            name: "java".into(),
            language: TargetLanguage::Java,
            primitives: table
                .into_iter()
                .map(|(p, name, boxed)| (p, PrimitiveSpelling::new(name, boxed, boxed.is_some())))
                .collect(),
            containers: ContainerSpelling {
                list: "java.util.ArrayList".into(),
                set: "java.util.HashSet".into(),
                map: "java.util.HashMap".into(),
                optional: None,
            },
        }
    }

    pub fn csharp() -> Self {
        let table = [
            (Primitive::Bool, "bool", true),
            (Primitive::I8, "sbyte", true),
            (Primitive::I16, "short", true),
            (Primitive::I32, "int", true),
            (Primitive::I64, "long", true),
            (Primitive::F32, "float", true),
            (Primitive::F64, "double", true),
            (Primitive::String, "string", false),
            (Primitive::Binary, "byte[]", false),
            (Primitive::Date, "System.DateTime", true),
        ];
        Self {
            name: "csharp".into(),
            language: TargetLanguage::CSharp,
            primitives: table
                .into_iter()
                .map(|(p, name, by_value)| (p, PrimitiveSpelling::new(name, None, by_value)))
                .collect(),
            containers: ContainerSpelling {
                list: "System.Collections.Generic.List".into(),
                set: "System.Collections.Generic.HashSet".into(),
                map: "System.Collections.Generic.Dictionary".into(),
                optional: None,
            },
        }
    }

    pub fn spelling(&self, primitive: Primitive) -> Option<&PrimitiveSpelling> {
        self.primitives.get(&primitive)
    }

    /// Primitives this profile cannot represent.
    pub fn missing_primitives(&self) -> Vec<Primitive> {
        Primitive::ALL
            .into_iter()
            .filter(|p| !self.primitives.contains_key(p))
            .collect()
    }

    /// Fail unless the profile covers every primitive.
    pub fn ensure_total(&self) -> Result<()> {
        match self.missing_primitives().first() {
            Some(primitive) => Err(self.unsupported(*primitive)),
            None => Ok(()),
        }
    }

    /// Every primitive's spelling, in [`Primitive::ALL`] order.
    pub fn total_spellings(&self) -> Result<Vec<&PrimitiveSpelling>> {
        Primitive::ALL
            .into_iter()
            .map(|p| self.spelling(p).ok_or_else(|| self.unsupported(p)))
            .collect()
    }

    fn unsupported(&self, primitive: Primitive) -> TargetError {
        TargetError::UnsupportedPrimitive {
            target: self.language.key().into(),
            profile: self.name.clone(),
            primitive: primitive.keyword().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_are_total() {
        for language in TargetLanguage::ALL {
            let profile = Profile::builtin(language);
            assert_eq!(profile.language, language);
            profile.ensure_total().unwrap();
        }
    }

    #[test]
    fn java_boxes_numeric_primitives() {
        let java = Profile::java();
        let int = java.spelling(Primitive::I32).unwrap();
        assert_eq!(int.typename, "int");
        assert_eq!(int.boxed_name(), "Integer");
        assert!(int.by_value);
        let text = java.spelling(Primitive::String).unwrap();
        assert_eq!(text.boxed_name(), "String");
        assert!(!text.by_value);
    }

    #[test]
    fn missing_primitive_is_reported() {
        let mut profile = Profile::cpp();
        profile.primitives.remove(&Primitive::Date);
        let err = profile.ensure_total().unwrap_err();
        assert!(matches!(err, TargetError::UnsupportedPrimitive { ref primitive, .. } if primitive == "date"));
    }
}
