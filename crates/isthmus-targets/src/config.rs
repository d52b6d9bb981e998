//! Per-target generator options, as read from the `[cpp]`, `[java]` and
//! `[csharp]` tables of `isthmus.toml`.

use std::path::{Path, PathBuf};

use isthmus_ir::{Case, IdentifierStyle};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::language::TargetLanguage;
use crate::parse::load_profile_toml;
use crate::profile::Profile;

/// Identifier style overrides; unset keys fall back to the target defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdentifierOverrides {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<IdentifierStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<IdentifierStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<IdentifierStyle>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_item: Option<IdentifierStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant: Option<IdentifierStyle>,
    #[serde(alias = "namespace", skip_serializing_if = "Option::is_none")]
    pub package: Option<IdentifierStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<IdentifierStyle>,
}

/// Resolved identifier styles for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    /// Records, enums, flags, interfaces and error domains.
    pub ty: IdentifierStyle,
    /// Record fields and error parameters.
    pub field: IdentifierStyle,
    /// Interface methods and properties.
    pub method: IdentifierStyle,
    /// Enum items and flags.
    pub enum_item: IdentifierStyle,
    /// Constants declared on records and interfaces.
    pub constant: IdentifierStyle,
    /// Namespace or package segments.
    pub package: IdentifierStyle,
    /// Generated file stems.
    pub file: IdentifierStyle,
}

impl Naming {
    pub fn defaults(language: TargetLanguage) -> Self {
        let style = IdentifierStyle::new;
        match language {
            TargetLanguage::Cpp => Self {
                ty: style(Case::Pascal),
                field: style(Case::Snake),
                method: style(Case::Snake),
                enum_item: style(Case::Train),
                constant: style(Case::Train),
                package: style(Case::Snake),
                file: style(Case::Snake),
            },
            TargetLanguage::Java => Self {
                ty: style(Case::Pascal),
                field: style(Case::Camel),
                method: style(Case::Camel),
                enum_item: style(Case::Train),
                constant: style(Case::Train),
                package: style(Case::Snake),
                file: style(Case::Pascal),
            },
            TargetLanguage::CSharp => Self {
                ty: style(Case::Pascal),
                field: style(Case::Pascal),
                method: style(Case::Pascal),
                enum_item: style(Case::Pascal),
                constant: style(Case::Pascal),
                package: style(Case::Pascal),
                file: style(Case::Pascal),
            },
        }
    }

    pub fn with_overrides(mut self, overrides: &IdentifierOverrides) -> Self {
        let pick = |slot: &mut IdentifierStyle, value: &Option<IdentifierStyle>| {
            if let Some(value) = value {
                *slot = value.clone();
            }
        };
        pick(&mut self.ty, &overrides.ty);
        pick(&mut self.field, &overrides.field);
        pick(&mut self.method, &overrides.method);
        pick(&mut self.enum_item, &overrides.enum_item);
        pick(&mut self.constant, &overrides.constant);
        pick(&mut self.package, &overrides.package);
        pick(&mut self.file, &overrides.file);
        self
    }
}

/// `[cpp]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CppConfig {
    /// Output directory, relative to the manifest.
    pub out: PathBuf,
    /// Dotted namespace, e.g. `acme.shop`.
    pub namespace: String,
    /// Macro placed on exported declarations, e.g. `SHOP_EXPORT`.
    pub export_macro: Option<String>,
    /// Per-kind overrides of the target's default identifier styles.
    pub identifier: IdentifierOverrides,
    /// Profile file replacing the builtin type spellings.
    pub profile: Option<PathBuf>,
}

impl Default for CppConfig {
    fn default() -> Self {
        Self {
            out: PathBuf::from("generated/cpp"),
            namespace: String::new(),
            export_macro: None,
            identifier: IdentifierOverrides::default(),
            profile: None,
        }
    }
}

/// `[java]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JavaConfig {
    /// Output directory, relative to the manifest.
    pub out: PathBuf,
    /// Dotted base package, e.g. `com.acme.shop`.
    pub package: String,
    /// Name passed to `System.loadLibrary`.
    pub native_lib: Option<String>,
    /// Reclaim native handles through `java.lang.ref.Cleaner` rather than
    /// `finalize()`.
    pub native_cleaner: bool,
    /// Annotation placed on optional values, e.g. `androidx.annotation.Nullable`.
    pub nullable_annotation: Option<String>,
    /// Per-kind overrides of the target's default identifier styles.
    pub identifier: IdentifierOverrides,
    /// Profile file replacing the builtin type spellings.
    pub profile: Option<PathBuf>,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            out: PathBuf::from("generated/java"),
            package: String::new(),
            native_lib: None,
            native_cleaner: true,
            nullable_annotation: None,
            identifier: IdentifierOverrides::default(),
            profile: None,
        }
    }
}

/// `[csharp]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CSharpConfig {
    /// Output directory, relative to the manifest.
    pub out: PathBuf,
    /// Dotted namespace, e.g. `Acme.Shop`.
    pub namespace: String,
    /// Native library named in `DllImport` attributes.
    pub dll_name: String,
    /// Per-kind overrides of the target's default identifier styles.
    pub identifier: IdentifierOverrides,
    /// Profile file replacing the builtin type spellings.
    pub profile: Option<PathBuf>,
}

impl Default for CSharpConfig {
    fn default() -> Self {
        Self {
            out: PathBuf::from("generated/csharp"),
            namespace: String::new(),
            dll_name: "native".into(),
            identifier: IdentifierOverrides::default(),
            profile: None,
        }
    }
}

/// Options for one enabled target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    Cpp(CppConfig),
    Java(JavaConfig),
    CSharp(CSharpConfig),
}

impl TargetConfig {
    pub fn default_for(language: TargetLanguage) -> Self {
        match language {
            TargetLanguage::Cpp => TargetConfig::Cpp(CppConfig::default()),
            TargetLanguage::Java => TargetConfig::Java(JavaConfig::default()),
            TargetLanguage::CSharp => TargetConfig::CSharp(CSharpConfig::default()),
        }
    }

    pub fn language(&self) -> TargetLanguage {
        match self {
            TargetConfig::Cpp(_) => TargetLanguage::Cpp,
            TargetConfig::Java(_) => TargetLanguage::Java,
            TargetConfig::CSharp(_) => TargetLanguage::CSharp,
        }
    }

    pub fn out(&self) -> &Path {
        match self {
            TargetConfig::Cpp(c) => &c.out,
            TargetConfig::Java(c) => &c.out,
            TargetConfig::CSharp(c) => &c.out,
        }
    }

    /// Base namespace (C++, C#) or package (Java) as path segments.
    pub fn base_namespace(&self) -> Vec<String> {
        let dotted = match self {
            TargetConfig::Cpp(c) => &c.namespace,
            TargetConfig::Java(c) => &c.package,
            TargetConfig::CSharp(c) => &c.namespace,
        };
        dotted
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn naming(&self) -> Naming {
        let overrides = match self {
            TargetConfig::Cpp(c) => &c.identifier,
            TargetConfig::Java(c) => &c.identifier,
            TargetConfig::CSharp(c) => &c.identifier,
        };
        Naming::defaults(self.language()).with_overrides(overrides)
    }

    pub fn profile_path(&self) -> Option<&Path> {
        match self {
            TargetConfig::Cpp(c) => c.profile.as_deref(),
            TargetConfig::Java(c) => c.profile.as_deref(),
            TargetConfig::CSharp(c) => c.profile.as_deref(),
        }
    }

    /// The active profile: the configured file relative to `base`, or the builtin.
    pub fn load_profile(&self, base: &Path) -> Result<Profile> {
        match self.profile_path() {
            Some(path) => load_profile_toml(&base.join(path)),
            None => Ok(Profile::builtin(self.language())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_table_parses_with_defaults() {
        let config: JavaConfig = toml::from_str(
            r#"
package = "com.acme.shop"
nullable-annotation = "javax.annotation.Nullable"

[identifier]
field = { style = "camelCase", prefix = "m" }
enum = "PascalCase"
"#,
        )
        .unwrap();
        assert!(config.native_cleaner);
        assert_eq!(config.out, PathBuf::from("generated/java"));
        let target = TargetConfig::Java(config);
        assert_eq!(target.base_namespace(), vec!["com", "acme", "shop"]);
        let naming = target.naming();
        assert_eq!(naming.field.apply("unit_price"), "munitPrice");
        assert_eq!(naming.enum_item.apply("light_blue"), "LightBlue");
        assert_eq!(naming.method.apply("get_total"), "getTotal");
    }

    #[test]
    fn namespace_alias_for_package_style() {
        let overrides: IdentifierOverrides = toml::from_str(r#"namespace = "PascalCase""#).unwrap();
        assert_eq!(overrides.package, Some(IdentifierStyle::new(Case::Pascal)));
    }

    #[test]
    fn builtin_profile_without_override() {
        let target = TargetConfig::default_for(TargetLanguage::CSharp);
        let profile = target.load_profile(Path::new(".")).unwrap();
        assert_eq!(profile.language, TargetLanguage::CSharp);
    }

    #[test]
    fn configured_profile_is_loaded_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let mut profile = Profile::cpp();
        profile.name = "embedded".into();
        std::fs::write(
            dir.path().join("embedded.profile.toml"),
            crate::parse::profile_to_toml(&profile).unwrap(),
        )
        .unwrap();
        let target = TargetConfig::Cpp(CppConfig {
            profile: Some(PathBuf::from("embedded.profile.toml")),
            ..CppConfig::default()
        });
        assert_eq!(target.load_profile(dir.path()).unwrap().name, "embedded");
    }
}
