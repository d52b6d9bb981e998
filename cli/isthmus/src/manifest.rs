//! `isthmus.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use isthmus_ir::Deriving;
use isthmus_targets::{CSharpConfig, CppConfig, JavaConfig, TargetConfig, TargetLanguage};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "isthmus.toml";

/// The top-level manifest structure for an isthmus project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IsthmusManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(default)]
    pub cpp: Option<CppConfig>,
    #[serde(default)]
    pub java: Option<JavaConfig>,
    #[serde(default)]
    pub csharp: Option<CSharpConfig>,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// `[generate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GenerateConfig {
    /// Declaration files (`.toml` or `.json`), relative to the manifest.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Capabilities every record derives in addition to its own.
    #[serde(default)]
    pub default_deriving: Vec<Deriving>,
    /// Enabled targets; empty means every target with a section.
    #[serde(default)]
    pub targets: Vec<TargetLanguage>,
    /// Where to write the processed-files report, if anywhere.
    #[serde(default)]
    pub report: Option<PathBuf>,
    /// Write the runtime library sources next to the generated code.
    #[serde(default = "default_support_lib")]
    pub support_lib: bool,
}

fn default_support_lib() -> bool {
    true
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            default_deriving: Vec::new(),
            targets: Vec::new(),
            report: None,
            support_lib: default_support_lib(),
        }
    }
}

impl IsthmusManifest {
    /// Search upward from `start_dir` for an `isthmus.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                return Ok(Some((Self::load(&candidate)?, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing isthmus.toml")
    }

    /// Languages to generate, in the fixed C++, Java, C# order.
    pub fn enabled_targets(&self) -> Vec<TargetLanguage> {
        TargetLanguage::ALL
            .into_iter()
            .filter(|language| {
                if self.generate.targets.is_empty() {
                    self.section(*language).is_some()
                } else {
                    self.generate.targets.contains(language)
                }
            })
            .collect()
    }

    /// The configured section for a target, if the manifest has one.
    pub fn section(&self, language: TargetLanguage) -> Option<TargetConfig> {
        match language {
            TargetLanguage::Cpp => self.cpp.clone().map(TargetConfig::Cpp),
            TargetLanguage::Java => self.java.clone().map(TargetConfig::Java),
            TargetLanguage::CSharp => self.csharp.clone().map(TargetConfig::CSharp),
        }
    }

    /// Options for every enabled target, defaulted where the section is absent.
    pub fn target_configs(&self, only: Option<TargetLanguage>) -> Result<Vec<TargetConfig>> {
        let enabled = self.enabled_targets();
        if enabled.is_empty() {
            bail!("no targets enabled: add a [cpp], [java] or [csharp] section or list them in [generate] targets");
        }
        let languages = match only {
            Some(language) if !enabled.contains(&language) => {
                bail!("target '{language}' is not enabled in {MANIFEST_FILE}")
            }
            Some(language) => vec![language],
            None => enabled,
        };
        Ok(languages
            .into_iter()
            .map(|language| self.section(language).unwrap_or_else(|| TargetConfig::default_for(language)))
            .collect())
    }

    /// Default manifest for a new project.
    pub fn template(name: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
version = "0.1.0"

[generate]
inputs = ["idl/{name}.toml"]
default-deriving = ["eq"]
report = "generated/report.json"

[cpp]
out = "generated/cpp"
namespace = "{name}"

[java]
out = "generated/java"
package = "com.example.{name}"
native-lib = "{name}"
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[project]
name = "shop"
version = "1.2.0"

[generate]
inputs = ["idl/shop.toml", "idl/extra.json"]
default-deriving = ["eq", "str"]
targets = ["cpp", "csharp"]
report = "out/report.json"

[cpp]
out = "gen/cpp"
namespace = "acme"
export-macro = "SHOP_EXPORT"

[java]
package = "com.acme"

[csharp]
out = "gen/cs"
namespace = "Acme"
dll-name = "shop"

[csharp.identifier]
field = { style = "camelCase", prefix = "_" }
"#;
        let manifest = IsthmusManifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.project.name, "shop");
        assert_eq!(manifest.project.version, "1.2.0");
        assert_eq!(manifest.generate.inputs.len(), 2);
        assert_eq!(manifest.generate.default_deriving, vec![Deriving::Eq, Deriving::Str]);
        assert_eq!(manifest.generate.report, Some(PathBuf::from("out/report.json")));
        assert_eq!(manifest.enabled_targets(), vec![TargetLanguage::Cpp, TargetLanguage::CSharp]);
        assert_eq!(manifest.cpp.as_ref().unwrap().export_macro.as_deref(), Some("SHOP_EXPORT"));
        assert_eq!(manifest.csharp.as_ref().unwrap().dll_name, "shop");

        let configs = manifest.target_configs(None).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[1].out(), Path::new("gen/cs"));
        assert_eq!(configs[1].base_namespace(), vec!["Acme"]);
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = IsthmusManifest::from_str("[project]\nname = \"minimal\"\n").unwrap();
        assert_eq!(manifest.project.version, "0.1.0");
        assert!(manifest.generate.inputs.is_empty());
        assert!(manifest.generate.support_lib);
        assert!(manifest.enabled_targets().is_empty());
        assert!(manifest.target_configs(None).is_err());
    }

    #[test]
    fn sections_enable_targets_by_default() {
        let manifest = IsthmusManifest::from_str("[project]\nname = \"p\"\n\n[java]\npackage = \"com.p\"\n").unwrap();
        assert_eq!(manifest.enabled_targets(), vec![TargetLanguage::Java]);
        assert!(manifest.target_configs(Some(TargetLanguage::Cpp)).is_err());
        let configs = manifest.target_configs(Some(TargetLanguage::Java)).unwrap();
        assert_eq!(configs[0].base_namespace(), vec!["com", "p"]);
    }

    #[test]
    fn listed_targets_without_sections_use_defaults() {
        let manifest =
            IsthmusManifest::from_str("[project]\nname = \"p\"\n\n[generate]\ntargets = [\"cpp\"]\n").unwrap();
        let configs = manifest.target_configs(None).unwrap();
        assert_eq!(configs, vec![TargetConfig::default_for(TargetLanguage::Cpp)]);
    }

    #[test]
    fn support_lib_can_be_disabled() {
        let manifest =
            IsthmusManifest::from_str("[project]\nname = \"p\"\n\n[generate]\nsupport-lib = false\n").unwrap();
        assert!(!manifest.generate.support_lib);
        assert!(GenerateConfig::default().support_lib);
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(IsthmusManifest::from_str("this is not valid toml [[[").is_err());
        assert!(IsthmusManifest::from_str("[project]\nname = \"p\"\n[generate]\ntargets = [\"rust\"]\n").is_err());
    }

    #[test]
    fn template_is_valid_toml() {
        let manifest = IsthmusManifest::from_str(&IsthmusManifest::template("demo")).unwrap();
        assert_eq!(manifest.project.name, "demo");
        assert_eq!(manifest.enabled_targets(), vec![TargetLanguage::Cpp, TargetLanguage::Java]);
        assert_eq!(manifest.java.as_ref().unwrap().native_lib.as_deref(), Some("demo"));
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[project]\nname = \"parent\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found_dir) = IsthmusManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.project.name, "parent");
        assert_eq!(found_dir, dir.path());
    }
}
