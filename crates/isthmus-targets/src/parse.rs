//! TOML parsing, serialization, validation, and discovery for target profiles.
//!
//! Custom profiles are stored as `.profile.toml` files, usually in a
//! `profiles/` directory next to `isthmus.toml`.

use std::path::{Path, PathBuf};

use crate::error::{Result, TargetError};
use crate::profile::Profile;

/// A validation issue found in a profile.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a profile from a `.profile.toml` file.
pub fn load_profile_toml(path: &Path) -> Result<Profile> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_profile_toml(&content)
}

/// Parse a profile from a TOML string.
pub fn parse_profile_toml(toml_str: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(toml_str)?;
    Ok(profile)
}

/// Serialize a profile to pretty TOML.
pub fn profile_to_toml(profile: &Profile) -> Result<String> {
    Ok(toml::to_string_pretty(profile)?)
}

/// Check a profile for structural problems.
///
/// Missing primitives are errors; suspicious spellings are warnings.
pub fn validate_profile(profile: &Profile) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for primitive in profile.missing_primitives() {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!("no spelling for primitive '{primitive}'"),
        });
    }

    for (primitive, spelling) in &profile.primitives {
        if spelling.typename.trim().is_empty() {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("primitive '{primitive}' has an empty typename"),
            });
        }
        if spelling.boxed.as_deref().is_some_and(|b| b == spelling.typename) {
            issues.push(ValidationIssue {
                severity: "warning",
                message: format!("primitive '{primitive}' declares a boxed name equal to its typename"),
            });
        }
    }

    for (label, spelling) in [
        ("list", &profile.containers.list),
        ("set", &profile.containers.set),
        ("map", &profile.containers.map),
    ] {
        if spelling.trim().is_empty() {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("container '{label}' has an empty spelling"),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Discover all `.profile.toml` files in `dir`.
///
/// Returns (profile_name, file_path) pairs sorted by name.
pub fn discover_profiles(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut profiles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(name) = file_name.strip_suffix(".profile.toml") {
            profiles.push((name.to_string(), path.clone()));
        }
    }
    profiles.sort();
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isthmus_ir::Primitive;

    #[test]
    fn profile_toml_round_trip() {
        let profile = Profile::java();
        let text = profile_to_toml(&profile).unwrap();
        assert!(text.contains("java.util.ArrayList"));
        let parsed = parse_profile_toml(&text).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn validate_reports_missing_primitives() {
        let mut profile = Profile::csharp();
        profile.primitives.remove(&Primitive::Binary);
        let issues = validate_profile(&profile).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, "error");
        assert!(issues[0].message.contains("binary"));
    }

    #[test]
    fn builtin_profiles_validate() {
        assert!(validate_profile(&Profile::cpp()).is_ok());
        assert!(validate_profile(&Profile::java()).is_ok());
    }

    #[test]
    fn load_missing_file() {
        let err = load_profile_toml(Path::new("/nonexistent/x.profile.toml")).unwrap_err();
        assert!(matches!(err, TargetError::NotFound { .. }));
    }

    #[test]
    fn discover_finds_profile_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("embedded.profile.toml"), profile_to_toml(&Profile::cpp()).unwrap())
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let found = discover_profiles(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "embedded");
    }
}
