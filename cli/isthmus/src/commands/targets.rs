//! `isthmus targets`: list targets and print their active profiles.

use std::path::Path;

use anyhow::{Context, Result};
use isthmus_targets::parse::{discover_profiles, profile_to_toml, validate_profile};
use isthmus_ir::Side;
use isthmus_targets::{Profile, TargetLanguage};

use crate::manifest::IsthmusManifest;

type Project<'a> = Option<(&'a IsthmusManifest, &'a Path)>;

/// The profile a target generates with and where it comes from.
fn active_profile(language: TargetLanguage, project: Project<'_>) -> Result<(Profile, String)> {
    let builtin = || -> Result<(Profile, String)> { Ok((Profile::builtin(language), "builtin".to_string())) };
    let Some((manifest, dir)) = project else {
        return builtin();
    };
    let Some(config) = manifest.section(language) else {
        return builtin();
    };
    match config.profile_path() {
        Some(path) => {
            let profile = config
                .load_profile(dir)
                .with_context(|| format!("loading {}", path.display()))?;
            Ok((profile, path.display().to_string()))
        }
        None => builtin(),
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Native => "native",
        Side::Managed => "managed",
    }
}

/// List every target with its side, status and profile.
pub fn list(project: Project<'_>) -> Result<()> {
    println!("Targets:");
    println!();
    for language in TargetLanguage::ALL {
        let status = match project {
            Some((manifest, _)) if manifest.enabled_targets().contains(&language) => "enabled",
            Some(_) => "disabled",
            None => "-",
        };
        let (profile, source) = active_profile(language, project)?;
        println!(
            "  {:<8} {:<6} {:<8} {:<9} profile '{}' ({source})",
            language.key(),
            language.display_name(),
            side_label(language.side()),
            status,
            profile.name,
        );
    }

    if let Some((_, dir)) = project {
        let custom = discover_profiles(&dir.join("profiles"))?;
        if !custom.is_empty() {
            println!();
            println!("Profiles in {}:", dir.join("profiles").display());
            for (name, path) in custom {
                println!("  {name:<20} {}", path.display());
            }
        }
    }
    println!();
    println!("Use 'isthmus targets --profile <target>' to print a profile.");
    Ok(())
}

/// Print a target's active profile as TOML, followed by any validation issues.
pub fn show_profile(language: TargetLanguage, project: Project<'_>) -> Result<()> {
    let (profile, source) = active_profile(language, project)?;
    println!("# {} profile '{}' ({source})", language.display_name(), profile.name);
    print!("{}", profile_to_toml(&profile)?);
    if let Err(issues) = validate_profile(&profile) {
        for issue in issues {
            eprintln!("{}: {}", issue.severity, issue.message);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builtin_profiles_without_project() {
        for language in TargetLanguage::ALL {
            let (profile, source) = active_profile(language, None).unwrap();
            assert_eq!(profile, Profile::builtin(language));
            assert_eq!(source, "builtin");
        }
        assert!(list(None).is_ok());
        assert!(show_profile(TargetLanguage::Java, None).is_ok());
    }

    #[test]
    fn manifest_profile_is_loaded_from_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("profiles")).unwrap();
        let mut custom = Profile::java();
        custom.name = "android".into();
        fs::write(
            dir.path().join("profiles/android.profile.toml"),
            profile_to_toml(&custom).unwrap(),
        )
        .unwrap();
        let manifest = IsthmusManifest::from_str(
            "[project]\nname = \"p\"\n\n[java]\nprofile = \"profiles/android.profile.toml\"\n",
        )
        .unwrap();

        let project = Some((&manifest, dir.path()));
        let (profile, source) = active_profile(TargetLanguage::Java, project).unwrap();
        assert_eq!(profile.name, "android");
        assert_eq!(source, "profiles/android.profile.toml");
        let (cpp, _) = active_profile(TargetLanguage::Cpp, project).unwrap();
        assert_eq!(cpp, Profile::cpp());
        assert!(list(project).is_ok());
    }

    #[test]
    fn missing_profile_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest =
            IsthmusManifest::from_str("[project]\nname = \"p\"\n\n[csharp]\nprofile = \"nope.profile.toml\"\n").unwrap();
        assert!(show_profile(TargetLanguage::CSharp, Some((&manifest, dir.path()))).is_err());
    }
}
