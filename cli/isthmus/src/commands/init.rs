//! `isthmus init`: create a project skeleton.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{IsthmusManifest, MANIFEST_FILE};

fn sample_declarations(name: &str) -> String {
    format!(
        r#"namespace = "{name}"

[[declarations]]
name = "greeting"
kind = "record"
comment = "A message and how often it was sent."
fields = [
    {{ name = "message", type = "string" }},
    {{ name = "count", type = "i32" }},
]

[[declarations]]
name = "greeter"
kind = "interface"
implemented-by = ["native"]
methods = [
    {{ name = "greet", params = [{{ name = "who", type = "string" }}], returns = "greeting" }},
]
"#
    )
}

/// Create `isthmus.toml` and a sample declaration file in `project_dir`.
pub fn run(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.join(MANIFEST_FILE).exists() {
        bail!("{} already contains {MANIFEST_FILE}", project_dir.display());
    }
    let idl_dir = project_dir.join("idl");
    fs::create_dir_all(&idl_dir).with_context(|| format!("creating {}", idl_dir.display()))?;
    fs::write(project_dir.join(MANIFEST_FILE), IsthmusManifest::template(name))
        .with_context(|| format!("writing {MANIFEST_FILE}"))?;
    let idl = idl_dir.join(format!("{name}.toml"));
    fs::write(&idl, sample_declarations(name)).with_context(|| format!("writing {}", idl.display()))?;
    println!("Created project '{name}' in {}", project_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isthmus_ir::DeclarationFile;

    #[test]
    fn creates_manifest_and_declarations() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("demo");
        run(&project, "demo").unwrap();
        let manifest = IsthmusManifest::load(&project.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.project.name, "demo");
        let file = DeclarationFile::load(&project.join("idl/demo.toml")).unwrap();
        assert_eq!(file.declarations.len(), 2);
    }

    #[test]
    fn refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), "demo").unwrap();
        assert!(run(dir.path(), "demo").is_err());
    }
}
