//! `isthmus generate`: build the IR, generate every target, write the files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use isthmus_bridge::{generate, GeneratedFile};
use isthmus_targets::TargetLanguage;
use tracing::debug;

use super::{load_ir, target_setups};
use crate::manifest::IsthmusManifest;

pub fn run(
    project_dir: &Path,
    manifest: &IsthmusManifest,
    target: Option<TargetLanguage>,
    dry_run: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let ir = load_ir(project_dir, manifest)?;
    let setups = target_setups(project_dir, manifest, target)?;
    let output = generate(&ir, &setups).context("generating bindings")?;

    if dry_run {
        print!("{}", output.report);
        return Ok(());
    }

    let written = write_files(project_dir, &output.files)?;
    if let Some(path) = report_path.or(manifest.generate.report.as_deref()) {
        let path = project_dir.join(path);
        let json = output.report.to_json().context("serializing report")?;
        write_file(&path, &json)?;
    }
    println!(
        "Generated {} files for {} ({} changed)",
        output.files.len(),
        manifest.project.name,
        written
    );
    Ok(())
}

/// Write generated files under `project_dir`, leaving unchanged files
/// untouched. Returns how many were written.
pub fn write_files(project_dir: &Path, files: &[GeneratedFile]) -> Result<usize> {
    let mut written = 0;
    for file in files {
        let path = project_dir.join(&file.path);
        if fs::read_to_string(&path).is_ok_and(|existing| existing == file.contents) {
            debug!(path = %path.display(), "unchanged");
            continue;
        }
        write_file(&path, &file.contents)?;
        written += 1;
    }
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"
namespace = "shop"

[[declarations]]
name = "color"
kind = "enum"
items = ["red", "green"]

[[declarations]]
name = "cart"
kind = "interface"
methods = [{ name = "paint", params = [{ name = "color", type = "color" }] }]
"#;

    fn project(manifest: &str) -> (tempfile::TempDir, IsthmusManifest) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("idl")).unwrap();
        fs::write(dir.path().join("idl/shop.toml"), SHOP).unwrap();
        (dir, IsthmusManifest::from_str(manifest).unwrap())
    }

    const MANIFEST: &str = r#"
[project]
name = "shop"

[generate]
inputs = ["idl/shop.toml"]
report = "gen/report.json"

[cpp]
out = "gen/cpp"

[csharp]
out = "gen/cs"
namespace = "Acme"
"#;

    #[test]
    fn writes_files_and_report() {
        let (dir, manifest) = project(MANIFEST);
        run(dir.path(), &manifest, None, false, None).unwrap();
        assert!(dir.path().join("gen/cpp/shop/color.hpp").is_file());
        assert!(dir.path().join("gen/cs/Acme/Shop/Cart.cs").is_file());
        assert!(dir.path().join("gen/cs/cabi/Acme/Shop/CartCabi.hpp").is_file());
        assert!(dir.path().join("gen/cpp/isthmus/runtime.hpp").is_file());
        assert!(dir.path().join("gen/cs/Isthmus/Runtime/Codecs.cs").is_file());

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("gen/report.json")).unwrap()).unwrap();
        let files = report["files"].as_array().unwrap();
        assert!(files.iter().any(|f| f["path"] == "gen/cpp/shop/cart.hpp"));
        assert!(files.iter().all(|f| f["sha256"].as_str().unwrap().len() == 64));
    }

    #[test]
    fn single_target_and_dry_run() {
        let (dir, manifest) = project(MANIFEST);
        run(dir.path(), &manifest, Some(TargetLanguage::Cpp), false, None).unwrap();
        assert!(dir.path().join("gen/cpp/shop/cart.hpp").is_file());
        assert!(!dir.path().join("gen/cs").exists());

        let (dir, manifest) = project(MANIFEST);
        run(dir.path(), &manifest, None, true, None).unwrap();
        assert!(!dir.path().join("gen").exists());
    }

    #[test]
    fn rerun_rewrites_nothing() {
        let (dir, manifest) = project(MANIFEST);
        let ir = load_ir(dir.path(), &manifest).unwrap();
        let setups = target_setups(dir.path(), &manifest, None).unwrap();
        let output = generate(&ir, &setups).unwrap();
        assert_eq!(write_files(dir.path(), &output.files).unwrap(), output.files.len());
        assert_eq!(write_files(dir.path(), &output.files).unwrap(), 0);
    }

    #[test]
    fn invalid_declarations_write_nothing() {
        let (dir, manifest) = project(MANIFEST);
        fs::write(
            dir.path().join("idl/shop.toml"),
            "[[declarations]]\nname = \"r\"\nkind = \"record\"\nfields = [{ name = \"x\", type = \"missing\" }]\n",
        )
        .unwrap();
        let err = run(dir.path(), &manifest, None, false, None).unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
        assert!(!dir.path().join("gen").exists());
    }
}
