//! `isthmus check`: run the whole pipeline in memory and report problems.

use std::path::Path;

use anyhow::{Context, Result};
use isthmus_bridge::generate;

use super::{load_ir, target_setups};
use crate::manifest::IsthmusManifest;

pub fn run(project_dir: &Path, manifest: &IsthmusManifest) -> Result<()> {
    let ir = load_ir(project_dir, manifest)?;
    let setups = target_setups(project_dir, manifest, None)?;
    let output = generate(&ir, &setups).context("generating bindings")?;

    for warning in &output.report.warnings {
        println!("warning: {warning}");
    }
    let targets: Vec<&str> = output.report.targets.iter().map(|t| t.key()).collect();
    println!(
        "ok: {} declarations, {} files for {}",
        ir.len(),
        output.files.len(),
        targets.join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(declarations: &str, manifest: &str) -> (tempfile::TempDir, IsthmusManifest) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("decls.toml"), declarations).unwrap();
        (dir, IsthmusManifest::from_str(manifest).unwrap())
    }

    const MANIFEST: &str = "[project]\nname = \"p\"\n\n[generate]\ninputs = [\"decls.toml\"]\ntargets = [\"java\"]\n";

    #[test]
    fn valid_project_writes_nothing() {
        let (dir, manifest) = project(
            "[[declarations]]\nname = \"point\"\nkind = \"record\"\nfields = [{ name = \"x\", type = \"f64\" }]\n",
            MANIFEST,
        );
        run(dir.path(), &manifest).unwrap();
        assert!(!dir.path().join("generated").exists());
    }

    #[test]
    fn ord_on_unordered_field_fails() {
        let (dir, manifest) = project(
            "[[declarations]]\nname = \"bag\"\nkind = \"record\"\nderiving = [\"ord\"]\nfields = [{ name = \"xs\", type = \"map<string, i32>\" }]\n",
            MANIFEST,
        );
        let err = run(dir.path(), &manifest).unwrap_err();
        assert!(format!("{err:#}").contains("no natural order"));
    }

    #[test]
    fn missing_inputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = IsthmusManifest::from_str("[project]\nname = \"p\"\n\n[cpp]\n").unwrap();
        assert!(run(dir.path(), &manifest).is_err());

        let manifest = IsthmusManifest::from_str(MANIFEST).unwrap();
        let err = run(dir.path(), &manifest).unwrap_err();
        assert!(format!("{err:#}").contains("decls.toml"));
    }
}
