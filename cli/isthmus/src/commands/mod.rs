//! CLI command implementations.

pub mod check;
pub mod generate;
pub mod init;
pub mod targets;

use std::path::Path;

use anyhow::{Context, Result};
use isthmus_bridge::TargetSetup;
use isthmus_ir::{DeclarationFile, Ir, IrBuilder};
use isthmus_targets::TargetLanguage;
use tracing::debug;

use crate::manifest::IsthmusManifest;

/// Load every declaration file the manifest lists and build the IR.
pub fn load_ir(project_dir: &Path, manifest: &IsthmusManifest) -> Result<Ir> {
    if manifest.generate.inputs.is_empty() {
        anyhow::bail!("no declaration files listed in [generate] inputs");
    }
    let mut builder = IrBuilder::new().with_default_deriving(manifest.generate.default_deriving.iter().copied());
    for input in &manifest.generate.inputs {
        let path = project_dir.join(input);
        let file = DeclarationFile::load(&path).with_context(|| format!("loading {}", path.display()))?;
        builder.extend(file.declarations);
    }
    let ir = builder.build().context("building IR")?;
    debug!(declarations = ir.len(), "built IR");
    Ok(ir)
}

/// Options and active profiles of the targets to generate.
pub fn target_setups(
    project_dir: &Path,
    manifest: &IsthmusManifest,
    only: Option<TargetLanguage>,
) -> Result<Vec<TargetSetup>> {
    manifest
        .target_configs(only)?
        .into_iter()
        .map(|config| {
            let profile = config
                .load_profile(project_dir)
                .with_context(|| format!("loading the {} profile", config.language()))?;
            Ok(TargetSetup {
                config,
                profile,
                support_lib: manifest.generate.support_lib,
            })
        })
        .collect()
}
