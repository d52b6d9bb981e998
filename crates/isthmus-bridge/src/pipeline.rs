//! Generation pipeline orchestrator.

use std::collections::BTreeSet;
use std::path::PathBuf;

use isthmus_ir::{Ir, Side};
use isthmus_targets::{CppConfig, Profile, TargetConfig, TargetLanguage, ViewResolver};
use tracing::{debug, info, warn};

use crate::derive::derive_all;
use crate::emit::{emitter_for, runtime_files, EmitContext, GeneratedFile};
use crate::error::{GenerateError, Result};
use crate::report::GenerationReport;
use crate::shape::destructor_warning;

/// One enabled target: its options and the active profile.
#[derive(Debug, Clone)]
pub struct TargetSetup {
    pub config: TargetConfig,
    pub profile: Profile,
    /// Ship the runtime library sources alongside the generated code.
    pub support_lib: bool,
}

impl TargetSetup {
    /// A target using its builtin profile.
    pub fn builtin(config: TargetConfig) -> Self {
        let profile = Profile::builtin(config.language());
        Self {
            config,
            profile,
            support_lib: true,
        }
    }
}

/// Output of a successful generation run. Nothing has been written yet.
#[derive(Debug)]
pub struct GenerationOutput {
    /// Files anchored under each target's output directory, in target then
    /// declaration order.
    pub files: Vec<GeneratedFile>,
    pub report: GenerationReport,
}

/// Run the full generation pipeline:
/// derive capabilities -> prepare views -> select shapes -> emit -> report.
///
/// Every view resolver is prepared before anything is emitted, so a profile
/// missing a primitive fails the run without partial output.
pub fn generate(ir: &Ir, targets: &[TargetSetup]) -> Result<GenerationOutput> {
    info!(declarations = ir.len(), targets = targets.len(), "starting generation");

    // Stage 1: capabilities
    let plans = derive_all(ir)?;
    debug!(records = plans.len(), "derived record capabilities");

    // Stage 2: views; managed glue names native types as the C++ target spells them
    let native_setup = targets
        .iter()
        .find(|t| t.config.language() == TargetLanguage::Cpp)
        .cloned()
        .unwrap_or_else(|| TargetSetup::builtin(TargetConfig::Cpp(CppConfig::default())));
    let native = ViewResolver::new(ir, &native_setup.config, native_setup.profile)?;
    let mut views = Vec::with_capacity(targets.len());
    for target in targets {
        views.push(ViewResolver::new(ir, &target.config, target.profile.clone())?);
    }

    let mut report = GenerationReport {
        declarations: ir.len(),
        targets: targets.iter().map(|t| t.config.language()).collect(),
        ..GenerationReport::default()
    };
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();
    for (target, view) in targets.iter().zip(&views) {
        let language = target.config.language();
        let ctx = EmitContext {
            view,
            native: &native,
            config: &target.config,
            plans: &plans,
        };

        // Stage 3: shapes and their design-time warnings
        if language.side() == Side::Managed {
            for (id, _) in ir.iter() {
                let shapes = ctx.shapes(id);
                if let Some(warning) = destructor_warning(ir, id, &shapes) {
                    warn!(target = %language, "{warning}");
                    report.warnings.push(format!("{}: {warning}", language.key()));
                }
            }
        }

        // Stage 4: emission
        let emitter = emitter_for(language);
        let mut emitted = Vec::new();
        for (id, _) in ir.iter() {
            emitted.extend(emitter.emit_declaration(&ctx, id)?);
        }
        emitted.extend(emitter.support_files(&ctx)?);
        if target.support_lib {
            emitted.extend(runtime_files(language));
        }

        let out = target.config.out();
        for mut file in emitted {
            file.path = out.join(&file.path);
            if !seen.insert(file.path.clone()) {
                return Err(duplicate_path(language, file.path));
            }
            report.record(&file);
            files.push(file);
        }
        info!(
            target = %language,
            files = report.files_for(language).count(),
            out = %out.display(),
            "generated target"
        );
    }

    Ok(GenerationOutput { files, report })
}

fn duplicate_path(language: TargetLanguage, path: PathBuf) -> GenerateError {
    GenerateError::emit(
        language.display_name(),
        path.display().to_string(),
        "two declarations map to the same output file",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::testing::{config, shop_ir};
    use isthmus_targets::{JavaConfig, TargetError};

    fn setups() -> Vec<TargetSetup> {
        TargetLanguage::ALL
            .into_iter()
            .map(|language| TargetSetup::builtin(config(language)))
            .collect()
    }

    #[test]
    fn generates_every_target_in_order() {
        let ir = shop_ir();
        let output = generate(&ir, &setups()).unwrap();
        let targets: Vec<TargetLanguage> = output.files.iter().map(|f| f.target).collect();
        let mut sorted = targets.clone();
        sorted.sort();
        assert_eq!(targets, sorted);
        assert_eq!(output.report.files.len(), output.files.len());
        assert_eq!(output.report.declarations, ir.len());

        let paths: Vec<PathBuf> = output.files.iter().map(|f| f.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("generated/cpp/acme/shop/line_item.hpp")));
        assert!(paths.contains(&PathBuf::from("generated/java/com/acme/shop/Cart.java")));
        assert!(paths.contains(&PathBuf::from("generated/java/jni/com/acme/shop/NativeCart.hpp")));
        assert!(paths.contains(&PathBuf::from("generated/csharp/Acme/Shop/Cart.cs")));
        assert!(paths.contains(&PathBuf::from("generated/csharp/cabi/Acme/Shop/CartCabi.hpp")));
        assert!(paths.contains(&PathBuf::from("generated/csharp/Acme/NativeCompletion.cs")));
    }

    #[test]
    fn output_is_deterministic() {
        let ir = shop_ir();
        let first = generate(&ir, &setups()).unwrap();
        let second = generate(&ir, &setups()).unwrap();
        assert_eq!(first.files, second.files);
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn async_native_interfaces_warn_per_managed_target() {
        let ir = shop_ir();
        let output = generate(&ir, &setups()).unwrap();
        assert_eq!(output.report.warnings.len(), 2);
        assert!(output.report.warnings[0].starts_with("java: 'shop.cart'"));
        assert!(output.report.warnings[1].starts_with("csharp: 'shop.cart'"));
    }

    #[test]
    fn native_views_default_without_cpp_target() {
        let ir = shop_ir();
        let output = generate(&ir, &[TargetSetup::builtin(config(TargetLanguage::Java))]).unwrap();
        assert!(output.files.iter().all(|f| f.target == TargetLanguage::Java));
        let glue = output
            .files
            .iter()
            .find(|f| f.path.ends_with("jni/com/acme/shop/NativeCart.hpp"))
            .unwrap();
        assert!(glue.contents.contains("#include \"shop/cart.hpp\""));
    }

    #[test]
    fn incomplete_profile_fails_before_emission() {
        let ir = shop_ir();
        let mut setup = TargetSetup::builtin(TargetConfig::Java(JavaConfig::default()));
        setup.profile.primitives.remove(&isthmus_ir::Primitive::Date);
        let err = generate(&ir, &[setup]).unwrap_err();
        assert!(matches!(err, GenerateError::Target(TargetError::UnsupportedPrimitive { .. })));
    }

    #[test]
    fn runtime_library_ships_unless_disabled() {
        let ir = shop_ir();
        let output = generate(&ir, &setups()).unwrap();
        let paths: Vec<PathBuf> = output.files.iter().map(|f| f.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("generated/cpp/isthmus/runtime.hpp")));
        assert!(paths.contains(&PathBuf::from("generated/java/io/isthmus/runtime/Codecs.java")));
        assert!(paths.contains(&PathBuf::from("generated/java/jni/isthmus/jni.hpp")));
        assert!(paths.contains(&PathBuf::from("generated/csharp/Isthmus/Runtime/Codecs.cs")));
        assert!(paths.contains(&PathBuf::from("generated/csharp/cabi/isthmus/cabi.hpp")));

        let mut bare = setups();
        for setup in &mut bare {
            setup.support_lib = false;
        }
        let output = generate(&ir, &bare).unwrap();
        assert!(output.files.iter().all(|f| !f.path.to_string_lossy().contains("isthmus/runtime")));
        assert!(output.files.iter().all(|f| !f.path.ends_with("jni/isthmus/jni.hpp")));
        assert!(output.files.iter().all(|f| !f.path.ends_with("Isthmus/Runtime/Codecs.cs")));
    }

    #[test]
    fn colliding_output_paths_are_rejected() {
        let ir = shop_ir();
        let java = TargetSetup::builtin(config(TargetLanguage::Java));
        let err = generate(&ir, &[java.clone(), java]).unwrap_err();
        assert!(matches!(err, GenerateError::Emit { .. }));
    }
}
