//! isthmus CLI: generate cross-language bindings from IDL declaration files.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isthmus_targets::TargetLanguage;
use tracing_subscriber::EnvFilter;

use manifest::IsthmusManifest;

#[derive(Parser)]
#[command(name = "isthmus", version, about = "Cross-language binding generator")]
struct Cli {
    /// Log progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Manifest to use instead of searching upward for isthmus.toml
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new isthmus project
    Init {
        /// Project name
        name: String,
    },
    /// Generate bindings for every enabled target
    Generate {
        /// Generate a single target (cpp, java, csharp)
        #[arg(long)]
        target: Option<TargetLanguage>,
        /// Print the report without writing any file
        #[arg(long)]
        dry_run: bool,
        /// Write the processed-files report here instead of the manifest's path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate declarations and target setup without writing anything
    Check,
    /// List targets and their profiles
    Targets {
        /// Print this target's active profile as TOML
        #[arg(long)]
        profile: Option<TargetLanguage>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&cwd.join(&name), &name),

        Commands::Generate {
            target,
            dry_run,
            report,
        } => {
            let (manifest, project_dir) = load_manifest(&cwd, cli.manifest.as_deref())?;
            commands::generate::run(&project_dir, &manifest, target, dry_run, report.as_deref())
        }

        Commands::Check => {
            let (manifest, project_dir) = load_manifest(&cwd, cli.manifest.as_deref())?;
            commands::check::run(&project_dir, &manifest)
        }

        Commands::Targets { profile } => {
            let project = load_manifest_optional(&cwd, cli.manifest.as_deref())?;
            let project = project.as_ref().map(|(manifest, dir)| (manifest, dir.as_path()));
            match profile {
                Some(language) => commands::targets::show_profile(language, project),
                None => commands::targets::list(project),
            }
        }
    }
}

fn load_manifest(cwd: &Path, explicit: Option<&Path>) -> Result<(IsthmusManifest, PathBuf)> {
    load_manifest_optional(cwd, explicit)?
        .with_context(|| format!("no {} found in {} or any parent directory", manifest::MANIFEST_FILE, cwd.display()))
}

fn load_manifest_optional(cwd: &Path, explicit: Option<&Path>) -> Result<Option<(IsthmusManifest, PathBuf)>> {
    match explicit {
        Some(path) => {
            let path = cwd.join(path);
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
            Ok(Some((IsthmusManifest::load(&path)?, dir)))
        }
        None => IsthmusManifest::find_and_load(cwd),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Full workflow: init -> check -> generate.
    #[test]
    fn init_check_generate_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("demo");

        commands::init::run(&project_path, "demo").unwrap();
        assert!(project_path.join("isthmus.toml").is_file());
        assert!(project_path.join("idl/demo.toml").is_file());

        let (manifest, project_dir) = load_manifest(&project_path, None).unwrap();
        assert_eq!(project_dir, project_path);
        commands::check::run(&project_dir, &manifest).unwrap();

        commands::generate::run(&project_dir, &manifest, None, false, None).unwrap();
        assert!(project_path.join("generated/cpp/demo/demo/greeting.hpp").is_file());
        assert!(project_path.join("generated/java/com/example/demo/demo/Greeter.java").is_file());
        assert!(project_path.join("generated/report.json").is_file());
    }

    #[test]
    fn explicit_manifest_sets_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("custom.toml"), "[project]\nname = \"c\"\n").unwrap();
        let (manifest, project_dir) = load_manifest(Path::new("/"), Some(&dir.path().join("custom.toml"))).unwrap();
        assert_eq!(manifest.project.name, "c");
        assert_eq!(project_dir, dir.path());
    }
}
