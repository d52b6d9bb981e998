//! Processed-files report of one generation run.

use std::fmt;
use std::path::PathBuf;

use isthmus_targets::TargetLanguage;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::emit::GeneratedFile;

/// One file the run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Target the file was generated for.
    pub target: TargetLanguage,
    /// Path under the target's output directory.
    pub path: PathBuf,
    /// SHA-256 of the contents, lowercase hex.
    pub sha256: String,
    /// Length of the contents in bytes.
    pub bytes: usize,
}

/// Summary of everything a generation run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Declarations in the IR the run was given.
    pub declarations: usize,
    pub targets: Vec<TargetLanguage>,
    pub files: Vec<FileEntry>,
    /// Design-time warnings, e.g. native destructors racing async calls.
    pub warnings: Vec<String>,
}

impl GenerationReport {
    pub fn record(&mut self, file: &GeneratedFile) {
        self.files.push(FileEntry {
            target: file.target,
            path: file.path.clone(),
            sha256: sha256_hex(file.contents.as_bytes()),
            bytes: file.contents.len(),
        });
    }

    pub fn files_for(&self, target: TargetLanguage) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(move |f| f.target == target)
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Generation Report ===")?;
        writeln!(f, "Declarations: {}", self.declarations)?;
        writeln!(f, "Files: {} ({} bytes)", self.files.len(), self.total_bytes())?;

        for target in &self.targets {
            let files: Vec<&FileEntry> = self.files_for(*target).collect();
            writeln!(f)?;
            writeln!(f, "--- {} ({} files) ---", target.display_name(), files.len())?;
            for file in files {
                writeln!(f, "  {} ({} bytes, sha256:{:.12})", file.path.display(), file.bytes, file.sha256)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Warnings ({}) ---", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  {warning}")?;
            }
        }
        Ok(())
    }
}
