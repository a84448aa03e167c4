//! Up-to-date checks for compile passes
use crate::compiler::CompilationAction;
use crate::error::{BuildError, BuildResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// File holding the fingerprint of the last successful pass, inside its output directory
pub const FINGERPRINT_FILE: &str = ".anvil-fingerprint";

/// Decides whether a compile pass can be skipped
pub trait UpToDateCheck: Send + Sync {
    fn is_up_to_date(&self, action: &CompilationAction) -> bool;

    /// Remember that `action` completed successfully
    fn record(&self, _action: &CompilationAction) -> BuildResult<()> {
        Ok(())
    }
}

/// Always recompiles
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverUpToDate;

impl UpToDateCheck for NeverUpToDate {
    fn is_up_to_date(&self, _action: &CompilationAction) -> bool {
        false
    }
}

/// Compares a SHA-256 over sources, classpath contents, flags and output dir with the stored one
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintCheck;

impl FingerprintCheck {
    /// Fingerprint of `action`, or `None` if a source file cannot be read
    ///
    /// Classpath directories are walked in name order. Missing classpath
    /// entries hash as their path alone.
    pub fn compute(action: &CompilationAction) -> Option<String> {
        let mut hasher = Sha256::new();
        hasher.update(action.output_dir.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update([action.compiler_separate_process as u8]);

        for flag in action.flags.iter().chain(&action.extra_args) {
            hasher.update(flag.as_bytes());
            hasher.update([0u8]);
        }
        for dep in &action.dependencies {
            hasher.update(dep.path.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hash_classpath_entry(&mut hasher, &dep.path)?;
        }

        let mut sources = action.source_files.clone();
        sources.sort();
        for source in &sources {
            hasher.update(source.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(source).ok()?);
        }

        Some(format!("{:x}", hasher.finalize()))
    }
}

fn hash_classpath_entry(hasher: &mut Sha256, entry: &Path) -> Option<()> {
    if entry.is_file() {
        hasher.update(fs::read(entry).ok()?);
        return Some(());
    }
    for file in WalkDir::new(entry)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() != FINGERPRINT_FILE)
    {
        let relative = file.path().strip_prefix(entry).unwrap_or(file.path());
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(fs::read(file.path()).ok()?);
    }
    Some(())
}

impl UpToDateCheck for FingerprintCheck {
    fn is_up_to_date(&self, action: &CompilationAction) -> bool {
        let stored = match fs::read_to_string(action.output_dir.join(FINGERPRINT_FILE)) {
            Ok(stored) => stored,
            Err(_) => return false,
        };
        Self::compute(action).is_some_and(|current| current == stored.trim())
    }

    fn record(&self, action: &CompilationAction) -> BuildResult<()> {
        let Some(fingerprint) = Self::compute(action) else {
            return Ok(());
        };
        let path = action.output_dir.join(FINGERPRINT_FILE);
        fs::write(&path, fingerprint).map_err(|e| BuildError::io(path, e))
    }
}
