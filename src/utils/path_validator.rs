use crate::error::{DepsError, Result};
use std::path::{Path, PathBuf};

const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Checks command-line paths before any file is read or written.
pub struct PathValidator;

impl PathValidator {
    /// An input file (manifest or inventory) must exist and be a regular file.
    pub fn validate_input_file(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            DepsError::InvalidInput(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_file() {
            return Err(DepsError::InvalidInput(format!(
                "Path '{}' is not a file",
                path.display()
            )));
        }

        Self::reject_system_path(path, &canonical)?;
        Ok(canonical)
    }

    /// An output file may not exist yet, but its directory must.
    pub fn validate_output_file(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if path.is_dir() {
            return Err(DepsError::InvalidInput(format!(
                "Output path '{}' is a directory",
                path.display()
            )));
        }

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let canonical_parent = parent.canonicalize().map_err(|e| {
            DepsError::InvalidInput(format!(
                "Output directory '{}' is not accessible: {e}",
                parent.display()
            ))
        })?;

        Self::reject_system_path(parent, &canonical_parent)
    }

    fn reject_system_path(path: &Path, canonical: &Path) -> Result<()> {
        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            let inside = path.starts_with(forbidden_path)
                || canonical.starts_with(forbidden_path)
                || forbidden_path
                    .canonicalize()
                    .is_ok_and(|resolved| canonical.starts_with(resolved));

            if inside {
                return Err(DepsError::InvalidInput(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(())
    }
}
