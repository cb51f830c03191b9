use crate::error::{DmmError, Result};
use std::path::{Path, PathBuf};

/// Provides safe path validation helpers for the manifest the tool reads and rewrites.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises the manifest path. The manifest must be an
    /// existing regular file outside system directories.
    pub fn validate_manifest_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| DmmError::ManifestNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !canonical.is_file() {
            return Err(DmmError::ManifestNotFound {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(DmmError::InvalidArgument(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }

            if let Ok(canonical_forbidden) = forbidden_path.canonicalize() {
                if canonical.starts_with(&canonical_forbidden) {
                    return Err(DmmError::InvalidArgument(format!(
                        "Access to system directory '{}' is not allowed",
                        forbidden
                    )));
                }
            }
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn accepts_existing_manifest() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("deps.ts");
        fs::write(&manifest, "export {};\n").unwrap();
        assert!(PathValidator::validate_manifest_path(&manifest).is_ok());
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempdir().unwrap();
        let err = PathValidator::validate_manifest_path(dir.path().join("deps.ts")).unwrap_err();
        assert!(matches!(err, DmmError::ManifestNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_manifest() {
        let dir = tempdir().unwrap();
        let err = PathValidator::validate_manifest_path(dir.path()).unwrap_err();
        assert!(matches!(err, DmmError::ManifestNotFound { .. }));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn rejects_system_directory() {
        let err = PathValidator::validate_manifest_path("/etc/hostname");
        assert!(err.is_err());
    }
}
