//! Extra trust anchors for upstream registries.
//!
//! Some upstreams are only reachable with private CAs. Every `*.pem` file in
//! the configured directory is loaded and added on top of the system roots.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::RegistryError;

/// Loads every certificate from the `*.pem` files directly inside `dir`.
///
/// A file may hold several certificates. A missing directory, or one without
/// PEM files, yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file cannot be
/// read or parsed.
pub fn load_extra_certs(dir: &Path) -> Result<Vec<reqwest::Certificate>, RegistryError> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Certificate directory not found");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| RegistryError::IoError {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let is_pem = entry.path().extension().is_some_and(|ext| ext == "pem");
        if entry.file_type().is_file() && is_pem {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        tracing::debug!(dir = %dir.display(), "No certificates found");
    }

    let mut certs = Vec::new();
    for path in files {
        let pem = std::fs::read(&path).map_err(|source| RegistryError::IoError {
            path: path.clone(),
            source,
        })?;
        let bundle = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
            RegistryError::InvalidCertificate {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        if bundle.is_empty() {
            tracing::debug!(cert = %path.display(), "No certificate in file");
            continue;
        }
        tracing::debug!(cert = %path.display(), count = bundle.len(), "Extra certificate imported");
        certs.extend(bundle);
    }

    Ok(certs)
}
