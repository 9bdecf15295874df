use std::path::Path;

use crate::errors::BenchError;
use crate::types::SampleDescriptor;

/// Scan `dir` for sample files, sorted lexically by file name.
///
/// Only direct children are considered; subdirectories and hidden files are
/// skipped. An empty `extensions` list accepts every regular file.
pub fn list_samples(dir: &Path, extensions: &[String]) -> Result<Vec<SampleDescriptor>, BenchError> {
    if !dir.is_dir() {
        return Err(BenchError::SamplesDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| BenchError::SamplesDirUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut samples = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let path = entry.path();
        let id = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        if id.starts_with('.') || !path.is_file() {
            continue;
        }

        if !extensions.is_empty() {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !extensions.iter().any(|wanted| wanted == ext) {
                continue;
            }
        }

        samples.push(SampleDescriptor { id, path });
    }

    if samples.is_empty() {
        return Err(BenchError::NoSamplesFound {
            path: dir.to_path_buf(),
        });
    }

    samples.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(samples)
}

/// Resolve a fixed list of sample names against `dir`, keeping the given order.
pub fn select_samples(dir: &Path, names: &[String]) -> Result<Vec<SampleDescriptor>, BenchError> {
    if !dir.is_dir() {
        return Err(BenchError::SamplesDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    if names.is_empty() {
        return Err(BenchError::NoSamplesFound {
            path: dir.to_path_buf(),
        });
    }

    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(BenchError::SampleNotFound { path });
            }
            Ok(SampleDescriptor {
                id: name.clone(),
                path,
            })
        })
        .collect()
}
