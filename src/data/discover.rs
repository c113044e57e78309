use std::path::Path;

use log::info;

use super::model::InputFile;
use crate::error::{PipelineError, Result};

/// Default filename suffix of per-frame measurement files.
pub const DEFAULT_SUFFIX: &str = "_morphometry_results.csv";

/// List the regular files in `dir` whose name ends with `suffix`, sorted
/// lexicographically by file name.
pub fn discover_files(dir: &Path, suffix: &str) -> Result<Vec<InputFile>> {
    if !dir.is_dir() {
        return Err(PipelineError::NotFound(format!(
            "input folder not found: {}",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.ends_with(suffix) {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| PipelineError::io(entry.path(), e))?;
        if !meta.is_file() {
            continue;
        }
        files.push(InputFile {
            path: entry.path(),
            name,
            size: meta.len(),
        });
    }

    if files.is_empty() {
        return Err(PipelineError::NotFound(format!(
            "no files matching '*{suffix}' in {}",
            dir.display()
        )));
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    let total: u64 = files.iter().map(|f| f.size).sum();
    info!(
        "Found {} files totaling {:.2} MB in {}",
        files.len(),
        total as f64 / 1e6,
        dir.display()
    );
    Ok(files)
}
