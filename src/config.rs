use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::discover::DEFAULT_SUFFIX;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Everything one pipeline run needs. Loadable from JSON; missing optional
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Columns to summarise and plot.
    pub columns: Vec<String>,
    /// Seconds between consecutive frames.
    pub interval_secs: f64,
    /// Opt in to parallel parsing. The planner may still run sequentially.
    pub parallel: bool,
    /// Polynomial trend degree; 0 disables the fit.
    pub poly_degree: u32,
    pub error_bars: bool,
    pub file_suffix: String,
    /// Run timestamp embedded in artifact names.
    pub timestamp: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            columns: Vec::new(),
            interval_secs: 5.0,
            parallel: false,
            poly_degree: 0,
            error_bars: false,
            file_suffix: DEFAULT_SUFFIX.to_string(),
            timestamp: None,
        }
    }
}

impl RunConfig {
    /// Read a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))
    }

    /// Check the configuration before any processing happens.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(PipelineError::Config("no columns selected".into()));
        }
        if !(self.interval_secs.is_finite() && self.interval_secs > 0.0) {
            return Err(PipelineError::Config(format!(
                "frame interval must be a positive number of seconds, got {}",
                self.interval_secs
            )));
        }
        if self.file_suffix.is_empty() {
            return Err(PipelineError::Config("file suffix is empty".into()));
        }
        if !self.input_dir.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "input folder not found: {}",
                self.input_dir.display()
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "output folder not found: {}",
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}
