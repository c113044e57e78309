use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;

use crate::data::model::MergedDataset;
use crate::error::{PipelineError, Result};
use crate::stats::StatTable;

/// Value written into every field of the section separator row.
pub const SEPARATOR_SENTINEL: &str = "NaN";

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// Output paths of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub summary: PathBuf,
    pub chart: PathBuf,
}

impl ArtifactPaths {
    /// `<prefix>_raw_data_<ts>.csv`, `<prefix>_summary_stats_<ts>.csv` and
    /// `<prefix>_metrics_vs_frame.png` inside `output_dir`.
    pub fn new(output_dir: &Path, prefix: &str, timestamp: &str) -> Self {
        Self {
            raw: output_dir.join(format!("{prefix}_raw_data_{timestamp}.csv")),
            summary: output_dir.join(format!("{prefix}_summary_stats_{timestamp}.csv")),
            chart: output_dir.join(format!("{prefix}_metrics_vs_frame.png")),
        }
    }
}

/// Base name of the input directory, used to prefix every artifact.
pub fn dataset_prefix(input_dir: &Path) -> String {
    let resolved = input_dir
        .canonicalize()
        .unwrap_or_else(|_| input_dir.to_path_buf());
    resolved
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset")
        .to_string()
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Raw artifact: the merged rows with header, one separator row, then the
/// mean-only table with its own header.
pub fn write_raw(path: &Path, merged: &MergedDataset, means: &StatTable) -> Result<()> {
    let mut writer = open_writer(path)?;
    let err = |e| PipelineError::csv(path, e);

    writer.write_record(&merged.columns).map_err(err)?;
    for row in &merged.rows {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .map_err(err)?;
    }

    writer
        .write_record(std::iter::repeat(SEPARATOR_SENTINEL).take(merged.columns.len()))
        .map_err(err)?;

    write_table(&mut writer, means).map_err(err)?;
    writer.flush().map_err(|e| PipelineError::io(path, e))?;

    info!("Wrote raw data and averages to {}", path.display());
    Ok(())
}

/// Summary artifact: the flattened per-field statistics table.
pub fn write_summary(path: &Path, table: &StatTable) -> Result<()> {
    let mut writer = open_writer(path)?;
    write_table(&mut writer, table).map_err(|e| PipelineError::csv(path, e))?;
    writer.flush().map_err(|e| PipelineError::io(path, e))?;

    info!("Wrote summary stats to {}", path.display());
    Ok(())
}

fn open_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(csv::WriterBuilder::new().flexible(true).from_writer(file))
}

fn write_table(writer: &mut csv::Writer<File>, table: &StatTable) -> csv::Result<()> {
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    Ok(())
}
