use log::{info, warn};

use super::model::{
    CellValue, FrameRecord, MergedDataset, FRAME_COLUMN, SOURCE_FILE_COLUMN, TIME_MIN_COLUMN,
    TIME_SEC_COLUMN,
};
use crate::error::{PipelineError, Result};

const DERIVED_COLUMNS: [&str; 4] = [
    FRAME_COLUMN,
    TIME_SEC_COLUMN,
    TIME_MIN_COLUMN,
    SOURCE_FILE_COLUMN,
];

/// Outcome of the numeric coercion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercionReport {
    /// Columns coercion was attempted on, in merged-column order.
    pub attempted: Vec<String>,
    /// Columns left in their original representation.
    pub failed: Vec<String>,
}

/// Merge the frame records, check the selected columns and coerce the
/// numeric-intended columns.
pub fn normalize(
    records: &[FrameRecord],
    selected: &[String],
) -> Result<(MergedDataset, CoercionReport)> {
    let mut merged = merge_records(records);
    info!(
        "Merged data shape: ({}, {})",
        merged.len(),
        merged.columns.len()
    );
    check_selected(&merged, selected)?;
    let report = coerce_numeric(&mut merged, selected);
    Ok((merged, report))
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Concatenate records in the given order. The merged header is the union
/// of the per-file headers (each followed by the derived columns) in order
/// of first appearance.
pub fn merge_records(records: &[FrameRecord]) -> MergedDataset {
    let mut columns: Vec<String> = Vec::new();
    for rec in records {
        let names = rec
            .columns
            .iter()
            .map(String::as_str)
            .chain(DERIVED_COLUMNS);
        for name in names {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.to_string());
            }
        }
    }

    let position = |name: &str| columns.iter().position(|c| c == name);
    let total_rows = records.iter().map(|r| r.rows.len()).sum();
    let mut rows = Vec::with_capacity(total_rows);

    for rec in records {
        // Derived columns win over same-named file columns.
        let mapping: Vec<Option<usize>> = rec
            .columns
            .iter()
            .map(|c| {
                if DERIVED_COLUMNS.contains(&c.as_str()) {
                    None
                } else {
                    position(c)
                }
            })
            .collect();
        let derived = [
            (position(FRAME_COLUMN), CellValue::Integer(i64::from(rec.info.frame))),
            (position(TIME_SEC_COLUMN), CellValue::Float(rec.info.time_sec)),
            (position(TIME_MIN_COLUMN), CellValue::Float(rec.info.time_min)),
            (
                position(SOURCE_FILE_COLUMN),
                CellValue::Text(rec.source_file.clone()),
            ),
        ];

        for src in &rec.rows {
            let mut row = vec![CellValue::Null; columns.len()];
            for (cell, target) in src.iter().zip(&mapping) {
                if let Some(idx) = target {
                    row[*idx] = cell.clone();
                }
            }
            for (idx, value) in &derived {
                if let Some(idx) = idx {
                    row[*idx] = value.clone();
                }
            }
            rows.push(row);
        }
    }

    MergedDataset { columns, rows }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Fail with every selected column that the merged header lacks.
pub fn check_selected(merged: &MergedDataset, selected: &[String]) -> Result<()> {
    let missing: Vec<String> = selected
        .iter()
        .filter(|c| !merged.has_column(c))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation { missing })
    }
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Convert the numeric-intended columns to numbers. A column is attempted
/// once; if any of its text cells does not parse, the whole column keeps
/// its original cells and a warning is logged.
pub fn coerce_numeric(merged: &mut MergedDataset, selected: &[String]) -> CoercionReport {
    let mut report = CoercionReport::default();

    for idx in 0..merged.columns.len() {
        let name = &merged.columns[idx];
        let intended = merged.column(idx).all(|c| c.is_numeric() || c.is_null())
            || [FRAME_COLUMN, TIME_SEC_COLUMN, TIME_MIN_COLUMN].contains(&name.as_str())
            || selected.iter().any(|s| s == name);
        if !intended {
            continue;
        }
        report.attempted.push(name.clone());

        let parsed: Option<Vec<CellValue>> = merged
            .column(idx)
            .map(|cell| match cell {
                CellValue::Text(s) => s.trim().parse::<f64>().ok().map(CellValue::Float),
                other => Some(other.clone()),
            })
            .collect();

        match parsed {
            Some(values) => {
                for (row, value) in merged.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                warn!("Could not convert column '{name}' to numeric type");
                report.failed.push(name.clone());
            }
        }
    }

    info!(
        "Applied numeric formatting to {} columns",
        report.attempted.len() - report.failed.len()
    );
    report
}
