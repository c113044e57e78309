//! Per-frame summary statistics
//!
//! One grouping pass over the merged rows produces [`GroupedStats`]; the
//! flattened statistics table and the mean-only table are both projections
//! of it, so they always share the same frame partition and values.

use std::collections::BTreeMap;

use crate::data::model::{CellValue, MergedDataset, FRAME_COLUMN};
use crate::error::{PipelineError, Result};

/// Statistic suffixes of the flattened table, in column order.
pub const STATISTICS: [&str; 4] = ["mean", "std", "sem", "count"];

/// Statistics of one field within one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN below two samples.
    pub std: f64,
    /// Standard error of the mean; NaN below two samples.
    pub sem: f64,
    /// Number of numeric, non-null samples.
    pub count: usize,
}

impl FieldStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                sem: f64::NAN,
                count,
            };
        }
        let n = count as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let (std, sem) = if count < 2 {
            (f64::NAN, f64::NAN)
        } else {
            let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            let std = variance.sqrt();
            (std, std / n.sqrt())
        };
        Self {
            mean,
            std,
            sem,
            count,
        }
    }
}

/// All selected fields of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStatistics {
    pub frame: i64,
    /// Aligned with [`GroupedStats::fields`].
    pub fields: Vec<FieldStats>,
}

/// Result of grouping the merged rows by frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedStats {
    pub fields: Vec<String>,
    /// Sorted by frame.
    pub frames: Vec<FrameStatistics>,
}

/// A small frame-keyed table ready for CSV output.
#[derive(Debug, Clone, PartialEq)]
pub struct StatTable {
    /// Header, starting with `Frame`.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl StatTable {
    /// Numeric cell at `row` for the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)?.as_f64()
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Group rows by frame and reduce every selected field. Non-numeric cells
/// (text left behind by a failed coercion, nulls) do not count as samples.
pub fn aggregate(merged: &MergedDataset, selected: &[String]) -> Result<GroupedStats> {
    let frame_idx = merged
        .column_index(FRAME_COLUMN)
        .ok_or_else(|| PipelineError::Validation {
            missing: vec![FRAME_COLUMN.to_string()],
        })?;

    let mut field_idx = Vec::with_capacity(selected.len());
    let mut missing = Vec::new();
    for name in selected {
        match merged.column_index(name) {
            Some(idx) => field_idx.push(idx),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::Validation { missing });
    }

    let mut groups: BTreeMap<i64, Vec<Vec<f64>>> = BTreeMap::new();
    for row in &merged.rows {
        let frame = match &row[frame_idx] {
            CellValue::Integer(i) => *i,
            CellValue::Float(f) if f.is_finite() => *f as i64,
            _ => continue,
        };
        let samples = groups
            .entry(frame)
            .or_insert_with(|| vec![Vec::new(); field_idx.len()]);
        for (slot, idx) in samples.iter_mut().zip(&field_idx) {
            if let Some(v) = row[*idx].as_f64() {
                if !v.is_nan() {
                    slot.push(v);
                }
            }
        }
    }

    let frames = groups
        .into_iter()
        .map(|(frame, samples)| FrameStatistics {
            frame,
            fields: samples.iter().map(|s| FieldStats::from_samples(s)).collect(),
        })
        .collect();

    Ok(GroupedStats {
        fields: selected.to_vec(),
        frames,
    })
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

impl GroupedStats {
    /// One row per frame with `{field}_{statistic}` columns.
    pub fn flattened(&self) -> StatTable {
        let mut columns = vec![FRAME_COLUMN.to_string()];
        for field in &self.fields {
            columns.extend(STATISTICS.iter().map(|stat| format!("{field}_{stat}")));
        }
        let rows = self
            .frames
            .iter()
            .map(|f| {
                let mut row = vec![CellValue::Integer(f.frame)];
                for s in &f.fields {
                    row.extend([
                        CellValue::Float(s.mean),
                        CellValue::Float(s.std),
                        CellValue::Float(s.sem),
                        CellValue::Integer(s.count as i64),
                    ]);
                }
                row
            })
            .collect();
        StatTable { columns, rows }
    }

    /// One row per frame with the mean of each field.
    pub fn means(&self) -> StatTable {
        let mut columns = vec![FRAME_COLUMN.to_string()];
        columns.extend(self.fields.iter().cloned());
        let rows = self
            .frames
            .iter()
            .map(|f| {
                std::iter::once(CellValue::Integer(f.frame))
                    .chain(f.fields.iter().map(|s| CellValue::Float(s.mean)))
                    .collect()
            })
            .collect();
        StatTable { columns, rows }
    }

    /// Frame numbers in order.
    pub fn frame_numbers(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.frame as f64).collect()
    }

    /// Per-frame values of one statistic for one field.
    pub fn series(&self, field: usize, pick: impl Fn(&FieldStats) -> f64) -> Vec<f64> {
        self.frames.iter().map(|f| pick(&f.fields[field])).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frames::frame_info;
    use crate::data::model::FrameRecord;
    use crate::data::normalize::merge_records;

    fn dataset() -> MergedDataset {
        let frame = |n: u32, values: &[(f64, &str)]| FrameRecord {
            info: frame_info(n, 5.0),
            source_file: format!("f{n}"),
            columns: vec!["Diameter".into(), "Perimeter".into()],
            rows: values
                .iter()
                .map(|(d, p)| vec![CellValue::Float(*d), CellValue::infer(p)])
                .collect(),
        };
        merge_records(&[
            frame(1, &[(1.0, "10"), (2.0, "20"), (3.0, "30")]),
            frame(2, &[(4.0, "")]),
            frame(3, &[(5.0, "7"), (9.0, "")]),
        ])
    }

    fn selected() -> Vec<String> {
        vec!["Diameter".into(), "Perimeter".into()]
    }

    #[test]
    fn computes_mean_std_sem_count() {
        let grouped = aggregate(&dataset(), &selected()).unwrap();
        let d = grouped.frames[0].fields[0];
        assert_eq!(d.mean, 2.0);
        assert!((d.std - 1.0).abs() < 1e-12);
        assert!((d.sem - 1.0 / 3f64.sqrt()).abs() < 1e-12);
        assert_eq!(d.count, 3);
    }

    #[test]
    fn spread_is_nan_exactly_below_two_samples() {
        let grouped = aggregate(&dataset(), &selected()).unwrap();
        for frame in &grouped.frames {
            for s in &frame.fields {
                if s.count < 2 {
                    assert!(s.std.is_nan() && s.sem.is_nan());
                } else {
                    assert!(s.std >= 0.0 && s.sem >= 0.0);
                }
            }
        }
        // Frame 2 Perimeter has no samples at all.
        let empty = grouped.frames[1].fields[1];
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
    }

    #[test]
    fn mean_view_matches_flattened_means() {
        let grouped = aggregate(&dataset(), &selected()).unwrap();
        let flat = grouped.flattened();
        let means = grouped.means();
        assert_eq!(flat.rows.len(), means.rows.len());
        for row in 0..means.rows.len() {
            assert_eq!(flat.value(row, "Frame"), means.value(row, "Frame"));
            for field in selected() {
                let m = means.value(row, &field).unwrap();
                let f = flat.value(row, &format!("{field}_mean")).unwrap();
                assert!(m == f || (m.is_nan() && f.is_nan()));
            }
        }
    }

    #[test]
    fn flattened_header_layout() {
        let flat = aggregate(&dataset(), &selected()).unwrap().flattened();
        assert_eq!(
            flat.columns,
            [
                "Frame",
                "Diameter_mean",
                "Diameter_std",
                "Diameter_sem",
                "Diameter_count",
                "Perimeter_mean",
                "Perimeter_std",
                "Perimeter_sem",
                "Perimeter_count",
            ]
        );
        assert_eq!(flat.rows.len(), 3);
    }

    #[test]
    fn unknown_field_is_validation_error() {
        let err = aggregate(&dataset(), &["Area".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { missing } if missing == ["Area"]));
    }
}
