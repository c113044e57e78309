use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::model::{CellValue, FrameInfo, FrameRecord, InputFile};
use crate::error::{PipelineError, Result};
use crate::planner::ExecutionPlan;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse every assigned file and return the records in frame order.
///
/// With a parallel plan the files are spread over a pool of
/// `plan.worker_count` threads. Each worker only reads its own files; the
/// frame order is restored after the join.
pub fn load_frames(
    assigned: &[(FrameInfo, InputFile)],
    plan: &ExecutionPlan,
) -> Result<Vec<FrameRecord>> {
    let mut records = if plan.parallel && plan.worker_count > 1 && assigned.len() > 1 {
        load_parallel(assigned, plan.worker_count)?
    } else {
        load_sequential(assigned)?
    };
    records.sort_by_key(|r| r.info.frame);
    Ok(records)
}

fn load_sequential(assigned: &[(FrameInfo, InputFile)]) -> Result<Vec<FrameRecord>> {
    assigned
        .iter()
        .map(|(info, file)| read_frame_file(*info, file))
        .collect()
}

fn load_parallel(
    assigned: &[(FrameInfo, InputFile)],
    workers: usize,
) -> Result<Vec<FrameRecord>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.min(assigned.len()))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

    let outcomes: Vec<Result<FrameRecord>> = pool.install(|| {
        assigned
            .par_iter()
            .map(|(info, file)| read_frame_file(*info, file))
            .collect()
    });

    outcomes.into_iter().collect()
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one measured object per row.
/// Cell types are guessed per field and short rows are padded with nulls.
/// A row with more fields than the header is an error.
pub fn read_frame_file(info: FrameInfo, file: &InputFile) -> Result<FrameRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&file.path)
        .map_err(|e| PipelineError::csv(&file.path, e))?;

    let header = reader
        .headers()
        .map_err(|e| PipelineError::csv(&file.path, e))?;
    let columns = dedupe_header(header.iter());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| PipelineError::csv(&file.path, e))?;
        if record.len() > columns.len() {
            return Err(PipelineError::MalformedRow {
                path: file.path.clone(),
                line: record.position().map_or(0, |p| p.line()),
                expected: columns.len(),
                found: record.len(),
            });
        }
        let mut row: Vec<CellValue> = record.iter().map(CellValue::infer).collect();
        row.resize(columns.len(), CellValue::Null);
        rows.push(row);
    }

    debug!(
        "Frame {}: {} rows x {} columns from {}",
        info.frame,
        rows.len(),
        columns.len(),
        file.name
    );

    Ok(FrameRecord {
        info,
        source_file: file.name.clone(),
        columns,
        rows,
    })
}

/// Repeated header names get `.1`, `.2`, ... suffixes so no column is
/// shadowed by a later one with the same name.
pub fn dedupe_header<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 1;
        while columns.contains(&candidate) {
            candidate = format!("{name}.{n}");
            n += 1;
        }
        columns.push(candidate);
    }
    columns
}
