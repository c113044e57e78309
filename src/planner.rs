//! Execution Planner
//!
//! Chooses between sequential and parallel file parsing from a disk write
//! benchmark and the number of selected columns.
//!
//! Decision policy, first match wins:
//! - throughput below [`MIN_THROUGHPUT_MBS`] runs sequentially
//! - [`MAX_SEQUENTIAL_COLUMNS`] or fewer selected columns run sequentially
//! - otherwise parallel with `min(cpu_count, MAX_WORKERS)` workers
//!
//! The caller's opt-in flag is AND-ed with the decision.
//!
//! The same module samples CPU load, which together with the measured
//! throughput feeds the chart rendering estimate.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{info, warn};
use sysinfo::System;

use crate::error::{PipelineError, Result};

/// Throughput below which parallel I/O is not worth it.
pub const MIN_THROUGHPUT_MBS: f64 = 50.0;
/// Column count at or below which parallel overhead dominates.
pub const MAX_SEQUENTIAL_COLUMNS: usize = 2;
/// Upper bound on worker threads.
pub const MAX_WORKERS: usize = 8;

/// Name of the benchmark scratch file inside the output directory.
pub const SCRATCH_FILE_NAME: &str = "disk_test.tmp";

/// How the run parses its input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub parallel: bool,
    pub worker_count: usize,
}

impl ExecutionPlan {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            worker_count: 1,
        }
    }
}

/// Why the planner picked its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanReason {
    SlowDisk,
    FewColumns,
    Adequate,
}

/// Pure plan decision. `cpu_count` is clamped to at least one.
pub fn choose_plan(
    throughput_mbs: f64,
    selected_columns: usize,
    cpu_count: usize,
    caller_opt_in: bool,
) -> ExecutionPlan {
    let (plan, _) = choose_plan_with_reason(throughput_mbs, selected_columns, cpu_count, caller_opt_in);
    plan
}

pub fn choose_plan_with_reason(
    throughput_mbs: f64,
    selected_columns: usize,
    cpu_count: usize,
    caller_opt_in: bool,
) -> (ExecutionPlan, PlanReason) {
    // NaN throughput fails the comparison below, so test "not at least".
    let reason = if !(throughput_mbs >= MIN_THROUGHPUT_MBS) {
        PlanReason::SlowDisk
    } else if selected_columns <= MAX_SEQUENTIAL_COLUMNS {
        PlanReason::FewColumns
    } else {
        PlanReason::Adequate
    };

    let plan = if reason == PlanReason::Adequate && caller_opt_in {
        ExecutionPlan {
            parallel: true,
            worker_count: cpu_count.clamp(1, MAX_WORKERS),
        }
    } else {
        ExecutionPlan::sequential()
    };
    (plan, reason)
}

/// Number of CPUs available to this process.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Benchmark through `meter` and pick the plan for this run. Returns the
/// plan together with the measured throughput in MB/s.
pub fn plan_run(
    meter: &dyn ThroughputMeter,
    output_dir: &Path,
    selected_columns: usize,
    caller_opt_in: bool,
) -> Result<(ExecutionPlan, f64)> {
    info!("Estimating system performance (disk I/O)...");
    let throughput = meter.measure(output_dir)?;
    let cpus = cpu_count();
    let (plan, reason) = choose_plan_with_reason(throughput, selected_columns, cpus, caller_opt_in);

    info!(
        "Disk write speed: {throughput:.2} MB/s, {selected_columns} columns selected \
         (thresholds: >= {MIN_THROUGHPUT_MBS} MB/s, > {MAX_SEQUENTIAL_COLUMNS} columns)"
    );
    match reason {
        PlanReason::SlowDisk => {
            info!("Disk I/O is slow, parallel parsing disabled")
        }
        PlanReason::FewColumns => {
            info!("Only {selected_columns} column(s) selected, parallel parsing disabled")
        }
        PlanReason::Adequate if !caller_opt_in => {
            info!("Parallel parsing not requested, running sequentially")
        }
        PlanReason::Adequate => info!(
            "Using {} workers ({cpus} CPUs available)",
            plan.worker_count
        ),
    }
    Ok((plan, throughput))
}

// ---------------------------------------------------------------------------
// Throughput measurement
// ---------------------------------------------------------------------------

/// Source of a disk write throughput figure in MB/s.
pub trait ThroughputMeter {
    fn measure(&self, dir: &Path) -> Result<f64>;
}

/// Returns a fixed figure, for runs where benchmarking is skipped.
#[derive(Debug, Clone, Copy)]
pub struct FixedThroughput(pub f64);

impl ThroughputMeter for FixedThroughput {
    fn measure(&self, _dir: &Path) -> Result<f64> {
        Ok(self.0)
    }
}

/// Writes `chunks` blocks of `chunk_bytes` to a scratch file and times it.
#[derive(Debug, Clone, Copy)]
pub struct DiskWriteBenchmark {
    pub chunk_bytes: usize,
    pub chunks: usize,
}

impl Default for DiskWriteBenchmark {
    /// About 100 MB in 1 MB chunks.
    fn default() -> Self {
        Self {
            chunk_bytes: 1024 * 1024,
            chunks: 100,
        }
    }
}

impl ThroughputMeter for DiskWriteBenchmark {
    fn measure(&self, dir: &Path) -> Result<f64> {
        self.measure_with(dir, |path| File::create(path).map(SyncOnFlush))
    }
}

impl DiskWriteBenchmark {
    /// Time the write through whatever sink `open` creates at the scratch
    /// path. The scratch file is removed afterwards whether or not the
    /// write succeeded.
    pub fn measure_with<W, F>(&self, dir: &Path, open: F) -> Result<f64>
    where
        W: Write,
        F: FnOnce(&Path) -> io::Result<W>,
    {
        let scratch = ScratchFile {
            path: dir.join(SCRATCH_FILE_NAME),
        };
        let chunk: Vec<u8> = b"0123456789"
            .iter()
            .copied()
            .cycle()
            .take(self.chunk_bytes)
            .collect();

        let start = Instant::now();
        {
            let mut sink = open(&scratch.path).map_err(|e| PipelineError::io(&scratch.path, e))?;
            for _ in 0..self.chunks {
                sink.write_all(&chunk)
                    .map_err(|e| PipelineError::io(&scratch.path, e))?;
            }
            sink.flush()
                .map_err(|e| PipelineError::io(&scratch.path, e))?;
        }
        let secs = start.elapsed().as_secs_f64().max(1e-9);
        drop(scratch);

        let megabytes = (self.chunk_bytes * self.chunks) as f64 / (1024.0 * 1024.0);
        Ok(megabytes / secs)
    }
}

/// A file whose flush waits until the data has reached the disk.
struct SyncOnFlush(File);

impl Write for SyncOnFlush {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_all()
    }
}

/// Removes the benchmark file on every exit path.
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove {}: {e}", self.path.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CPU load and chart estimate
// ---------------------------------------------------------------------------

/// Approximate seconds to render one field's series.
pub const SECS_PER_FIELD: f64 = 0.4;
/// Throughput floor used by the estimate so a stalled disk cannot blow it up.
pub const MIN_ESTIMATE_THROUGHPUT_MBS: f64 = 10.0;

/// Source of a whole-system CPU load percentage in `0..=100`.
pub trait LoadSampler {
    fn sample(&self) -> f64;
}

/// Returns a fixed load, for tests and runs that skip sampling.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoad(pub f64);

impl LoadSampler for FixedLoad {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Averages global CPU usage over `window`, as reported by the OS.
#[derive(Debug, Clone, Copy)]
pub struct SystemLoad {
    pub window: Duration,
}

impl Default for SystemLoad {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
        }
    }
}

impl LoadSampler for SystemLoad {
    fn sample(&self) -> f64 {
        let mut sys = System::new();
        sys.refresh_cpu();
        // Usage is a delta between two refreshes; the OS needs a minimum gap.
        std::thread::sleep(self.window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu();
        f64::from(sys.global_cpu_info().cpu_usage()).clamp(0.0, 100.0)
    }
}

/// Estimated chart rendering time in seconds for `fields` series under the
/// given CPU load (percent) and disk throughput (MB/s).
pub fn estimate_chart_secs(fields: usize, cpu_load: f64, throughput_mbs: f64) -> f64 {
    let disk = throughput_mbs.max(MIN_ESTIMATE_THROUGHPUT_MBS);
    fields as f64 * SECS_PER_FIELD * (1.0 + cpu_load / 100.0) * (1.0 + 100.0 / disk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_disk_downgrades_opt_in() {
        let plan = choose_plan(49.9, 5, 16, true);
        assert_eq!(plan, ExecutionPlan::sequential());
    }

    #[test]
    fn few_columns_stay_sequential() {
        assert!(!choose_plan(500.0, 2, 16, true).parallel);
        assert!(!choose_plan(500.0, 1, 16, true).parallel);
    }

    #[test]
    fn fast_disk_and_many_columns_go_parallel() {
        for cpus in [1, 4, 8, 32] {
            let plan = choose_plan(50.0, 5, cpus, true);
            assert!(plan.parallel);
            assert_eq!(plan.worker_count, cpus.min(8));
        }
    }

    #[test]
    fn never_forces_parallel_without_opt_in() {
        let plan = choose_plan(1000.0, 10, 8, false);
        assert!(!plan.parallel);
        assert_eq!(plan.worker_count, 1);
    }

    #[test]
    fn nan_throughput_counts_as_slow() {
        let (_, reason) = choose_plan_with_reason(f64::NAN, 5, 4, true);
        assert_eq!(reason, PlanReason::SlowDisk);
    }

    #[test]
    fn disk_benchmark_measures_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let bench = DiskWriteBenchmark {
            chunk_bytes: 64 * 1024,
            chunks: 4,
        };
        let mbs = bench.measure(dir.path()).unwrap();
        assert!(mbs > 0.0);
        assert!(!dir.path().join(SCRATCH_FILE_NAME).exists());
    }

    #[test]
    fn disk_benchmark_fails_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = DiskWriteBenchmark::default().measure(&missing).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(!missing.join(SCRATCH_FILE_NAME).exists());
    }

    /// Writes through to a real file, then fails once `budget` chunks are in.
    struct FailAfter {
        file: File,
        budget: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device full"));
            }
            self.budget -= 1;
            self.file.write_all(buf)?;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    #[test]
    fn scratch_file_is_removed_when_the_write_fails_midway() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join(SCRATCH_FILE_NAME);
        let bench = DiskWriteBenchmark {
            chunk_bytes: 1024,
            chunks: 10,
        };

        let err = bench
            .measure_with(dir.path(), |path| {
                let file = File::create(path)?;
                Ok(FailAfter { file, budget: 3 })
            })
            .unwrap_err();

        match err {
            PipelineError::Io { path, source } => {
                assert_eq!(path, scratch);
                assert_eq!(source.to_string(), "device full");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!scratch.exists());
    }

    #[test]
    fn plan_run_uses_injected_meter() {
        let dir = tempfile::tempdir().unwrap();
        let (plan, mbs) = plan_run(&FixedThroughput(10.0), dir.path(), 5, true).unwrap();
        assert!(!plan.parallel);
        assert_eq!(mbs, 10.0);
    }

    #[test]
    fn chart_estimate_scales_with_load_and_disk() {
        // 2 fields * 0.4s * (1 + 0.5) * (1 + 100/100)
        assert!((estimate_chart_secs(2, 50.0, 100.0) - 2.4).abs() < 1e-12);
        // Idle CPU, fast disk: close to the bare per-field cost.
        assert!((estimate_chart_secs(5, 0.0, 1e6) - 2.0).abs() < 1e-3);
        assert_eq!(estimate_chart_secs(0, 80.0, 200.0), 0.0);
    }

    #[test]
    fn chart_estimate_floors_slow_disks() {
        let stalled = estimate_chart_secs(3, 20.0, 0.5);
        let floored = estimate_chart_secs(3, 20.0, MIN_ESTIMATE_THROUGHPUT_MBS);
        assert_eq!(stalled, floored);
        // 3 * 0.4 * 1.2 * 11
        assert!((floored - 15.84).abs() < 1e-9);
    }

    #[test]
    fn fixed_load_is_returned_as_is() {
        assert_eq!(FixedLoad(37.5).sample(), 37.5);
    }
}
