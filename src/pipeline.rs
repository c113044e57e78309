use std::path::PathBuf;

use log::info;

use crate::chart::{render_chart, ChartOptions};
use crate::config::RunConfig;
use crate::data::discover::discover_files;
use crate::data::frames::assign_frames;
use crate::data::loader::load_frames;
use crate::data::normalize::{normalize, CoercionReport};
use crate::error::Result;
use crate::planner::{estimate_chart_secs, plan_run, ExecutionPlan, LoadSampler, ThroughputMeter};
use crate::report::{dataset_prefix, write_raw, write_summary, ArtifactPaths};
use crate::stats::aggregate;

/// Format of generated run timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub raw_path: PathBuf,
    pub summary_path: PathBuf,
    pub chart_path: PathBuf,
    pub files: usize,
    pub rows: usize,
    pub columns: usize,
    pub frames: usize,
    pub plan: ExecutionPlan,
    /// Measured disk write throughput in MB/s.
    pub throughput_mbs: f64,
    /// CPU load percentage sampled before charting.
    pub cpu_load: f64,
    pub chart_eta_secs: f64,
    pub coercion: CoercionReport,
    pub skipped_fits: Vec<String>,
}

/// Current local time as a run timestamp.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Run every stage for `config`. Disk throughput and CPU load come from the
/// injected `meter` and `load`. Any stage error aborts the run.
pub fn run(
    config: &RunConfig,
    meter: &dyn ThroughputMeter,
    load: &dyn LoadSampler,
) -> Result<RunSummary> {
    config.validate()?;

    let files = discover_files(&config.input_dir, &config.file_suffix)?;
    let (plan, throughput_mbs) = plan_run(
        meter,
        &config.output_dir,
        config.columns.len(),
        config.parallel,
    )?;

    info!("Reading {} CSV files...", files.len());
    let assigned = assign_frames(&files, config.interval_secs);
    let records = load_frames(&assigned, &plan)?;
    let (merged, coercion) = normalize(&records, &config.columns)?;

    info!("Calculating summary statistics...");
    let grouped = aggregate(&merged, &config.columns)?;
    let means = grouped.means();
    let flattened = grouped.flattened();

    let timestamp = config.timestamp.clone().unwrap_or_else(now_timestamp);
    let prefix = dataset_prefix(&config.input_dir);
    let paths = ArtifactPaths::new(&config.output_dir, &prefix, &timestamp);

    write_raw(&paths.raw, &merged, &means)?;
    write_summary(&paths.summary, &flattened)?;

    let cpu_load = load.sample();
    info!("CPU load: {cpu_load:.1}%");
    let chart_eta_secs = estimate_chart_secs(config.columns.len(), cpu_load, throughput_mbs);
    info!(
        "Estimated chart generation time: {chart_eta_secs:.1} sec (~{:.1} min)",
        chart_eta_secs / 60.0
    );

    info!("Generating chart for: {}", config.columns.join(", "));
    let options = ChartOptions {
        interval_secs: config.interval_secs,
        error_bars: config.error_bars,
        poly_degree: config.poly_degree,
    };
    let chart = render_chart(&paths.chart, &means, Some(&merged), &options)?;

    Ok(RunSummary {
        raw_path: paths.raw,
        summary_path: paths.summary,
        chart_path: chart.path,
        files: files.len(),
        rows: merged.len(),
        columns: merged.columns.len(),
        frames: grouped.frames.len(),
        plan,
        throughput_mbs,
        cpu_load,
        chart_eta_secs,
        coercion,
        skipped_fits: chart.skipped_fits,
    })
}
