use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use morpho_frames::planner::{
    DiskWriteBenchmark, FixedLoad, FixedThroughput, LoadSampler, SystemLoad, ThroughputMeter,
};
use morpho_frames::RunConfig;

/// Summarise a directory of per-frame morphometry CSVs.
#[derive(Parser, Debug)]
#[command(name = "morpho-frames", version, about)]
struct Cli {
    /// JSON run configuration; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the per-frame measurement files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Existing, writable directory for the artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Columns to summarise and plot (comma separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Seconds between consecutive frames
    #[arg(long)]
    interval: Option<f64>,

    /// Allow parallel parsing when the disk benchmark permits it
    #[arg(long)]
    parallel: bool,

    /// Polynomial trend degree (0 = off)
    #[arg(long)]
    poly_degree: Option<u32>,

    /// Draw mean ± std error bars
    #[arg(long)]
    error_bars: bool,

    /// Filename suffix of the measurement files
    #[arg(long)]
    suffix: Option<String>,

    /// Timestamp embedded in artifact names (default: now)
    #[arg(long)]
    timestamp: Option<String>,

    /// Skip the disk benchmark and assume this throughput in MB/s
    #[arg(long)]
    assume_throughput: Option<f64>,

    /// Skip CPU sampling and assume this load percentage
    #[arg(long)]
    assume_load: Option<f64>,
}

/// Measurements the caller chose to fix instead of sampling.
struct Assumed {
    throughput: Option<f64>,
    load: Option<f64>,
}

impl Cli {
    fn into_config(self) -> Result<(RunConfig, Assumed)> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(input) = self.input {
            cfg.input_dir = input;
        }
        if let Some(output) = self.output {
            cfg.output_dir = output;
        }
        if !self.columns.is_empty() {
            cfg.columns = self
                .columns
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(interval) = self.interval {
            cfg.interval_secs = interval;
        }
        cfg.parallel |= self.parallel;
        cfg.error_bars |= self.error_bars;
        if let Some(degree) = self.poly_degree {
            cfg.poly_degree = degree;
        }
        if let Some(suffix) = self.suffix {
            cfg.file_suffix = suffix;
        }
        if self.timestamp.is_some() {
            cfg.timestamp = self.timestamp;
        }
        let assumed = Assumed {
            throughput: self.assume_throughput,
            load: self.assume_load,
        };
        Ok((cfg, assumed))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, assumed) = Cli::parse().into_config()?;
    let meter: Box<dyn ThroughputMeter> = match assumed.throughput {
        Some(mbs) => Box::new(FixedThroughput(mbs)),
        None => Box::new(DiskWriteBenchmark::default()),
    };
    let load: Box<dyn LoadSampler> = match assumed.load {
        Some(percent) => Box::new(FixedLoad(percent)),
        None => Box::new(SystemLoad::default()),
    };

    let summary = morpho_frames::run(&config, meter.as_ref(), load.as_ref())
        .context("analysis failed")?;

    info!(
        "Done: {} files, {} rows, {} frames",
        summary.files, summary.rows, summary.frames
    );
    info!("Raw: {}", summary.raw_path.display());
    info!("Summary: {}", summary.summary_path.display());
    info!("Chart: {}", summary.chart_path.display());
    Ok(())
}
