use std::collections::BTreeSet;
use std::path::Path;

use morpho_frames::planner::{estimate_chart_secs, FixedLoad, FixedThroughput};
use morpho_frames::{run, PipelineError, RunConfig};

const FAST_DISK: FixedThroughput = FixedThroughput(500.0);
const QUIET_CPU: FixedLoad = FixedLoad(25.0);

fn write_frames(dir: &Path, frames: usize, rows: usize) {
    for f in 0..frames {
        let mut body = String::from("Label,Diameter,Perimeter,Circularity,Area\n");
        for r in 0..rows {
            let d = 10.0 + f as f64 + r as f64 * 0.5;
            body.push_str(&format!(
                "{},{d},{},{},{}\n",
                r + 1,
                d * 3.2,
                0.8 + r as f64 * 0.01,
                d * d * 0.785
            ));
        }
        std::fs::write(dir.join(format!("R2_t{f:03}_morphometry_results.csv")), body).unwrap();
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    config: RunConfig,
}

fn fixture(frames: usize, rows: usize, columns: &[&str]) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("R2");
    let output = root.path().join("out");
    std::fs::create_dir(&input).unwrap();
    std::fs::create_dir(&output).unwrap();
    write_frames(&input, frames, rows);

    let config = RunConfig {
        input_dir: input,
        output_dir: output,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        interval_secs: 5.0,
        timestamp: Some("2024_05_06_07_08_09".into()),
        ..RunConfig::default()
    };
    Fixture {
        _root: root,
        config,
    }
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

#[test]
fn three_frames_end_to_end() {
    let fx = fixture(3, 10, &["Diameter", "Perimeter"]);
    let summary = run(&fx.config, &FAST_DISK, &QUIET_CPU).unwrap();

    assert_eq!(summary.files, 3);
    assert_eq!(summary.rows, 30);
    assert_eq!(summary.frames, 3);
    assert!(!summary.plan.parallel);
    assert!(summary.coercion.failed.is_empty());

    assert_eq!(
        summary.summary_path.file_name().unwrap(),
        "R2_summary_stats_2024_05_06_07_08_09.csv"
    );
    let (header, rows) = read_rows(&summary.summary_path);
    assert_eq!(
        header,
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
    assert_eq!(rows.len(), 3);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], (i + 1).to_string());
        assert_eq!(row[4], "10");
        assert_eq!(row[8], "10");
    }

    // Raw artifact: 30 data rows, separator, mean header, 3 mean rows.
    let text = std::fs::read_to_string(&summary.raw_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + 30 + 1 + 1 + 3);
    assert!(lines[31].split(',').all(|f| f == "NaN"));
    assert_eq!(lines[32], "Frame,Diameter,Perimeter");

    let header: Vec<&str> = lines[0].split(',').collect();
    let frame = header.iter().position(|h| *h == "Frame").unwrap();
    let time = header.iter().position(|h| *h == "TimeSec").unwrap();
    let pairs: BTreeSet<(String, String)> = lines[1..31]
        .iter()
        .map(|l| {
            let f: Vec<&str> = l.split(',').collect();
            (f[frame].to_string(), f[time].to_string())
        })
        .collect();
    let expected: BTreeSet<(String, String)> = [("1", "0.0"), ("2", "5.0"), ("3", "10.0")]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    assert_eq!(pairs, expected);

    assert!(summary.chart_path.ends_with("R2_metrics_vs_frame.png"));
    assert!(summary.chart_path.exists());
}

#[test]
fn rerun_with_same_timestamp_is_byte_identical() {
    let fx = fixture(4, 6, &["Diameter", "Perimeter", "Area"]);
    let first = run(&fx.config, &FAST_DISK, &QUIET_CPU).unwrap();
    let raw_a = std::fs::read(&first.raw_path).unwrap();
    let summary_a = std::fs::read(&first.summary_path).unwrap();

    let second = run(&fx.config, &FAST_DISK, &QUIET_CPU).unwrap();
    assert_eq!(first.raw_path, second.raw_path);
    assert_eq!(raw_a, std::fs::read(&second.raw_path).unwrap());
    assert_eq!(summary_a, std::fs::read(&second.summary_path).unwrap());
}

#[test]
fn parallel_run_matches_sequential_run() {
    let columns = ["Diameter", "Perimeter", "Circularity", "Area"];
    let fx = fixture(9, 5, &columns);

    let sequential = run(&fx.config, &FAST_DISK, &QUIET_CPU).unwrap();
    let raw_seq = std::fs::read(&sequential.raw_path).unwrap();
    let summary_seq = std::fs::read(&sequential.summary_path).unwrap();

    let parallel_cfg = RunConfig {
        parallel: true,
        ..fx.config.clone()
    };
    let parallel = run(&parallel_cfg, &FAST_DISK, &QUIET_CPU).unwrap();
    assert!(parallel.plan.parallel);
    assert!(parallel.plan.worker_count >= 1 && parallel.plan.worker_count <= 8);

    assert_eq!(raw_seq, std::fs::read(&parallel.raw_path).unwrap());
    assert_eq!(summary_seq, std::fs::read(&parallel.summary_path).unwrap());
}

#[test]
fn slow_disk_keeps_run_sequential() {
    let fx = fixture(3, 2, &["Diameter", "Perimeter", "Area"]);
    let cfg = RunConfig {
        parallel: true,
        ..fx.config.clone()
    };
    let summary = run(&cfg, &FixedThroughput(12.0), &QUIET_CPU).unwrap();
    assert!(!summary.plan.parallel);
    assert_eq!(summary.throughput_mbs, 12.0);
    assert_eq!(summary.cpu_load, 25.0);
    assert_eq!(summary.chart_eta_secs, estimate_chart_secs(3, 25.0, 12.0));
}

#[test]
fn missing_selected_column_names_it() {
    let fx = fixture(2, 3, &["Diameter", "Volume"]);
    match run(&fx.config, &FAST_DISK, &QUIET_CPU) {
        Err(PipelineError::Validation { missing }) => assert_eq!(missing, ["Volume"]),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn empty_input_directory_is_not_found() {
    let fx = fixture(0, 0, &["Diameter"]);
    assert!(matches!(
        run(&fx.config, &FAST_DISK, &QUIET_CPU),
        Err(PipelineError::NotFound(_))
    ));
}

#[test]
fn error_bars_and_fit_do_not_break_the_run() {
    let fx = fixture(5, 4, &["Diameter", "Perimeter"]);
    let cfg = RunConfig {
        error_bars: true,
        poly_degree: 2,
        ..fx.config.clone()
    };
    let summary = run(&cfg, &FAST_DISK, &QUIET_CPU).unwrap();
    assert!(summary.skipped_fits.is_empty());
    assert!(summary.chart_path.exists());
}
