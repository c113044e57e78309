//! Metrics-vs-frame line chart
//!
//! One line with point markers per selected field (mean per frame), titled
//! with the frame interval. Optional standard-deviation error bars and a
//! dashed polynomial trend are drawn per field and listed in the legend.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{info, warn};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::color::generate_palette;
use crate::data::model::MergedDataset;
use crate::error::{PipelineError, Result};
use crate::stats::{aggregate, StatTable};

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const FIT_SAMPLES: usize = 100;
const FONT_FAMILY: &str = "sans-serif";

/// What to draw besides the mean lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartOptions {
    pub interval_secs: f64,
    pub error_bars: bool,
    /// Polynomial trend degree, 0 disables the fit.
    pub poly_degree: u32,
}

/// Where the chart went and which fields had their fit skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutcome {
    pub path: PathBuf,
    pub skipped_fits: Vec<String>,
}

struct Series {
    x: Vec<f64>,
    y: Vec<f64>,
    std: Option<Vec<f64>>,
    fit: Option<Vec<(f64, f64)>>,
}

/// Render the mean-only table to `path`. `raw` supplies the per-frame
/// standard deviation when error bars are requested.
pub fn render_chart(
    path: &Path,
    means: &StatTable,
    raw: Option<&MergedDataset>,
    options: &ChartOptions,
) -> Result<ChartOutcome> {
    let fields: Vec<String> = means.columns.iter().skip(1).cloned().collect();
    let x: Vec<f64> = (0..means.rows.len())
        .map(|r| means.value(r, &means.columns[0]).unwrap_or(f64::NAN))
        .collect();

    let spread = match (options.error_bars, raw) {
        (true, Some(raw)) => Some(aggregate(raw, &fields)?),
        _ => None,
    };

    let mut skipped_fits = Vec::new();
    let mut series = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let y: Vec<f64> = (0..means.rows.len())
            .map(|r| means.value(r, field).unwrap_or(f64::NAN))
            .collect();
        let std = spread.as_ref().map(|g| g.series(i, |s| s.std));

        let fit = if options.poly_degree > 0 {
            match fit_curve(&x, &y, options.poly_degree as usize) {
                Some(points) => Some(points),
                None => {
                    warn!(
                        "Polynomial fit (deg={}) failed for {field}, skipping",
                        options.poly_degree
                    );
                    skipped_fits.push(field.clone());
                    None
                }
            }
        } else {
            None
        };

        series.push(Series { x: x.clone(), y, std, fit });
    }

    draw_chart(path, &fields, &series, options).map_err(|e| PipelineError::Chart {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!(
        "Saved metrics vs. frame chart (interval={}s) to {}",
        options.interval_secs,
        path.display()
    );

    Ok(ChartOutcome {
        path: path.to_path_buf(),
        skipped_fits,
    })
}

// ---------------------------------------------------------------------------
// Polynomial fit
// ---------------------------------------------------------------------------

/// Least-squares polynomial with coefficients in ascending order, fitted on
/// x rescaled to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
    center: f64,
    half_span: f64,
}

impl Polynomial {
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.half_span;
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }
}

/// Fit a polynomial of `degree` through the finite points. Returns `None`
/// when there are not more points than the degree or the normal equations
/// are singular.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Polynomial> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect();
    if points.len() <= degree {
        return None;
    }

    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (px, _)| {
            (lo.min(*px), hi.max(*px))
        });
    let center = (lo + hi) / 2.0;
    let half_span = if hi > lo { (hi - lo) / 2.0 } else { 1.0 };

    // Normal equations A^T A c = A^T y, augmented with the right-hand side.
    let n = degree + 1;
    let mut m = vec![vec![0.0; n + 1]; n];
    for (px, py) in &points {
        let t = (px - center) / half_span;
        let powers: Vec<f64> = (0..n).map(|k| t.powi(k as i32)).collect();
        for r in 0..n {
            for c in 0..n {
                m[r][c] += powers[r] * powers[c];
            }
            m[r][n] += powers[r] * py;
        }
    }

    let coeffs = solve(m)?;
    Some(Polynomial {
        coeffs,
        center,
        half_span,
    })
}

/// Gauss-Jordan elimination with partial pivoting on an augmented matrix.
fn solve(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = m.len();
    let scale = (0..n).map(|i| m[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < scale * 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        let p = m[col][col];
        for v in m[col].iter_mut() {
            *v /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                if factor != 0.0 {
                    for k in col..=n {
                        let delta = factor * m[col][k];
                        m[row][k] -= delta;
                    }
                }
            }
        }
    }

    let coeffs: Vec<f64> = m.iter().map(|row| row[n]).collect();
    coeffs.iter().all(|c| c.is_finite()).then_some(coeffs)
}

fn fit_curve(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<(f64, f64)>> {
    let poly = polyfit(x, y, degree)?;
    let (lo, hi) = finite_range(x.iter().copied())?;
    let points: Vec<(f64, f64)> = (0..FIT_SAMPLES)
        .map(|i| {
            let px = lo + (hi - lo) * i as f64 / (FIT_SAMPLES - 1) as f64;
            (px, poly.eval(px))
        })
        .collect();
    points.iter().all(|(_, py)| py.is_finite()).then_some(points)
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Chart title for a run with the given frame interval.
pub fn caption(interval_secs: f64) -> String {
    format!("Metrics vs. Frame (Interval={interval_secs}s)")
}

/// The bitmap backend resolves text through the font registry, which starts
/// out empty; the bundled Ubuntu Light face is registered once per process.
fn ensure_font() -> std::result::Result<(), String> {
    static FONT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    FONT.get_or_init(|| {
        register_font(
            FONT_FAMILY,
            FontStyle::Normal,
            epaint_default_fonts::UBUNTU_LIGHT,
        )
        .map_err(|_| "bundled chart font could not be parsed".to_string())
    })
    .clone()
}

fn draw_chart(
    path: &Path,
    fields: &[String],
    series: &[Series],
    options: &ChartOptions,
) -> std::result::Result<(), Box<dyn Error>> {
    ensure_font()?;

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_range, y_range) = ranges(series);
    let mut chart = ChartBuilder::on(&root)
        .caption(caption(options.interval_secs), (FONT_FAMILY, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)?;

    chart
        .configure_mesh()
        .x_desc("Frame")
        .y_desc("Metric Value")
        .draw()?;

    let colours = generate_palette(series.len());
    for ((field, s), &colour) in fields.iter().zip(series).zip(&colours) {
        let points: Vec<(f64, f64)> = s
            .x
            .iter()
            .zip(&s.y)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();

        chart
            .draw_series(LineSeries::new(points.iter().copied(), colour.stroke_width(2)))?
            .label(field.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], colour.stroke_width(2))
            });
        chart.draw_series(PointSeries::of_element(
            points.iter().copied(),
            4,
            colour.filled(),
            &|c, size, style| EmptyElement::at(c) + Circle::new((0, 0), size, style),
        ))?;

        if let Some(std) = &s.std {
            let bar_style = colour.mix(0.6).stroke_width(1);
            let bars = s
                .x
                .iter()
                .zip(&s.y)
                .zip(std)
                .filter(|((x, y), d)| x.is_finite() && y.is_finite() && d.is_finite())
                .map(|((&x, &y), &d)| ErrorBar::new_vertical(x, y - d, y, y + d, bar_style, 6));
            chart
                .draw_series(bars)?
                .label(format!("{field} ± Std Dev"))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x + 10, y - 6), (x + 10, y + 6)], bar_style)
                });
        }

        if let Some(fit) = &s.fit {
            let fit_style = colour.mix(0.8).stroke_width(2);
            chart
                .draw_series(DashedLineSeries::new(fit.iter().copied(), 6, 4, fit_style))?
                .label(format!("{field} Poly Fit (deg={})", options.poly_degree))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 8, y)], fit_style)
                });
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Axis ranges covering the means, the error bars and the fitted curves.
fn ranges(series: &[Series]) -> ((f64, f64), (f64, f64)) {
    let xs = series.iter().flat_map(|s| s.x.iter().copied());
    let ys = series.iter().flat_map(|s| {
        let bars = s.std.iter().flat_map(move |std| {
            s.y.iter()
                .zip(std)
                .flat_map(|(y, d)| [y - d, y + d])
        });
        let fit = s.fit.iter().flat_map(|f| f.iter().map(|p| p.1));
        s.y.iter().copied().chain(bars).chain(fit)
    });
    (
        padded(finite_range(xs), 0.02),
        padded(finite_range(ys), 0.05),
    )
}

fn padded(range: Option<(f64, f64)>, fraction: f64) -> (f64, f64) {
    match range {
        None => (0.0, 1.0),
        Some((lo, hi)) if hi - lo <= f64::EPSILON * lo.abs().max(1.0) => (lo - 1.0, hi + 1.0),
        Some((lo, hi)) => {
            let pad = (hi - lo) * fraction;
            (lo - pad, hi + pad)
        }
    }
}
