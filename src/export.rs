//! Chart and data export
//!
//! Renders the two evolution charts to timestamped SVG files in a
//! designated output directory, mirroring what the interactive plots
//! show, and optionally dumps the raw curve arrays as JSON.

use chrono::Local;
use ndarray::Array1;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::evolution::{EvolutionCurves, SystemCurves};

/// Export failures, surfaced to the user as a notification
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not render chart {path}: {message}")]
    Render { path: PathBuf, message: String },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not encode data snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

const CHART_SIZE: (u32, u32) = (900, 560);

/// Render both decay-system charts as timestamped SVG files.
/// Returns the written paths in Hf, Nd order.
pub fn export_charts(curves: &EvolutionCurves, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let hf_path = dir.join(format!("evolution_hf_{stamp}.svg"));
    let nd_path = dir.join(format!("evolution_nd_{stamp}.svg"));

    render_system_chart(
        &hf_path,
        "Evolution of the \u{b9}\u{2077}\u{2076}Hf/\u{b9}\u{2077}\u{2077}Hf Isotopic Ratio",
        "\u{b9}\u{2077}\u{2076}Hf/\u{b9}\u{2077}\u{2077}Hf",
        &curves.time_ga,
        &curves.hf,
        curves.extraction_ga,
    )?;
    render_system_chart(
        &nd_path,
        "Evolution of the \u{b9}\u{2074}\u{b3}Nd/\u{b9}\u{2074}\u{2074}Nd Isotopic Ratio",
        "\u{b9}\u{2074}\u{b3}Nd/\u{b9}\u{2074}\u{2074}Nd",
        &curves.time_ga,
        &curves.nd,
        curves.extraction_ga,
    )?;

    Ok(vec![hf_path, nd_path])
}

fn render_system_chart(
    path: &Path,
    title: &str,
    y_label: &str,
    time_ga: &Array1<f64>,
    sys: &SystemCurves,
    extraction_ga: f64,
) -> Result<(), ExportError> {
    draw_chart(path, title, y_label, time_ga, sys, extraction_ga).map_err(|e| {
        ExportError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

fn draw_chart(
    path: &Path,
    title: &str,
    y_label: &str,
    time_ga: &Array1<f64>,
    sys: &SystemCurves,
    extraction_ga: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let origin_ga = time_ga[0];
    let (y_min, y_max) = value_span(&[&sys.bulk, &sys.depleted, &sys.extracted]);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    // Reversed x range puts the present on the right, matching the
    // before-present reading direction
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(14)
        .x_label_area_size(44)
        .y_label_area_size(72)
        .build_cartesian_2d(origin_ga..0.0, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time (Ga before present)")
        .y_desc(y_label)
        .light_line_style(BLACK.mix(0.08))
        .draw()?;

    let series = |arr: &Array1<f64>| {
        time_ga
            .iter()
            .zip(arr.iter())
            .map(|(&t, &r)| (t, r))
            .collect::<Vec<_>>()
    };

    chart
        .draw_series(LineSeries::new(series(&sys.bulk), BLACK.stroke_width(2)))?
        .label("Bulk Silicate Earth (BSE)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], BLACK.stroke_width(2)));
    chart
        .draw_series(LineSeries::new(series(&sys.depleted), RED.stroke_width(2)))?
        .label("Depleted Mantle")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], RED.stroke_width(2)));
    chart
        .draw_series(LineSeries::new(series(&sys.extracted), BLUE.stroke_width(2)))?
        .label("Continental Crust")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], BLUE.stroke_width(2)));

    // Extraction marker with its annotation anchored at the bulk ratio
    let grey = RGBColor(128, 128, 128);
    chart.draw_series(LineSeries::new(
        vec![(extraction_ga, y_min), (extraction_ga, y_max)],
        grey.stroke_width(1),
    ))?;
    chart.draw_series(std::iter::once(Text::new(
        format!("Crust extraction {extraction_ga:.1} Ga"),
        (extraction_ga + 0.05, sys.extraction_anchor),
        ("sans-serif", 14),
    )))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Padded min/max over a set of trajectories
fn value_span(arrays: &[&Array1<f64>]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for arr in arrays {
        for &v in arr.iter() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    let pad = ((max - min) * 0.04).max(1e-4);
    (min - pad, max + pad)
}

/// Serializable mirror of [`EvolutionCurves`]
#[derive(Debug, Serialize, Deserialize)]
pub struct CurvesSnapshot {
    pub time_ga: Vec<f64>,
    pub extraction_ga: f64,
    pub extraction_index: usize,
    pub hf: SystemSnapshot,
    pub nd: SystemSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub bulk: Vec<f64>,
    pub depleted: Vec<f64>,
    pub extracted: Vec<f64>,
    pub extraction_anchor: f64,
}

impl From<&SystemCurves> for SystemSnapshot {
    fn from(sys: &SystemCurves) -> Self {
        Self {
            bulk: sys.bulk.to_vec(),
            depleted: sys.depleted.to_vec(),
            extracted: sys.extracted.to_vec(),
            extraction_anchor: sys.extraction_anchor,
        }
    }
}

impl From<&EvolutionCurves> for CurvesSnapshot {
    fn from(curves: &EvolutionCurves) -> Self {
        Self {
            time_ga: curves.time_ga.to_vec(),
            extraction_ga: curves.extraction_ga,
            extraction_index: curves.extraction_index,
            hf: SystemSnapshot::from(&curves.hf),
            nd: SystemSnapshot::from(&curves.nd),
        }
    }
}

/// Write the seven aligned arrays as a timestamped JSON file
pub fn export_snapshot(curves: &EvolutionCurves, dir: &Path) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("evolution_curves_{stamp}.json"));
    let snapshot = CurvesSnapshot::from(curves);
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(&path, json).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{EvolutionSimulator, ModelParams};

    fn curves() -> EvolutionCurves {
        EvolutionSimulator::with_params(ModelParams::default())
            .unwrap()
            .compute_at(2.9)
    }

    #[test]
    fn export_charts_writes_one_svg_per_system() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_charts(&curves(), dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        for path in &paths {
            let content = fs::read_to_string(path).unwrap();
            assert!(content.contains("<svg"), "{path:?} is not an SVG");
        }
    }

    #[test]
    fn export_charts_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("figures");
        let paths = export_charts(&curves(), &nested).unwrap();
        assert!(paths[0].starts_with(&nested));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let curves = curves();
        let path = export_snapshot(&curves, dir.path()).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let parsed: CurvesSnapshot = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.time_ga.len(), curves.time_ga.len());
        assert_eq!(parsed.extraction_index, curves.extraction_index);
        assert_eq!(parsed.hf.bulk, curves.hf.bulk.to_vec());
        assert_eq!(parsed.nd.extraction_anchor, curves.nd.extraction_anchor);
    }

    #[test]
    fn value_span_pads_flat_data() {
        let flat = Array1::from_elem(4, 1.0);
        let (lo, hi) = value_span(&[&flat]);
        assert!(lo < 1.0 && hi > 1.0);
    }
}
