//! Desktop front end
//!
//! egui application around the evolution model: an extraction-time
//! slider and free-text entry on the left, the two isotope-ratio charts
//! in the center, and export buttons. Every parameter change triggers
//! one synchronous recomputation of the full curve set.

use eframe::egui;
use egui_plot::{Corner, GridMark, Legend, Line, LineStyle, Plot, PlotPoint, PlotPoints, VLine};
use egui_plot::Text as PlotText;
use ndarray::Array1;
use std::path::PathBuf;
use thiserror::Error;

use log::{error, info, warn};

use crate::evolution::{constants, EvolutionCurves, EvolutionSimulator, SystemCurves};
use crate::export;

// ─── Colors ──────────────────────────────────────────────────────────────────

const BSE_COLOR: egui::Color32 = egui::Color32::from_rgb(230, 228, 218);
const DEPLETED_COLOR: egui::Color32 = egui::Color32::from_rgb(217, 77, 77);
const CRUST_COLOR: egui::Color32 = egui::Color32::from_rgb(70, 130, 230);
const MARKER_COLOR: egui::Color32 = egui::Color32::from_rgb(160, 160, 150);
const DIM: egui::Color32 = egui::Color32::from_rgb(110, 110, 105);

/// Rejected extraction-time input, surfaced as a blocking notification
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("`{0}` is not a number")]
    NotNumeric(String),
    #[error("{0} Ga is outside the modeled span 0\u{2013}{1} Ga")]
    OutOfRange(f64, f64),
}

/// Parse and bounds-check an extraction-time entry.
/// The model itself never sees a value this rejects.
pub fn parse_extraction_input(text: &str, origin_ga: f64) -> Result<f64, InputError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| InputError::NotNumeric(text.trim().to_string()))?;
    if !value.is_finite() {
        return Err(InputError::NotNumeric(text.trim().to_string()));
    }
    if !(0.0..=origin_ga).contains(&value) {
        return Err(InputError::OutOfRange(value, origin_ga));
    }
    Ok(value)
}

/// Bulk ratio linearly interpolated at `t_ga`, used only to place the
/// extraction annotation; the model output itself is never interpolated
fn interpolate_bulk(time_ga: &Array1<f64>, bulk: &Array1<f64>, t_ga: f64) -> f64 {
    let n = time_ga.len();
    if t_ga >= time_ga[0] {
        return bulk[0];
    }
    if t_ga <= time_ga[n - 1] {
        return bulk[n - 1];
    }
    // Grid descends, so find the bracketing pair
    for i in 1..n {
        if time_ga[i] <= t_ga {
            let span = time_ga[i - 1] - time_ga[i];
            let frac = if span > 0.0 {
                (time_ga[i - 1] - t_ga) / span
            } else {
                0.0
            };
            return bulk[i - 1] + frac * (bulk[i] - bulk[i - 1]);
        }
    }
    bulk[n - 1]
}

/// Interactive session state
pub struct EvolutionApp {
    simulator: EvolutionSimulator,
    extraction_ga: f64,
    extraction_text: String,
    curves: EvolutionCurves,
    input_error: Option<String>,
    export_status: Option<String>,
    output_dir: PathBuf,
}

impl EvolutionApp {
    pub fn new(simulator: EvolutionSimulator) -> Self {
        let extraction_ga = simulator.extraction_time();
        let curves = simulator.compute();
        Self {
            simulator,
            extraction_ga,
            extraction_text: format!("{extraction_ga:.2}"),
            curves,
            input_error: None,
            export_status: None,
            output_dir: PathBuf::from("exports"),
        }
    }

    fn apply_extraction(&mut self, extraction_ga: f64) {
        self.extraction_ga = extraction_ga;
        self.extraction_text = format!("{extraction_ga:.2}");
        self.simulator.set_extraction_time(extraction_ga);
        self.curves = self.simulator.compute();
    }

    fn apply_text_entry(&mut self) {
        match parse_extraction_input(&self.extraction_text, self.simulator.params().origin_ga) {
            Ok(value) => self.apply_extraction(value),
            Err(e) => {
                warn!("rejected extraction-time input: {e}");
                self.input_error = Some(e.to_string());
            }
        }
    }

    fn export_charts(&mut self) {
        match export::export_charts(&self.curves, &self.output_dir) {
            Ok(paths) => {
                info!("exported {} chart(s) to {:?}", paths.len(), self.output_dir);
                self.export_status = Some(format!(
                    "Wrote {}",
                    paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            Err(e) => {
                error!("chart export failed: {e}");
                self.export_status = Some(format!("Export failed: {e}"));
            }
        }
    }

    fn export_snapshot(&mut self) {
        match export::export_snapshot(&self.curves, &self.output_dir) {
            Ok(path) => {
                info!("exported curve data to {}", path.display());
                self.export_status = Some(format!("Wrote {}", path.display()));
            }
            Err(e) => {
                error!("data export failed: {e}");
                self.export_status = Some(format!("Export failed: {e}"));
            }
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        let origin_ga = self.simulator.params().origin_ga;

        ui.add_space(4.0);
        ui.heading("Crust extraction");
        ui.add_space(4.0);

        let slider = ui.add(
            egui::Slider::new(&mut self.extraction_ga, 0.0..=origin_ga)
                .step_by(0.01)
                .suffix(" Ga")
                .text("Extraction time"),
        );
        if slider.changed() {
            let value = self.extraction_ga;
            self.apply_extraction(value);
        }

        ui.horizontal(|ui| {
            ui.label("Exact value:");
            let entry = ui.text_edit_singleline(&mut self.extraction_text);
            let submitted = entry.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Apply").clicked() || submitted {
                self.apply_text_entry();
            }
        });

        ui.colored_label(
            DIM,
            format!(
                "Snapped to grid: {:.3} Ga (sample {})",
                self.curves.snapped_extraction_ga(),
                self.curves.extraction_index
            ),
        );

        if ui.button("Reset to 2.9 Ga").clicked() {
            self.apply_extraction(constants::DEFAULT_EXTRACTION_GA.min(origin_ga));
        }

        ui.separator();
        ui.heading("Export");
        ui.add_space(4.0);

        if ui.button("Export charts (SVG)").clicked() {
            self.export_charts();
        }
        if ui.button("Export curve data (JSON)").clicked() {
            self.export_snapshot();
        }
        if let Some(status) = &self.export_status {
            ui.add_space(4.0);
            ui.colored_label(DIM, status);
        }

        ui.separator();
        ui.colored_label(
            DIM,
            format!(
                "Grid: {} samples, {origin_ga:.1} Ga \u{2192} present",
                self.simulator.params().num_samples
            ),
        );
    }

    fn draw_system_plot(
        &self,
        ui: &mut egui::Ui,
        id: &str,
        y_label: &str,
        sys: &SystemCurves,
        height: f32,
    ) {
        let origin_ga = self.simulator.params().origin_ga;
        let extraction_ga = self.extraction_ga;
        // Plot in elapsed-time coordinates so the present sits on the
        // right; the axis formatter converts back to Ga before present
        let to_x = move |t_ga: f64| origin_ga - t_ga;

        let line_points = |arr: &Array1<f64>| -> PlotPoints {
            self.curves
                .time_ga
                .iter()
                .zip(arr.iter())
                .map(|(&t, &r)| [to_x(t), r])
                .collect()
        };

        let bulk = line_points(&sys.bulk);
        let depleted = line_points(&sys.depleted);
        let extracted = line_points(&sys.extracted);
        let label_y = interpolate_bulk(&self.curves.time_ga, &sys.bulk, extraction_ga);

        Plot::new(id.to_string())
            .height(height)
            .x_axis_label("Time (Ga before present)")
            .y_axis_label(y_label)
            .x_axis_formatter(move |mark: GridMark, _range: &std::ops::RangeInclusive<f64>| {
                format!("{:.1}", origin_ga - mark.value)
            })
            .legend(Legend::default().position(Corner::LeftTop))
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new(bulk)
                        .color(BSE_COLOR)
                        .width(2.0)
                        .name("Bulk Silicate Earth (BSE)"),
                );
                plot_ui.line(
                    Line::new(depleted)
                        .color(DEPLETED_COLOR)
                        .width(2.0)
                        .style(LineStyle::Dashed { length: 8.0 })
                        .name("Depleted Mantle"),
                );
                plot_ui.line(
                    Line::new(extracted)
                        .color(CRUST_COLOR)
                        .width(2.0)
                        .style(LineStyle::Dotted { spacing: 4.0 })
                        .name("Continental Crust"),
                );
                plot_ui.vline(
                    VLine::new(to_x(extraction_ga))
                        .color(MARKER_COLOR)
                        .width(1.0),
                );
                plot_ui.text(
                    PlotText::new(
                        PlotPoint::new(to_x(extraction_ga) + 0.05, label_y),
                        egui::RichText::new(format!("Crust extraction\n{extraction_ga:.2} Ga"))
                            .size(11.0)
                            .color(MARKER_COLOR),
                    )
                    .anchor(egui::Align2::LEFT_BOTTOM),
                );
            });
    }

    /// Whether a rejected input is waiting to be acknowledged; all other
    /// interaction is disabled until then
    fn input_blocked(&self) -> bool {
        self.input_error.is_some()
    }

    fn dismiss_input_error(&mut self) {
        self.input_error = None;
    }

    fn draw_error_modal(&mut self, ctx: &egui::Context) {
        let mut dismissed = false;
        if let Some(message) = &self.input_error {
            egui::Window::new("Invalid extraction time")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(6.0);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
        }
        if dismissed {
            self.dismiss_input_error();
        }
    }
}

impl eframe::App for EvolutionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let enabled = !self.input_blocked();

        egui::SidePanel::left("controls")
            .min_width(240.0)
            .max_width(320.0)
            .show(ctx, |ui| {
                ui.add_enabled_ui(enabled, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        self.draw_controls(ui);
                    });
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(enabled, |ui| {
                let plot_height = ((ui.available_height() - 12.0) / 2.0).max(120.0);
                self.draw_system_plot(
                    ui,
                    "hf_evolution",
                    "\u{b9}\u{2077}\u{2076}Hf/\u{b9}\u{2077}\u{2077}Hf",
                    &self.curves.hf,
                    plot_height,
                );
                ui.add_space(8.0);
                self.draw_system_plot(
                    ui,
                    "nd_evolution",
                    "\u{b9}\u{2074}\u{b3}Nd/\u{b9}\u{2074}\u{2074}Nd",
                    &self.curves.nd,
                    plot_height,
                );
            });
        });

        self.draw_error_modal(ctx);
    }
}
