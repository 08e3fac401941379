//! Mantle Evolution Simulator - Main Entry Point
//!
//! Desktop application for interactive mantle-crust isotopic evolution
//! modeling with chart export

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::egui;
use mantle_simulator_lib::{EvolutionApp, EvolutionSimulator};

fn main() -> eframe::Result<()> {
    // Initialize logging
    env_logger::init();

    // Model parameters from config or documented defaults
    let simulator = EvolutionSimulator::new();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1180.0, 760.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Mantle Evolution Simulator",
        options,
        Box::new(|_cc| Ok(Box::new(EvolutionApp::new(simulator)))),
    )
}
