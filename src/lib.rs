//! Mantle Evolution Simulator Library
//!
//! Closed-form radiogenic isotope evolution for the Lu-Hf and Sm-Nd
//! decay systems across bulk, depleted-mantle and crust reservoirs,
//! with an egui desktop front end and SVG/JSON export.

pub mod app;
pub mod evolution;
pub mod export;

pub use app::EvolutionApp;
pub use evolution::{EvolutionCurves, EvolutionSimulator, ModelParams};
